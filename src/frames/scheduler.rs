//! Decides which frame to fetch next.
//!
//! The scheduler is pure bookkeeping: it never touches threads or pixels.
//! [`FrameLoader`](super::FrameLoader) feeds it requests and completions and
//! executes the [`Step`]s it hands out.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::frames::{FrameSection, Quality};

/// A fetch the loader should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub index: u32,
    /// Quality actually being fetched, after the LQ to HQ fallback
    pub quality: Quality,
    pub url: String,
}

/// Work produced by [`FrameScheduler::next_steps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Fetch(FetchRequest),
    /// The section of this frame is unknown; scheduling pauses until sections arrive
    RequestSection(u32),
    /// The section has no url at all for this frame
    Unavailable(u32),
}

/// Working set, in-flight fetches and cached qualities of one media file.
#[derive(Debug)]
pub struct FrameScheduler {
    concurrency: usize,
    lq_first: bool,
    /// Frames the view wants, fetched nearest to `cursor` first
    wanted: BTreeSet<u32>,
    cursor: u32,
    /// Frame to jump to on the next pick
    jump: Option<u32>,
    /// Explicit single-frame loads, served before the working set
    forced: VecDeque<(u32, Quality)>,
    in_flight: BTreeMap<u32, Quality>,
    sections: HashMap<u32, FrameSection>,
    awaiting_section: Option<u32>,
    loaded: HashMap<u32, Quality>,
}

impl FrameScheduler {
    pub fn new(concurrency: usize, lq_first: bool) -> Self {
        Self {
            concurrency: concurrency.max(1),
            lq_first,
            wanted: BTreeSet::new(),
            cursor: 0,
            jump: None,
            forced: VecDeque::new(),
            in_flight: BTreeMap::new(),
            sections: HashMap::new(),
            awaiting_section: None,
            loaded: HashMap::new(),
        }
    }

    fn default_quality(&self) -> Quality {
        if self.lq_first { Quality::Lq } else { Quality::Hq }
    }

    fn has_at_least(&self, index: u32, quality: Quality) -> bool {
        self.loaded.get(&index).is_some_and(|q| *q >= quality)
    }

    pub fn push_sections(&mut self, sections: impl IntoIterator<Item = FrameSection>) {
        for section in sections {
            self.sections.insert(section.index, section);
        }
        self.awaiting_section = None;
    }

    pub fn has_section(&self, index: u32) -> bool {
        self.sections.contains_key(&index)
    }

    /// Replace the working set. Scheduling restarts from its lowest frame.
    pub fn set_frames_to_load(&mut self, frames: impl IntoIterator<Item = u32>) {
        let quality = self.default_quality();
        self.wanted = frames
            .into_iter()
            .filter(|i| !self.has_at_least(*i, quality))
            .collect();
        if let Some(first) = self.wanted.first() {
            self.cursor = *first;
        }
    }

    pub fn add_frames_to_load(&mut self, frames: impl IntoIterator<Item = u32>) {
        let quality = self.default_quality();
        for index in frames {
            if !self.has_at_least(index, quality) {
                self.wanted.insert(index);
            }
        }
    }

    /// Fetch `index` next and continue the working set from there.
    pub fn set_next_frame_to_load(&mut self, index: u32) {
        if !self.has_at_least(index, self.default_quality()) {
            self.wanted.insert(index);
        }
        self.jump = Some(index);
    }

    /// Ask for one frame at `quality` regardless of the working set.
    ///
    /// Returns `false` if that quality (or better) is already cached or queued.
    pub fn request(&mut self, index: u32, quality: Quality) -> bool {
        if self.has_at_least(index, quality)
            || self.in_flight.get(&index).is_some_and(|q| *q >= quality)
            || self.forced.contains(&(index, quality))
        {
            return false;
        }
        self.forced.push_back((index, quality));
        true
    }

    /// Pending frame nearest to the cursor, preferring frames ahead of it on ties.
    fn nearest_wanted(&self) -> Option<u32> {
        let ahead = self.wanted.range(self.cursor..).next().copied();
        let behind = self.wanted.range(..self.cursor).next_back().copied();
        match (ahead, behind) {
            (Some(a), Some(b)) if self.cursor - b < a - self.cursor => Some(b),
            (Some(a), _) => Some(a),
            (None, b) => b,
        }
    }

    fn pick(&mut self) -> Option<(u32, Quality)> {
        if let Some(forced) = self.forced.front() {
            return Some(*forced);
        }
        if let Some(jump) = self.jump.take() {
            self.cursor = jump;
        }
        let index = self.nearest_wanted()?;
        self.cursor = index;
        Some((index, self.default_quality()))
    }

    fn remove_picked(&mut self, index: u32, quality: Quality) {
        if self.forced.front() == Some(&(index, quality)) {
            self.forced.pop_front();
        } else {
            self.wanted.remove(&index);
        }
    }

    /// Hand out as much work as the concurrency limit allows.
    pub fn next_steps(&mut self) -> Vec<Step> {
        let mut steps = Vec::new();
        if self.awaiting_section.is_some() {
            return steps;
        }

        let in_flight = &self.in_flight;
        self.wanted.retain(|i| !in_flight.contains_key(i));

        while self.in_flight.len() < self.concurrency {
            let Some((index, quality)) = self.pick() else {
                break;
            };
            let Some(section) = self.sections.get(&index) else {
                self.awaiting_section = Some(index);
                steps.push(Step::RequestSection(index));
                break;
            };
            let target = section
                .url_for(quality)
                .map(|(served, url)| (served, url.to_string()));
            self.remove_picked(index, quality);

            match target {
                Some((served, _)) if self.has_at_least(index, served) => {}
                Some((served, url)) => {
                    if served != quality {
                        log::warn!("No {} url for frame {}, using {}", quality, index, served);
                    }
                    self.in_flight.insert(index, served);
                    steps.push(Step::Fetch(FetchRequest {
                        index,
                        quality: served,
                        url,
                    }));
                }
                None => steps.push(Step::Unavailable(index)),
            }
        }
        steps
    }

    /// Record a finished fetch. Returns `true` if its pixels should replace the cache.
    ///
    /// An LQ result never replaces an HQ frame that arrived first.
    pub fn on_completed(&mut self, index: u32, quality: Quality, success: bool) -> bool {
        if self.in_flight.get(&index) == Some(&quality) {
            self.in_flight.remove(&index);
        }
        if !success || self.has_at_least(index, quality) {
            return false;
        }
        self.loaded.insert(index, quality);
        true
    }

    pub fn loaded_quality(&self, index: u32) -> Option<Quality> {
        self.loaded.get(&index).copied()
    }

    pub fn is_in_flight(&self, index: u32) -> bool {
        self.in_flight.contains_key(&index)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Frames still waiting to be fetched.
    pub fn pending_count(&self) -> usize {
        self.wanted.len() + self.forced.len()
    }

    /// Forget everything, including sections and cached qualities.
    pub fn cleanup(&mut self) {
        self.wanted.clear();
        self.forced.clear();
        self.in_flight.clear();
        self.sections.clear();
        self.loaded.clear();
        self.awaiting_section = None;
        self.jump = None;
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections(range: std::ops::Range<u32>) -> Vec<FrameSection> {
        range
            .map(|i| {
                FrameSection::new(
                    i,
                    Some(&format!("lq/{}.png", i)),
                    Some(&format!("hq/{}.png", i)),
                )
            })
            .collect()
    }

    fn fetched(steps: &[Step]) -> Vec<u32> {
        steps
            .iter()
            .filter_map(|s| match s {
                Step::Fetch(r) => Some(r.index),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_concurrency_limit() {
        let mut s = FrameScheduler::new(2, true);
        s.push_sections(sections(0..10));
        s.set_frames_to_load(0..10);
        assert_eq!(fetched(&s.next_steps()), vec![0, 1]);
        assert!(s.next_steps().is_empty());

        assert!(s.on_completed(0, Quality::Lq, true));
        assert_eq!(fetched(&s.next_steps()), vec![2]);
        assert_eq!(s.pending_count(), 7);
    }

    #[test]
    fn test_missing_section_pauses_scheduling() {
        let mut s = FrameScheduler::new(2, true);
        s.set_frames_to_load([4, 5]);
        assert_eq!(s.next_steps(), vec![Step::RequestSection(4)]);
        assert!(s.next_steps().is_empty());

        s.push_sections(sections(4..6));
        assert_eq!(fetched(&s.next_steps()), vec![4, 5]);
    }

    #[test]
    fn test_jump_then_nearest_forward() {
        let mut s = FrameScheduler::new(1, true);
        s.push_sections(sections(0..10));
        s.set_frames_to_load(0..10);
        assert_eq!(fetched(&s.next_steps()), vec![0]);
        s.on_completed(0, Quality::Lq, true);

        s.set_next_frame_to_load(7);
        assert_eq!(fetched(&s.next_steps()), vec![7]);
        s.on_completed(7, Quality::Lq, true);
        // 6 and 8 are equally close; playback runs forward
        assert_eq!(fetched(&s.next_steps()), vec![8]);
        s.on_completed(8, Quality::Lq, true);
        assert_eq!(fetched(&s.next_steps()), vec![9]);
        s.on_completed(9, Quality::Lq, true);
        assert_eq!(fetched(&s.next_steps()), vec![6]);
    }

    #[test]
    fn test_lq_never_overwrites_hq() {
        let mut s = FrameScheduler::new(2, true);
        s.push_sections(sections(0..1));
        assert!(s.request(0, Quality::Hq));
        let steps = s.next_steps();
        assert_eq!(
            steps,
            vec![Step::Fetch(FetchRequest {
                index: 0,
                quality: Quality::Hq,
                url: "hq/0.png".into(),
            })]
        );
        assert!(s.on_completed(0, Quality::Hq, true));
        assert!(!s.request(0, Quality::Lq));
        assert!(!s.on_completed(0, Quality::Lq, true));
        assert_eq!(s.loaded_quality(0), Some(Quality::Hq));
    }

    #[test]
    fn test_lq_falls_back_to_hq_url() {
        let mut s = FrameScheduler::new(2, true);
        s.push_sections([FrameSection::new(3, None, Some("hq/3.png"))]);
        s.set_frames_to_load([3]);
        match s.next_steps().as_slice() {
            [Step::Fetch(r)] => {
                assert_eq!(r.quality, Quality::Hq);
                assert_eq!(r.url, "hq/3.png");
            }
            other => panic!("unexpected steps {:?}", other),
        }
    }

    #[test]
    fn test_frame_without_urls_is_unavailable() {
        let mut s = FrameScheduler::new(2, true);
        s.push_sections([FrameSection::new(1, None, None)]);
        s.set_frames_to_load([1]);
        assert_eq!(s.next_steps(), vec![Step::Unavailable(1)]);
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn test_failed_fetch_is_not_cached() {
        let mut s = FrameScheduler::new(2, true);
        s.push_sections(sections(0..2));
        s.set_frames_to_load([0]);
        s.next_steps();
        assert!(!s.on_completed(0, Quality::Lq, false));
        assert_eq!(s.loaded_quality(0), None);
        assert_eq!(s.in_flight_count(), 0);
    }

    #[test]
    fn test_cleanup_forgets_everything() {
        let mut s = FrameScheduler::new(2, true);
        s.push_sections(sections(0..4));
        s.set_frames_to_load(0..4);
        s.next_steps();
        s.cleanup();
        assert_eq!(s.pending_count(), 0);
        assert_eq!(s.in_flight_count(), 0);
        assert!(!s.has_section(0));
    }
}
