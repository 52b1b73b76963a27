//! Sparse keyframed video annotation data.
//!
//! Only sampled frames are stored. Values for other frames are resolved at
//! read time from the nearest keyframe (or, opt-in, by interpolation).

use std::collections::BTreeMap;

use annotate_geom::{BoundingBox, CompoundPath, ImagePoint};
use serde::{Deserialize, Serialize};

use super::payload::{DirectionalVector, Payload, Polyline, Skeleton, SkeletonNode};
use super::sub_annotation::SubAnnotations;
use crate::error::{EngineError, Result};

/// Inclusive frame range `[start, end]`, wire shape `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment(pub u32, pub u32);

impl Segment {
    pub fn start(&self) -> u32 {
        self.0
    }

    pub fn end(&self) -> u32 {
        self.1
    }

    pub fn contains(&self, frame: u32) -> bool {
        frame >= self.0 && frame <= self.1
    }

    pub fn len(&self) -> u32 {
        self.1.saturating_sub(self.0)
    }
}

/// Keyframes plus the frame ranges the annotation is visible in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoData {
    pub frames: BTreeMap<u32, Payload>,
    pub segments: Vec<Segment>,
    pub sub_frames: BTreeMap<u32, SubAnnotations>,
    /// Author asked for interpolation between keyframes
    pub interpolated: bool,
}

impl VideoData {
    /// A single keyframe visible from `frame` until `last_frame`.
    pub fn starting_at(frame: u32, last_frame: u32, payload: Payload) -> Self {
        Self {
            frames: BTreeMap::from([(frame, payload)]),
            segments: vec![Segment(frame, last_frame.max(frame))],
            sub_frames: BTreeMap::new(),
            interpolated: false,
        }
    }

    /// Whether any segment covers `frame`.
    pub fn is_visible_at(&self, frame: u32) -> bool {
        self.segments.iter().any(|s| s.contains(frame))
    }

    /// Nearest keyframe payload, see [`find_closest_keyframe`].
    pub fn closest_keyframe(&self, frame: u32) -> Option<(u32, &Payload)> {
        find_closest_keyframe(&self.frames, frame)
    }

    /// Sub-annotations stored at or before `frame`.
    pub fn previous_sub_frame(&self, frame: u32) -> Option<(u32, &SubAnnotations)> {
        self.sub_frames.range(..=frame).next_back().map(|(k, v)| (*k, v))
    }
}

/// Nearest keyframe at or before `frame`; if there is none, the nearest after it.
pub fn find_closest_keyframe<T>(frames: &BTreeMap<u32, T>, frame: u32) -> Option<(u32, &T)> {
    frames
        .range(..=frame)
        .next_back()
        .or_else(|| frames.range(frame..).next())
        .map(|(k, v)| (*k, v))
}

/// Linear blend of two keyframes, if their shapes are compatible.
pub fn interpolate_payload(from: &Payload, to: &Payload, t: f64) -> Option<Payload> {
    let lerp = |a: f64, b: f64| a + (b - a) * t;
    let lerp_points = |a: &[ImagePoint], b: &[ImagePoint]| -> Option<Vec<ImagePoint>> {
        (a.len() == b.len()).then(|| a.iter().zip(b).map(|(p, q)| p.lerp(q, t)).collect())
    };

    match (from, to) {
        (Payload::BoundingBox(a), Payload::BoundingBox(b)) => Some(Payload::BoundingBox(
            BoundingBox::new(lerp(a.x, b.x), lerp(a.y, b.y), lerp(a.w, b.w), lerp(a.h, b.h)),
        )),
        (Payload::DirectionalVector(a), Payload::DirectionalVector(b)) => {
            Some(Payload::DirectionalVector(DirectionalVector {
                angle: lerp(a.angle, b.angle),
                length: lerp(a.length, b.length),
            }))
        }
        (Payload::Polygon(a), Payload::Polygon(b)) => {
            if a.additional_paths.len() != b.additional_paths.len() {
                return None;
            }
            let path = lerp_points(&a.path, &b.path)?;
            let additional_paths = a
                .additional_paths
                .iter()
                .zip(&b.additional_paths)
                .map(|(p, q)| lerp_points(p, q))
                .collect::<Option<Vec<_>>>()?;
            Some(Payload::Polygon(CompoundPath::with_additional(path, additional_paths)))
        }
        (Payload::Polyline(a), Payload::Polyline(b)) => Some(Payload::Polyline(Polyline {
            path: lerp_points(&a.path, &b.path)?,
        })),
        (Payload::Skeleton(a), Payload::Skeleton(b)) => {
            if a.nodes.len() != b.nodes.len() {
                return None;
            }
            let nodes = a
                .nodes
                .iter()
                .zip(&b.nodes)
                .map(|(p, q)| SkeletonNode {
                    x: lerp(p.x, q.x),
                    y: lerp(p.y, q.y),
                    label: p.label.clone(),
                })
                .collect();
            Some(Payload::Skeleton(Skeleton { nodes }))
        }
        _ => None,
    }
}

/// Interpolated value at `frame`, falling back to the closest keyframe when the
/// surrounding keyframes can't be blended.
pub fn interpolate_at(frames: &BTreeMap<u32, Payload>, frame: u32) -> Option<Payload> {
    let before = frames.range(..=frame).next_back();
    let after = frames.range(frame..).next();
    match (before, after) {
        (Some((&a, from)), Some((&b, to))) if a != b => {
            let t = f64::from(frame - a) / f64::from(b - a);
            interpolate_payload(from, to, t).or_else(|| Some(from.clone()))
        }
        _ => find_closest_keyframe(frames, frame).map(|(_, p)| p.clone()),
    }
}

/// Move or resize segment `index` to `[start, end]` (rounded, clamped to the video).
///
/// A pure move (same length) shifts the segment's keyframes with it. Keyframes
/// that end up outside the video are dropped, except that the one closest to
/// each edge is clipped onto the first/last frame when that frame has none.
pub fn update_segment(
    data: &VideoData,
    index: usize,
    start: f64,
    end: f64,
    total_frames: u32,
) -> Result<VideoData> {
    if total_frames == 0 {
        return Err(EngineError::InvalidSegment("video has no frames".into()));
    }
    let old = *data
        .segments
        .get(index)
        .ok_or_else(|| EngineError::InvalidSegment(format!("no segment at index {index}")))?;

    let last = i64::from(total_frames - 1);
    let new_start = round_frame(start).clamp(0, last);
    let new_end = round_frame(end).clamp(new_start, last);

    let mut out = data.clone();
    out.segments[index] = Segment(new_start as u32, new_end as u32);

    let same_length = new_end - new_start == i64::from(old.len());
    let delta = new_start - i64::from(old.start());
    if !same_length || delta == 0 {
        return Ok(out);
    }

    let shifted_frames = shift_range(&data.frames, old, delta);
    let shifted_subs = shift_range(&data.sub_frames, old, delta);

    let below = shifted_frames.keys().any(|&k| k < 0);
    let above = shifted_frames.keys().any(|&k| k > last);
    if below && above {
        return Err(EngineError::InvalidSegment(
            "shift pushes keyframes past both ends of the video".into(),
        ));
    }

    out.frames = clip_to_video(shifted_frames, last);
    out.sub_frames = clip_to_video(shifted_subs, last);
    Ok(out)
}

fn round_frame(v: f64) -> i64 {
    if v.is_finite() { v.round() as i64 } else { 0 }
}

fn shift_range<T: Clone>(frames: &BTreeMap<u32, T>, range: Segment, delta: i64) -> BTreeMap<i64, T> {
    frames
        .iter()
        .map(|(&k, v)| {
            let k = i64::from(k);
            let moved = if range.contains(k as u32) { k + delta } else { k };
            (moved, v.clone())
        })
        .collect()
}

fn clip_to_video<T>(mut frames: BTreeMap<i64, T>, last: i64) -> BTreeMap<u32, T> {
    let closest_below = frames.range(..0).next_back().map(|(k, _)| *k);
    let closest_above = frames.range(last + 1..).next().map(|(k, _)| *k);

    if let Some(k) = closest_below {
        if !frames.contains_key(&0) {
            if let Some(v) = frames.remove(&k) {
                frames.insert(0, v);
            }
        }
    }
    if let Some(k) = closest_above {
        if !frames.contains_key(&last) {
            if let Some(v) = frames.remove(&k) {
                frames.insert(last, v);
            }
        }
    }

    frames
        .into_iter()
        .filter(|(k, _)| (0..=last).contains(k))
        .map(|(k, v)| (k as u32, v))
        .collect()
}
