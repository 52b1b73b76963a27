//! Fixed-rate video playback.

use std::time::Duration;

/// What a playback tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStep {
    /// Not playing, or not enough time has passed
    Idle,
    /// Moved to `frame`, whose pixels are available
    Advanced(u32),
    /// Moved to `frame` but its pixels are not loaded yet; show a loading state
    Waiting(u32),
}

/// Advances `current mod total` at a fixed interval.
///
/// While the current frame is still loading, playback holds on it instead of
/// racing ahead over frames that have no pixels.
#[derive(Debug, Clone)]
pub struct Playback {
    interval: Duration,
    playing: bool,
    elapsed: Duration,
    waiting: bool,
}

impl Playback {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / fps.max(1),
            playing: false,
            elapsed: Duration::ZERO,
            waiting: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn play(&mut self) {
        self.playing = true;
        self.elapsed = Duration::ZERO;
    }

    pub fn pause(&mut self) {
        self.playing = false;
        self.waiting = false;
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Advance the clock by `dt`.
    pub fn tick(
        &mut self,
        dt: Duration,
        current: u32,
        total: u32,
        is_loaded: impl Fn(u32) -> bool,
    ) -> PlaybackStep {
        if !self.playing || total == 0 {
            return PlaybackStep::Idle;
        }
        if self.waiting {
            if !is_loaded(current) {
                return PlaybackStep::Idle;
            }
            self.waiting = false;
            self.elapsed = Duration::ZERO;
            return PlaybackStep::Advanced(current);
        }

        self.elapsed += dt;
        if self.elapsed < self.interval {
            return PlaybackStep::Idle;
        }
        self.elapsed -= self.interval;
        // Dropped ticks are not caught up
        if self.elapsed >= self.interval {
            self.elapsed = Duration::ZERO;
        }

        let next = (current + 1) % total;
        if is_loaded(next) {
            PlaybackStep::Advanced(next)
        } else {
            self.waiting = true;
            PlaybackStep::Waiting(next)
        }
    }
}
