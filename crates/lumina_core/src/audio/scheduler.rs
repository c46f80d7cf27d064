//! Gapless back-to-back scheduling of incoming speech frames.

use std::time::Duration;

use crate::ports::SourceId;

/// Where a frame landed on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub id: SourceId,
    pub start: Duration,
    pub end: Duration,
}

/// Tracks the playback cursor and the sources that have not finished yet.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start: Duration,
    next_id: SourceId,
    live: Vec<Scheduled>,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a frame of `length` right after the previous one, or at `now` if
    /// playback has already caught up.
    pub fn schedule(&mut self, length: Duration, now: Duration) -> Scheduled {
        self.live.retain(|s| s.end > now);

        let start = self.next_start.max(now);
        let end = start + length;
        self.next_id += 1;
        let scheduled = Scheduled {
            id: self.next_id,
            start,
            end,
        };
        self.next_start = end;
        self.live.push(scheduled);
        scheduled
    }

    /// Forgets every queued or playing source and rewinds the cursor to zero.
    /// Returns the sources the caller must stop.
    pub fn interrupt(&mut self) -> Vec<SourceId> {
        self.next_start = Duration::ZERO;
        self.live.drain(..).map(|s| s.id).collect()
    }

    pub fn next_start(&self) -> Duration {
        self.next_start
    }

    pub fn live_sources(&self) -> usize {
        self.live.len()
    }
}
