use std::collections::VecDeque;
use std::time::Duration;

/// Limits for one streaming pass, shared by every streamer run that frame.
///
/// `global_used` counts bytes held by all streamers. Each streamer may grow
/// up to `global_total` minus what the others hold, and updates `global_used`
/// when its pass ends so the next streamer sees the new figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamBudget {
    pub global_total: u64,
    pub global_used: u64,
    /// Per-frame transfer cap.
    pub frame_cap: u64,
    pub frame_remaining: u64,
    /// False while loads are suspended; evictions still run.
    pub allow_loads: bool,
}

impl StreamBudget {
    pub fn new(global_total: u64, frame_cap: u64) -> Self {
        Self {
            global_total,
            global_used: 0,
            frame_cap,
            frame_remaining: frame_cap,
            allow_loads: true,
        }
    }

    pub fn with_used(mut self, global_used: u64) -> Self {
        self.global_used = global_used;
        self
    }

    pub fn global_remaining(&self) -> u64 {
        self.global_total.saturating_sub(self.global_used)
    }

    /// Bytes moved so far this frame.
    pub fn transferred(&self) -> u64 {
        self.frame_cap.saturating_sub(self.frame_remaining)
    }

    /// Nothing has been charged against the frame cap yet.
    pub fn is_untouched(&self) -> bool {
        self.frame_remaining == self.frame_cap
    }

    /// Charge a transfer against the frame cap.
    ///
    /// A transfer larger than the whole cap is allowed only as the first one
    /// of the frame, so oversized-for-cap resources still make progress.
    pub(crate) fn try_charge(&mut self, bytes: u64) -> bool {
        if bytes <= self.frame_remaining {
            self.frame_remaining -= bytes;
            true
        } else if bytes > self.frame_cap && self.frame_cap > 0 && self.is_untouched() {
            self.frame_remaining = 0;
            true
        } else {
            false
        }
    }
}

/// Rolling window of streaming pass durations.
#[derive(Debug, Clone)]
pub struct PassTimer {
    samples: VecDeque<Duration>,
    window: usize,
}

impl PassTimer {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed);
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn last(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    pub fn average(&self) -> Duration {
        match self.samples.len() {
            0 => Duration::ZERO,
            n => self.samples.iter().sum::<Duration>() / n as u32,
        }
    }

    pub fn max(&self) -> Duration {
        self.samples.iter().copied().max().unwrap_or_default()
    }
}

impl Default for PassTimer {
    fn default() -> Self {
        Self::new(120)
    }
}
