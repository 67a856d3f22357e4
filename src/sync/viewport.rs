use std::time::Duration;

use tokio::time::{sleep_until, Instant};

use crate::map::geo::Viewport;

/// A cancellable one-shot deadline.
///
/// Nothing is spawned: the owner awaits [`DebounceTimer::wait`] on a copy of the
/// deadline, so cancelling is just forgetting it and teardown leaves nothing
/// behind to fire.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl DebounceTimer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    pub fn quiet(&self) -> Duration {
        self.quiet
    }

    /// (Re)starts the quiet window from now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.quiet);
    }

    /// Returns whether a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarms and returns true if the deadline has passed.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Resolves at `deadline`; never resolves for `None`.
    pub async fn wait(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => futures::future::pending::<()>().await,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackerSignal {
    /// The hint state flipped. `true` means "zoom in to see parcels".
    BelowZoomThreshold(bool),
    /// A settled viewport at a zoom where data may be loaded.
    BoundsChanged(Viewport),
}

/// Turns raw move/zoom gestures into settled, zoom-gated viewports.
#[derive(Debug)]
pub struct ViewportTracker {
    min_zoom: u8,
    timer: DebounceTimer,
    pending: Option<Viewport>,
    current: Option<Viewport>,
    below_threshold: Option<bool>,
    disposed: bool,
}

impl ViewportTracker {
    pub fn new(min_zoom: u8, quiet: Duration) -> Self {
        Self {
            min_zoom,
            timer: DebounceTimer::new(quiet),
            pending: None,
            current: None,
            below_threshold: None,
            disposed: false,
        }
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn allows(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom
    }

    pub fn timer(&self) -> &DebounceTimer {
        &self.timer
    }

    /// Last viewport that went through the gate.
    pub fn current(&self) -> Option<Viewport> {
        self.current
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Pan finished. Evaluation waits for the quiet window; a later move
    /// restarts it.
    pub fn move_ended(&mut self, viewport: Viewport) {
        if self.disposed {
            return;
        }
        self.pending = Some(viewport);
        self.timer.arm();
    }

    /// Zoom finished. Drops any pending pan and evaluates right away.
    pub fn zoom_ended(&mut self, viewport: Viewport) -> Vec<TrackerSignal> {
        if self.disposed {
            return Vec::new();
        }
        self.timer.cancel();
        self.pending = None;
        self.evaluate(viewport)
    }

    /// Called when the timer's deadline passes.
    pub fn timer_fired(&mut self, now: Instant) -> Vec<TrackerSignal> {
        if self.disposed || !self.timer.take_if_due(now) {
            return Vec::new();
        }
        match self.pending.take() {
            Some(viewport) => self.evaluate(viewport),
            None => Vec::new(),
        }
    }

    /// Applies the zoom gate to `viewport`.
    pub fn evaluate(&mut self, viewport: Viewport) -> Vec<TrackerSignal> {
        if self.disposed {
            return Vec::new();
        }
        self.current = Some(viewport);

        let below = !self.allows(viewport.zoom);
        let mut signals = Vec::new();
        if self.below_threshold != Some(below) {
            self.below_threshold = Some(below);
            signals.push(TrackerSignal::BelowZoomThreshold(below));
        }
        if below {
            log::debug!("Zoom {} below {}, not loading parcels", viewport.zoom, self.min_zoom);
        } else {
            signals.push(TrackerSignal::BoundsChanged(viewport));
        }
        signals
    }

    /// Unmount. Any pending timer is dropped and nothing evaluates afterwards.
    pub fn teardown(&mut self) {
        self.timer.cancel();
        self.pending = None;
        self.disposed = true;
    }
}
