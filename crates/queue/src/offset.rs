//! Batch-offset window bookkeeping.
//!
//! While a window is open, at most `max_parallel` units may start in total.
//! The window closes only when its timer fires, so slots freed mid-window
//! stay empty until then.

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct OffsetWindow {
    count: usize,
    timer: Option<CancellationToken>,
}

impl OffsetWindow {
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Units admitted in the current window.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Starts a new window whose end is signalled by `timer`'s owner.
    pub fn open(&mut self, timer: CancellationToken) {
        self.count = 0;
        self.timer = Some(timer);
    }

    /// Claims up to `wanted` slots without exceeding `max` per window.
    /// Returns the number granted.
    pub fn claim(&mut self, wanted: usize, max: usize) -> usize {
        let granted = (self.count + wanted).min(max).saturating_sub(self.count);
        self.count += granted;
        granted
    }

    /// Called when the window's timer has fired.
    pub fn elapse(&mut self) {
        self.count = 0;
        self.timer = None;
    }

    /// Tears the window down, cancelling a pending timer.
    pub fn close(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.count = 0;
    }
}
