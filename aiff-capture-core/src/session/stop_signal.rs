use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared between a controller and a capture loop.
///
/// Checked without blocking at the top of every loop iteration. Firing is
/// permanent.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    fired: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.fired.store(true, Ordering::SeqCst);
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let signal = StopSignal::new();
        let other = signal.clone();
        assert!(!other.is_fired());

        signal.fire();
        assert!(other.is_fired());
        signal.fire();
        assert!(signal.is_fired());
    }
}
