use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const NO_REQUEST: u8 = 0;
const REQUEST_IDLE: u8 = 1;
const REQUEST_BUSY: u8 = 2;

/// Binary "request in flight" target and its per-tick EMA.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PendingState {
    pub target: bool,
    /// Always in [0, 1]; only moves through `step`
    pub smoothed: f32,
}

impl PendingState {
    /// One fixed-rate EMA step toward the target, independent of frame time.
    pub fn step(self, alpha: f32) -> Self {
        let target = if self.target { 1.0 } else { 0.0 };
        let smoothed = (self.smoothed + (target - self.smoothed) * alpha).clamp(0.0, 1.0);
        Self { smoothed, ..self }
    }
}

/// Cloneable setter for the pending target, safe to call from any thread.
/// Only the latest request before a tick is observed by that tick.
#[derive(Clone, Debug, Default)]
pub struct PendingHandle {
    request: Arc<AtomicU8>,
}

impl PendingHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pending(&self, active: bool) {
        let value = if active { REQUEST_BUSY } else { REQUEST_IDLE };
        self.request.store(value, Ordering::Release);
    }

    /// Consume the outstanding request, if any.
    pub fn take_request(&self) -> Option<bool> {
        match self.request.swap(NO_REQUEST, Ordering::AcqRel) {
            REQUEST_BUSY => Some(true),
            REQUEST_IDLE => Some(false),
            _ => None,
        }
    }
}

/// Parse a pending command word from an external caller.
pub fn parse_pending_word(word: &str) -> Option<bool> {
    match word.trim().to_ascii_lowercase().as_str() {
        "on" | "busy" | "true" | "1" | "pending" => Some(true),
        "off" | "idle" | "false" | "0" | "done" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_converges_to_target_within_100_ticks() {
        let mut state = PendingState { target: true, smoothed: 0.0 };
        for _ in 0..100 {
            state = state.step(0.05);
        }
        // 1 - 0.95^100
        assert!(state.smoothed > 0.99);
        assert!((state.smoothed - (1.0 - 0.95f32.powi(100))).abs() < 1e-3);
    }

    #[test]
    fn ema_is_monotone_and_bounded() {
        let mut state = PendingState { target: true, smoothed: 0.0 };
        let mut prev = state.smoothed;
        for _ in 0..500 {
            state = state.step(0.05);
            assert!(state.smoothed >= prev);
            assert!((0.0..=1.0).contains(&state.smoothed));
            prev = state.smoothed;
        }

        state.target = false;
        for _ in 0..500 {
            state = state.step(0.05);
            assert!(state.smoothed <= prev);
            assert!((0.0..=1.0).contains(&state.smoothed));
            prev = state.smoothed;
        }
        assert!(state.smoothed < 1e-3);
    }

    #[test]
    fn handle_keeps_latest_request() {
        let handle = PendingHandle::new();
        assert_eq!(handle.take_request(), None);
        handle.set_pending(true);
        handle.set_pending(false);
        assert_eq!(handle.take_request(), Some(false));
        assert_eq!(handle.take_request(), None);
    }

    #[test]
    fn handle_works_across_threads() {
        let handle = PendingHandle::new();
        let remote = handle.clone();
        std::thread::spawn(move || remote.set_pending(true))
            .join()
            .unwrap();
        assert_eq!(handle.take_request(), Some(true));
    }

    #[test]
    fn parses_command_words() {
        assert_eq!(parse_pending_word(" ON "), Some(true));
        assert_eq!(parse_pending_word("idle"), Some(false));
        assert_eq!(parse_pending_word("0"), Some(false));
        assert_eq!(parse_pending_word("maybe"), None);
    }
}
