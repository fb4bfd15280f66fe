//! The error slot the host inspects after a failed call.

use crate::error::BridgeError;
use parking_lot::Mutex;

/// Holds the most recent failure for the host to pick up.
///
/// A new failure replaces the previous one.
#[derive(Debug, Default)]
pub struct ErrorSlot {
    error: Mutex<Option<BridgeError>>,
}

impl ErrorSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `error`, replacing any previous one.
    pub fn set(&self, error: BridgeError) {
        *self.error.lock() = Some(error);
    }

    /// Remove and return the stored failure.
    pub fn take(&self) -> Option<BridgeError> {
        self.error.lock().take()
    }

    /// Return a copy of the stored failure, leaving it in place.
    pub fn peek(&self) -> Option<BridgeError> {
        self.error.lock().clone()
    }

    /// Whether a failure is stored.
    pub fn is_set(&self) -> bool {
        self.error.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_peek_take() {
        let slot = ErrorSlot::new();
        assert!(!slot.is_set());

        slot.set(BridgeError::http(500));
        slot.set(BridgeError::http(404));
        assert_eq!(slot.peek().and_then(|e| e.status()), Some(404));
        assert!(slot.is_set());

        assert_eq!(slot.take().and_then(|e| e.status()), Some(404));
        assert!(slot.take().is_none());
    }
}
