use std::sync::{Arc, Mutex};

/// First-error-wins message latch.
///
/// The first message recorded sticks until [`clear`](StickyError::clear);
/// later candidates are dropped so the root cause is what reaches the
/// operator. Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct StickyError {
    slot: Arc<Mutex<Option<String>>>,
}

impl StickyError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` unless a message is already latched.
    pub fn set_if_empty(&self, message: impl Into<String>) {
        let mut slot = self.lock();
        if slot.is_none() {
            *slot = Some(message.into());
        }
    }

    pub fn get(&self) -> Option<String> {
        self.lock().clone()
    }

    pub fn has(&self) -> bool {
        self.lock().is_some()
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_wins() {
        let sticky = StickyError::new();
        sticky.set_if_empty("root cause");
        sticky.set_if_empty("follow-on noise");
        assert_eq!(sticky.get().as_deref(), Some("root cause"));
    }

    #[test]
    fn clear_rearms_the_latch() {
        let sticky = StickyError::new();
        sticky.set_if_empty("first");
        sticky.clear();
        assert!(!sticky.has());
        sticky.set_if_empty("second");
        assert_eq!(sticky.get().as_deref(), Some("second"));
    }

    #[test]
    fn clones_share_the_slot() {
        let sticky = StickyError::new();
        let clone = sticky.clone();
        clone.set_if_empty("shared");
        assert_eq!(sticky.get().as_deref(), Some("shared"));
    }
}
