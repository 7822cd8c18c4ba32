use std::sync::{Arc, Mutex};

/// Participant in the driver's per-iteration barrier.
///
/// Before each control loop iteration the driver calls
/// [`block_until_ready`] on every registered participant, and after the
/// iteration it calls [`begin_background_work`] whether or not the iteration
/// succeeded. Hardware sessions use this to keep their I/O cycles off the
/// control loop's critical section.
///
/// Both methods are infallible; a participant that cannot become ready
/// should resolve that internally rather than block forever.
///
/// [`block_until_ready`]: SyncParticipant::block_until_ready
/// [`begin_background_work`]: SyncParticipant::begin_background_work
pub trait SyncParticipant: Send + Sync {
    /// Block until this participant's background work has quiesced.
    fn block_until_ready(&self);

    /// Release this participant to work until the next barrier.
    fn begin_background_work(&self);
}

/// Registration set with object-identity semantics. Registering the same
/// `Arc` twice keeps one entry.
#[derive(Default)]
pub(crate) struct ParticipantSet {
    items: Mutex<Vec<Arc<dyn SyncParticipant>>>,
}

impl ParticipantSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, participant: Arc<dyn SyncParticipant>) {
        let mut items = self.lock();
        if !items.iter().any(|p| Arc::ptr_eq(p, &participant)) {
            items.push(participant);
        }
    }

    pub(crate) fn unregister(&self, participant: &Arc<dyn SyncParticipant>) {
        self.lock().retain(|p| !Arc::ptr_eq(p, participant));
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn SyncParticipant>> {
        self.lock().clone()
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn SyncParticipant>>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl SyncParticipant for Noop {
        fn block_until_ready(&self) {}
        fn begin_background_work(&self) {}
    }

    #[test]
    fn registering_twice_keeps_one_entry() {
        let set = ParticipantSet::new();
        let participant: Arc<dyn SyncParticipant> = Arc::new(Noop);
        set.register(Arc::clone(&participant));
        set.register(Arc::clone(&participant));
        assert_eq!(set.snapshot().len(), 1);
    }

    #[test]
    fn unregister_removes_by_identity() {
        let set = ParticipantSet::new();
        let first: Arc<dyn SyncParticipant> = Arc::new(Noop);
        let second: Arc<dyn SyncParticipant> = Arc::new(Noop);
        set.register(Arc::clone(&first));
        set.register(Arc::clone(&second));
        set.unregister(&first);
        let rest = set.snapshot();
        assert_eq!(rest.len(), 1);
        assert!(Arc::ptr_eq(&rest[0], &second));
    }
}
