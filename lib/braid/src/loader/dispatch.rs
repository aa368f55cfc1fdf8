use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Decides when the loaders of a request may be dispatched.
///
/// Loads enqueued while a batch is in flight wait for it: a batch answering
/// late may still add fetches at the depth being collected, and those belong
/// in the same batches as the ones already waiting.
#[derive(Debug, Default)]
pub struct DispatchState {
    in_flight: AtomicUsize,
    fields_entered_once: AtomicBool,
}

impl DispatchState {
    /// Called when the root selection set is entered. Returns true the first time.
    pub fn enter_fields(&self) -> bool {
        !self.fields_entered_once.swap(true, Ordering::SeqCst)
    }

    pub fn fields_entered_once(&self) -> bool {
        self.fields_entered_once.load(Ordering::SeqCst)
    }

    pub fn batch_started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub fn batch_finished(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_sub(1))
            });
    }

    pub fn batches_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn should_dispatch(&self) -> bool {
        self.fields_entered_once() && self.batches_in_flight() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchState;

    #[test]
    fn waits_for_fields_and_batches_in_flight() {
        let state = DispatchState::default();
        assert!(!state.should_dispatch());

        assert!(state.enter_fields());
        assert!(!state.enter_fields());
        assert!(state.should_dispatch());

        state.batch_started();
        state.batch_started();
        state.batch_finished();
        assert!(!state.should_dispatch());
        state.batch_finished();
        assert!(state.should_dispatch());

        state.batch_finished();
        assert_eq!(state.batches_in_flight(), 0);
    }
}
