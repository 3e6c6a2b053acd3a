use futures::future::{AbortHandle, AbortRegistration, Abortable};

/// Read-only view of a task's cancellation handle, handed to the operation
/// that performs the request.
#[derive(Debug, Clone)]
pub struct CancelSignal(AbortHandle);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        self.0.is_aborted()
    }

    /// Signal that never fires, for running an operation outside a tracker.
    pub fn never() -> Self {
        let (handle, _) = AbortHandle::new_pair();
        CancelSignal(handle)
    }
}

/// Owned cancellation handle; exactly one exists per running task.
#[derive(Debug)]
pub struct CancelHandle {
    handle: AbortHandle,
}

impl CancelHandle {
    pub fn new() -> (Self, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        (CancelHandle { handle }, registration)
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal(self.handle.clone())
    }

    /// Aborts the guarded future. Consuming the handle makes it unusable afterwards.
    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn wrap<F>(registration: AbortRegistration, future: F) -> Abortable<F> {
        Abortable::new(future, registration)
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn cancelling_aborts_wrapped_future() {
        let (handle, registration) = CancelHandle::new();
        let signal = handle.signal();
        let guarded = CancelHandle::wrap(registration, futures::future::pending::<()>());

        assert!(!signal.is_cancelled());
        handle.cancel();

        assert!(signal.is_cancelled());
        assert!(block_on(guarded).is_err());
    }

    #[test]
    fn never_signal_stays_quiet() {
        assert!(!CancelSignal::never().is_cancelled());
    }
}
