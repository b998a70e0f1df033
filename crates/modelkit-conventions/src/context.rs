//! Per-dispatch convention context.
//!
//! A dispatch walks its conventions with one context. The context moves
//! `Idle -> Processing` before each convention runs, and ends either `Stopped` (a
//! convention halted propagation, optionally replacing the subject) or `Completed`
//! (every convention ran).

/// Where a dispatch is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextState<T> {
    Idle,
    Processing,
    /// Propagation halted; the payload is the subject handed back to the originator,
    /// `None` when the subject was removed.
    Stopped(Option<T>),
    Completed,
}

/// Handle conventions use to inspect the event's subject and stop propagation.
#[derive(Debug, Clone)]
pub struct ConventionContext<T> {
    subject: T,
    state: ContextState<T>,
}

impl<T: Clone + PartialEq> ConventionContext<T> {
    pub fn new(subject: T) -> Self {
        Self {
            subject,
            state: ContextState::Idle,
        }
    }

    /// The subject as it was when the dispatch started.
    pub fn subject(&self) -> &T {
        &self.subject
    }

    pub fn state(&self) -> &ContextState<T> {
        &self.state
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, ContextState::Stopped(_))
    }

    /// Halt propagation and keep the current subject.
    pub fn stop_processing(&mut self) {
        self.state = ContextState::Stopped(Some(self.subject.clone()));
    }

    /// Halt propagation and hand back `result` instead of the subject. `None` signals
    /// that the subject no longer participates in the model.
    pub fn stop_processing_with(&mut self, result: Option<T>) {
        self.state = ContextState::Stopped(result);
    }

    /// Halt only if `result` differs from the current subject.
    pub fn stop_processing_if_changed(&mut self, result: Option<T>) {
        if result.as_ref() != Some(&self.subject) {
            self.stop_processing_with(result);
        }
    }

    /// Enter `Processing` before the next convention runs.
    pub(crate) fn begin(&mut self) {
        if !self.is_stopped() {
            self.state = ContextState::Processing;
        }
    }

    /// Mark the dispatch complete unless it was stopped.
    pub(crate) fn complete(&mut self) {
        if !self.is_stopped() {
            self.state = ContextState::Completed;
        }
    }

    /// The result for the event's originator.
    pub(crate) fn into_result(self) -> Option<T> {
        match self.state {
            ContextState::Stopped(result) => result,
            _ => Some(self.subject),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_completes() {
        let mut ctx = ConventionContext::new(7u32);
        assert_eq!(ctx.state(), &ContextState::Idle);
        ctx.begin();
        assert_eq!(ctx.state(), &ContextState::Processing);
        ctx.complete();
        assert_eq!(ctx.state(), &ContextState::Completed);
        assert_eq!(ctx.into_result(), Some(7));
    }

    #[test]
    fn test_stop_keeps_subject() {
        let mut ctx = ConventionContext::new(7u32);
        ctx.begin();
        ctx.stop_processing();
        ctx.complete();
        assert!(ctx.is_stopped());
        assert_eq!(ctx.into_result(), Some(7));
    }

    #[test]
    fn test_stop_with_replacement_or_removal() {
        let mut ctx = ConventionContext::new(7u32);
        ctx.stop_processing_with(Some(8));
        assert_eq!(ctx.into_result(), Some(8));

        let mut ctx = ConventionContext::new(7u32);
        ctx.stop_processing_with(None);
        assert_eq!(ctx.into_result(), None);
    }

    #[test]
    fn test_stop_if_changed() {
        let mut ctx = ConventionContext::new(7u32);
        ctx.begin();
        ctx.stop_processing_if_changed(Some(7));
        assert!(!ctx.is_stopped());
        ctx.stop_processing_if_changed(None);
        assert!(ctx.is_stopped());
        ctx.begin();
        assert!(ctx.is_stopped());
    }
}
