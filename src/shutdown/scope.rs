// src/shutdown/scope.rs

use std::any::Any;

use tokio::task::JoinError;

use crate::errors::SafeRunError;

/// How a scoped execution ended.
///
/// The wrapper never re-raises; this value is the only way a caller learns
/// whether the work failed or was cancelled.
#[derive(Debug)]
pub enum ScopeOutcome {
    /// The work returned `Ok(())`.
    Completed,
    /// The work reported [`SafeRunError::Interrupted`].
    Interrupted,
    /// The work returned any other error, or panicked.
    Failed(SafeRunError),
}

impl ScopeOutcome {
    pub(crate) fn from_join(res: Result<Result<(), SafeRunError>, JoinError>) -> Self {
        match res {
            Ok(Ok(())) => ScopeOutcome::Completed,
            Ok(Err(SafeRunError::Interrupted)) => ScopeOutcome::Interrupted,
            Ok(Err(err)) => ScopeOutcome::Failed(err),
            Err(join_err) if join_err.is_cancelled() => ScopeOutcome::Interrupted,
            Err(join_err) => {
                let msg = panic_message(join_err.into_panic());
                ScopeOutcome::Failed(SafeRunError::WorkPanicked(msg))
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ScopeOutcome::Completed)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, ScopeOutcome::Interrupted)
    }

    pub fn error(&self) -> Option<&SafeRunError> {
        match self {
            ScopeOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Process exit status for this outcome. A user asking to stop is a
    /// normal termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            ScopeOutcome::Completed | ScopeOutcome::Interrupted => 0,
            ScopeOutcome::Failed(_) => 1,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(ScopeOutcome::Completed.exit_code(), 0);
        assert_eq!(ScopeOutcome::Interrupted.exit_code(), 0);
        assert_eq!(
            ScopeOutcome::Failed(SafeRunError::UnknownUnit("x".into())).exit_code(),
            1
        );
    }

    #[test]
    fn interrupted_error_maps_to_interrupted_outcome() {
        let outcome = ScopeOutcome::from_join(Ok(Err(SafeRunError::Interrupted)));
        assert!(outcome.is_interrupted());
        assert!(outcome.error().is_none());
    }
}
