//! Tagged result of one remote call.
//!
//! The script generator contains its failures while the audio synthesizer
//! propagates them. [`CallOutcome`] makes that difference explicit so the
//! pipeline decides per call site what a failure means for the run.

/// A non-fatal problem reported to the user while the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// 1-based slide number the notice refers to.
    pub slide: usize,
    pub message: String,
}

impl Notice {
    pub fn new(slide: usize, message: impl Into<String>) -> Self {
        Self {
            slide,
            message: message.into(),
        }
    }
}

/// Outcome of a single remote call.
#[derive(Debug)]
pub enum CallOutcome<T, E> {
    /// The call succeeded.
    Ok(T),
    /// The call failed and a fallback value was substituted.
    Degraded { value: T, notice: Notice },
    /// The call failed and the run cannot continue.
    Fatal(E),
}

impl<T, E> CallOutcome<T, E> {
    /// Split into the usable value and an optional notice, or the fatal error.
    pub fn into_result(self) -> Result<(T, Option<Notice>), E> {
        match self {
            CallOutcome::Ok(value) => Ok((value, None)),
            CallOutcome::Degraded { value, notice } => Ok((value, Some(notice))),
            CallOutcome::Fatal(err) => Err(err),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, CallOutcome::Degraded { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CallOutcome::Fatal(_))
    }
}

impl<T, E> From<Result<T, E>> for CallOutcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => CallOutcome::Ok(value),
            Err(err) => CallOutcome::Fatal(err),
        }
    }
}
