//! Fatal error taxonomy for the encode pipeline.
//!
//! Non-convergence of the search and a missed tolerance after the final pass
//! are not errors: the search falls back to the last tried quality with a
//! warning, and a 3-pass miss is reported as a deviation.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where in the pipeline a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// A sample-window encode or measure, identified by search iteration and
    /// window position (both 1-based).
    Sample { iteration: usize, window: usize },
    /// A full-length pass (1-3).
    Pass(u8),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Sample { iteration, window } => {
                write!(f, "sample window {window} of iteration {iteration}")
            }
            Stage::Pass(n) => write!(f, "pass {n}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no bitrate could be determined for {} ({stage})", path.display())]
    MeasurementUnavailable { path: PathBuf, stage: Stage },

    #[error("encoder failed during {stage}: {detail}")]
    EncodeFailed { stage: Stage, detail: String },

    #[error("cancelled")]
    Cancelled,
}

/// Whether an error chain bottoms out in a user cancellation.
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<EncodeError>(), Some(EncodeError::Cancelled))
}

/// Tag an encoder failure with the stage it happened in. Cancellation passes
/// through untouched so the batch loop can tell it apart from a real failure.
pub fn fail_stage(err: anyhow::Error, stage: Stage) -> anyhow::Error {
    if is_cancelled(&err) {
        return err;
    }
    EncodeError::EncodeFailed {
        stage,
        detail: format!("{err:#}"),
    }
    .into()
}
