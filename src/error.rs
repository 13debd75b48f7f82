//! The crate's one fallible-to-caller error type.
//!
//! The graph-mutation hot path never returns `Result`: unreachable code
//! becomes `Bad`, failed constant folds become `tarval_bad`, and invariant
//! violations are collected by the verifier rather than raised (§7). The few
//! operations that *can* be misused by a caller in a way that deserves a
//! typed `Err` — double-initialising a process-wide registry, asking for a
//! signed/unsigned pairing on a mode that has none, writing a VCG dump to an
//! unopenable path — report through `FirmError`.
use thiserror::Error;

/// Errors surfaced by the handful of genuinely fallible entry points.
#[derive(Debug, Error)]
pub enum FirmError {
    /// A mode with this name was already registered with different
    /// parameters than the ones requested.
    #[error("mode `{name}` already registered with incompatible parameters")]
    ModeConflict {
        /// The conflicting mode's name.
        name: String,
    },

    /// An operation code with this name was already registered.
    #[error("operation `{name}` already registered")]
    OpConflict {
        /// The conflicting operation's name.
        name: String,
    },

    /// The requested mode has no paired signed/unsigned counterpart.
    #[error("mode `{name}` has no {counterpart} counterpart")]
    NoModePairing {
        /// The mode that was queried.
        name: String,
        /// Which counterpart ("signed" or "unsigned") was missing.
        counterpart: &'static str,
    },

    /// A hook tried to re-enter the event it is currently handling.
    #[error("hook re-entered event `{event}`")]
    HookReentry {
        /// The event name that was re-entered.
        event: &'static str,
    },

    /// Writing a textual or VCG dump failed at the I/O layer.
    #[error("failed to write dump to `{path}`: {source}")]
    DumpIo {
        /// The path that failed to open or write.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the crate's fallible entry points.
pub type FirmResult<T> = Result<T, FirmError>;
