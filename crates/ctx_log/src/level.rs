//! Severity levels understood by [`Logger`][crate::Logger] and every [`Sink`][crate::Sink].

use std::{fmt, str::FromStr};

use crate::LoggerError;

/// The severity of a log record.
///
/// Levels are ordered from least to most severe. The last three levels escalate after the
/// record has been written:
/// - [`Level::DPanic`] panics only on loggers built in development mode.
/// - [`Level::Panic`] always panics.
/// - [`Level::Fatal`] terminates the process with a non-zero exit status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Diagnostic detail, usually disabled in production.
    Debug,

    /// Routine operational messages.
    Info,

    /// Something unexpected that the caller recovered from.
    Warn,

    /// A failed operation.
    Error,

    /// An error that should never happen; panics in development mode after being written.
    DPanic,

    /// An error that must not be recovered from; panics after being written.
    Panic,

    /// An error that stops the process; exits with status `1` after being written.
    Fatal,
}

impl Level {
    /// All levels, from least to most severe.
    pub const ALL: [Self; 7] = [
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::DPanic,
        Self::Panic,
        Self::Fatal,
    ];

    /// The lowercase name used in structured output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::DPanic => "dpanic",
            Self::Panic => "panic",
            Self::Fatal => "fatal",
        }
    }

    /// Position of this level in [`Level::ALL`].
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Debug => 0,
            Self::Info => 1,
            Self::Warn => 2,
            Self::Error => 3,
            Self::DPanic => 4,
            Self::Panic => 5,
            Self::Fatal => 6,
        }
    }

    /// Whether a call at this level always diverges after the write.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Panic | Self::Fatal)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LoggerError::Configuration(format!("Unknown log level `{s}`")))
    }
}
