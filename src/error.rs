//! Error types for the transaction simulator
//!
//! Defines a unified error type shared by the data manager, the
//! transaction manager, and the command parser/driver.

use std::fmt;
use std::io;

/// Unified error type for simulator operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Operation named a transaction id that was never begun or has terminated
    UnknownTransaction(u64),
    /// Operation attempted directly on a site that is down
    SiteDown(u32),
    /// Variable absent from a site's history
    UnknownVariable { site: u32, variable: u32 },
    /// Snapshot window lies before any stored version of a variable
    NoVisibleVersion { site: u32, variable: u32, start_time: u64 },
    /// A failure interval falsifies the snapshot at a site
    SiteDisqualified { site: u32, variable: u32 },
    /// Another transaction's commit landed after this transaction's snapshot began
    AbortFirstCommitter { variable: u32, commit_time: u64, start_time: u64 },
    /// A write intention precedes a recorded site failure
    AbortWriteBeforeFailure { variable: u32, write_time: u64, failure_time: u64, site: u32 },
    /// A read exhausted every candidate site without success or parking
    NoValidSite { variable: u32 },
    /// Site id outside the fixed cluster range
    UnknownSite(u32),
    /// Command line did not match the grammar
    Parse(String),
    /// I/O error reading the command stream
    Io(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::UnknownTransaction(id) => write!(f, "transaction T{id} does not exist"),
            SimError::SiteDown(s) => write!(f, "site {s} is down"),
            SimError::UnknownVariable { site, variable } => {
                write!(f, "variable x{variable} not found at site {site}")
            }
            SimError::NoVisibleVersion { site, variable, start_time } => write!(
                f,
                "no visible version of x{variable} at site {site} for start_time {start_time}"
            ),
            SimError::SiteDisqualified { site, variable } => {
                write!(f, "site {site} disqualified for x{variable}: down during snapshot window")
            }
            SimError::AbortFirstCommitter { variable, commit_time, start_time } => write!(
                f,
                "x{variable} was committed at {commit_time}, after transaction start time {start_time}"
            ),
            SimError::AbortWriteBeforeFailure { variable, write_time, failure_time, site } => write!(
                f,
                "write timestamp {write_time} for x{variable} precedes failure timestamp {failure_time} on site {site}"
            ),
            SimError::NoValidSite { variable } => {
                write!(f, "no valid site could provide the value for x{variable}")
            }
            SimError::UnknownSite(s) => write!(f, "site {s} does not exist"),
            SimError::Parse(msg) => write!(f, "{msg}"),
            SimError::Io(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SimError {}

impl From<io::Error> for SimError {
    fn from(e: io::Error) -> Self {
        SimError::Io(e.to_string())
    }
}

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;
