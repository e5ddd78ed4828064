//! Decide whether a DAG looks ready to be fetched through a gateway
//!
//! This is policy, not verification. When the archive itself is partial, the
//! only evidence is the size the root declares for its links against the sum
//! of object sizes already stored under the root's prefix. Both numbers can be
//! off: declared sizes may be missing or wrong, and unrelated uploads sharing a
//! prefix inflate the stored total.

use crate::walk::Structure;
use std::fmt;

/// DAGs bigger than this are never probed: 100 MiB
pub const SIZE_CEILING: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Attempt,
    Defer,
}

/// Why a verdict was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The archive holds the whole DAG
    AlreadyComplete,
    /// Partial DAG with a root that declares no sizes
    NoSizeAvailable,
    /// The expected size is over the ceiling
    TooLarge { expected: u64, ceiling: u64 },
    /// The store holds at least as many bytes as the DAG should need
    AllBytesLanded { expected: u64, stored: u64 },
    /// More bytes are expected than are stored so far
    UploadInProgress { expected: u64, stored: u64 },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::AlreadyComplete => write!(f, "dag is already complete"),
            Reason::NoSizeAvailable => write!(f, "no size available for a partial dag"),
            Reason::TooLarge { expected, ceiling } => {
                write!(f, "expected size {expected} exceeds the {ceiling} byte ceiling")
            }
            Reason::AllBytesLanded { expected, stored } => {
                write!(f, "{stored} bytes stored covers the expected {expected}")
            }
            Reason::UploadInProgress { expected, stored } => {
                write!(f, "only {stored} of {expected} expected bytes stored")
            }
        }
    }
}

/// The outcome of [`decide`]. A `Defer` is a normal result, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchDecision {
    pub verdict: Verdict,
    pub reason: Reason,
}

impl FetchDecision {
    fn attempt(reason: Reason) -> Self {
        Self {
            verdict: Verdict::Attempt,
            reason,
        }
    }
    fn defer(reason: Reason) -> Self {
        Self {
            verdict: Verdict::Defer,
            reason,
        }
    }
    pub fn should_attempt(&self) -> bool {
        self.verdict == Verdict::Attempt
    }
}

/// Decide whether to attempt a gateway fetch
///
/// Rules, first match wins:
///
/// 1. a complete structure is always attempted
/// 2. a partial structure without an expected size is deferred
/// 3. an expected size over `size_ceiling` is deferred
/// 4. attempt once `stored` (the accumulated size under the root's prefix)
///    reaches the expected size, defer until then
pub fn decide(
    structure: Structure,
    expected: Option<u64>,
    size_ceiling: u64,
    stored: u64,
) -> FetchDecision {
    if structure == Structure::Complete {
        return FetchDecision::attempt(Reason::AlreadyComplete);
    }
    let Some(expected) = expected else {
        return FetchDecision::defer(Reason::NoSizeAvailable);
    };
    if expected > size_ceiling {
        return FetchDecision::defer(Reason::TooLarge {
            expected,
            ceiling: size_ceiling,
        });
    }
    if stored >= expected {
        FetchDecision::attempt(Reason::AllBytesLanded { expected, stored })
    } else {
        FetchDecision::defer(Reason::UploadInProgress { expected, stored })
    }
}
