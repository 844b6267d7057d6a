//! Heuristic split of delivery failures into permanent and transient.

use strum::AsRefStr;

/// Lowercase markers that identify a failure as permanent
const PERMANENT_MARKERS: &[&str] = &[
    "550",
    "user unknown",
    "does not exist",
    "rejected",
    "blacklisted",
    "suppression list",
];

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FailureClass {
    /// The address should be suppressed for its owner
    Permanent,
    Transient,
}

impl FailureClass {
    pub fn is_permanent(&self) -> bool {
        matches!(self, FailureClass::Permanent)
    }
}

/// Classify a transport error message.
///
/// Case-insensitive substring match; anything unrecognized is transient.
pub fn classify(message: &str) -> FailureClass {
    let lowered = message.to_lowercase();
    if PERMANENT_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        FailureClass::Permanent
    } else {
        FailureClass::Transient
    }
}
