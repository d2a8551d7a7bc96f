use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of processing one message. Anything other than `Success` means
/// the message is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    #[default]
    Success,
    Speed,
    Geoposition,
    Parse,
    Missing,
    Other,
}

impl ResultStatus {
    pub const ALL: [ResultStatus; 6] = [
        ResultStatus::Success,
        ResultStatus::Speed,
        ResultStatus::Geoposition,
        ResultStatus::Parse,
        ResultStatus::Missing,
        ResultStatus::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::Speed => "speed",
            ResultStatus::Geoposition => "geoposition",
            ResultStatus::Parse => "parse",
            ResultStatus::Missing => "missing",
            ResultStatus::Other => "other",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultStatus::Success)
    }

    /// Filter-driven suppression; routine, not a data problem.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, ResultStatus::Speed | ResultStatus::Geoposition)
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
