use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The offices that can be nominated for and voted on.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "President")]
    President,
    #[serde(rename = "Vice President Internal")]
    VicePresidentInternal,
    #[serde(rename = "Vice President External")]
    VicePresidentExternal,
    #[serde(rename = "Vice President Academic")]
    VicePresidentAcademic,
    #[serde(rename = "Vice President Finance")]
    VicePresidentFinance,
    #[serde(rename = "Vice President Student Life")]
    VicePresidentStudentLife,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Self::President,
        Self::VicePresidentInternal,
        Self::VicePresidentExternal,
        Self::VicePresidentAcademic,
        Self::VicePresidentFinance,
        Self::VicePresidentStudentLife,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::President => "President",
            Self::VicePresidentInternal => "Vice President Internal",
            Self::VicePresidentExternal => "Vice President External",
            Self::VicePresidentAcademic => "Vice President Academic",
            Self::VicePresidentFinance => "Vice President Finance",
            Self::VicePresidentStudentLife => "Vice President Student Life",
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown position '{0}'")]
pub struct UnknownPosition(pub String);

impl FromStr for Position {
    type Err = UnknownPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|position| position.as_str() == s)
            .ok_or_else(|| UnknownPosition(s.to_string()))
    }
}
