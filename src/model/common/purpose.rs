use std::fmt::Display;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// Which flow a one-time code or session belongs to. Codes and sessions
/// issued for one purpose are never accepted by another.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Nomination,
    Withdrawal,
    Voting,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nomination => "nomination",
            Self::Withdrawal => "withdrawal",
            Self::Voting => "voting",
        }
    }
}

impl Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Purpose> for Bson {
    fn from(purpose: Purpose) -> Self {
        Bson::String(purpose.as_str().to_string())
    }
}
