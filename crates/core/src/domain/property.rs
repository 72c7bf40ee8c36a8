use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Square-footage range used as the pricing dimension of the booking widget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertySizeBucket {
    #[serde(rename = "<1000")]
    Under1000,
    #[serde(rename = "1000-2000")]
    From1000To2000,
    #[serde(rename = "2000-3000")]
    From2000To3000,
    #[serde(rename = "3000-4000")]
    From3000To4000,
    #[serde(rename = "4000-5000")]
    From4000To5000,
}

impl PropertySizeBucket {
    pub const ALL: [PropertySizeBucket; 5] = [
        Self::Under1000,
        Self::From1000To2000,
        Self::From2000To3000,
        Self::From3000To4000,
        Self::From4000To5000,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Under1000 => "<1000",
            Self::From1000To2000 => "1000-2000",
            Self::From2000To3000 => "2000-3000",
            Self::From3000To4000 => "3000-4000",
            Self::From4000To5000 => "4000-5000",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Under1000 => "Under 1000 sq ft",
            Self::From1000To2000 => "1000-2000 sq ft",
            Self::From2000To3000 => "2000-3000 sq ft",
            Self::From3000To4000 => "3000-4000 sq ft",
            Self::From4000To5000 => "4000-5000 sq ft",
        }
    }
}

impl fmt::Display for PropertySizeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertySizeBucket {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL.into_iter().find(|bucket| bucket.as_str() == trimmed).ok_or_else(|| {
            DomainError::InvalidInput(format!(
                "unknown property size `{trimmed}` (expected <1000|1000-2000|2000-3000|3000-4000|4000-5000)"
            ))
        })
    }
}
