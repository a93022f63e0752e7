//! Billable service categories
//!
//! Shared vocabulary between the pricing catalog, coverage rules and claim
//! line items. `Other` carries the raw label for service types the engine
//! has no mapping for; such items resolve as self-pay unless a rule exists
//! for the same label.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Consultation,
    Drug,
    Lab,
    Procedure,
    Ward,
    Nursing,
    Other(String),
}

impl ServiceCategory {
    pub fn as_str(&self) -> &str {
        match self {
            ServiceCategory::Consultation => "consultation",
            ServiceCategory::Drug => "drug",
            ServiceCategory::Lab => "lab",
            ServiceCategory::Procedure => "procedure",
            ServiceCategory::Ward => "ward",
            ServiceCategory::Nursing => "nursing",
            ServiceCategory::Other(label) => label,
        }
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for ServiceCategory {
    fn from(s: &str) -> Self {
        match s {
            "consultation" => ServiceCategory::Consultation,
            "drug" | "medication" => ServiceCategory::Drug,
            "lab" | "investigation" => ServiceCategory::Lab,
            "procedure" => ServiceCategory::Procedure,
            "ward" => ServiceCategory::Ward,
            "nursing" => ServiceCategory::Nursing,
            other => ServiceCategory::Other(other.to_string()),
        }
    }
}
