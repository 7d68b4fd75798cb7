//! Core domain model for Leadscope: raw search candidates and classified leads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "leadscope-core";

/// One raw search result pointing at a public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub snippet: String,
    pub link: String,
    pub position: u32,
}

/// Closed set of lead categories. Declaration order is the tie-break order
/// used by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Kitchen Tenant", alias = "kitchen_tenant")]
    KitchenTenant,
    #[serde(rename = "Office Tenant", alias = "office_tenant")]
    OfficeTenant,
    #[serde(rename = "Event Client", alias = "event_client")]
    EventClient,
    #[serde(rename = "Uncategorized", alias = "uncategorized")]
    Uncategorized,
}

impl Category {
    /// Categories that can accumulate score, in declaration order.
    pub const REAL: [Category; 3] = [
        Category::KitchenTenant,
        Category::OfficeTenant,
        Category::EventClient,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::KitchenTenant => "Kitchen Tenant",
            Category::OfficeTenant => "Office Tenant",
            Category::EventClient => "Event Client",
            Category::Uncategorized => "Uncategorized",
        }
    }

    pub fn is_real(self) -> bool {
        self != Category::Uncategorized
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseLabelError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("unknown confidence: {0}")]
    UnknownConfidence(String),
}

impl FromStr for Category {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s
            .trim()
            .to_ascii_lowercase()
            .replace(['_', '-'], " ");
        match folded.as_str() {
            "kitchen tenant" => Ok(Category::KitchenTenant),
            "office tenant" => Ok(Category::OfficeTenant),
            "event client" => Ok(Category::EventClient),
            "uncategorized" => Ok(Category::Uncategorized),
            _ => Err(ParseLabelError::UnknownCategory(s.to_string())),
        }
    }
}

/// Confidence tier. Variant order gives the total order Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn rank(self) -> u8 {
        match self {
            Confidence::Low => 1,
            Confidence::Medium => 2,
            Confidence::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            _ => Err(ParseLabelError::UnknownConfidence(s.to_string())),
        }
    }
}

/// A search query as handed to a search adapter. `label` is copied verbatim
/// into `Lead::source` and `category` is the fallback category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query_id: String,
    pub label: String,
    pub category: Category,
    pub query: String,
    #[serde(default)]
    pub num_results: Option<u32>,
}

/// Classified output record ready for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub headline: String,
    pub profile_url: String,
    pub snippet: String,
    pub category: Category,
    pub confidence: Confidence,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}
