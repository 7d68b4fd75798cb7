//! Lead classification pipeline: title parsing, weighted keyword scoring,
//! lead building, URL-keyed deduplication and CSV serialization.
//!
//! Everything here is synchronous and free of IO apart from the optional
//! YAML keyword table loader.

pub mod builder;
pub mod dedup;
pub mod export;
pub mod rules;
pub mod scoring;
pub mod title;

pub use builder::LeadBuilder;
pub use dedup::{merge_leads, normalize_profile_url};
pub use export::{leads_to_csv, CsvExportError, CSV_HEADERS};
pub use rules::{CategoryRules, KeywordGroup, KeywordTable, RulesError};
pub use scoring::{CategoryScorer, Classification, ScoreVector};
pub use title::{parse_title, ParsedTitle};

pub const CRATE_NAME: &str = "leadscope-classify";
