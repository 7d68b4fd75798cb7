//! Category keyword tables.
//!
//! A table is read-only once built. The built-in default can be replaced by a
//! `rules/categories.yaml` file with the same shape.

use std::collections::HashSet;
use std::path::Path;

use leadscope_core::Category;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LOCATION_BONUS: u32 = 3;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing keyword table: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{0} cannot carry keyword groups")]
    NotScorable(Category),
    #[error("category {0} is declared more than once")]
    DuplicateCategory(Category),
    #[error("keyword group for {0} has no keywords")]
    EmptyGroup(Category),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub weight: u32,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRules {
    pub category: Category,
    pub groups: Vec<KeywordGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTable {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_location_bonus")]
    pub location_bonus: u32,
    #[serde(default)]
    pub location_tokens: Vec<String>,
    pub categories: Vec<CategoryRules>,
}

fn default_version() -> u32 {
    1
}

fn default_location_bonus() -> u32 {
    DEFAULT_LOCATION_BONUS
}

fn group(weight: u32, keywords: &[&str]) -> KeywordGroup {
    KeywordGroup {
        weight,
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            version: 1,
            location_bonus: DEFAULT_LOCATION_BONUS,
            location_tokens: [
                "baltimore",
                "maryland",
                "annapolis",
                "towson",
                "ellicott city",
                "columbia, md",
                "dmv",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            categories: vec![
                CategoryRules {
                    category: Category::KitchenTenant,
                    groups: vec![
                        group(
                            10,
                            &[
                                "catering",
                                "caterer",
                                "food truck",
                                "meal prep",
                                "commercial kitchen",
                                "ghost kitchen",
                            ],
                        ),
                        group(
                            5,
                            &[
                                "catering owner",
                                "personal chef",
                                "private chef",
                                "pastry",
                                "bakery",
                                "cottage food",
                                "food business",
                            ],
                        ),
                        group(3, &["chef", "cook", "culinary", "kitchen", "food", "restaurant"]),
                    ],
                },
                CategoryRules {
                    category: Category::OfficeTenant,
                    groups: vec![
                        group(
                            10,
                            &["coworking", "office space", "private office", "shared office"],
                        ),
                        group(
                            5,
                            &[
                                "startup",
                                "founder",
                                "consultant",
                                "agency",
                                "remote team",
                                "small business owner",
                            ],
                        ),
                        group(
                            3,
                            &[
                                "ceo",
                                "freelance",
                                "entrepreneur",
                                "accountant",
                                "attorney",
                                "therapist",
                            ],
                        ),
                    ],
                },
                CategoryRules {
                    category: Category::EventClient,
                    groups: vec![
                        group(
                            10,
                            &[
                                "event planner",
                                "event planning",
                                "wedding planner",
                                "event venue",
                                "event space",
                            ],
                        ),
                        group(
                            5,
                            &[
                                "wedding",
                                "gala",
                                "conference",
                                "corporate events",
                                "party planner",
                                "fundraiser",
                            ],
                        ),
                        group(3, &["event", "meetup", "workshop", "retreat", "celebration"]),
                    ],
                },
            ],
        }
    }
}

impl KeywordTable {
    pub fn from_yaml_str(text: &str) -> Result<Self, RulesError> {
        let table: KeywordTable = serde_yaml::from_str(text)?;
        table.validate()?;
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Loads `path` when it exists, otherwise falls back to the built-in table.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        let mut seen = HashSet::new();
        for rules in &self.categories {
            if !rules.category.is_real() {
                return Err(RulesError::NotScorable(rules.category));
            }
            if !seen.insert(rules.category) {
                return Err(RulesError::DuplicateCategory(rules.category));
            }
            if rules.groups.iter().any(|g| g.keywords.is_empty()) {
                return Err(RulesError::EmptyGroup(rules.category));
            }
        }
        Ok(())
    }
}
