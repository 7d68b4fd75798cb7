//! Weighted keyword scoring and confidence tiers.

use leadscope_core::{Category, Confidence};

use crate::rules::KeywordTable;

pub const HIGH_MIN_SCORE: u32 = 15;
pub const MEDIUM_MIN_SCORE: u32 = 8;

/// Per-category scores in declaration order. `Uncategorized` is never stored
/// and `get` reports zero for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreVector {
    entries: Vec<(Category, u32)>,
}

impl ScoreVector {
    fn zeroed(order: &[Category]) -> Self {
        Self {
            entries: order.iter().map(|c| (*c, 0)).collect(),
        }
    }

    pub fn get(&self, category: Category) -> u32 {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, s)| *s)
            .unwrap_or(0)
    }

    /// Real categories with their scores, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, u32)> + '_ {
        self.entries.iter().copied()
    }

    /// Real categories by score descending; ties keep declaration order.
    pub fn ranked(&self) -> Vec<(Category, u32)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    fn add(&mut self, category: Category, weight: u32) {
        if let Some(entry) = self.entries.iter_mut().find(|(c, _)| *c == category) {
            entry.1 = entry.1.saturating_add(weight);
        }
    }

    /// First-declared category holding the maximum score, if that score is
    /// non-zero.
    fn leader(&self) -> Option<Category> {
        let mut best: Option<(Category, u32)> = None;
        for (category, score) in self.iter() {
            if score > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((category, score));
            }
        }
        best.map(|(c, _)| c)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub confidence: Confidence,
    pub scores: ScoreVector,
}

/// Scores free text against a keyword table held for the scorer's lifetime.
/// Keywords and location tokens are lower-cased once at construction.
#[derive(Debug, Clone)]
pub struct CategoryScorer {
    table: KeywordTable,
    order: Vec<Category>,
}

impl Default for CategoryScorer {
    fn default() -> Self {
        Self::new(KeywordTable::default())
    }
}

impl CategoryScorer {
    pub fn new(mut table: KeywordTable) -> Self {
        for group in table.categories.iter_mut().flat_map(|r| r.groups.iter_mut()) {
            for keyword in &mut group.keywords {
                *keyword = keyword.to_lowercase();
            }
        }
        for token in &mut table.location_tokens {
            *token = token.to_lowercase();
        }

        let mut order = table
            .categories
            .iter()
            .map(|rules| rules.category)
            .filter(|c| c.is_real())
            .collect::<Vec<_>>();
        for category in Category::REAL {
            if !order.contains(&category) {
                order.push(category);
            }
        }
        Self { table, order }
    }

    pub fn score(&self, title: &str, snippet: &str) -> Classification {
        let text = format!("{title} {snippet}").to_lowercase();
        let mut scores = ScoreVector::zeroed(&self.order);

        // every matching keyword entry counts, even when groups overlap
        for rules in &self.table.categories {
            for group in &rules.groups {
                for keyword in &group.keywords {
                    if text.contains(keyword.as_str()) {
                        scores.add(rules.category, group.weight);
                    }
                }
            }
        }

        let local = self
            .table
            .location_tokens
            .iter()
            .any(|token| text.contains(token.as_str()));
        if local {
            if let Some(leader) = scores.leader() {
                scores.add(leader, self.table.location_bonus);
            }
        }

        let ranked = scores.ranked();
        let (top_category, top) = ranked
            .first()
            .copied()
            .unwrap_or((Category::Uncategorized, 0));
        let second = ranked.get(1).map(|(_, s)| *s).unwrap_or(0);

        let (category, confidence) = decide(top_category, top, second);
        Classification {
            category,
            confidence,
            scores,
        }
    }
}

fn decide(top_category: Category, top: u32, second: u32) -> (Category, Confidence) {
    if top == 0 {
        return (Category::Uncategorized, Confidence::Low);
    }
    // top > 1.5 * second, kept in integers
    let dominant = u64::from(top) * 2 > u64::from(second) * 3;
    let confidence = if top >= HIGH_MIN_SCORE && dominant {
        Confidence::High
    } else if top >= MEDIUM_MIN_SCORE {
        Confidence::Medium
    } else {
        Confidence::Low
    };
    (top_category, confidence)
}
