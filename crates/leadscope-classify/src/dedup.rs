//! URL-keyed lead deduplication.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use leadscope_core::Lead;

/// Lowercases the URL and removes exactly one trailing slash.
pub fn normalize_profile_url(url: &str) -> String {
    let lower = url.to_lowercase();
    match lower.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => lower,
    }
}

/// Merges lead lists so each normalized profile URL appears once.
///
/// Keys keep the position where they were first seen. A later duplicate
/// replaces the stored lead only when its confidence is strictly higher.
pub fn merge_leads<I>(lists: I) -> Vec<Lead>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = Lead>,
{
    let mut best: HashMap<String, (usize, Lead)> = HashMap::new();
    for lead in lists.into_iter().flatten() {
        let key = normalize_profile_url(&lead.profile_url);
        let next_index = best.len();
        match best.entry(key) {
            Entry::Occupied(mut slot) => {
                if lead.confidence > slot.get().1.confidence {
                    slot.get_mut().1 = lead;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert((next_index, lead));
            }
        }
    }

    let mut merged = best.into_values().collect::<Vec<_>>();
    merged.sort_by_key(|(index, _)| *index);
    merged.into_iter().map(|(_, lead)| lead).collect()
}
