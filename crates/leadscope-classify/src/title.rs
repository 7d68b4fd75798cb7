//! Splits a combined "name - headline" result title.

use std::sync::LazyLock;

use regex::Regex;

const SEPARATOR: &str = " - ";

static SITE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\|\s*LinkedIn\s*$").expect("valid site suffix pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedTitle {
    pub name: String,
    pub headline: String,
}

pub fn strip_site_suffix(title: &str) -> &str {
    match SITE_SUFFIX.find(title) {
        Some(m) => &title[..m.start()],
        None => title,
    }
}

pub fn parse_title(title: &str) -> ParsedTitle {
    let cleaned = strip_site_suffix(title);
    match cleaned.split_once(SEPARATOR) {
        // split_once keeps every later separator inside the remainder
        Some((name, rest)) => ParsedTitle {
            name: name.trim().to_string(),
            headline: rest.trim().to_string(),
        },
        None => ParsedTitle {
            name: cleaned.trim().to_string(),
            headline: String::new(),
        },
    }
}
