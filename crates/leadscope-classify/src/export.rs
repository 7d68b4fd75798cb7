//! RFC 4180 text export of leads.

use chrono::SecondsFormat;
use csv::{Terminator, WriterBuilder};
use leadscope_core::Lead;
use thiserror::Error;

pub const CSV_HEADERS: [&str; 8] = [
    "Name",
    "Headline",
    "Category",
    "Confidence",
    "Profile URL",
    "Snippet",
    "Source Query",
    "Scraped At",
];

#[derive(Debug, Error)]
pub enum CsvExportError {
    #[error("writing csv record: {0}")]
    Write(#[from] csv::Error),
    #[error("flushing csv buffer: {0}")]
    Flush(#[from] std::io::Error),
    #[error("csv output is not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Header plus one row per lead, joined by `\n` with no trailing newline.
/// No leads, no header. Fields are quoted only when they contain a comma,
/// quote, CR or LF.
pub fn leads_to_csv(leads: &[Lead]) -> Result<String, CsvExportError> {
    if leads.is_empty() {
        return Ok(String::new());
    }

    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for lead in leads {
        let scraped_at = lead.scraped_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        writer.write_record([
            lead.name.as_str(),
            lead.headline.as_str(),
            lead.category.as_str(),
            lead.confidence.as_str(),
            lead.profile_url.as_str(),
            lead.snippet.as_str(),
            lead.source.as_str(),
            scraped_at.as_str(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    let mut text = String::from_utf8(bytes)?;
    // the writer terminates every record, including the last
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use leadscope_core::{Category, Confidence};

    fn lead(name: &str, snippet: &str) -> Lead {
        Lead {
            id: "b-0-1".to_string(),
            name: name.to_string(),
            headline: "Owner".to_string(),
            profile_url: "https://linkedin.com/in/x".to_string(),
            snippet: snippet.to_string(),
            category: Category::EventClient,
            confidence: Confidence::Medium,
            source: "Event planners".to_string(),
            scraped_at: Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).single().unwrap(),
        }
    }

    fn row(csv: &str) -> &str {
        csv.split_once('\n').unwrap().1
    }

    #[test]
    fn quotes_and_commas_are_escaped() {
        let csv = leads_to_csv(&[lead(r#"Smith, "Chef""#, "")]).unwrap();
        assert!(row(&csv).starts_with(r#""Smith, ""Chef""",Owner,"#));
        assert!(row(&csv).contains(",https://linkedin.com/in/x,,Event planners,"));
    }

    #[test]
    fn line_breaks_force_quoting_and_plain_text_does_not() {
        let csv = leads_to_csv(&[lead("plain text", "line\nbreak\rhere")]).unwrap();
        assert!(row(&csv).starts_with("plain text,Owner,"));
        assert!(row(&csv).contains(",\"line\nbreak\rhere\","));
    }

    #[test]
    fn empty_list_has_no_header() {
        assert_eq!(leads_to_csv(&[]).unwrap(), "");
    }

    #[test]
    fn header_then_rows_without_trailing_newline() {
        let csv = leads_to_csv(&[lead("Jane Doe", "weddings, galas"), lead("Sam", "x")]).unwrap();
        let lines = csv.split('\n').collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Name,Headline,Category,Confidence,Profile URL,Snippet,Source Query,Scraped At"
        );
        assert_eq!(
            lines[1],
            "Jane Doe,Owner,Event Client,Medium,https://linkedin.com/in/x,\"weddings, galas\",Event planners,2026-10-19T08:30:00.000Z"
        );
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn only_the_final_terminator_is_dropped() {
        let mut with_break = lead("Sam", "x");
        with_break.source = "query\n".to_string();
        let csv = leads_to_csv(&[with_break]).unwrap();
        assert!(csv.ends_with("2026-10-19T08:30:00.000Z"));
        assert!(csv.contains(",\"query\n\","));
    }
}
