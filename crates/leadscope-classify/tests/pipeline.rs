use std::sync::Arc;

use leadscope_classify::{leads_to_csv, merge_leads, CategoryScorer, LeadBuilder};
use leadscope_core::{Candidate, Category, Confidence};

fn candidate(title: &str, snippet: &str, link: &str, position: u32) -> Candidate {
    Candidate {
        title: title.to_string(),
        snippet: snippet.to_string(),
        link: link.to_string(),
        position,
    }
}

#[test]
fn candidates_from_two_queries_merge_into_one_export() {
    let builder = LeadBuilder::new(Arc::new(CategoryScorer::default()));

    let caterers = vec![
        candidate(
            "Jane Doe - Owner, Baltimore Catering Co | LinkedIn",
            "catering owner serving Baltimore weddings",
            "https://linkedin.com/in/janedoe/",
            1,
        ),
        candidate(
            "Tom Baker | LinkedIn",
            "Annapolis resident",
            "https://linkedin.com/in/tombaker",
            2,
        ),
    ]
    .iter()
    .map(|c| builder.build(c, Category::KitchenTenant, "Baltimore caterers"))
    .collect::<Vec<_>>();

    let food_trucks = vec![
        candidate(
            "Tom Baker - Food Truck Owner | LinkedIn",
            "meal prep and food truck catering in Annapolis",
            "https://LinkedIn.com/in/TomBaker/",
            1,
        ),
        candidate(
            "Jane Doe - Caterer | LinkedIn",
            "chef",
            "https://linkedin.com/in/janedoe",
            2,
        ),
    ]
    .iter()
    .map(|c| builder.build(c, Category::KitchenTenant, "Food truck owners"))
    .collect::<Vec<_>>();

    assert_eq!(caterers[1].confidence, Confidence::Low);
    assert_eq!(food_trucks[0].confidence, Confidence::High);

    let merged = merge_leads(vec![caterers, food_trucks]);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].name, "Jane Doe");
    assert_eq!(merged[0].source, "Baltimore caterers");
    assert_eq!(merged[1].name, "Tom Baker");
    assert_eq!(merged[1].source, "Food truck owners");
    assert_eq!(merged[1].headline, "Food Truck Owner");

    let csv = leads_to_csv(&merged).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains("\"Owner, Baltimore Catering Co\""));
}
