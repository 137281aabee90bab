use serde::Serialize;
use time::OffsetDateTime;
use trailmark_core::Entry;
use trailmark_intel::{ClassificationResult, ClassifierRules, EntryClassifier};

#[derive(Serialize)]
struct ClassifyReport {
    #[serde(flatten)]
    result: ClassificationResult,
    quality_score: f64,
}

pub fn execute(text: &str, tags: &[String], json: bool) -> anyhow::Result<()> {
    let report = classify_text(text, tags);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let r = &report.result;
    println!("type:       {}", r.entry_type);
    println!("confidence: {:.2}", r.confidence_score);
    println!("quality:    {:.2}", report.quality_score);
    if !r.suggested_tags.is_empty() {
        let tags: Vec<&str> = r.suggested_tags.iter().map(String::as_str).collect();
        println!("suggested:  {}", tags.join(", "));
    }
    println!("reasoning:");
    for point in &r.reasoning_points {
        println!("  - {point}");
    }
    Ok(())
}

fn classify_text(text: &str, tags: &[String]) -> ClassifyReport {
    let entry = Entry::new(text.trim()).with_tags(tags.iter().cloned());
    let classifier = EntryClassifier::new(ClassifierRules::default(), OffsetDateTime::now_utc());
    let result = classifier.classify(&entry);
    let quality_score = classifier.quality_score(&entry, &result);
    ClassifyReport {
        result,
        quality_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailmark_core::EntryType;

    #[test]
    fn tag_declares_type() {
        let report = classify_text("Wrapped up the exporter", &["completion".to_string()]);
        assert_eq!(report.result.entry_type, EntryType::Completion);
        assert!((0.0..=1.0).contains(&report.quality_score));
    }

    #[test]
    fn json_report_is_flat() {
        let report = classify_text("Read the docs", &[]);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("entry_type").is_some());
        assert!(json.get("quality_score").is_some());
    }
}
