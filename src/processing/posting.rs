//! Posting records as they move through the pipeline

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A posting record as yielded by a posting source.
///
/// Absent or null fields deserialize to empty strings. Numbers and booleans are
/// coerced to their string form; arrays and objects make the record malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawPosting {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub company: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub experience: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(default, alias = "RawSkills", deserialize_with = "lenient_string")]
    pub skills: String,
}

/// A posting enriched by the pipeline.
///
/// `normalized_skills` and `skill_text` are filled by the normalizer, `cluster`
/// by the cluster engine. Once labeled the record is only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Posting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub experience: String,
    pub summary: String,
    pub raw_skills: String,
    pub normalized_skills: Vec<String>,
    pub skill_text: String,
    #[serde(default)]
    pub cluster: Option<usize>,
}

impl Posting {
    pub fn new(raw: RawPosting, normalized_skills: Vec<String>, skill_text: String) -> Self {
        Self {
            title: raw.title,
            company: raw.company,
            location: raw.location,
            experience: raw.experience,
            summary: raw.summary,
            raw_skills: raw.skills,
            normalized_skills,
            skill_text,
            cluster: None,
        }
    }

    /// Key used to recognise the same listing across runs.
    pub fn listing_key(&self) -> (&str, &str, &str) {
        (&self.title, &self.company, &self.location)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a text field, found {}",
            match other {
                Value::Array(_) => "an array",
                _ => "an object",
            }
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_become_empty() {
        let raw: RawPosting = serde_json::from_value(json!({
            "Title": "Data Engineer",
            "Skills": null
        }))
        .unwrap();

        assert_eq!(raw.title, "Data Engineer");
        assert_eq!(raw.company, "");
        assert_eq!(raw.skills, "");
    }

    #[test]
    fn test_scalar_fields_are_coerced() {
        let raw: RawPosting = serde_json::from_value(json!({
            "Title": "Analyst",
            "Experience": 3,
            "Skills": true
        }))
        .unwrap();

        assert_eq!(raw.experience, "3");
        assert_eq!(raw.skills, "true");
    }

    #[test]
    fn test_nested_field_is_rejected() {
        let result: std::result::Result<RawPosting, _> = serde_json::from_value(json!({
            "Title": "Analyst",
            "Skills": ["python", "sql"]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_listing_key() {
        let raw = RawPosting {
            title: "ML Engineer".to_string(),
            company: "Acme".to_string(),
            location: "Pune".to_string(),
            ..Default::default()
        };
        let posting = Posting::new(raw, vec!["python".to_string()], "python".to_string());

        assert_eq!(posting.listing_key(), ("ML Engineer", "Acme", "Pune"));
        assert_eq!(posting.cluster, None);
    }
}
