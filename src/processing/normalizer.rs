//! Skill text normalization

use crate::error::{JobAlertError, Result};
use crate::processing::posting::{Posting, RawPosting};
use regex::Regex;

/// Turns scraped skill text into canonical lowercase tokens.
pub struct SkillNormalizer {
    noise_regex: Regex,
}

impl Default for SkillNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillNormalizer {
    pub fn new() -> Self {
        // Anything outside ASCII letters, digits, comma and space is deleted outright
        let noise_regex = Regex::new(r"[^a-zA-Z0-9, ]").expect("Invalid noise regex");

        Self { noise_regex }
    }

    /// Normalize one raw skill field into an ordered token list.
    ///
    /// Empty tokens produced by consecutive or trailing commas are kept, so
    /// `"Python, SQL, "` becomes `["python", "sql", ""]`.
    pub fn normalize(&self, raw: &str) -> Vec<String> {
        let lowered = raw.to_lowercase();
        let cleaned = self.noise_regex.replace_all(&lowered, "");

        cleaned
            .split(',')
            .map(|token| token.trim().to_string())
            .collect()
    }

    /// Join tokens with single spaces to form a posting's skill text.
    pub fn join(tokens: &[String]) -> String {
        tokens.join(" ")
    }

    /// Build a pipeline posting from a source record.
    ///
    /// A record with neither a title nor any skill text carries nothing to
    /// cluster or report and is rejected.
    pub fn normalize_record(&self, raw: RawPosting) -> Result<Posting> {
        if raw.title.trim().is_empty() && raw.skills.trim().is_empty() {
            return Err(JobAlertError::InvalidInput(
                "posting has neither a title nor skills".to_string(),
            ));
        }

        let tokens = self.normalize(&raw.skills);
        let skill_text = Self::join(&tokens);
        Ok(Posting::new(raw, tokens, skill_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_trailing_empty_token_is_kept() {
        let normalizer = SkillNormalizer::new();
        assert_eq!(normalizer.normalize("Python, SQL, "), tokens(&["python", "sql", ""]));
    }

    #[test]
    fn test_punctuation_is_deleted_not_replaced() {
        let normalizer = SkillNormalizer::new();
        assert_eq!(normalizer.normalize("C++/ML!"), tokens(&["cml"]));
        assert_eq!(normalizer.normalize("Node.js, C#"), tokens(&["nodejs", "c"]));
    }

    #[test]
    fn test_accented_characters_are_dropped() {
        let normalizer = SkillNormalizer::new();
        assert_eq!(normalizer.normalize("Café Ops, Naïve Bayes"), tokens(&["caf ops", "nave bayes"]));
    }

    #[test]
    fn test_consecutive_commas_and_empty_input() {
        let normalizer = SkillNormalizer::new();
        assert_eq!(normalizer.normalize("a,,b"), tokens(&["a", "", "b"]));
        assert_eq!(normalizer.normalize(""), tokens(&[""]));
    }

    #[test]
    fn test_inner_whitespace_is_preserved() {
        let normalizer = SkillNormalizer::new();
        let result = normalizer.normalize("  Machine Learning ,Deep\tLearning");
        // Tabs are noise characters and vanish
        assert_eq!(result, tokens(&["machine learning", "deeplearning"]));
    }

    #[test]
    fn test_join() {
        let joined = SkillNormalizer::join(&tokens(&["python", "machine learning", ""]));
        assert_eq!(joined, "python machine learning ");
    }

    #[test]
    fn test_normalize_record() {
        let normalizer = SkillNormalizer::new();
        let raw = RawPosting {
            title: "Data Scientist".to_string(),
            skills: "Python, Machine Learning".to_string(),
            ..Default::default()
        };

        let posting = normalizer.normalize_record(raw).unwrap();
        assert_eq!(posting.normalized_skills, tokens(&["python", "machine learning"]));
        assert_eq!(posting.skill_text, "python machine learning");
        assert_eq!(posting.raw_skills, "Python, Machine Learning");
    }

    #[test]
    fn test_blank_record_is_rejected() {
        let normalizer = SkillNormalizer::new();
        let raw = RawPosting {
            company: "Acme".to_string(),
            ..Default::default()
        };
        assert!(normalizer.normalize_record(raw).is_err());
    }
}
