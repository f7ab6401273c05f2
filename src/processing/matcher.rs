//! Recipient keyword matching against labeled postings

use crate::error::{JobAlertError, Result};
use crate::processing::posting::Posting;
use aho_corasick::AhoCorasick;
use std::collections::BTreeMap;

/// Recipient address → keywords of interest.
pub type PreferenceMap = BTreeMap<String, Vec<String>>;

/// Recipient address → postings that matched at least one keyword.
///
/// Every configured recipient has an entry; an empty list means the recipient
/// was checked and nothing matched.
pub type MatchResult<'a> = BTreeMap<String, Vec<&'a Posting>>;

/// Case-insensitive substring matcher for one recipient's keywords.
pub struct KeywordMatcher {
    automaton: AhoCorasick,
}

impl KeywordMatcher {
    pub fn new(keywords: &[String]) -> Result<Self> {
        let patterns: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)
            .map_err(|e| JobAlertError::Processing(format!("Failed to build keyword matcher: {}", e)))?;

        Ok(Self { automaton })
    }

    pub fn is_match(&self, posting: &Posting) -> bool {
        self.automaton.is_match(&posting.skill_text.to_lowercase())
    }
}

/// Select, for every recipient, the postings whose skill text contains any of
/// their keywords.
pub fn match_postings<'a, I>(postings: I, prefs: &PreferenceMap) -> Result<MatchResult<'a>>
where
    I: IntoIterator<Item = &'a Posting> + Clone,
{
    let mut result = MatchResult::new();

    for (recipient, keywords) in prefs {
        let matcher = KeywordMatcher::new(keywords)?;
        let matched: Vec<&Posting> = postings
            .clone()
            .into_iter()
            .filter(|p| matcher.is_match(p))
            .collect();
        log::debug!("{} postings match preferences of {}", matched.len(), recipient);
        result.insert(recipient.clone(), matched);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::posting::RawPosting;

    fn posting(title: &str, skill_text: &str) -> Posting {
        let raw = RawPosting {
            title: title.to_string(),
            ..Default::default()
        };
        let tokens = skill_text.split(' ').map(str::to_string).collect();
        Posting::new(raw, tokens, skill_text.to_string())
    }

    fn prefs(entries: &[(&str, &[&str])]) -> PreferenceMap {
        entries
            .iter()
            .map(|(recipient, keywords)| {
                (
                    recipient.to_string(),
                    keywords.iter().map(|k| k.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_match_and_empty_entry() {
        let postings = vec![posting("Data Scientist", "python sql"), posting("Backend", "java spring")];
        let prefs = prefs(&[("a@x.com", &["python"]), ("b@x.com", &["go"])]);

        let result = match_postings(&postings, &prefs).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result["a@x.com"], vec![&postings[0]]);
        assert!(result["b@x.com"].is_empty());
    }

    #[test]
    fn test_keywords_are_case_insensitive_substrings() {
        let postings = vec![posting("ML", "machine learning python"), posting("Web", "javascript react")];
        let prefs = prefs(&[("c@x.com", &["Machine Learning"]), ("d@x.com", &["JAVA"])]);

        let result = match_postings(&postings, &prefs).unwrap();

        assert_eq!(result["c@x.com"], vec![&postings[0]]);
        // "java" is a substring of "javascript"
        assert_eq!(result["d@x.com"], vec![&postings[1]]);
    }

    #[test]
    fn test_any_keyword_is_enough() {
        let postings = vec![posting("A", "sql"), posting("B", "excel"), posting("C", "rust")];
        let prefs = prefs(&[("e@x.com", &["rust", "sql"])]);

        let result = match_postings(&postings, &prefs).unwrap();
        assert_eq!(result["e@x.com"], vec![&postings[0], &postings[2]]);
    }

    #[test]
    fn test_recipient_without_keywords() {
        let postings = vec![posting("A", "sql")];
        let prefs = prefs(&[("f@x.com", &[])]);

        let result = match_postings(&postings, &prefs).unwrap();
        assert!(result["f@x.com"].is_empty());
    }

    #[test]
    fn test_no_recipients() {
        let postings = vec![posting("A", "sql")];
        let result = match_postings(&postings, &PreferenceMap::new()).unwrap();
        assert!(result.is_empty());
    }
}
