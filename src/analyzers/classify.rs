//! Joins free-text class labels to normalized categories through a manual
//! code lookup.

use std::collections::{BTreeMap, BTreeSet};

/// Category assigned to codes missing from the lookup.
pub const UNCLASSIFIED: &str = "unclassified";

/// The leading code of a label such as `"3.10 Fabricação de produtos"`.
pub fn extract_code(label: &str) -> &str {
    label
        .trim_start_matches('\u{feff}')
        .split_whitespace()
        .next()
        .unwrap_or("")
}

/// Code to category lookup. One code may map to several categories, in
/// which case a matching row contributes to each of them.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    entries: BTreeMap<String, Vec<String>>,
}

impl Classifier {
    pub fn from_pairs<I, C, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, K)>,
        C: Into<String>,
        K: Into<String>,
    {
        let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (code, category) in pairs {
            let category = category.into();
            let targets = entries.entry(code.into().trim().to_string()).or_default();
            if !targets.contains(&category) {
                targets.push(category);
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Categories for `code`, or `None` on a join miss.
    pub fn lookup(&self, code: &str) -> Option<&[String]> {
        self.entries.get(code.trim()).map(Vec::as_slice)
    }

    /// Categories for `code`, falling back to [`UNCLASSIFIED`].
    pub fn classify(&self, code: &str) -> Vec<&str> {
        match self.lookup(code) {
            Some(categories) => categories.iter().map(String::as_str).collect(),
            None => vec![UNCLASSIFIED],
        }
    }

    /// Lookup codes that none of `seen` matched.
    pub fn unused_codes<'a, I>(&self, seen: I) -> Vec<&str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let seen: BTreeSet<&str> = seen.into_iter().map(str::trim).collect();
        self.entries
            .keys()
            .map(String::as_str)
            .filter(|code| !seen.contains(code))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_code_takes_first_token() {
        assert_eq!(extract_code("3.10 Fabricação de produtos alimentícios"), "3.10");
        assert_eq!(extract_code("\u{feff}3 Indústrias de transformação"), "3");
        assert_eq!(extract_code("   "), "");
    }

    #[test]
    fn test_classify_known_code() {
        let classifier = Classifier::from_pairs([("3.10", "2H2"), ("3.24", "2C1")]);
        assert_eq!(classifier.classify("3.24"), vec!["2C1"]);
    }

    #[test]
    fn test_join_miss_is_unclassified() {
        let classifier = Classifier::from_pairs([("3.10", "2H2")]);
        assert_eq!(classifier.lookup("9.99"), None);
        assert_eq!(classifier.classify("9.99"), vec![UNCLASSIFIED]);
    }

    #[test]
    fn test_code_with_several_categories() {
        let classifier =
            Classifier::from_pairs([("3.10", "2H2"), ("3.10", "2H3"), ("3.10", "2H2")]);
        assert_eq!(classifier.classify("3.10"), vec!["2H2", "2H3"]);
        assert_eq!(classifier.len(), 1);
    }

    #[test]
    fn test_unused_codes() {
        let classifier = Classifier::from_pairs([("3.10", "2H2"), ("3.24", "2C1")]);
        assert_eq!(classifier.unused_codes(["3.10", "9.99"]), vec!["3.24"]);
    }
}
