//! Caller-supplied business profile facts.

use serde::{Deserialize, Serialize};

const NO_PROFILE: &str = "No user profile available";

/// Ordered key/value facts about the asker's business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileContext {
    entries: Vec<(String, String)>,
}

impl ProfileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fact. A repeated key replaces the earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Parse a `key=value` pair.
    pub fn parse_pair(pair: &str) -> Option<(String, String)> {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return None;
        }
        Some((key.to_string(), value.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.trim().is_empty())
    }

    /// `Business Type: Retail | State: Delhi`, skipping blank values.
    pub fn render(&self) -> String {
        let parts: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| format!("{}: {}", title_case(k), v.trim()))
            .collect();

        if parts.is_empty() {
            NO_PROFILE.to_string()
        } else {
            parts.join(" | ")
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ProfileContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut profile = ProfileContext::new();
        for (k, v) in iter {
            profile.insert(k, v);
        }
        profile
    }
}

/// Renders an optional profile, treating `None` like an empty one.
pub fn render_profile(profile: Option<&ProfileContext>) -> String {
    profile
        .map(ProfileContext::render)
        .unwrap_or_else(|| NO_PROFILE.to_string())
}

fn title_case(key: &str) -> String {
    key.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_profile() {
        let profile: ProfileContext = [("business_type", "Retail"), ("state", "Delhi")]
            .into_iter()
            .collect();
        assert_eq!(profile.render(), "Business Type: Retail | State: Delhi");
    }

    #[test]
    fn test_empty_profile() {
        assert_eq!(render_profile(None), NO_PROFILE);
        let profile: ProfileContext = [("turnover", "  ")].into_iter().collect();
        assert!(profile.is_empty());
        assert_eq!(profile.render(), NO_PROFILE);
    }

    #[test]
    fn test_insert_replaces() {
        let mut profile = ProfileContext::new();
        profile.insert("state", "Delhi");
        profile.insert("state", "Goa");
        assert_eq!(profile.render(), "State: Goa");
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            ProfileContext::parse_pair("business-type = Manufacturing"),
            Some(("business-type".to_string(), "Manufacturing".to_string()))
        );
        assert_eq!(ProfileContext::parse_pair("novalue="), None);
        assert_eq!(ProfileContext::parse_pair("missing"), None);
    }
}
