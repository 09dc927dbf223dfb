use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::Platform;

/// A stored game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub name: String,
    pub source_url: String,
    #[serde(default)]
    pub embed_url: String,
    #[serde(default)]
    pub iframe_url: String,
    pub platform: Platform,
    pub collected_at: DateTime<Utc>,
}

impl GameRecord {
    /// The url to put into an iframe. `iframe_url` wins when both are set.
    pub fn effective_url(&self) -> &str {
        if !self.iframe_url.trim().is_empty() {
            self.iframe_url.trim()
        } else {
            self.embed_url.trim()
        }
    }
}

/// Write-side input of the store.
///
/// `platform` and `collected_at` are filled in by the store when absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCreate {
    pub name: String,
    pub source_url: String,
    #[serde(default)]
    pub embed_url: String,
    #[serde(default)]
    pub iframe_url: String,
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub collected_at: Option<DateTime<Utc>>,
}

impl GameCreate {
    /// Build a record for `platform`, putting `url` into the column that platform uses.
    pub fn found(platform: Platform, name: &str, source_url: &str, url: &str) -> Self {
        let (embed_url, iframe_url) = if platform.stores_as_iframe() {
            (String::new(), url.to_string())
        } else {
            (url.to_string(), String::new())
        };

        Self {
            name: name.trim().to_string(),
            source_url: source_url.to_string(),
            embed_url,
            iframe_url,
            platform: Some(platform),
            collected_at: None,
        }
    }

    /// First usable url of the record, if any.
    pub fn usable_url(&self) -> Option<&str> {
        [self.iframe_url.as_str(), self.embed_url.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|url| is_usable_url(url))
    }
}

/// A `(name, listing url)` pair found on a listing page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CandidateEntry {
    pub name: String,
    pub url: String,
}

impl CandidateEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Lowercase and drop everything that is not alphanumeric.
///
/// Loose on purpose: "Run 3" and "Run3" collapse to the same key.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_usable_url(url: &str) -> bool {
    if url.is_empty() || url.eq_ignore_ascii_case("null") || url.eq_ignore_ascii_case("none") {
        return false;
    }

    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}
