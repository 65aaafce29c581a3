//! Subscription filters
//!
//! A [`Filter`] is ANDed across its fields and ORed within each list field.
//! Serialization follows the NIP-01 filter object: absent fields are omitted
//! entirely and timestamps are written as integer seconds.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::ser::SerializeMap;

/// A single-letter tag query, e.g. `#e` or `#p`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTag {
    key: char,
    values: Vec<String>,
}

impl FilterTag {
    /// Build a tag query from a raw `[key, value...]` array.
    ///
    /// Returns `None` for an empty array or a key that is not exactly one
    /// character long.
    pub fn from_array<S: AsRef<str>>(raw: &[S]) -> Option<Self> {
        let (key, values) = raw.split_first()?;
        let mut chars = key.as_ref().chars();
        let key = chars.next()?;
        if chars.next().is_some() {
            return None;
        }

        Some(Self {
            key,
            values: values.iter().map(|v| v.as_ref().to_string()).collect(),
        })
    }

    pub fn key(&self) -> char {
        self.key
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Subscription predicate sent in a `REQ`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub ids: Option<Vec<String>>,
    pub authors: Option<Vec<String>>,
    pub kinds: Option<Vec<u16>>,
    pub tags: Vec<FilterTag>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = Some(authors.into_iter().map(Into::into).collect());
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u16>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Add one tag query from a raw array; malformed arrays are dropped
    pub fn tag<S: AsRef<str>>(mut self, raw: &[S]) -> Self {
        if let Some(tag) = FilterTag::from_array(raw) {
            self.tags.push(tag);
        }
        self
    }

    /// Replace the tag queries; malformed arrays are dropped
    pub fn tags<S: AsRef<str>>(mut self, raw: &[Vec<S>]) -> Self {
        self.tags = raw
            .iter()
            .filter_map(|tag| FilterTag::from_array(tag))
            .collect();
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Serialize for Filter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if let Some(ids) = &self.ids {
            map.serialize_entry("ids", ids)?;
        }
        if let Some(authors) = &self.authors {
            map.serialize_entry("authors", authors)?;
        }
        if let Some(kinds) = &self.kinds {
            map.serialize_entry("kinds", kinds)?;
        }
        for tag in &self.tags {
            map.serialize_entry(&format!("#{}", tag.key), &tag.values)?;
        }
        if let Some(since) = &self.since {
            map.serialize_entry("since", &since.timestamp())?;
        }
        if let Some(until) = &self.until {
            map.serialize_entry("until", &until.timestamp())?;
        }
        if let Some(limit) = &self.limit {
            map.serialize_entry("limit", limit)?;
        }
        map.end()
    }
}
