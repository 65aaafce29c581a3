//! Unsigned and signed Nostr events

use crate::error::{Error, Result};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An unsigned event: everything that goes into the id hash.
///
/// `created_at` is held at whole-second precision because only whole seconds
/// take part in the canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseEvent {
    author_key: String,
    created_at: DateTime<Utc>,
    kind: u16,
    tags: Vec<Vec<String>>,
    content: String,
}

impl BaseEvent {
    pub fn new(
        author_key: impl Into<String>,
        created_at: DateTime<Utc>,
        kind: u16,
        tags: Vec<Vec<String>>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author_key: author_key.into(),
            created_at: whole_seconds(created_at),
            kind,
            tags,
            content: content.into(),
        }
    }

    /// Hex-encoded x-only public key of the author
    pub fn author_key(&self) -> &str {
        &self.author_key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn kind(&self) -> u16 {
        self.kind
    }

    pub fn tags(&self) -> &[Vec<String>] {
        &self.tags
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Fluent builder for constructing BaseEvent instances
///
/// # Example
///
/// ```
/// use quasar_core::BaseEventBuilder;
///
/// let base = BaseEventBuilder::new()
///     .author_key("79dff8f82963424e0bb02708a22e44b4980893e3a4be0fa3cb60a43b946764e3")
///     .created_at_secs(1671217411)
///     .kind(1)
///     .content("Hello, Nostr!")
///     .add_tag(vec!["t", "nostr"])
///     .build();
///
/// assert_eq!(base.kind(), 1);
/// assert_eq!(base.tags().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct BaseEventBuilder {
    author_key: String,
    created_at: DateTime<Utc>,
    kind: u16,
    tags: Vec<Vec<String>>,
    content: String,
}

impl BaseEventBuilder {
    /// Create a new builder; `created_at` defaults to now
    pub fn new() -> Self {
        Self {
            author_key: String::new(),
            created_at: Utc::now(),
            kind: 1,
            tags: Vec::new(),
            content: String::new(),
        }
    }

    pub fn author_key<S: Into<String>>(mut self, author_key: S) -> Self {
        self.author_key = author_key.into();
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the creation time from seconds since the epoch.
    ///
    /// Out-of-range values leave the current timestamp untouched.
    pub fn created_at_secs(mut self, secs: i64) -> Self {
        if let Some(at) = DateTime::from_timestamp(secs, 0) {
            self.created_at = at;
        }
        self
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kind = kind;
        self
    }

    pub fn content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = content.into();
        self
    }

    /// Add a single tag
    ///
    /// Accepts any iterator of string-like values
    pub fn add_tag<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.push(values.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Replace all tags at once
    pub fn tags(mut self, tags: Vec<Vec<String>>) -> Self {
        self.tags = tags;
        self
    }

    pub fn build(self) -> BaseEvent {
        BaseEvent::new(
            self.author_key,
            self.created_at,
            self.kind,
            self.tags,
            self.content,
        )
    }
}

impl Default for BaseEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A signed event.
///
/// `id` and `signature` are derived from the base fields and cannot be set
/// independently: events come out of [`crate::identity::sign`], out of a
/// decoded relay frame, or out of a stored [`crate::LocalEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    base: BaseEvent,
    id: String,
    signature: String,
}

impl Event {
    pub(crate) fn from_parts(base: BaseEvent, id: String, signature: String) -> Self {
        Self {
            base,
            id,
            signature,
        }
    }

    /// 32-byte lowercase hex id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 64-byte hex Schnorr signature over the raw id bytes
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn base(&self) -> &BaseEvent {
        &self.base
    }

    pub fn author_key(&self) -> &str {
        self.base.author_key()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.base.created_at()
    }

    pub fn kind(&self) -> u16 {
        self.base.kind()
    }

    pub fn tags(&self) -> &[Vec<String>] {
        self.base.tags()
    }

    pub fn content(&self) -> &str {
        self.base.content()
    }

    /// Re-derive the id and check the signature against the author key
    pub fn verify(&self) -> Result<()> {
        crate::identity::verify(self)
    }
}

/// Wire representation with NIP-01 field names
#[derive(Serialize, Deserialize)]
struct EventHelper {
    id: String,
    pubkey: String,
    created_at: i64,
    kind: u16,
    tags: Vec<Vec<String>>,
    content: String,
    sig: String,
}

impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Event", 7)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("pubkey", self.author_key())?;
        state.serialize_field("created_at", &self.created_at().timestamp())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("tags", self.tags())?;
        state.serialize_field("content", self.content())?;
        state.serialize_field("sig", &self.signature)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let helper = EventHelper::deserialize(deserializer)?;
        let created_at =
            timestamp_from_secs(helper.created_at).map_err(serde::de::Error::custom)?;

        Ok(Event::from_parts(
            BaseEvent::new(
                helper.pubkey,
                created_at,
                helper.kind,
                helper.tags,
                helper.content,
            ),
            helper.id,
            helper.sig,
        ))
    }
}

/// Parse an event from its NIP-01 JSON object
impl TryFrom<&str> for Event {
    type Error = Error;

    fn try_from(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Display implementation that outputs pretty-printed JSON
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "<invalid Event>"),
        }
    }
}

/// An ordered collection of events, e.g. one EOSE-delimited batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub events: Vec<Event>,
}

impl FromIterator<Event> for EventBatch {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        EventBatch {
            events: iter.into_iter().collect(),
        }
    }
}

impl Extend<Event> for EventBatch {
    fn extend<T: IntoIterator<Item = Event>>(&mut self, iter: T) {
        self.events.extend(iter);
    }
}

impl IntoIterator for EventBatch {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Interpret an integer as seconds since the Unix epoch
pub fn timestamp_from_secs(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::InvalidData(format!("timestamp {} is out of range", secs)))
}

fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(0).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_EVENT_JSON: &str = r#"{
        "id":"4376c65d2f232afbe9b882a35baa4f6fe8667c4e684749af565f981833ed6a65",
        "pubkey":"79dff8f82963424e0bb02708a22e44b4980893e3a4be0fa3cb60a43b946764e3",
        "created_at":1671217411,
        "kind":1,
        "tags":[
            ["e","5c83da77af1dec6d7289834998ad7aafbd9e2191396d75ec3cc27f5a77226f36","wss://nostr.example.com"],
            ["p","f7234bd4c1394dda46d09f35bd384dd30cc552ad5541990f98844fb06676e9ca"]
        ],
        "content":"This is a reply to another note!",
        "sig":"908a15e46fb4d8675bab026fc230a0e3542bfade63da02d542fb78b2a8513fcd0092619a2c8c1221e581946e0191f2af505dfdf8657a414dbca329186f009262"
    }"#;

    #[test]
    fn test_builder_basic() {
        let base = BaseEventBuilder::new()
            .author_key("test_pubkey")
            .created_at_secs(1234567890)
            .kind(7)
            .content("Hello!")
            .build();

        assert_eq!(base.author_key(), "test_pubkey");
        assert_eq!(base.created_at().timestamp(), 1234567890);
        assert_eq!(base.kind(), 7);
        assert_eq!(base.content(), "Hello!");
        assert!(base.tags().is_empty());
    }

    #[test]
    fn test_builder_with_tags() {
        let base = BaseEventBuilder::new()
            .add_tag(vec!["e", "event_id"])
            .add_tag(vec!["p", "pubkey_id", "relay_url"])
            .build();

        assert_eq!(base.tags().len(), 2);
        assert_eq!(base.tags()[1], vec!["p", "pubkey_id", "relay_url"]);
    }

    #[test]
    fn test_created_at_truncated_to_seconds() {
        let at = DateTime::from_timestamp(1700000000, 999_000_000).unwrap();
        let base = BaseEvent::new("pk", at, 1, vec![], "");

        assert_eq!(base.created_at().timestamp_subsec_nanos(), 0);
        assert_eq!(base.created_at().timestamp(), 1700000000);
    }

    #[test]
    fn test_out_of_range_secs_ignored_by_builder() {
        let base = BaseEventBuilder::new()
            .created_at_secs(1234)
            .created_at_secs(i64::MAX)
            .build();
        assert_eq!(base.created_at().timestamp(), 1234);
    }

    #[test]
    fn test_parse_sample_event() {
        let event = Event::try_from(SAMPLE_EVENT_JSON).unwrap();

        assert_eq!(
            event.id(),
            "4376c65d2f232afbe9b882a35baa4f6fe8667c4e684749af565f981833ed6a65"
        );
        assert_eq!(event.created_at().timestamp(), 1671217411);
        assert_eq!(event.kind(), 1);
        assert_eq!(event.tags().len(), 2);
        assert_eq!(event.content(), "This is a reply to another note!");
    }

    #[test]
    fn test_serialize_uses_wire_field_order() {
        let event = Event::try_from(SAMPLE_EVENT_JSON).unwrap();
        let json = serde_json::to_string(&event).unwrap();

        let positions: Vec<usize> = ["\"id\"", "\"pubkey\"", "\"created_at\"", "\"kind\"", "\"tags\"", "\"content\"", "\"sig\""]
            .iter()
            .map(|key| json.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.contains("\"created_at\":1671217411"));
    }

    #[test]
    fn test_parse_rejects_kind_out_of_range() {
        let json = SAMPLE_EVENT_JSON.replace("\"kind\":1,", "\"kind\":70000,");
        assert!(Event::try_from(json.as_str()).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_field() {
        let json = r#"{"id":"a","pubkey":"b","created_at":1,"kind":1,"tags":[],"content":"x"}"#;
        assert!(Event::try_from(json).is_err());
    }

    #[test]
    fn test_display_is_pretty_json() {
        let event = Event::try_from(SAMPLE_EVENT_JSON).unwrap();
        let displayed = format!("{}", event);

        assert!(displayed.contains('\n'));
        assert!(displayed.contains("This is a reply to another note!"));
    }

    #[test]
    fn test_event_batch_collect_and_extend() {
        let event = Event::try_from(SAMPLE_EVENT_JSON).unwrap();
        let mut batch: EventBatch = vec![event.clone()].into_iter().collect();
        batch.extend(vec![event.clone(), event]);

        assert_eq!(batch.events.len(), 3);
        assert_eq!(batch.into_iter().count(), 3);
    }
}
