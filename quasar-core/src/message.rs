//! Relay protocol messages (NIP-01 framing)
//!
//! - Client to Relay: `EVENT`, `REQ`, `CLOSE`
//! - Relay to Client: `EVENT`, `OK`, `EOSE`, `CLOSED`, `NOTICE`
//!
//! Every frame is a JSON array led by an uppercase string tag. Decoding reads
//! the tag first and then exactly the fields that tag defines; any arity or
//! type mismatch is rejected as [`Error::InvalidData`] without partial recovery.

use crate::error::{Error, RelayError, Result};
use crate::event::Event;
use crate::filter::Filter;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Messages sent from client to relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `["CLOSE", <subscription_id>]`
    Close(String),

    /// `["EVENT", <event>]`
    Event(Event),

    /// `["REQ", <subscription_id>, <filter>...]`
    Request {
        subscription_id: String,
        filters: Vec<Filter>,
    },
}

impl ClientMessage {
    /// Encode as a text frame.
    ///
    /// Never fails: if serialization goes wrong the result is an empty
    /// string, which callers treat as "nothing to send".
    pub fn encode(&self) -> String {
        let encoded = match self {
            ClientMessage::Close(subscription_id) => {
                serde_json::to_string(&("CLOSE", subscription_id))
            }
            ClientMessage::Event(event) => serde_json::to_string(&("EVENT", event)),
            ClientMessage::Request {
                subscription_id,
                filters,
            } => encode_request(subscription_id, filters),
        };

        encoded.unwrap_or_else(|e| {
            warn!("Failed to encode client message: {}", e);
            String::new()
        })
    }
}

// Filters are streamed into the array directly so their key order survives
fn encode_request(subscription_id: &str, filters: &[Filter]) -> serde_json::Result<String> {
    use serde::ser::{SerializeSeq, Serializer};

    let mut out = Vec::with_capacity(64);
    let mut serializer = serde_json::Serializer::new(&mut out);
    let mut seq = serializer.serialize_seq(Some(filters.len() + 2))?;
    seq.serialize_element("REQ")?;
    seq.serialize_element(subscription_id)?;
    for filter in filters {
        seq.serialize_element(filter)?;
    }
    seq.end()?;

    // serde_json only ever writes valid UTF-8
    Ok(String::from_utf8(out).unwrap_or_default())
}

/// Messages sent from relay to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// `["EVENT", <subscription_id>, <event>]`
    Event {
        subscription_id: String,
        event: Event,
    },

    /// `["CLOSED", <subscription_id>, <reason>]`
    Closed {
        subscription_id: String,
        reason: String,
    },

    /// `["EOSE", <subscription_id>]`
    Eose { subscription_id: String },

    /// `["NOTICE", <reason>]`
    Notice { reason: String },

    /// `["OK", <event_id>, <accepted>, <reason>]`
    Ok {
        event_id: String,
        accepted: bool,
        reason: String,
    },
}

impl RelayMessage {
    /// Decode a relay frame
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(frame)
            .map_err(|e| Error::InvalidData(format!("frame is not JSON: {}", e)))?;
        let Value::Array(fields) = value else {
            return Err(Error::InvalidData("frame is not an array".to_string()));
        };
        let Some(tag) = fields.first().and_then(Value::as_str) else {
            return Err(Error::InvalidData(
                "frame does not start with a string tag".to_string(),
            ));
        };

        match tag {
            "EVENT" => {
                expect_arity(tag, &fields, 3)?;
                Ok(RelayMessage::Event {
                    subscription_id: string_at(tag, &fields, 1)?,
                    event: event_at(&fields, 2)?,
                })
            }
            "CLOSED" => {
                expect_arity(tag, &fields, 3)?;
                Ok(RelayMessage::Closed {
                    subscription_id: string_at(tag, &fields, 1)?,
                    reason: string_at(tag, &fields, 2)?,
                })
            }
            "EOSE" => {
                expect_arity(tag, &fields, 2)?;
                Ok(RelayMessage::Eose {
                    subscription_id: string_at(tag, &fields, 1)?,
                })
            }
            "NOTICE" => {
                expect_arity(tag, &fields, 2)?;
                Ok(RelayMessage::Notice {
                    reason: string_at(tag, &fields, 1)?,
                })
            }
            "OK" => {
                expect_arity(tag, &fields, 4)?;
                let accepted = fields[2].as_bool().ok_or_else(|| {
                    Error::InvalidData("OK field 2 is not a boolean".to_string())
                })?;
                Ok(RelayMessage::Ok {
                    event_id: string_at(tag, &fields, 1)?,
                    accepted,
                    reason: string_at(tag, &fields, 3)?,
                })
            }
            other => Err(Error::InvalidData(format!("unknown message type: {}", other))),
        }
    }

    /// Subscription this message belongs to, if it names one
    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            RelayMessage::Event {
                subscription_id, ..
            }
            | RelayMessage::Closed {
                subscription_id, ..
            }
            | RelayMessage::Eose { subscription_id } => Some(subscription_id),
            RelayMessage::Notice { .. } | RelayMessage::Ok { .. } => None,
        }
    }
}

/// Decode a relay frame as an event.
///
/// `EVENT` frames yield their event; every other well-formed frame becomes
/// the matching [`RelayError`] signal.
pub fn decode_relay(frame: &[u8]) -> std::result::Result<Event, RelayError> {
    match RelayMessage::decode(frame) {
        Ok(RelayMessage::Event { event, .. }) => Ok(event),
        Ok(RelayMessage::Closed {
            subscription_id,
            reason,
        }) => Err(RelayError::Closed {
            subscription_id,
            reason,
        }),
        Ok(RelayMessage::Eose { subscription_id }) => Err(RelayError::Eose { subscription_id }),
        Ok(RelayMessage::Notice { reason }) => Err(RelayError::Notice(reason)),
        Ok(RelayMessage::Ok {
            event_id,
            accepted,
            reason,
        }) => Err(RelayError::Ok {
            event_id,
            accepted,
            reason,
        }),
        Err(e) => Err(RelayError::InvalidData(e.to_string())),
    }
}

fn expect_arity(tag: &str, fields: &[Value], arity: usize) -> Result<()> {
    if fields.len() != arity {
        return Err(Error::InvalidData(format!(
            "{} frame expects {} elements, got {}",
            tag,
            arity,
            fields.len()
        )));
    }
    Ok(())
}

fn string_at(tag: &str, fields: &[Value], index: usize) -> Result<String> {
    fields[index]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidData(format!("{} field {} is not a string", tag, index)))
}

fn event_at(fields: &[Value], index: usize) -> Result<Event> {
    Event::deserialize(&fields[index])
        .map_err(|e| Error::InvalidData(format!("invalid event: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::BaseEventBuilder;
    use chrono::DateTime;

    const EVENT_OBJECT: &str = r#"{"id":"abc","pubkey":"pk","created_at":123,"kind":1,"tags":[["t","x"]],"content":"hello","sig":"sig"}"#;

    fn sample_event() -> Event {
        let frame = format!(r#"["EVENT","sub1",{}]"#, EVENT_OBJECT);
        decode_relay(frame.as_bytes()).unwrap()
    }

    #[test]
    fn test_encode_close() {
        let frame = ClientMessage::Close("sub1".to_string()).encode();
        assert_eq!(frame, r#"["CLOSE","sub1"]"#);
    }

    #[test]
    fn test_encode_event() {
        let frame = ClientMessage::Event(sample_event()).encode();
        assert_eq!(frame, format!(r#"["EVENT",{}]"#, EVENT_OBJECT));
    }

    #[test]
    fn test_encode_request_with_filters() {
        let filters = vec![
            Filter::new().kinds([1]).limit(10),
            Filter::new()
                .authors(["pk"])
                .since(DateTime::from_timestamp(1700000000, 0).unwrap()),
        ];
        let frame = ClientMessage::Request {
            subscription_id: "sub1".to_string(),
            filters,
        }
        .encode();

        assert_eq!(
            frame,
            r#"["REQ","sub1",{"kinds":[1],"limit":10},{"authors":["pk"],"since":1700000000}]"#
        );
    }

    #[test]
    fn test_encode_request_without_filters() {
        let frame = ClientMessage::Request {
            subscription_id: "s".to_string(),
            filters: vec![],
        }
        .encode();
        assert_eq!(frame, r#"["REQ","s"]"#);
    }

    #[test]
    fn test_decode_event() {
        let frame = format!(r#"["EVENT","sub1",{}]"#, EVENT_OBJECT);
        match RelayMessage::decode(frame.as_bytes()).unwrap() {
            RelayMessage::Event {
                subscription_id,
                event,
            } => {
                assert_eq!(subscription_id, "sub1");
                assert_eq!(event.content(), "hello");
                assert_eq!(event.kind(), 1);
                assert_eq!(event.created_at().timestamp(), 123);
            }
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_decode_closed_is_closed_failure() {
        let err = decode_relay(br#"["CLOSED","sub1","duplicate: already opened"]"#).unwrap_err();
        assert_eq!(
            err,
            RelayError::Closed {
                subscription_id: "sub1".to_string(),
                reason: "duplicate: already opened".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_closed_wrong_arity_is_invalid_data() {
        let err = decode_relay(br#"["CLOSED","sub1"]"#).unwrap_err();
        assert!(matches!(err, RelayError::InvalidData(_)));

        let err = decode_relay(br#"["CLOSED","sub1","reason","extra"]"#).unwrap_err();
        assert!(matches!(err, RelayError::InvalidData(_)));
    }

    #[test]
    fn test_decode_eose_notice_ok() {
        assert_eq!(
            RelayMessage::decode(br#"["EOSE","sub1"]"#).unwrap(),
            RelayMessage::Eose {
                subscription_id: "sub1".to_string()
            }
        );
        assert_eq!(
            RelayMessage::decode(br#"["NOTICE","slow down"]"#).unwrap(),
            RelayMessage::Notice {
                reason: "slow down".to_string()
            }
        );
        assert_eq!(
            RelayMessage::decode(br#"["OK","eid",false,"blocked: spam"]"#).unwrap(),
            RelayMessage::Ok {
                event_id: "eid".to_string(),
                accepted: false,
                reason: "blocked: spam".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        let frames: [&[u8]; 9] = [
            b"not json",
            br#"{"EVENT":1}"#,
            br#"[]"#,
            br#"[1,"sub1"]"#,
            br#"["AUTH","challenge"]"#,
            br#"["EOSE",42]"#,
            br#"["OK","eid","true","msg"]"#,
            br#"["NOTICE"]"#,
            br#"["EVENT","sub1",{"id":"abc"}]"#,
        ];

        for frame in frames {
            assert!(
                matches!(RelayMessage::decode(frame), Err(Error::InvalidData(_))),
                "frame should be rejected: {}",
                String::from_utf8_lossy(frame)
            );
        }
    }

    #[test]
    fn test_subscription_id_accessor() {
        let eose = RelayMessage::decode(br#"["EOSE","abc"]"#).unwrap();
        assert_eq!(eose.subscription_id(), Some("abc"));

        let notice = RelayMessage::decode(br#"["NOTICE","x"]"#).unwrap();
        assert_eq!(notice.subscription_id(), None);
    }

    #[test]
    fn test_event_frame_survives_reencode() {
        let base = BaseEventBuilder::new()
            .author_key("pk")
            .created_at_secs(99)
            .kind(1)
            .content("hi")
            .build();
        let event = Event::from_parts(base, "id".to_string(), "sig".to_string());

        let frame = ClientMessage::Event(event.clone()).encode();
        let relayed = frame.replacen("[\"EVENT\",", "[\"EVENT\",\"s\",", 1);
        assert_eq!(decode_relay(relayed.as_bytes()).unwrap(), event);
    }
}
