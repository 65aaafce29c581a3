//! Interop with nostr-sdk events
//!
//! Both directions go through the NIP-01 JSON object, which is the one
//! representation the two libraries are guaranteed to agree on.

use crate::{error::Result, event::Event};
use serde::Deserialize;

/// Convert from a nostr-sdk Event (fallible: kind and timestamp are range-checked)
impl TryFrom<&nostr_sdk::Event> for Event {
    type Error = crate::error::Error;

    fn try_from(nostr_event: &nostr_sdk::Event) -> Result<Self> {
        let value = serde_json::to_value(nostr_event)?;
        Ok(Event::deserialize(value)?)
    }
}

/// Convert into a nostr-sdk Event, e.g. to hand it to nostr-sdk's verifier
impl TryFrom<&Event> for nostr_sdk::Event {
    type Error = crate::error::Error;

    fn try_from(event: &Event) -> Result<Self> {
        let json = serde_json::to_string(event)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BaseEventBuilder, Keys, Signer, sign};

    #[test]
    fn test_signed_event_verifies_in_nostr_sdk() {
        let keys = Keys::generate();
        let base = BaseEventBuilder::new()
            .author_key(keys.public_key())
            .kind(1)
            .add_tag(vec!["t", "quasar"])
            .content("interop")
            .build();
        let event = sign(base, &keys).unwrap();

        let nostr_event = nostr_sdk::Event::try_from(&event).unwrap();
        assert!(nostr_event.verify().is_ok());

        let back = Event::try_from(&nostr_event).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_tampered_event_fails_nostr_sdk_verification() {
        let keys = Keys::generate();
        let base = BaseEventBuilder::new()
            .author_key(keys.public_key())
            .content("original")
            .build();
        let event = sign(base, &keys).unwrap();

        let json = serde_json::to_string(&event)
            .unwrap()
            .replace("original", "tampered");
        // Rejecting at parse time is as good as rejecting at verify time
        if let Ok(nostr_event) = serde_json::from_str::<nostr_sdk::Event>(&json) {
            assert!(nostr_event.verify().is_err());
        }
    }
}
