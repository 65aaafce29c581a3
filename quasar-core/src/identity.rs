//! Event identity and signing
//!
//! The id of an event is the SHA-256 of its canonical serialization
//! `[0,<pubkey>,<created_at>,<kind>,<tags>,<content>]` written as compact JSON.
//! Any deviation in ordering, whitespace or number formatting changes the id.

use crate::error::{Error, Result};
use crate::event::{BaseEvent, Event};
use crate::keys::{hex_decode, hex_encode};
use secp256k1::{Keypair, Message, SECP256K1, SecretKey, XOnlyPublicKey, schnorr};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Failure reported by a [`Signer`]
#[derive(Error, Debug)]
#[error("{0}")]
pub struct SignerError(pub String);

/// Produces signatures over raw event ids without exposing its private key
pub trait Signer: Send + Sync {
    /// Hex-encoded x-only public key matching the signatures produced
    fn public_key(&self) -> String;

    /// Sign a 32-byte digest
    fn sign(&self, digest: &[u8; 32]) -> std::result::Result<Vec<u8>, SignerError>;
}

/// Canonical serialization of an unsigned event
pub fn canonical_serialize(base: &BaseEvent) -> Vec<u8> {
    // A tuple of strings, integers and string arrays cannot fail to serialize
    serde_json::to_vec(&(
        0,
        base.author_key(),
        base.created_at().timestamp(),
        base.kind(),
        base.tags(),
        base.content(),
    ))
    .unwrap_or_default()
}

/// Lowercase hex SHA-256 of the canonical serialization
pub fn derive_id(base: &BaseEvent) -> String {
    hex_encode(Sha256::digest(canonical_serialize(base)))
}

/// Derive the id of `base` and sign it
///
/// # Example
///
/// ```
/// use quasar_core::{BaseEventBuilder, Keys, Signer, sign};
///
/// let keys = Keys::generate();
/// let base = BaseEventBuilder::new()
///     .author_key(keys.public_key())
///     .kind(1)
///     .content("Hello, Nostr!")
///     .build();
///
/// let event = sign(base, &keys)?;
/// event.verify()?;
/// # Ok::<(), quasar_core::Error>(())
/// ```
pub fn sign(base: BaseEvent, signer: &dyn Signer) -> Result<Event> {
    let id = derive_id(&base);

    let digest: [u8; 32] = hex_decode(&id)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| Error::Signing(format!("id {} is not 32 hex-encoded bytes", id)))?;

    let signature = signer
        .sign(&digest)
        .map_err(|e| Error::Signing(e.to_string()))?;

    Ok(Event::from_parts(base, id, hex_encode(signature)))
}

/// Check that the event id matches its content and the signature matches the id
pub fn verify(event: &Event) -> Result<()> {
    let computed = derive_id(event.base());
    if computed != event.id() {
        return Err(Error::IdMismatch {
            expected: event.id().to_string(),
            actual: computed,
        });
    }

    let message = Message::from_digest_slice(&hex_decode(event.id())?)
        .map_err(|e| Error::InvalidSignature(format!("invalid id: {}", e)))?;
    let signature = schnorr::Signature::from_slice(&hex_decode(event.signature())?)
        .map_err(|e| Error::InvalidSignature(format!("malformed signature: {}", e)))?;
    let public_key = XOnlyPublicKey::from_slice(&hex_decode(event.author_key())?)
        .map_err(|e| Error::InvalidSignature(format!("invalid author key: {}", e)))?;

    SECP256K1
        .verify_schnorr(&signature, &message, &public_key)
        .map_err(|e| Error::InvalidSignature(e.to_string()))
}

/// A secp256k1 key pair producing BIP-340 signatures
pub struct Keys {
    keypair: Keypair,
}

impl Keys {
    /// Generate a fresh random key pair
    pub fn generate() -> Self {
        Self {
            keypair: Keypair::new(SECP256K1, &mut secp256k1::rand::thread_rng()),
        }
    }

    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_slice(secret)
            .map_err(|e| Error::Signing(format!("invalid secret key: {}", e)))?;
        Ok(Self {
            keypair: Keypair::from_secret_key(SECP256K1, &secret),
        })
    }

    pub fn from_secret_hex(secret: &str) -> Result<Self> {
        Self::from_secret_bytes(&hex_decode(secret)?)
    }

    /// Raw secret scalar, for export as `nsec`
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.keypair.secret_bytes()
    }
}

impl Signer for Keys {
    fn public_key(&self) -> String {
        let (public_key, _parity) = self.keypair.x_only_public_key();
        hex_encode(public_key.serialize())
    }

    fn sign(&self, digest: &[u8; 32]) -> std::result::Result<Vec<u8>, SignerError> {
        let message =
            Message::from_digest_slice(digest).map_err(|e| SignerError(e.to_string()))?;
        let signature = SECP256K1.sign_schnorr_no_aux_rand(&message, &self.keypair);
        Ok(signature.as_ref().to_vec())
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_key())
            .field("secret", &"<redacted>")
            .finish()
    }
}
