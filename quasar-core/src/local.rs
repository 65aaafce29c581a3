//! Storage projection of events
//!
//! [`LocalEvent`] is the shape events take once they leave the wire: a
//! protobuf message that cache backends persist. It carries the same seven
//! fields as [`Event`] but is free to evolve independently of the NIP-01 JSON.

use crate::error::{Error, Result};
use crate::event::{BaseEvent, Event, timestamp_from_secs};
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use prost::Message;
use std::io::{Read, Write};

/// Persisted event record
#[derive(Clone, PartialEq, Eq, Message)]
pub struct LocalEvent {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub author_key: String,
    #[prost(int64, tag = "3")]
    pub created_at: i64,
    #[prost(uint32, tag = "4")]
    pub kind: u32,
    #[prost(message, repeated, tag = "5")]
    pub tags: Vec<LocalTag>,
    #[prost(string, tag = "6")]
    pub content: String,
    #[prost(string, tag = "7")]
    pub signature: String,
}

/// One tag of a persisted event
#[derive(Clone, PartialEq, Eq, Message)]
pub struct LocalTag {
    #[prost(string, repeated, tag = "1")]
    pub values: Vec<String>,
}

impl From<&Event> for LocalEvent {
    fn from(event: &Event) -> Self {
        LocalEvent {
            id: event.id().to_string(),
            author_key: event.author_key().to_string(),
            created_at: event.created_at().timestamp(),
            kind: u32::from(event.kind()),
            tags: event
                .tags()
                .iter()
                .map(|values| LocalTag {
                    values: values.clone(),
                })
                .collect(),
            content: event.content().to_string(),
            signature: event.signature().to_string(),
        }
    }
}

impl TryFrom<LocalEvent> for Event {
    type Error = Error;

    fn try_from(local: LocalEvent) -> Result<Self> {
        let kind = u16::try_from(local.kind).map_err(|_| {
            Error::Conversion(format!(
                "stored kind {} is out of valid range (0-65535)",
                local.kind
            ))
        })?;
        let created_at = timestamp_from_secs(local.created_at)
            .map_err(|e| Error::Conversion(format!("stored event {}: {}", local.id, e)))?;

        Ok(Event::from_parts(
            BaseEvent::new(
                local.author_key,
                created_at,
                kind,
                local.tags.into_iter().map(|tag| tag.values).collect(),
                local.content,
            ),
            local.id,
            local.signature,
        ))
    }
}

/// Write events in length-delimited format
///
/// Format: `[varint length][protobuf binary data]` per event, so records can
/// be appended to the same stream and read back one at a time.
pub fn write_events_delimited<W: Write>(writer: &mut W, events: &[LocalEvent]) -> Result<()> {
    let mut buf = Vec::new();
    for event in events {
        buf.clear();
        event.encode_length_delimited(&mut buf)?;
        writer.write_all(&buf)?;
    }
    Ok(())
}

/// Largest record length [`read_events_delimited`] will allocate for
pub const MAX_RECORD_LEN: usize = 4 * 1024 * 1024;

/// Read events from a length-delimited protobuf stream
///
/// Returns an iterator that yields events one at a time.
pub fn read_events_delimited<R: Read>(reader: R) -> EventIterator<R> {
    EventIterator {
        reader,
        buffer: Vec::new(),
    }
}

/// Iterator over events in a length-delimited stream
pub struct EventIterator<R: Read> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: Read> Iterator for EventIterator<R> {
    type Item = Result<LocalEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let length = match read_varint(&mut self.reader) {
            Ok(Some(len)) if len <= MAX_RECORD_LEN as u64 => len as usize,
            Ok(Some(len)) => {
                return Some(Err(Error::InvalidData(format!(
                    "Record length {} exceeds limit of {} bytes",
                    len, MAX_RECORD_LEN
                ))));
            }
            Ok(None) => return None,
            Err(e) => return Some(Err(e.into())),
        };

        self.buffer.clear();
        self.buffer.resize(length, 0);
        if let Err(e) = self.reader.read_exact(&mut self.buffer) {
            return Some(Err(e.into()));
        }

        Some(LocalEvent::decode(&self.buffer[..]).map_err(Error::from))
    }
}

/// Wrap a writer with gzip compression at the default level (6)
pub fn create_gzip_encoder<W: Write>(writer: W) -> GzEncoder<W> {
    GzEncoder::new(writer, Compression::new(6))
}

/// Wrap a reader with gzip decompression.
///
/// Reads every concatenated gzip member, so a file grown by appending
/// independently compressed chunks decodes as one stream.
pub fn create_gzip_decoder<R: Read>(reader: R) -> MultiGzDecoder<R> {
    MultiGzDecoder::new(reader)
}

/// Read a varint; `Ok(None)` on a clean end of stream before the first byte
fn read_varint<R: Read>(reader: &mut R) -> std::io::Result<Option<u64>> {
    let mut result = 0u64;
    let mut shift = 0;
    let mut buf = [0u8; 1];

    loop {
        if reader.read(&mut buf)? == 0 {
            if shift == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Stream ended inside a varint",
            ));
        }
        let byte = buf[0];

        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(Some(result));
        }

        shift += 7;
        if shift >= 64 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Varint too large",
            ));
        }
    }
}
