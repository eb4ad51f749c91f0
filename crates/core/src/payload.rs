//! Compressed batch payload codec
//!
//! The watcher ships each chunk as base64 of a zlib-deflated JSON array of
//! file change events.

use crate::FileChangeEvent;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("failed to inflate payload: {0}")]
    Inflate(#[from] std::io::Error),

    #[error("payload is not a JSON event array: {0}")]
    Json(#[from] serde_json::Error),

    #[error("inflated payload exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Upper bound on the inflated size of one chunk
pub const MAX_DECODED_LEN: usize = 64 * 1024 * 1024;

/// Decode a chunk payload into its events
pub fn decode_events(msg: &str) -> Result<Vec<FileChangeEvent>, PayloadError> {
    decode_events_limited(msg, MAX_DECODED_LEN)
}

/// Decode a chunk payload, refusing to inflate more than `limit` bytes
pub fn decode_events_limited(msg: &str, limit: usize) -> Result<Vec<FileChangeEvent>, PayloadError> {
    let compressed = STANDARD.decode(msg.trim())?;
    let decoder = ZlibDecoder::new(compressed.as_slice());
    let mut json = Vec::new();
    decoder.take(limit as u64 + 1).read_to_end(&mut json)?;
    if json.len() > limit {
        return Err(PayloadError::TooLarge { limit });
    }
    Ok(serde_json::from_slice(&json)?)
}

/// Encode events the same way the watcher does
pub fn encode_events(events: &[FileChangeEvent]) -> Result<String, PayloadError> {
    let json = serde_json::to_vec(events)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}
