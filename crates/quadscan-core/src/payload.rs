//! Secondary interpretation of decoded code text as `hex(zlib(json))`.
//!
//! Most codes carry plain text and will not decode; that is the normal case,
//! so [`try_decode`] returns `Option` instead of an error.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum PayloadError {
    #[error("failed to serialize payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to compress payload: {0}")]
    Compress(#[from] std::io::Error),
}

/// Decode `text` as hex, inflate, read UTF-8 and parse JSON.
///
/// Surrounding whitespace is ignored. Any failing stage yields `None`.
pub fn try_decode(text: &str) -> Option<Value> {
    let bytes = hex::decode(text.trim()).ok()?;
    let mut inflated = String::new();
    ZlibDecoder::new(bytes.as_slice())
        .read_to_string(&mut inflated)
        .ok()?;
    serde_json::from_str(&inflated).ok()
}

/// Inverse of [`try_decode`]: compact JSON, zlib, lowercase hex.
pub fn encode(value: &Value) -> Result<String, PayloadError> {
    let json = serde_json::to_vec(value)?;
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&json)?;
    Ok(hex::encode(enc.finish()?))
}
