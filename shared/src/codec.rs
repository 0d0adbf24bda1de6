//! JSON text-frame codec
//!
//! Every message travels as a single UTF-8 text frame holding one JSON
//! object:
//! ```text
//! {"type":"chat","payload":{...},"timestamp":"2024-01-01T00:00:00Z","clientId":"client_..."}
//! ```
//!
//! The transport preserves frame boundaries, so no length prefix is needed.

use thiserror::Error;

use crate::Envelope;

/// Maximum frame size (1 MiB) accepted in either direction
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes (max: {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),

    #[error("Envelope type is empty")]
    MissingType,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode an envelope into a text frame
pub fn encode(envelope: &Envelope) -> Result<String, CodecError> {
    if envelope.kind().is_empty() {
        return Err(CodecError::MissingType);
    }

    let text = serde_json::to_string(envelope)?;
    if text.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(text.len()));
    }

    Ok(text)
}

/// Decode a text frame into an envelope
///
/// Fails on non-JSON input, on objects missing `type` or `timestamp`, and on
/// oversized frames.
pub fn decode(text: &str) -> Result<Envelope, CodecError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(text.len()));
    }

    let envelope: Envelope = serde_json::from_str(text)?;
    if envelope.kind().is_empty() {
        return Err(CodecError::MissingType);
    }

    Ok(envelope)
}
