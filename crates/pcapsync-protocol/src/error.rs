//! Protocol error types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type for frame decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Why an inbound frame was dropped.
///
/// Every variant is recoverable: the frame is discarded and the next one
/// is processed normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not parseable as a JSON document, or larger than the frame limit.
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },

    /// Parsed, but not an object with a string `Type` field.
    #[error("unknown envelope: {reason}")]
    UnknownEnvelope { reason: String },

    /// Valid envelope whose `Type` no family accepts. Expected during
    /// version skew between server and client.
    #[error("unrecognized event type '{event_type}'")]
    UnrecognizedVariant { event_type: String },

    /// Known `Type`, but the payload fails shape or range checks.
    #[error("invalid payload for '{event_type}': {reason}")]
    InvalidPayload { event_type: String, reason: String },
}

impl DecodeError {
    /// Creates a malformed frame error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Creates an unknown envelope error.
    pub fn unknown_envelope(reason: impl Into<String>) -> Self {
        Self::UnknownEnvelope {
            reason: reason.into(),
        }
    }

    /// Creates an unrecognized variant error.
    pub fn unrecognized(event_type: impl Into<String>) -> Self {
        Self::UnrecognizedVariant {
            event_type: event_type.into(),
        }
    }

    /// Creates an invalid payload error.
    pub fn invalid_payload(event_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            event_type: event_type.into(),
            reason: reason.into(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            Self::MalformedFrame { .. } => DecodeErrorKind::MalformedFrame,
            Self::UnknownEnvelope { .. } => DecodeErrorKind::UnknownEnvelope,
            Self::UnrecognizedVariant { .. } => DecodeErrorKind::UnrecognizedVariant,
            Self::InvalidPayload { .. } => DecodeErrorKind::InvalidPayload,
        }
    }
}

/// Classification of a [`DecodeError`], for counters and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DecodeErrorKind {
    MalformedFrame,
    UnknownEnvelope,
    UnrecognizedVariant,
    InvalidPayload,
}

impl DecodeErrorKind {
    /// Every classification.
    pub const ALL: [DecodeErrorKind; 4] = [
        Self::MalformedFrame,
        Self::UnknownEnvelope,
        Self::UnrecognizedVariant,
        Self::InvalidPayload,
    ];

    /// Returns the classification name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedFrame => "MalformedFrame",
            Self::UnknownEnvelope => "UnknownEnvelope",
            Self::UnrecognizedVariant => "UnrecognizedVariant",
            Self::InvalidPayload => "InvalidPayload",
        }
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while encoding an outbound frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Failed to serialize the event to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Encoded frame exceeds the frame limit.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}
