//! Typed event protocol for the pcapsync state channel.
//!
//! The server pushes one JSON object per text frame whenever its state
//! changes. Every frame is untrusted until it has passed through
//! [`decode_frame`], which narrows it to exactly one [`Event`] variant or
//! classifies why it was dropped.
//!
//! # Envelope
//!
//! Every message is an object with a string `Type` discriminator and one
//! payload field whose name depends on the family:
//!
//! ```text
//! {"Type": "tagAdded", "Tag": {"Name": "...", ...}}
//! {"Type": "webhooksUpdated", "Webhooks": ["...", ...]}
//! ```
//!
//! # Example
//!
//! ```rust
//! use pcapsync_protocol::{decode_frame, EventFamily};
//!
//! let frame = r#"{"Type":"configUpdated","Config":{"AutoInsertLimitToQuery":true}}"#;
//! let event = decode_frame(frame).unwrap();
//! assert_eq!(event.family(), EventFamily::Config);
//! ```

mod decode;
mod error;
mod types;
pub mod validate;

pub use decode::{decode_frame, decode_value, encode_event};
pub use error::{DecodeError, DecodeErrorKind, DecodeResult, EncodeError};
pub use types::{Event, EventFamily, EventKind};
pub use validate::{
    is_config_event, is_converter_event, is_event, is_family, is_pcap_over_ip_endpoints_event,
    is_pcap_stats_event, is_tag_event, is_webhooks_event,
};

/// Maximum frame size (1 MB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;
