//! Frame decoding and encoding.
//!
//! One frame carries exactly one JSON object. Decoding runs three steps and
//! stops at the first failure:
//!
//! ```text
//! text ──parse──▶ Value ──envelope──▶ Type ──family + payload──▶ Event
//!   MalformedFrame      UnknownEnvelope      UnrecognizedVariant / InvalidPayload
//! ```

use serde_json::Value;

use crate::MAX_FRAME_SIZE;
use crate::error::{DecodeError, DecodeResult, EncodeError};
use crate::types::{Event, EventFamily};
use crate::validate::{TYPE_FIELD, narrow};

/// Decodes one text frame into a validated [`Event`].
///
/// Total over arbitrary input: every string maps to an event or to one of
/// the four [`DecodeError`] kinds.
///
/// # Example
///
/// ```rust
/// use pcapsync_protocol::{decode_frame, DecodeErrorKind, Event};
///
/// let event = decode_frame(r#"{"Type":"webhooksUpdated","Webhooks":["a"]}"#).unwrap();
/// assert_eq!(event, Event::WebhooksUpdated { webhooks: vec!["a".to_string()] });
///
/// let err = decode_frame(r#"{"Type":"futureEventKind","Foo":"bar"}"#).unwrap_err();
/// assert_eq!(err.kind(), DecodeErrorKind::UnrecognizedVariant);
/// ```
pub fn decode_frame(frame: &str) -> DecodeResult<Event> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(DecodeError::malformed(format!(
            "frame too large: {} bytes (max: {})",
            frame.len(),
            MAX_FRAME_SIZE
        )));
    }

    let value: Value =
        serde_json::from_str(frame).map_err(|e| DecodeError::malformed(e.to_string()))?;
    decode_value(&value)
}

/// Decodes an already parsed value into a validated [`Event`].
pub fn decode_value(value: &Value) -> DecodeResult<Event> {
    let event_type = envelope_type(value)?;

    let family = EventFamily::ALL
        .iter()
        .copied()
        .find(|family| family.accepts(event_type))
        .ok_or_else(|| DecodeError::unrecognized(event_type))?;

    narrow(value, family).map_err(|reason| DecodeError::invalid_payload(event_type, reason))
}

/// Encodes an event as a text frame.
///
/// # Example
///
/// ```rust
/// use pcapsync_protocol::{decode_frame, encode_event, Event};
///
/// let event = Event::WebhooksUpdated { webhooks: vec!["hook-1".to_string()] };
/// let frame = encode_event(&event).unwrap();
/// assert_eq!(decode_frame(&frame).unwrap(), event);
/// ```
pub fn encode_event(event: &Event) -> Result<String, EncodeError> {
    let frame = serde_json::to_string(event)?;
    if frame.len() > MAX_FRAME_SIZE {
        return Err(EncodeError::FrameTooLarge {
            size: frame.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(frame)
}

fn envelope_type(value: &Value) -> DecodeResult<&str> {
    let object = value.as_object().ok_or_else(|| {
        DecodeError::unknown_envelope(format!("expected an object, found {}", json_type(value)))
    })?;

    match object.get(TYPE_FIELD) {
        Some(Value::String(event_type)) => Ok(event_type),
        Some(other) => Err(DecodeError::unknown_envelope(format!(
            "`{TYPE_FIELD}` is {}, expected a string",
            json_type(other)
        ))),
        None => Err(DecodeError::unknown_envelope(format!(
            "missing `{TYPE_FIELD}` field"
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeErrorKind;
    use crate::types::EventKind;
    use pcapsync_core::{PcapStats, TagInfo};

    const PCAP_PROCESSED: &str = r#"{"Type":"pcapProcessed","PcapStats":{"PcapCount":1,"PacketCount":100,"ImportJobCount":0,"IndexCount":1,"StreamCount":2,"StreamRecordCount":2,"PacketRecordCount":100}}"#;

    fn kind_of(frame: &str) -> DecodeErrorKind {
        decode_frame(frame).unwrap_err().kind()
    }

    #[test]
    fn decodes_pcap_processed() {
        let event = decode_frame(PCAP_PROCESSED).unwrap();
        assert_eq!(
            event,
            Event::PcapProcessed {
                stats: PcapStats {
                    pcap_count: 1,
                    packet_count: 100,
                    import_job_count: 0,
                    index_count: 1,
                    stream_count: 2,
                    stream_record_count: 2,
                    packet_record_count: 100,
                }
            }
        );
        assert_eq!(event.kind(), EventKind::PcapProcessed);
    }

    #[test]
    fn unknown_type_is_unrecognized_variant() {
        let err = decode_frame(r#"{"Type":"futureEventKind","Foo":"bar"}"#).unwrap_err();
        assert_eq!(err, DecodeError::unrecognized("futureEventKind"));
    }

    #[test]
    fn malformed_frames() {
        for frame in ["", "{", "not json", r#"{"Type":"tagAdded",}"#, "\u{0}"] {
            assert_eq!(kind_of(frame), DecodeErrorKind::MalformedFrame, "{frame:?}");
        }
    }

    #[test]
    fn oversized_frame_is_malformed() {
        let frame = format!(
            r#"{{"Type":"webhooksUpdated","Webhooks":["{}"]}}"#,
            "x".repeat(MAX_FRAME_SIZE)
        );
        assert_eq!(kind_of(&frame), DecodeErrorKind::MalformedFrame);
    }

    #[test]
    fn non_object_or_untyped_is_unknown_envelope() {
        for frame in [
            "null",
            "42",
            r#""tagAdded""#,
            r#"[{"Type":"tagAdded"}]"#,
            r#"{"Tag":{}}"#,
            r#"{"Type":null}"#,
            r#"{"Type":["tagAdded"]}"#,
        ] {
            assert_eq!(kind_of(frame), DecodeErrorKind::UnknownEnvelope, "{frame}");
        }
    }

    #[test]
    fn known_type_with_bad_payload_is_invalid_payload() {
        let frames = [
            r#"{"Type":"tagAdded"}"#,
            r#"{"Type":"tagAdded","Tag":{"Name":"a","Definition":"","Color":"","MatchingCount":-1,"UncertainCount":0,"Referenced":false,"Converters":[]}}"#,
            r#"{"Type":"converterAdded","Converter":{"Name":"c","CachedStreamCount":0,"Processes":[{"Running":"yes","ExitCode":0,"Pid":1,"Errors":0}]}}"#,
            r#"{"Type":"webhooksUpdated","Webhooks":"http://hook"}"#,
            r#"{"Type":"configUpdated","Config":null}"#,
            r#"{"Type":"indexesMerged","PcapStats":{"PcapCount":1}}"#,
        ];
        for frame in frames {
            assert_eq!(kind_of(frame), DecodeErrorKind::InvalidPayload, "{frame}");
        }
    }

    #[test]
    fn invalid_payload_names_the_type() {
        let err = decode_frame(r#"{"Type":"tagDeleted","Tag":{}}"#).unwrap_err();
        match err {
            DecodeError::InvalidPayload { event_type, reason } => {
                assert_eq!(event_type, "tagDeleted");
                assert!(reason.contains("missing field"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn extra_fields_are_ignored() {
        let frame = r#"{"Type":"webhooksUpdated","Webhooks":["a","b"],"Sequence":9}"#;
        assert_eq!(
            decode_frame(frame).unwrap(),
            Event::WebhooksUpdated {
                webhooks: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[test]
    fn decoding_is_total_over_arbitrary_text() {
        let inputs = [
            "}}}}",
            "[[[[[[[[[[",
            "\"\\ud800\"",
            "1e999",
            "{\"Type\":\"tagAdded\",\"Tag\":{\"MatchingCount\":1e400}}",
            "true false",
            "{\"Type\":\"pcapProcessed\",\"PcapStats\":[]}",
            "ÿ",
        ];
        for input in inputs {
            assert!(decode_frame(input).is_err(), "{input}");
        }
        let deep = "[".repeat(10_000);
        assert_eq!(kind_of(&deep), DecodeErrorKind::MalformedFrame);
    }

    #[test]
    fn encode_emits_wire_shape() {
        let event = Event::WebhooksUpdated {
            webhooks: vec!["a".to_string(), "b".to_string()],
        };
        let frame = encode_event(&event).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        insta::assert_json_snapshot!(value, @r#"
        {
          "Type": "webhooksUpdated",
          "Webhooks": [
            "a",
            "b"
          ]
        }
        "#);
    }

    #[test]
    fn encode_then_decode_tag_event() {
        let event = Event::TagUpdated {
            tag: TagInfo::new("mark/flag", "id:1,2", "#00ff00").with_referenced(true),
        };
        let frame = encode_event(&event).unwrap();
        assert_eq!(decode_frame(&frame).unwrap(), event);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn known_or_near_literal() -> impl Strategy<Value = String> {
            prop_oneof![
                prop::sample::select(EventKind::ALL).prop_map(|kind| kind.as_str().to_string()),
                "[a-zA-Z]{0,24}",
            ]
        }

        proptest! {
            #[test]
            fn arbitrary_text_never_panics(frame in any::<String>()) {
                if let Err(err) = decode_frame(&frame) {
                    prop_assert!(DecodeErrorKind::ALL.contains(&err.kind()));
                }
            }

            #[test]
            fn json_shaped_text_never_panics(frame in r#"[\[\]{}":,0-9a-zA-Z \-.]{0,64}"#) {
                if let Err(err) = decode_frame(&frame) {
                    prop_assert!(DecodeErrorKind::ALL.contains(&err.kind()));
                }
            }

            #[test]
            fn typed_objects_classify_by_literal(
                event_type in known_or_near_literal(),
                field in "[A-Za-z]{1,12}",
                number in any::<i64>(),
            ) {
                let frame = serde_json::json!({"Type": event_type, field: number}).to_string();
                match decode_frame(&frame) {
                    Ok(event) => prop_assert_eq!(event.kind().as_str(), event_type.as_str()),
                    Err(err) => {
                        let known = EventKind::from_literal(&event_type).is_some();
                        prop_assert_eq!(
                            err.kind() == DecodeErrorKind::UnrecognizedVariant,
                            !known
                        );
                        if known {
                            prop_assert_eq!(err.kind(), DecodeErrorKind::InvalidPayload);
                        }
                    }
                }
            }
        }
    }
}
