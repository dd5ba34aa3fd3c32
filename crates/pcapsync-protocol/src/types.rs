//! Event schema for the pcapsync channel.
//!
//! The whole schema is declared once in the table at the bottom of this
//! file. From it the macro generates:
//! - [`EventKind`]: one value per `Type` literal
//! - [`EventFamily`]: the variant groups, in decoding order
//! - [`Event`]: the serde-tagged union that decoding narrows to
//!
//! Shape checks come from the serde derives on the payload types, so the
//! validator, the decoder and the dispatcher all read the same declaration.

use std::fmt;
use std::str::FromStr;

use pcapsync_core::{Config, ConverterStatus, PcapOverIpEndpoint, PcapStats, TagInfo};
use serde::{Deserialize, Serialize};

macro_rules! event_schema {
    ($(
        $(#[$family_meta:meta])*
        $family:ident($field:ident = $field_name:literal : $payload:ty) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $literal:literal
            ),+ $(,)?
        }
    )+) => {
        /// A single `Type` discriminator value.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventKind {
            $($(
                $(#[$variant_meta])*
                $variant,
            )+)+
        }

        impl EventKind {
            /// Every known discriminator, in schema order.
            pub const ALL: &'static [EventKind] = &[$($(EventKind::$variant,)+)+];

            /// Returns the wire literal.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($(Self::$variant => $literal,)+)+
                }
            }

            /// Returns the family this discriminator belongs to.
            pub fn family(&self) -> EventFamily {
                match self {
                    $($(Self::$variant => EventFamily::$family,)+)+
                }
            }

            /// Looks up a wire literal.
            pub fn from_literal(literal: &str) -> Option<Self> {
                match literal {
                    $($($literal => Some(Self::$variant),)+)+
                    _ => None,
                }
            }
        }

        /// A group of discriminators sharing one payload shape.
        ///
        /// Each family also names the region of mirrored state its events touch.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum EventFamily {
            $(
                $(#[$family_meta])*
                $family,
            )+
        }

        impl EventFamily {
            /// Every family, in the order decoding tries them.
            pub const ALL: &'static [EventFamily] = &[$(EventFamily::$family,)+];

            /// Returns the name of the payload field.
            pub fn payload_field(&self) -> &'static str {
                match self {
                    $(Self::$family => $field_name,)+
                }
            }

            /// Returns the discriminators of this family.
            pub fn kinds(&self) -> &'static [EventKind] {
                match self {
                    $(Self::$family => &[$(EventKind::$variant,)+],)+
                }
            }

            /// Returns the family name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$family => stringify!($family),)+
                }
            }
        }

        /// A validated event, narrowed to exactly one variant.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(tag = "Type")]
        pub enum Event {
            $($(
                $(#[$variant_meta])*
                #[serde(rename = $literal)]
                $variant {
                    #[serde(rename = $field_name)]
                    $field: $payload,
                },
            )+)+
        }

        impl Event {
            /// Returns the discriminator of this event.
            pub fn kind(&self) -> EventKind {
                match self {
                    $($(Self::$variant { .. } => EventKind::$variant,)+)+
                }
            }
        }
    };
}

event_schema! {
    /// Tag lifecycle and evaluation results.
    Tag(tag = "Tag": TagInfo) {
        TagAdded = "tagAdded",
        TagDeleted = "tagDeleted",
        TagUpdated = "tagUpdated",
        /// Matching counters changed after a tagging job.
        TagEvaluated = "tagEvaluated",
    }
    /// Converter lifecycle and process status.
    Converter(converter = "Converter": ConverterStatus) {
        /// A converter finished processing queued streams.
        ConverterCompleted = "converterCompleted",
        ConverterDeleted = "converterDeleted",
        ConverterAdded = "converterAdded",
        ConverterRestarted = "converterRestarted",
    }
    /// Ingestion counters.
    PcapStats(stats = "PcapStats": PcapStats) {
        IndexesMerged = "indexesMerged",
        PcapProcessed = "pcapProcessed",
    }
    /// Server configuration.
    Config(config = "Config": Config) {
        ConfigUpdated = "configUpdated",
    }
    /// Webhook identifiers, always the full set.
    Webhooks(webhooks = "Webhooks": Vec<String>) {
        WebhooksUpdated = "webhooksUpdated",
    }
    /// Pcap-over-ip endpoints, always the full set.
    PcapOverIpEndpoints(endpoints = "PcapOverIPEndpoints": Vec<PcapOverIpEndpoint>) {
        PcapOverIpEndpointsUpdated = "pcapOverIPEndpointsUpdated",
    }
}

impl EventKind {
    /// Returns true if this discriminator removes an entry rather than
    /// inserting or replacing one.
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::TagDeleted | Self::ConverterDeleted)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_literal(s).ok_or_else(|| format!("unknown event type '{s}'"))
    }
}

impl EventFamily {
    /// Returns true if `literal` is one of this family's discriminators.
    pub fn accepts(&self, literal: &str) -> bool {
        self.kinds().iter().any(|kind| kind.as_str() == literal)
    }
}

impl fmt::Display for EventFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    /// Returns the family (and state region) of this event.
    pub fn family(&self) -> EventFamily {
        self.kind().family()
    }

    /// Returns the wire discriminator.
    pub fn type_name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Returns the key of the entry this event addresses, for keyed families.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::TagAdded { tag }
            | Self::TagDeleted { tag }
            | Self::TagUpdated { tag }
            | Self::TagEvaluated { tag } => Some(&tag.name),
            Self::ConverterCompleted { converter }
            | Self::ConverterDeleted { converter }
            | Self::ConverterAdded { converter }
            | Self::ConverterRestarted { converter } => Some(&converter.name),
            Self::IndexesMerged { .. }
            | Self::PcapProcessed { .. }
            | Self::ConfigUpdated { .. }
            | Self::WebhooksUpdated { .. }
            | Self::PcapOverIpEndpointsUpdated { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn literals_are_disjoint_across_families() {
        let mut seen = HashSet::new();
        for kind in EventKind::ALL {
            assert!(seen.insert(kind.as_str()), "duplicate literal {kind}");
        }
        for literal in &seen {
            let accepting: Vec<_> = EventFamily::ALL
                .iter()
                .filter(|family| family.accepts(literal))
                .collect();
            assert_eq!(accepting.len(), 1, "{literal} accepted by {accepting:?}");
        }
    }

    #[test]
    fn family_kinds_cover_every_kind() {
        let from_families: usize = EventFamily::ALL.iter().map(|f| f.kinds().len()).sum();
        assert_eq!(from_families, EventKind::ALL.len());
        // tag 4, converter 4, pcap stats 2, config 1, webhooks 1, endpoints 1
        assert_eq!(EventKind::ALL.len(), 13);
        for kind in EventKind::ALL {
            assert!(kind.family().kinds().contains(kind));
        }
    }

    #[test]
    fn literal_lookup_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(*kind));
        }
        assert!("futureEventKind".parse::<EventKind>().is_err());
        assert_eq!(
            EventKind::from_literal("pcapOverIPEndpointsUpdated"),
            Some(EventKind::PcapOverIpEndpointsUpdated)
        );
    }

    #[test]
    fn family_order_matches_table() {
        let names: Vec<_> = EventFamily::ALL.iter().map(|f| f.payload_field()).collect();
        assert_eq!(
            names,
            vec![
                "Tag",
                "Converter",
                "PcapStats",
                "Config",
                "Webhooks",
                "PcapOverIPEndpoints"
            ]
        );
    }

    #[test]
    fn serialized_type_matches_kind() {
        let events = vec![
            Event::TagEvaluated {
                tag: TagInfo::new("t", "", ""),
            },
            Event::ConverterRestarted {
                converter: ConverterStatus::new("c"),
            },
            Event::IndexesMerged {
                stats: PcapStats::default(),
            },
            Event::ConfigUpdated {
                config: Config::new(true),
            },
            Event::WebhooksUpdated {
                webhooks: vec!["a".to_string()],
            },
            Event::PcapOverIpEndpointsUpdated {
                endpoints: Vec::new(),
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["Type"], event.type_name());
            assert!(value.get(event.family().payload_field()).is_some());
        }
    }

    #[test]
    fn keyed_events_expose_name() {
        let event = Event::ConverterDeleted {
            converter: ConverterStatus::new("pythonrequests"),
        };
        assert_eq!(event.key(), Some("pythonrequests"));
        assert!(event.kind().is_removal());

        let event = Event::WebhooksUpdated { webhooks: vec![] };
        assert_eq!(event.key(), None);
    }
}
