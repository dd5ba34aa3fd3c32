//! Server-side records mirrored by the client.
//!
//! These are the payloads carried by the event channel:
//! - [`TagInfo`]: a tag definition and its match counters
//! - [`ConverterStatus`]: a converter and its worker processes
//! - [`PcapStats`]: ingestion counters for the whole server
//! - [`PcapOverIpEndpoint`]: a remote pcap-over-ip feed
//!
//! Field names on the wire are PascalCase. Counts are unsigned so that a
//! negative or fractional count never deserializes; integral values written
//! in float notation (`100.0`, `1e2`) are accepted.

use serde::{Deserialize, Serialize};

use crate::number;

/// A tag and its evaluation counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagInfo {
    /// Unique tag name, e.g. `service/http` or `mark/flag`.
    pub name: String,
    /// Query the tag is defined by.
    pub definition: String,
    /// Display color.
    pub color: String,
    /// Streams known to match.
    #[serde(deserialize_with = "number::count")]
    pub matching_count: u64,
    /// Streams whose match status is not yet evaluated.
    #[serde(deserialize_with = "number::count")]
    pub uncertain_count: u64,
    /// Whether another tag's definition references this tag.
    pub referenced: bool,
    /// Names of converters attached to this tag.
    pub converters: Vec<String>,
}

impl TagInfo {
    /// Creates a tag with zero counters and no converters.
    pub fn new(
        name: impl Into<String>,
        definition: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            color: color.into(),
            matching_count: 0,
            uncertain_count: 0,
            referenced: false,
            converters: Vec::new(),
        }
    }

    /// Builder: set match counters.
    pub fn with_counts(mut self, matching: u64, uncertain: u64) -> Self {
        self.matching_count = matching;
        self.uncertain_count = uncertain;
        self
    }

    /// Builder: set referenced flag.
    pub fn with_referenced(mut self, referenced: bool) -> Self {
        self.referenced = referenced;
        self
    }

    /// Builder: attach a converter.
    pub fn with_converter(mut self, converter: impl Into<String>) -> Self {
        self.converters.push(converter.into());
        self
    }

    /// Returns true if the named converter is attached to this tag.
    pub fn uses_converter(&self, converter: &str) -> bool {
        self.converters.iter().any(|c| c == converter)
    }
}

/// Status of one converter worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessStats {
    pub running: bool,
    #[serde(deserialize_with = "number::signed")]
    pub exit_code: i64,
    #[serde(deserialize_with = "number::signed")]
    pub pid: i64,
    /// Number of errors the process reported on stderr.
    #[serde(deserialize_with = "number::count")]
    pub errors: u64,
}

/// A converter and the processes it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConverterStatus {
    /// Converter name (file name in the converter directory).
    pub name: String,
    /// Streams with cached converter output.
    #[serde(deserialize_with = "number::count")]
    pub cached_stream_count: u64,
    /// Worker processes, in server order.
    pub processes: Vec<ProcessStats>,
}

impl ConverterStatus {
    /// Creates a converter with no cached streams and no processes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cached_stream_count: 0,
            processes: Vec::new(),
        }
    }

    /// Builder: set cached stream count.
    pub fn with_cached_streams(mut self, count: u64) -> Self {
        self.cached_stream_count = count;
        self
    }

    /// Builder: add a process.
    pub fn with_process(mut self, process: ProcessStats) -> Self {
        self.processes.push(process);
        self
    }

    /// Returns the number of running processes.
    pub fn running_processes(&self) -> usize {
        self.processes.iter().filter(|p| p.running).count()
    }

    /// Returns the total error count across processes.
    pub fn total_errors(&self) -> u64 {
        self.processes.iter().map(|p| p.errors).sum()
    }
}

/// Server-wide ingestion counters.
///
/// All counters only grow over the life of a connection, except
/// `import_job_count` which drops as imports finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PcapStats {
    #[serde(deserialize_with = "number::count")]
    pub pcap_count: u64,
    #[serde(deserialize_with = "number::count")]
    pub packet_count: u64,
    #[serde(deserialize_with = "number::count")]
    pub import_job_count: u64,
    #[serde(deserialize_with = "number::count")]
    pub index_count: u64,
    #[serde(deserialize_with = "number::count")]
    pub stream_count: u64,
    #[serde(deserialize_with = "number::count")]
    pub stream_record_count: u64,
    #[serde(deserialize_with = "number::count")]
    pub packet_record_count: u64,
}

impl PcapStats {
    /// Returns the names of monotonic counters that are lower in `newer`
    /// than in `self`.
    ///
    /// `ImportJobCount` is never reported.
    pub fn regressions(&self, newer: &PcapStats) -> Vec<&'static str> {
        let pairs = [
            ("PcapCount", self.pcap_count, newer.pcap_count),
            ("PacketCount", self.packet_count, newer.packet_count),
            ("IndexCount", self.index_count, newer.index_count),
            ("StreamCount", self.stream_count, newer.stream_count),
            (
                "StreamRecordCount",
                self.stream_record_count,
                newer.stream_record_count,
            ),
            (
                "PacketRecordCount",
                self.packet_record_count,
                newer.packet_record_count,
            ),
        ];
        pairs
            .into_iter()
            .filter(|(_, old, new)| new < old)
            .map(|(name, _, _)| name)
            .collect()
    }
}

/// A pcap-over-ip endpoint the server pulls packets from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PcapOverIpEndpoint {
    /// `host:port` of the remote feed.
    pub address: String,
    /// Unix timestamp of the last successful connect, 0 if never.
    #[serde(deserialize_with = "number::signed")]
    pub last_connected: i64,
    /// Unix timestamp of the last disconnect, 0 if never.
    #[serde(deserialize_with = "number::signed")]
    pub last_disconnected: i64,
    #[serde(deserialize_with = "number::count")]
    pub received_packets: u64,
}

impl PcapOverIpEndpoint {
    /// Creates an endpoint that has never connected.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            last_connected: 0,
            last_disconnected: 0,
            received_packets: 0,
        }
    }

    /// Returns true if the last connect is more recent than the last disconnect.
    pub fn is_connected(&self) -> bool {
        self.last_connected > self.last_disconnected
    }
}
