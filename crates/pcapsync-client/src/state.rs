//! Client-side mirror of server state.
//!
//! The mirror is seeded from a [`Snapshot`] on every (re)connect, kept
//! current by applying events, and cleared on disconnect. The protocol has
//! no sequence numbers, so a reconnect always means a fresh snapshot rather
//! than replaying what was missed.

use pcapsync_core::{Config, ConverterStatus, PcapOverIpEndpoint, PcapStats, TagInfo};
use pcapsync_protocol::{Event, EventFamily};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Full server state fetched out of band when a connection is established.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tags: Vec<TagInfo>,
    pub converters: Vec<ConverterStatus>,
    pub pcap_stats: Option<PcapStats>,
    pub config: Option<Config>,
    pub webhooks: Vec<String>,
    pub pcap_over_ip_endpoints: Vec<PcapOverIpEndpoint>,
}

/// Mirrored server state.
///
/// Tags and converters keep server insertion order and are unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirroredState {
    tags: Vec<TagInfo>,
    converters: Vec<ConverterStatus>,
    pcap_stats: Option<PcapStats>,
    config: Option<Config>,
    webhooks: Vec<String>,
    pcap_over_ip_endpoints: Vec<PcapOverIpEndpoint>,
    connected: bool,
}

impl MirroredState {
    /// Creates an empty, disconnected mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every region with the snapshot and marks the mirror connected.
    pub fn bootstrap(&mut self, snapshot: Snapshot) {
        self.reset();
        for tag in snapshot.tags {
            self.upsert_tag(tag);
        }
        for converter in snapshot.converters {
            self.upsert_converter(converter);
        }
        self.pcap_stats = snapshot.pcap_stats;
        self.config = snapshot.config;
        self.webhooks = snapshot.webhooks;
        self.pcap_over_ip_endpoints = snapshot.pcap_over_ip_endpoints;
        self.connected = true;
    }

    /// Clears every region and marks the mirror disconnected.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Applies one validated event and returns the region it touched.
    ///
    /// Adds and updates are upserts, deletes of unknown keys are no-ops,
    /// and collection events replace the whole collection.
    pub fn apply(&mut self, event: Event) -> EventFamily {
        let region = event.family();
        match event {
            Event::TagAdded { tag }
            | Event::TagUpdated { tag }
            | Event::TagEvaluated { tag } => self.upsert_tag(tag),
            Event::TagDeleted { tag } => self.remove_tag(&tag.name),
            Event::ConverterAdded { converter }
            | Event::ConverterCompleted { converter }
            | Event::ConverterRestarted { converter } => self.upsert_converter(converter),
            Event::ConverterDeleted { converter } => self.remove_converter(&converter.name),
            Event::IndexesMerged { stats } | Event::PcapProcessed { stats } => {
                self.replace_pcap_stats(stats)
            }
            Event::ConfigUpdated { config } => self.config = Some(config),
            Event::WebhooksUpdated { webhooks } => self.webhooks = webhooks,
            Event::PcapOverIpEndpointsUpdated { endpoints } => {
                self.pcap_over_ip_endpoints = endpoints
            }
        }
        region
    }

    fn upsert_tag(&mut self, tag: TagInfo) {
        match self.tags.iter_mut().find(|t| t.name == tag.name) {
            Some(existing) => *existing = tag,
            None => self.tags.push(tag),
        }
    }

    fn remove_tag(&mut self, name: &str) {
        self.tags.retain(|t| t.name != name);
    }

    fn upsert_converter(&mut self, converter: ConverterStatus) {
        match self.converters.iter_mut().find(|c| c.name == converter.name) {
            Some(existing) => *existing = converter,
            None => self.converters.push(converter),
        }
    }

    fn remove_converter(&mut self, name: &str) {
        self.converters.retain(|c| c.name != name);
    }

    fn replace_pcap_stats(&mut self, stats: PcapStats) {
        if let Some(previous) = &self.pcap_stats {
            let regressed = previous.regressions(&stats);
            if !regressed.is_empty() {
                warn!(counters = ?regressed, "pcap stats counters decreased");
            }
        }
        self.pcap_stats = Some(stats);
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn tags(&self) -> &[TagInfo] {
        &self.tags
    }

    pub fn converters(&self) -> &[ConverterStatus] {
        &self.converters
    }

    pub fn pcap_stats(&self) -> Option<&PcapStats> {
        self.pcap_stats.as_ref()
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn webhooks(&self) -> &[String] {
        &self.webhooks
    }

    pub fn pcap_over_ip_endpoints(&self) -> &[PcapOverIpEndpoint] {
        &self.pcap_over_ip_endpoints
    }

    /// Looks up a tag by name.
    pub fn tag(&self, name: &str) -> Option<&TagInfo> {
        self.tags.iter().find(|t| t.name == name)
    }

    /// Looks up a converter by name.
    pub fn converter(&self, name: &str) -> Option<&ConverterStatus> {
        self.converters.iter().find(|c| c.name == name)
    }

    /// Returns the tags that have the named converter attached.
    pub fn tags_using_converter<'a>(
        &'a self,
        converter: &'a str,
    ) -> impl Iterator<Item = &'a TagInfo> + 'a {
        self.tags.iter().filter(move |t| t.uses_converter(converter))
    }

    /// Returns the number of running converter processes.
    pub fn running_process_count(&self) -> usize {
        self.converters
            .iter()
            .map(ConverterStatus::running_processes)
            .sum()
    }
}
