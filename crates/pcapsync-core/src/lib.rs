//! Core types: tags, converters, pcap stats, server config, tracing

pub mod config;
pub mod model;
mod number;
pub mod tracing;

pub use config::{Config, is_config};
pub use model::{ConverterStatus, PcapOverIpEndpoint, PcapStats, ProcessStats, TagInfo};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
