//! Offline frame classification.
//!
//! Reads recorded frames (one JSON document per line), prints how each one
//! decodes and optionally replays the accepted ones into a mirror. Useful
//! for checking a capture of the channel against this client's schema.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use pcapsync_protocol::decode_frame;
use serde::Serialize;
use tracing::debug;

use crate::dispatch::FrameStats;
use crate::error::ClientResult;
use crate::state::MirroredState;

#[derive(Serialize)]
struct Replay<'a> {
    frames: FrameStats,
    state: &'a MirroredState,
}

/// Classifies frames from `file`, or stdin when `None`.
pub fn run(file: Option<&Path>, apply: bool) -> ClientResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut mirror = MirroredState::new();
    let target = apply.then_some(&mut mirror);

    let stats = match file {
        Some(path) => classify(BufReader::new(File::open(path)?), &mut out, target)?,
        None => classify(io::stdin().lock(), &mut out, target)?,
    };

    if apply {
        let replay = Replay {
            frames: stats,
            state: &mirror,
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&replay)?)?;
    } else {
        writeln!(
            out,
            "accepted {} dropped {}",
            stats.accepted,
            stats.total_dropped()
        )?;
    }
    Ok(())
}

/// Decodes every non-blank line and writes `<line>\t<result>\t<detail>`.
///
/// Accepted events are applied to `mirror` when one is given.
pub fn classify<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    mut mirror: Option<&mut MirroredState>,
) -> ClientResult<FrameStats> {
    let mut stats = FrameStats::default();

    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;

        match decode_frame(&line) {
            Ok(event) => {
                stats.record_accepted();
                writeln!(out, "{line_no}\tok\t{}", event.type_name())?;
                if let Some(state) = mirror.as_deref_mut() {
                    let region = state.apply(event);
                    debug!(line = line_no, region = %region, "applied");
                }
            }
            Err(err) => {
                stats.record_drop(err.kind());
                writeln!(out, "{line_no}\t{}\t{err}", err.kind())?;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcapsync_protocol::DecodeErrorKind;

    const CAPTURE: &str = r#"{"Type":"webhooksUpdated","Webhooks":["a","b"]}

{"Type":"futureEventKind","Foo":"bar"}
{"Type":"pcapProcessed","PcapStats":{"PcapCount":1}}
not json
{"Type":"webhooksUpdated","Webhooks":["c"]}
"#;

    #[test]
    fn classifies_each_line() {
        let mut out = Vec::new();
        let stats = classify(CAPTURE.as_bytes(), &mut out, None).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<_> = out.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "1\tok\twebhooksUpdated");
        assert!(lines[1].starts_with("3\tUnrecognizedVariant\t"));
        assert!(lines[2].starts_with("4\tInvalidPayload\t"));
        assert!(lines[3].starts_with("5\tMalformedFrame\t"));
        assert_eq!(lines[4], "6\tok\twebhooksUpdated");

        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.dropped(DecodeErrorKind::InvalidPayload), 1);
        assert_eq!(stats.total_dropped(), 3);
    }

    #[test]
    fn applies_accepted_frames() {
        let mut mirror = MirroredState::new();
        let mut out = Vec::new();
        classify(CAPTURE.as_bytes(), &mut out, Some(&mut mirror)).unwrap();
        assert_eq!(mirror.webhooks(), ["c".to_string()]);
        assert!(mirror.pcap_stats().is_none());
    }
}
