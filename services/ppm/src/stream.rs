use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::handler::BsmHandler;
use crate::status::ResultStatus;

/// Per-status counts for one run over a message stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub processed: u64,
    pub retained: u64,
    pub suppressed: u64,
    pub speed: u64,
    pub geoposition: u64,
    pub parse: u64,
    pub missing: u64,
    pub other: u64,
    pub bytes_out: u64,
}

impl StreamSummary {
    pub fn record(&mut self, status: ResultStatus) {
        self.processed += 1;
        match status {
            ResultStatus::Success => {
                self.retained += 1;
                return;
            }
            ResultStatus::Speed => self.speed += 1,
            ResultStatus::Geoposition => self.geoposition += 1,
            ResultStatus::Parse => self.parse += 1,
            ResultStatus::Missing => self.missing += 1,
            ResultStatus::Other => self.other += 1,
        }
        self.suppressed += 1;
    }

    pub fn count(&self, status: ResultStatus) -> u64 {
        match status {
            ResultStatus::Success => self.retained,
            ResultStatus::Speed => self.speed,
            ResultStatus::Geoposition => self.geoposition,
            ResultStatus::Parse => self.parse,
            ResultStatus::Missing => self.missing,
            ResultStatus::Other => self.other,
        }
    }
}

/// Feeds a line-oriented message stream through one handler. Retained
/// messages are written one per line; suppressed ones are only counted.
pub struct StreamRunner {
    handler: BsmHandler,
}

impl StreamRunner {
    pub fn new(handler: BsmHandler) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &BsmHandler {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut BsmHandler {
        &mut self.handler
    }

    /// Lines that are not valid UTF-8 count as parse failures; the stream
    /// continues past them.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
    ) -> Result<StreamSummary> {
        let mut summary = StreamSummary::default();
        let mut buf = Vec::new();
        let mut index = 0usize;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .context("failed to read message stream")?;
            if read == 0 {
                break;
            }
            index += 1;

            let Ok(line) = std::str::from_utf8(&buf) else {
                summary.record(ResultStatus::Parse);
                warn!(line = index, "message is not valid UTF-8");
                continue;
            };
            let line = line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }

            self.handler.process(line);
            if self.handler.result().is_success() {
                // serialization can still downgrade the status
                let json = self.handler.json();
                if !json.is_empty() {
                    writer
                        .write_all(json.as_bytes())
                        .and_then(|_| writer.write_all(b"\n"))
                        .context("failed to write retained message")?;
                    summary.bytes_out += json.len() as u64 + 1;
                }
            }

            let status = self.handler.result();
            summary.record(status);
            if status.is_success() {
                continue;
            } else if status.is_policy_rejection() {
                debug!(line = index, status = %status, "message suppressed");
            } else {
                warn!(line = index, status = %status, "malformed message suppressed");
            }
        }

        writer.flush().context("failed to flush output")?;
        info!(
            processed = summary.processed,
            retained = summary.retained,
            suppressed = summary.suppressed,
            "message stream finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use cvdp_geofence::{GeofenceIndex, Point};

    use crate::config::PpmConfig;
    use crate::features::FeatureSet;

    #[test]
    fn test_summary_counts() {
        let mut summary = StreamSummary::default();
        for status in [
            ResultStatus::Success,
            ResultStatus::Speed,
            ResultStatus::Speed,
            ResultStatus::Parse,
        ] {
            summary.record(status);
        }

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.retained, 1);
        assert_eq!(summary.suppressed, 3);
        assert_eq!(summary.count(ResultStatus::Speed), 2);
        assert_eq!(summary.count(ResultStatus::Missing), 0);
    }

    struct Everywhere;

    impl GeofenceIndex for Everywhere {
        fn is_within(&self, _point: Point) -> bool {
            true
        }
    }

    fn runner() -> StreamRunner {
        let mut config = PpmConfig::default();
        config.features = FeatureSet::empty();
        StreamRunner::new(BsmHandler::new(Arc::new(Everywhere), &config))
    }

    #[test]
    fn test_invalid_utf8_line_does_not_stop_the_stream() {
        let mut input = b"{\"id\":\"one\"}\n".to_vec();
        input.extend_from_slice(b"{\"id\":\"\xff\"}\n");
        input.extend_from_slice(b"{\"id\":\"three\"}\r\n");

        let mut output = Vec::new();
        let summary = runner().run(Cursor::new(input), &mut output).unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.retained, 2);
        assert_eq!(summary.count(ResultStatus::Parse), 1);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "{\"id\":\"one\"}\n{\"id\":\"three\"}\n"
        );
    }

    #[test]
    fn test_last_line_without_newline_is_processed() {
        let mut output = Vec::new();
        let summary = runner()
            .run(Cursor::new("\n\n{\"id\":\"x\"}"), &mut output)
            .unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.bytes_out, output.len() as u64);
    }
}
