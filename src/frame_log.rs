// src/frame_log.rs
//
// Detection-frame input. The on-device model wrapper writes one JSON
// object per line; this module discovers those logs and streams them
// frame by frame. A malformed line is skipped with a warning, never a
// reason to abort the run.

use crate::types::{DetectionFrame, InputConfig};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub struct FrameLogSource {
    config: InputConfig,
}

impl FrameLogSource {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    pub fn find_log_files(&self) -> Result<Vec<PathBuf>> {
        let mut logs = Vec::new();
        let log_extensions = ["jsonl", "ndjson", "JSONL", "NDJSON"];

        for entry in WalkDir::new(&self.config.log_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if let Some(ext) = path.extension() {
                if log_extensions.contains(&ext.to_str().unwrap_or("")) {
                    logs.push(path.to_path_buf());
                }
            }
        }

        logs.sort();
        info!("Found {} detection log(s)", logs.len());
        Ok(logs)
    }

    pub fn open(&self, path: &Path) -> Result<FrameLogReader<BufReader<File>>> {
        info!("Opening detection log: {}", path.display());
        let file = File::open(path)
            .with_context(|| format!("Failed to open detection log {}", path.display()))?;
        Ok(FrameLogReader::new(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

pub struct FrameLogReader<R: BufRead> {
    reader: R,
    source: String,
    line_no: u64,
}

impl<R: BufRead> FrameLogReader<R> {
    pub fn new(reader: R, source: String) -> Self {
        Self {
            reader,
            source,
            line_no: 0,
        }
    }

    /// Next well-formed frame, or None at end of stream. Blank and
    /// unparsable lines are skipped.
    pub fn next_frame(&mut self) -> Result<Option<DetectionFrame>> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("I/O error reading {}", self.source))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<DetectionFrame>(trimmed) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    warn!(
                        "Skipping malformed frame at {}:{}: {}",
                        self.source, self.line_no, e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(contents: &str) -> FrameLogReader<Cursor<Vec<u8>>> {
        FrameLogReader::new(Cursor::new(contents.as_bytes().to_vec()), "test".to_string())
    }

    #[test]
    fn test_reads_frames_in_order() {
        let mut log = reader(concat!(
            r#"{"timestamp_ms": 1000, "detections": [{"category": "car", "box": {"left": 0, "top": 0, "right": 10, "bottom": 10}, "score": 0.9}]}"#,
            "\n",
            r#"{"timestamp_ms": 1033, "detections": []}"#,
            "\n",
        ));

        let first = log.next_frame().unwrap().unwrap();
        assert_eq!(first.timestamp_ms, 1000);
        assert_eq!(first.detections.len(), 1);
        assert_eq!(first.detections[0].category, "car");
        assert_eq!(first.detections[0].bbox.height(), 10.0);

        let second = log.next_frame().unwrap().unwrap();
        assert_eq!(second.timestamp_ms, 1033);
        assert!(second.detections.is_empty());

        assert!(log.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let mut log = reader(concat!(
            "this is not json\n",
            r#"{"timestamp_ms": "nope"}"#,
            "\n",
            "\n",
            r#"{"timestamp_ms": 2000, "detections": []}"#,
            "\n",
        ));

        let frame = log.next_frame().unwrap().unwrap();
        assert_eq!(frame.timestamp_ms, 2000);
        assert!(log.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        let mut log = reader("");
        assert!(log.next_frame().unwrap().is_none());
    }
}
