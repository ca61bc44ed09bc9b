use crate::error::PoseSourceError;
use crate::pose::{PoseSample, PoseSource};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    offset_ms: u64,
    #[serde(default)]
    poses: Vec<PoseSample>,
}

/// Replays recorded pose estimates from JSON lines
///
/// Each line is `{"offset_ms": <u64>, "poses": [...]}`, with offsets measured
/// from the first call to [`PoseSource::next_poses`]. Blank lines and lines
/// starting with `#` are skipped. A malformed line yields an error once and
/// the replay continues with the next line.
pub struct ReplayPoseSource<R = BufReader<File>> {
    name: String,
    lines: Lines<R>,
    line_number: usize,
    started: Option<Instant>,
    records: u64,
}

impl ReplayPoseSource {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, PoseSourceError> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        info!("Replaying poses from {}", path.display());
        Ok(Self::from_reader(
            format!("replay:{}", path.display()),
            BufReader::new(file),
        ))
    }
}

impl<R: AsyncBufRead + Unpin + Send> ReplayPoseSource<R> {
    pub fn from_reader(name: String, reader: R) -> Self {
        Self {
            name,
            lines: reader.lines(),
            line_number: 0,
            started: None,
            records: 0,
        }
    }

    /// Records replayed so far
    pub fn records(&self) -> u64 {
        self.records
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> PoseSource for ReplayPoseSource<R> {
    async fn next_poses(&mut self) -> Result<Option<Vec<PoseSample>>, PoseSourceError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                debug!("{} exhausted after {} records", self.name, self.records);
                return Ok(None);
            };
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let record: ReplayRecord =
                serde_json::from_str(trimmed).map_err(|e| PoseSourceError::Parse {
                    line: self.line_number,
                    details: e.to_string(),
                })?;

            let started = *self.started.get_or_insert_with(Instant::now);
            sleep_until(started + Duration::from_millis(record.offset_ms)).await;

            self.records += 1;
            return Ok(Some(record.poses));
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_json(score: f32) -> String {
        serde_json::to_string(&PoseSample::uniform(score, 0.9)).unwrap()
    }

    fn source_from(text: String) -> ReplayPoseSource<BufReader<std::io::Cursor<Vec<u8>>>> {
        ReplayPoseSource::from_reader(
            "test".to_string(),
            BufReader::new(std::io::Cursor::new(text.into_bytes())),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_follows_offsets() {
        let text = format!(
            "# recorded session\n{{\"offset_ms\":0,\"poses\":[{}]}}\n\n{{\"offset_ms\":500,\"poses\":[]}}\n",
            sample_json(0.8)
        );
        let mut source = source_from(text);
        let start = Instant::now();

        let first = source.next_poses().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].score, 0.8);

        let second = source.next_poses().await.unwrap().unwrap();
        assert!(second.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(500));

        assert!(source.next_poses().await.unwrap().is_none());
        assert_eq!(source.records(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_line_reports_and_continues() {
        let text = "{\"offset_ms\": 0}\nnot json\n{\"offset_ms\": 10, \"poses\": []}\n".to_string();
        let mut source = source_from(text);

        assert!(source.next_poses().await.unwrap().unwrap().is_empty());
        match source.next_poses().await {
            Err(PoseSourceError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other.map(|p| p.map(|v| v.len()))),
        }
        assert!(source.next_poses().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_open_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"offset_ms\":0,\"poses\":[{}]}}", sample_json(0.5)).unwrap();

        let mut source = ReplayPoseSource::open(file.path()).await.unwrap();
        assert!(source.source_name().starts_with("replay:"));
        assert_eq!(source.next_poses().await.unwrap().unwrap().len(), 1);
    }
}
