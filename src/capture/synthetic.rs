use super::media::{ContainerFormat, MediaCapability, MediaSignal};
use crate::error::CaptureError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct SyntheticMediaOptions {
    /// Containers the fake recorder claims to support
    pub formats: Vec<ContainerFormat>,
    pub chunk_interval: Duration,
    pub chunk_size: usize,
}

impl Default for SyntheticMediaOptions {
    fn default() -> Self {
        Self {
            formats: vec![ContainerFormat::WebM, ContainerFormat::Mp4],
            chunk_interval: Duration::from_millis(250),
            chunk_size: 4096,
        }
    }
}

/// Injects recorder failures into a running [`SyntheticMedia`]
#[derive(Debug, Clone, Default)]
pub struct SyntheticControl {
    failing_segments: Arc<AtomicU32>,
    fail_after_chunks: Arc<AtomicU32>,
}

impl SyntheticControl {
    /// Make the next `segments` segments fail after `after_chunks` chunks
    pub fn fail_next_segments(&self, segments: u32, after_chunks: u32) {
        self.fail_after_chunks.store(after_chunks, Ordering::SeqCst);
        self.failing_segments.store(segments, Ordering::SeqCst);
    }

    fn take_failure(&self) -> Option<u32> {
        self.failing_segments
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| self.fail_after_chunks.load(Ordering::SeqCst))
    }
}

struct RunningSegment {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Recorder that emits placeholder chunks at a fixed cadence
pub struct SyntheticMedia {
    options: SyntheticMediaOptions,
    control: SyntheticControl,
    running: Option<RunningSegment>,
}

impl SyntheticMedia {
    pub fn new(options: SyntheticMediaOptions) -> Self {
        Self {
            options,
            control: SyntheticControl::default(),
            running: None,
        }
    }

    /// A recorder that supports no container at all
    pub fn unsupported() -> Self {
        Self::new(SyntheticMediaOptions {
            formats: Vec::new(),
            ..SyntheticMediaOptions::default()
        })
    }

    pub fn control(&self) -> SyntheticControl {
        self.control.clone()
    }
}

impl Default for SyntheticMedia {
    fn default() -> Self {
        Self::new(SyntheticMediaOptions::default())
    }
}

impl Drop for SyntheticMedia {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.token.cancel();
        }
    }
}

#[async_trait]
impl MediaCapability for SyntheticMedia {
    async fn supports(&self, format: ContainerFormat) -> bool {
        self.options.formats.contains(&format)
    }

    async fn start_segment(
        &mut self,
        format: ContainerFormat,
        sink: mpsc::UnboundedSender<MediaSignal>,
    ) -> Result<(), CaptureError> {
        if !self.options.formats.contains(&format) {
            return Err(CaptureError::SegmentStart {
                details: format!("{} not supported", format),
            });
        }

        if let Some(running) = &self.running {
            if !running.join.is_finished() {
                return Err(CaptureError::SegmentStart {
                    details: "a segment is already running".to_string(),
                });
            }
            trace!("Reaping finished synthetic segment");
            self.running = None;
        }

        let fail_after = self.control.take_failure();
        let interval = self.options.chunk_interval;
        let chunk_size = self.options.chunk_size;
        let token = CancellationToken::new();
        let task_token = token.clone();

        let join = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            let mut sent: u32 = 0;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        let _ = sink.send(MediaSignal::SegmentEnded);
                        break;
                    }
                    _ = ticker.tick() => {
                        if fail_after.is_some_and(|limit| sent >= limit) {
                            debug!("Synthetic recorder failing after {} chunks", sent);
                            let _ = sink.send(MediaSignal::Failed(
                                "synthetic recorder failure".to_string(),
                            ));
                            break;
                        }

                        let chunk = MediaSignal::Chunk {
                            captured_at: Instant::now(),
                            data: vec![(sent % 251) as u8; chunk_size],
                        };
                        if sink.send(chunk).is_err() {
                            trace!("Synthetic recorder sink closed");
                            break;
                        }
                        sent += 1;
                    }
                }
            }
        });

        self.running = Some(RunningSegment { token, join });
        Ok(())
    }

    async fn stop_segment(&mut self) -> Result<(), CaptureError> {
        if let Some(running) = self.running.take() {
            running.token.cancel();
            running
                .join
                .await
                .map_err(|e| CaptureError::SegmentStop {
                    details: e.to_string(),
                })?;
        }
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_chunks_then_segment_end() {
        let mut media = SyntheticMedia::new(SyntheticMediaOptions {
            chunk_interval: Duration::from_millis(100),
            chunk_size: 4,
            ..SyntheticMediaOptions::default()
        });
        let (tx, mut rx) = mpsc::unbounded_channel();

        media.start_segment(ContainerFormat::WebM, tx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;
        media.stop_segment().await.unwrap();

        let mut chunks = 0;
        let mut ended = false;
        while let Ok(signal) = rx.try_recv() {
            match signal {
                MediaSignal::Chunk { data, .. } => {
                    assert_eq!(data.len(), 4);
                    chunks += 1;
                }
                MediaSignal::SegmentEnded => ended = true,
                MediaSignal::Failed(reason) => panic!("unexpected failure: {}", reason),
            }
        }
        assert_eq!(chunks, 3);
        assert!(ended);
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_failure() {
        let mut media = SyntheticMedia::new(SyntheticMediaOptions {
            chunk_interval: Duration::from_millis(100),
            ..SyntheticMediaOptions::default()
        });
        media.control().fail_next_segments(1, 2);
        let (tx, mut rx) = mpsc::unbounded_channel();

        media.start_segment(ContainerFormat::Mp4, tx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let mut signals = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            signals.push(signal);
        }
        assert_eq!(signals.len(), 3);
        assert!(matches!(signals[2], MediaSignal::Failed(_)));

        // Only the requested number of segments fail
        media.stop_segment().await.unwrap();
        assert_eq!(media.control().take_failure(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_segment_does_not_block_next_start() {
        let mut media = SyntheticMedia::new(SyntheticMediaOptions {
            chunk_interval: Duration::from_millis(100),
            ..SyntheticMediaOptions::default()
        });
        media.control().fail_next_segments(1, 0);
        let (tx, mut rx) = mpsc::unbounded_channel();

        media.start_segment(ContainerFormat::WebM, tx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(matches!(rx.try_recv(), Ok(MediaSignal::Failed(_))));

        // The failed segment was never stopped explicitly
        let (tx, mut rx) = mpsc::unbounded_channel();
        media.start_segment(ContainerFormat::WebM, tx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(matches!(rx.try_recv(), Ok(MediaSignal::Chunk { .. })));

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            media.start_segment(ContainerFormat::WebM, tx).await,
            Err(CaptureError::SegmentStart { .. })
        ));
        media.stop_segment().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_probe() {
        let media = SyntheticMedia::unsupported();
        assert!(media.probe(ContainerFormat::WebM).await.is_err());

        let mp4_only = SyntheticMedia::new(SyntheticMediaOptions {
            formats: vec![ContainerFormat::Mp4],
            ..SyntheticMediaOptions::default()
        });
        assert_eq!(
            mp4_only.probe(ContainerFormat::WebM).await.unwrap(),
            ContainerFormat::Mp4
        );
    }
}
