use super::artifact::{resolve_timestamp_timezone, ArtifactIdGenerator, VideoArtifact};
use super::media::{ContainerFormat, MediaCapability, MediaSignal};
use super::segment::SegmentBuffer;
use crate::config::CaptureConfig;
use crate::detection::HitEvent;
use crate::error::CaptureError;
use crate::events::{EventBus, TrainerEvent};
use crate::storage::{enforce_retention, ArtifactStore};
use chrono::Utc;
use chrono_tz::Tz;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// Not started, or stopped
    Stopped,
    /// No usable recorder; hits are not captured
    Disabled,
    /// Waiting for training to start
    Idle,
    /// A segment is running
    Recording,
    /// Writing a hit clip
    Finalizing,
}

/// Counters for the capture worker
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub segments_started: AtomicU64,
    pub segments_failed: AtomicU64,
    pub artifacts_saved: AtomicU64,
    pub clips_dropped: AtomicU64,
    pub hits_ignored: AtomicU64,
}

impl CaptureStats {
    pub fn snapshot(&self) -> CaptureStatsSnapshot {
        CaptureStatsSnapshot {
            segments_started: self.segments_started.load(Ordering::Relaxed),
            segments_failed: self.segments_failed.load(Ordering::Relaxed),
            artifacts_saved: self.artifacts_saved.load(Ordering::Relaxed),
            clips_dropped: self.clips_dropped.load(Ordering::Relaxed),
            hits_ignored: self.hits_ignored.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStatsSnapshot {
    pub segments_started: u64,
    pub segments_failed: u64,
    pub artifacts_saved: u64,
    pub clips_dropped: u64,
    pub hits_ignored: u64,
}

/// State shared between the handle and its worker
#[derive(Debug)]
struct CaptureShared {
    should_record: AtomicBool,
    state: RwLock<CaptureState>,
    format: RwLock<Option<ContainerFormat>>,
    stats: CaptureStats,
}

impl CaptureShared {
    fn set_state(&self, state: CaptureState) {
        let mut current = self.state.write();
        if *current != state {
            trace!("Capture state {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    fn should_record(&self) -> bool {
        self.should_record.load(Ordering::SeqCst)
    }
}

/// Rolling pre-roll recorder that turns hits into stored clips
///
/// Segments run back to back between "training started" and "training
/// stopped". A hit holds the current segment open for the post-roll, then
/// the retained lead-in and the tail are written as one artifact.
pub struct RollingCapture {
    config: CaptureConfig,
    event_bus: Arc<EventBus>,
    store: Arc<dyn ArtifactStore>,
    media: Mutex<Option<Box<dyn MediaCapability>>>,
    ids: Arc<ArtifactIdGenerator>,
    shared: Arc<CaptureShared>,
    cancellation_token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RollingCapture {
    pub fn new(
        config: CaptureConfig,
        event_bus: Arc<EventBus>,
        store: Arc<dyn ArtifactStore>,
        media: Box<dyn MediaCapability>,
        ids: ArtifactIdGenerator,
    ) -> Self {
        Self {
            config,
            event_bus,
            store,
            media: Mutex::new(Some(media)),
            ids: Arc::new(ids),
            shared: Arc::new(CaptureShared {
                should_record: AtomicBool::new(false),
                state: RwLock::new(CaptureState::Stopped),
                format: RwLock::new(None),
                stats: CaptureStats::default(),
            }),
            cancellation_token: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    /// Probe the recorder and start the worker
    ///
    /// An unsupported recorder disables capture and is not an error.
    pub async fn start(&self) -> Result<(), CaptureError> {
        let media = self.media.lock().take().ok_or(CaptureError::AlreadyRunning)?;

        if !self.config.enabled {
            info!("Video capture disabled in configuration");
            self.shared.set_state(CaptureState::Disabled);
            return Ok(());
        }

        let preferred = ContainerFormat::from(self.config.preferred_format);
        let format = match media.probe(preferred).await {
            Ok(format) => format,
            Err(e) => {
                self.disable(e.to_string());
                return Ok(());
            }
        };

        info!(
            "Starting rolling capture ({} via {} recorder)",
            format,
            media.backend_name()
        );
        *self.shared.format.write() = Some(format);

        // Subscribe before returning so no session transition is missed
        let events = self.event_bus.subscribe();
        let worker = CaptureWorker {
            media,
            format,
            buffer: SegmentBuffer::new(self.config.retention()),
            store: Arc::clone(&self.store),
            event_bus: Arc::clone(&self.event_bus),
            ids: Arc::clone(&self.ids),
            shared: Arc::clone(&self.shared),
            timezone: resolve_timestamp_timezone(&self.config.timestamp_timezone),
            segment_duration: self.config.segment_duration(),
            postroll: self.config.postroll(),
            flush_timeout: self.config.flush_timeout(),
            max_artifacts: self.config.max_artifacts,
            segment: None,
            tail: None,
        };

        self.shared.set_state(CaptureState::Idle);
        let token = self.cancellation_token.clone();
        *self.worker.lock() = Some(tokio::spawn(worker.run(events, token)));

        Ok(())
    }

    /// Stop the worker, finishing any clip whose post-roll is pending
    pub async fn stop(&self) {
        info!("Stopping rolling capture");
        self.cancellation_token.cancel();

        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            match timeout(STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Capture worker panicked: {}", e),
                Err(_) => warn!("Capture worker did not stop within {:?}", STOP_TIMEOUT),
            }
        }

        if self.state() != CaptureState::Disabled {
            self.shared.set_state(CaptureState::Stopped);
        }
    }

    pub fn state(&self) -> CaptureState {
        *self.shared.state.read()
    }

    pub fn is_disabled(&self) -> bool {
        self.state() == CaptureState::Disabled
    }

    /// Negotiated container, once started
    pub fn format(&self) -> Option<ContainerFormat> {
        *self.shared.format.read()
    }

    pub fn should_record(&self) -> bool {
        self.shared.should_record()
    }

    pub fn stats(&self) -> CaptureStatsSnapshot {
        self.shared.stats.snapshot()
    }

    fn disable(&self, reason: String) {
        warn!("Rolling capture disabled: {}", reason);
        self.shared.set_state(CaptureState::Disabled);

        if let Err(e) = self
            .event_bus
            .publish(TrainerEvent::CaptureUnsupported { reason })
        {
            warn!("Failed to publish capture unsupported: {}", e);
        }
    }
}

struct ActiveSegment {
    id: u64,
    signals: mpsc::UnboundedReceiver<MediaSignal>,
    deadline: Instant,
}

struct PendingTail {
    deadline: Instant,
    hit: HitEvent,
}

/// Single owner of the recorder and the segment buffer
struct CaptureWorker {
    media: Box<dyn MediaCapability>,
    format: ContainerFormat,
    buffer: SegmentBuffer,
    store: Arc<dyn ArtifactStore>,
    event_bus: Arc<EventBus>,
    ids: Arc<ArtifactIdGenerator>,
    shared: Arc<CaptureShared>,
    timezone: Tz,
    segment_duration: Duration,
    postroll: Duration,
    flush_timeout: Duration,
    max_artifacts: usize,
    segment: Option<ActiveSegment>,
    tail: Option<PendingTail>,
}

async fn next_signal(segment: &mut Option<ActiveSegment>) -> Option<MediaSignal> {
    match segment {
        Some(segment) => segment.signals.recv().await,
        None => std::future::pending().await,
    }
}

impl CaptureWorker {
    async fn run(
        mut self,
        mut events: broadcast::Receiver<TrainerEvent>,
        token: CancellationToken,
    ) {
        debug!("Capture worker running");

        loop {
            let now = Instant::now();
            let segment_deadline = self.segment.as_ref().map(|s| s.deadline);
            let tail_deadline = self.tail.as_ref().map(|t| t.deadline);

            tokio::select! {
                _ = token.cancelled() => {
                    self.shared.should_record.store(false, Ordering::SeqCst);
                    if self.tail.is_some() {
                        info!("Finishing pending hit clip before shutdown");
                        self.finalize().await;
                    } else {
                        self.stop_segment().await;
                    }
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Capture event listener lagged by {} events; continuing", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Event bus closed; stopping capture worker");
                        self.stop_segment().await;
                        break;
                    }
                },
                signal = next_signal(&mut self.segment), if self.segment.is_some() => {
                    self.handle_signal(signal).await;
                }
                _ = sleep_until(tail_deadline.unwrap_or(now)), if tail_deadline.is_some() => {
                    self.finalize().await;
                }
                _ = sleep_until(segment_deadline.unwrap_or(now)),
                    if segment_deadline.is_some() && tail_deadline.is_none() => {
                    self.rotate().await;
                }
            }
        }

        self.shared.set_state(CaptureState::Stopped);
        debug!("Capture worker stopped");
    }

    async fn handle_event(&mut self, event: TrainerEvent) {
        match event {
            TrainerEvent::TrainingStarted { session_id } => {
                info!("Capture armed for session {}", session_id);
                self.shared.should_record.store(true, Ordering::SeqCst);
                if self.segment.is_none() && self.tail.is_none() {
                    self.start_segment().await;
                }
            }
            TrainerEvent::TrainingStopped { .. } => {
                self.shared.should_record.store(false, Ordering::SeqCst);
                if self.tail.is_some() {
                    debug!("Training stopped; letting post-roll finish");
                } else {
                    self.stop_segment().await;
                    self.buffer.clear();
                    self.shared.set_state(CaptureState::Idle);
                }
            }
            TrainerEvent::HitDetected(hit) => self.on_hit(hit).await,
            _ => {}
        }
    }

    async fn on_hit(&mut self, hit: HitEvent) {
        if self.tail.is_some() {
            debug!("Post-roll already pending; ignoring hit ({})", hit.kind);
            self.shared.stats.hits_ignored.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if !self.shared.should_record() {
            debug!("Hit ({}) outside a recording session; not captured", hit.kind);
            return;
        }

        if self.segment.is_none() {
            self.start_segment().await;
            if self.segment.is_none() {
                warn!("No recorder segment for hit; clip skipped");
                self.shared.stats.clips_dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        info!(
            "Hit ({}) captured; recording {:?} post-roll",
            hit.kind, self.postroll
        );
        self.tail = Some(PendingTail {
            deadline: Instant::now() + self.postroll,
            hit,
        });
    }

    async fn handle_signal(&mut self, signal: Option<MediaSignal>) {
        match signal {
            Some(MediaSignal::Chunk { captured_at, data }) => {
                self.buffer.push(captured_at, data);
            }
            Some(MediaSignal::Failed(reason)) => {
                if let Some(segment) = self.segment.take() {
                    self.buffer.discard_segment(segment.id);
                }
                // The recorder still holds the dead segment until told to stop
                if let Err(e) = self.media.stop_segment().await {
                    warn!("Failed to release failed segment: {}", e);
                }
                self.segment_failed(CaptureError::RecorderFailed { details: reason });

                if self.tail.take().is_some() {
                    warn!("Hit clip abandoned after recorder failure");
                    self.shared.stats.clips_dropped.fetch_add(1, Ordering::Relaxed);
                }
                self.restart_or_idle().await;
            }
            Some(MediaSignal::SegmentEnded) | None => {
                if let Some(segment) = self.segment.take() {
                    debug!("Recorder ended segment {} on its own", segment.id);
                }
                if self.tail.is_some() {
                    self.finalize().await;
                } else {
                    self.restart_or_idle().await;
                }
            }
        }
    }

    async fn start_segment(&mut self) {
        let (sender, signals) = mpsc::unbounded_channel();
        let now = Instant::now();
        let id = self.buffer.begin_segment(now);

        match self.media.start_segment(self.format, sender).await {
            Ok(()) => {
                trace!("Started segment {}", id);
                self.shared
                    .stats
                    .segments_started
                    .fetch_add(1, Ordering::Relaxed);
                self.segment = Some(ActiveSegment {
                    id,
                    signals,
                    deadline: now + self.segment_duration,
                });
                self.shared.set_state(CaptureState::Recording);
            }
            Err(e) => {
                self.segment_failed(e);
                self.shared.set_state(CaptureState::Idle);
            }
        }
    }

    /// Stop the running segment and buffer whatever the recorder flushes
    async fn stop_segment(&mut self) {
        let Some(mut segment) = self.segment.take() else {
            return;
        };

        if let Err(e) = self.media.stop_segment().await {
            warn!("Failed to stop segment {}: {}", segment.id, e);
        }

        let flush_timeout = self.flush_timeout;
        let buffer = &mut self.buffer;
        let flushed = timeout(flush_timeout, async {
            while let Some(signal) = segment.signals.recv().await {
                match signal {
                    MediaSignal::Chunk { captured_at, data } => buffer.push(captured_at, data),
                    MediaSignal::SegmentEnded => return Ok(()),
                    MediaSignal::Failed(reason) => return Err(reason),
                }
            }
            Ok(())
        })
        .await;

        match flushed {
            Ok(Ok(())) => trace!("Segment {} flushed", segment.id),
            Ok(Err(reason)) => {
                self.buffer.discard_segment(segment.id);
                self.segment_failed(CaptureError::RecorderFailed { details: reason });
            }
            Err(_) => warn!(
                "Recorder did not flush segment {} within {:?}",
                segment.id, flush_timeout
            ),
        }
    }

    async fn rotate(&mut self) {
        trace!("Rotating recorder segment");
        self.stop_segment().await;
        self.restart_or_idle().await;
    }

    async fn restart_or_idle(&mut self) {
        if self.shared.should_record() {
            self.start_segment().await;
        } else {
            self.shared.set_state(CaptureState::Idle);
        }
    }

    /// Write the lead-in plus post-roll as one artifact
    ///
    /// Runs to completion once started.
    async fn finalize(&mut self) {
        let Some(tail) = self.tail.take() else {
            return;
        };

        self.shared.set_state(CaptureState::Finalizing);
        self.stop_segment().await;

        let clip = self.buffer.take_clip();
        if clip.is_empty() {
            warn!("No footage buffered for hit ({}); nothing to save", tail.hit.kind);
            self.shared.stats.clips_dropped.fetch_add(1, Ordering::Relaxed);
        } else {
            let created_at = Utc::now();
            let artifact = VideoArtifact::from_clip(
                self.ids.next_id(created_at),
                created_at,
                self.format,
                &self.timezone,
                Some(tail.hit.kind),
                clip,
            );
            self.persist(artifact).await;
        }

        self.restart_or_idle().await;
    }

    async fn persist(&self, artifact: VideoArtifact) {
        let id = artifact.id();
        match self.store.append(artifact).await {
            Ok(metadata) => {
                self.shared
                    .stats
                    .artifacts_saved
                    .fetch_add(1, Ordering::Relaxed);

                let retention = enforce_retention(self.store.as_ref(), self.max_artifacts).await;
                if !retention.errors.is_empty() {
                    warn!(
                        "Retention finished with {} errors after saving {}",
                        retention.errors.len(),
                        id
                    );
                }

                info!("Saved hit clip {} ({} bytes)", metadata.filename, metadata.size_bytes);
                if let Err(e) = self.event_bus.publish(TrainerEvent::VideoSaved(metadata)) {
                    warn!("Failed to publish video saved: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to save hit clip {}: {}", id, e);
                self.shared.stats.clips_dropped.fetch_add(1, Ordering::Relaxed);
                self.report_error(format!("failed to save clip {}: {}", id, e));
            }
        }
    }

    fn segment_failed(&self, error: CaptureError) {
        warn!("Recorder segment failed: {}", error);
        self.shared
            .stats
            .segments_failed
            .fetch_add(1, Ordering::Relaxed);
        self.report_error(error.to_string());
    }

    fn report_error(&self, error: String) {
        if let Err(e) = self.event_bus.publish(TrainerEvent::SystemError {
            component: "rolling_capture".to_string(),
            error,
        }) {
            warn!("Failed to publish capture error: {}", e);
        }
    }
}
