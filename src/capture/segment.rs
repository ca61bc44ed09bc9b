use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug)]
struct BufferedChunk {
    segment: u64,
    captured_at: Instant,
    data: Vec<u8>,
}

/// Statistics for the rolling segment buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentBufferStats {
    pub segments_started: u64,
    pub chunks_pushed: u64,
    pub chunks_evicted: u64,
    pub chunks_discarded: u64,
    pub bytes_evicted: u64,
}

/// Chunks from recent recorder segments, bounded by a retention window
///
/// Eviction happens only when a new segment begins, oldest chunk first, so a
/// finished clip always contains the lead-in of the segments that preceded
/// the hit.
#[derive(Debug)]
pub struct SegmentBuffer {
    chunks: VecDeque<BufferedChunk>,
    retention: Duration,
    current_segment: u64,
    bytes: usize,
    stats: SegmentBufferStats,
}

impl SegmentBuffer {
    pub fn new(retention: Duration) -> Self {
        debug!("Created segment buffer with retention {:?}", retention);
        Self {
            chunks: VecDeque::new(),
            retention,
            current_segment: 0,
            bytes: 0,
            stats: SegmentBufferStats::default(),
        }
    }

    /// Start tagging chunks with a new segment id, evicting expired chunks
    pub fn begin_segment(&mut self, now: Instant) -> u64 {
        self.current_segment += 1;
        self.stats.segments_started += 1;

        let mut evicted = 0;
        while let Some(oldest) = self.chunks.front() {
            if now.saturating_duration_since(oldest.captured_at) <= self.retention {
                break;
            }
            if let Some(chunk) = self.chunks.pop_front() {
                self.bytes -= chunk.data.len();
                self.stats.bytes_evicted += chunk.data.len() as u64;
                evicted += 1;
            }
        }

        self.stats.chunks_evicted += evicted;
        if evicted > 0 {
            trace!(
                "Segment {} evicted {} chunks older than {:?}",
                self.current_segment,
                evicted,
                self.retention
            );
        }
        self.current_segment
    }

    pub fn push(&mut self, captured_at: Instant, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }

        self.bytes += data.len();
        self.stats.chunks_pushed += 1;
        self.chunks.push_back(BufferedChunk {
            segment: self.current_segment,
            captured_at,
            data,
        });
    }

    /// Drop everything recorded by `segment`
    pub fn discard_segment(&mut self, segment: u64) -> usize {
        let before = self.chunks.len();
        let mut freed = 0;
        self.chunks.retain(|chunk| {
            if chunk.segment == segment {
                freed += chunk.data.len();
                false
            } else {
                true
            }
        });
        self.bytes -= freed;

        let discarded = before - self.chunks.len();
        self.stats.chunks_discarded += discarded as u64;
        discarded
    }

    /// Concatenate every retained chunk, oldest first, and empty the buffer
    pub fn take_clip(&mut self) -> Vec<u8> {
        let mut clip = Vec::with_capacity(self.bytes);
        for chunk in self.chunks.drain(..) {
            clip.extend_from_slice(&chunk.data);
        }
        self.bytes = 0;
        clip
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn current_segment(&self) -> u64 {
        self.current_segment
    }

    /// Capture time of the oldest retained chunk
    pub fn oldest(&self) -> Option<Instant> {
        self.chunks.front().map(|chunk| chunk.captured_at)
    }

    pub fn stats(&self) -> SegmentBufferStats {
        self.stats.clone()
    }
}
