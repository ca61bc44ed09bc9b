use crate::config::PreferredFormat;
use crate::error::CaptureError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Container a recorder can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    WebM,
    Mp4,
}

impl ContainerFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ContainerFormat::WebM => "video/webm",
            ContainerFormat::Mp4 => "video/mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ContainerFormat::WebM => "webm",
            ContainerFormat::Mp4 => "mp4",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "webm" => Some(ContainerFormat::WebM),
            "mp4" => Some(ContainerFormat::Mp4),
            _ => None,
        }
    }

    /// Formats to try, `preferred` first
    pub fn negotiation_order(preferred: ContainerFormat) -> [ContainerFormat; 2] {
        match preferred {
            ContainerFormat::WebM => [ContainerFormat::WebM, ContainerFormat::Mp4],
            ContainerFormat::Mp4 => [ContainerFormat::Mp4, ContainerFormat::WebM],
        }
    }
}

impl From<PreferredFormat> for ContainerFormat {
    fn from(format: PreferredFormat) -> Self {
        match format {
            PreferredFormat::Webm => ContainerFormat::WebM,
            PreferredFormat::Mp4 => ContainerFormat::Mp4,
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime_type())
    }
}

/// Output of a running recorder segment
#[derive(Debug, Clone)]
pub enum MediaSignal {
    /// Encoded data produced by the recorder
    Chunk { captured_at: Instant, data: Vec<u8> },
    /// The segment stopped and every chunk has been delivered
    SegmentEnded,
    /// The recorder failed; the segment is lost
    Failed(String),
}

/// A live recording handle driven by the rolling capture worker
///
/// Only one segment runs at a time. Chunks for a segment are sent on the
/// sender passed to [`MediaCapability::start_segment`], followed by
/// [`MediaSignal::SegmentEnded`] once a stop has been flushed.
#[async_trait]
pub trait MediaCapability: Send + Sync {
    /// Check which container the recorder can produce
    async fn supports(&self, format: ContainerFormat) -> bool;

    async fn start_segment(
        &mut self,
        format: ContainerFormat,
        sink: mpsc::UnboundedSender<MediaSignal>,
    ) -> Result<(), CaptureError>;

    async fn stop_segment(&mut self) -> Result<(), CaptureError>;

    fn backend_name(&self) -> &str;

    /// Negotiate a container, preferring `preferred`
    async fn probe(&self, preferred: ContainerFormat) -> Result<ContainerFormat, CaptureError> {
        for format in ContainerFormat::negotiation_order(preferred) {
            if self.supports(format).await {
                return Ok(format);
            }
        }

        Err(CaptureError::Unsupported {
            reason: format!("{} supports neither webm nor mp4", self.backend_name()),
        })
    }
}

/// Recorder for hosts without any capture device
#[derive(Debug, Default)]
pub struct NoMedia;

#[async_trait]
impl MediaCapability for NoMedia {
    async fn supports(&self, _format: ContainerFormat) -> bool {
        false
    }

    async fn start_segment(
        &mut self,
        _format: ContainerFormat,
        _sink: mpsc::UnboundedSender<MediaSignal>,
    ) -> Result<(), CaptureError> {
        Err(CaptureError::Unsupported {
            reason: "no recording backend configured".to_string(),
        })
    }

    async fn stop_segment(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation_order_prefers_requested_format() {
        assert_eq!(
            ContainerFormat::negotiation_order(ContainerFormat::Mp4),
            [ContainerFormat::Mp4, ContainerFormat::WebM]
        );
        assert_eq!(ContainerFormat::from(PreferredFormat::Webm), ContainerFormat::WebM);
    }

    #[tokio::test]
    async fn test_no_media_probe_is_unsupported() {
        let media = NoMedia;
        let result = media.probe(ContainerFormat::WebM).await;
        assert!(matches!(result, Err(CaptureError::Unsupported { .. })));
    }

    #[test]
    fn test_extension_round_trip() {
        for format in [ContainerFormat::WebM, ContainerFormat::Mp4] {
            assert_eq!(ContainerFormat::from_extension(format.extension()), Some(format));
        }
        assert_eq!(ContainerFormat::from_extension("avi"), None);
    }
}
