use crate::core::MAX_MEDIA_DURATION;
use mp4::{Mp4Reader, TrackType};
use std::io::{BufReader, Cursor};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("MP4 parse error: {0}")]
    Mp4(#[from] mp4::Error),

    #[error("No video track found")]
    NoVideoTrack,

    #[error("Video reports no usable duration")]
    NoDuration,

    #[error("Video too long: {0}s")]
    TooLong(f64),
}

/// Accept a probed length only if playback can schedule it
fn checked_length(secs: f64) -> Result<f64, ProbeError> {
    if !secs.is_finite() || secs <= 0.0 {
        Err(ProbeError::NoDuration)
    } else if secs > MAX_MEDIA_DURATION {
        Err(ProbeError::TooLong(secs))
    } else {
        Ok(secs)
    }
}

/// Reads the intrinsic length of video content at insertion time
pub trait MediaProbe: Send + Sync {
    /// Length of the video in seconds (always > 0 on success)
    fn video_duration(&self, data: &[u8]) -> Result<f64, ProbeError>;
}

/// Probe for MP4/MOV containers
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp4Probe;

impl MediaProbe for Mp4Probe {
    fn video_duration(&self, data: &[u8]) -> Result<f64, ProbeError> {
        let size = data.len() as u64;
        let reader = BufReader::new(Cursor::new(data));
        let mp4 = Mp4Reader::read_header(reader, size)?;

        let has_video = mp4
            .tracks()
            .values()
            .any(|t| matches!(t.track_type(), Ok(TrackType::Video)));
        if !has_video {
            return Err(ProbeError::NoVideoTrack);
        }

        let secs = mp4.duration().as_secs_f64();
        debug!("Probed MP4: {:.3}s, {} tracks", secs, mp4.tracks().len());
        checked_length(secs)
    }
}

/// Probe that reports a fixed length, for content whose length is known upfront
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub f64);

impl MediaProbe for FixedProbe {
    fn video_duration(&self, _data: &[u8]) -> Result<f64, ProbeError> {
        checked_length(self.0)
    }
}
