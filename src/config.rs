//! Muxer configuration.
//!
//! All knobs of the pipeline travel in a single [`MuxerConfig`] value that
//! is handed to the writer at construction time; there is no process-wide
//! configuration state. [`MuxerConfig::from_env`] builds one from the
//! `TSMUX_H264_FILE` / `TSMUX_ADTS_FILE` environment variables, which is
//! how the binary is driven.

use crate::error::{Result, TsMuxError};
use std::env;
use std::path::PathBuf;

/// Environment variable naming the H.264 Annex-B input file
pub const ENV_H264_FILE: &str = "TSMUX_H264_FILE";
/// Environment variable naming the AAC ADTS input file
pub const ENV_ADTS_FILE: &str = "TSMUX_ADTS_FILE";

const DEFAULT_SEGMENT_DURATION_MS: u64 = 4000;
const DEFAULT_VIDEO_FPS: u32 = 25;
const DEFAULT_GOP_FRAMES: u32 = 25;
const DEFAULT_BUFFER_CAPACITY: usize = 32 * 1024 * 1024;
const DEFAULT_PSI_INTERVAL: i64 = 40;
const DEFAULT_SEGMENT_PREFIX: &str = "mux";
const DEFAULT_PLAYLIST_NAME: &str = "playlist.m3u8";

/// Configuration for one mux run.
#[derive(Debug, Clone)]
pub struct MuxerConfig {
    /// Path to the H.264 Annex-B byte stream
    pub video_path: PathBuf,
    /// Path to the ADTS-framed AAC stream. The recorder feeding this
    /// muxer writes 48 kHz audio with 1024 samples per raw data block;
    /// neither constant is re-derived here, the muxer trusts the ADTS
    /// headers.
    pub audio_path: PathBuf,
    /// Directory receiving segments and the playlist
    pub output_dir: PathBuf,
    /// Segment filename prefix (`<prefix>-<n>.ts`)
    pub segment_prefix: String,
    /// Playlist filename
    pub playlist_name: String,
    /// Target segment duration in milliseconds
    pub segment_duration_ms: u64,
    /// Video frame rate the input was encoded at
    pub fps: u32,
    /// GOP length the video input is assumed to carry (SPS/PPS/IDR every
    /// `gop_frames` frames); segment rotation itself keys off SPS boundaries
    pub gop_frames: u32,
    /// Refill buffer capacity per stream
    pub buffer_capacity: usize,
    /// PAT/PMT repetition interval in packets
    pub psi_interval: i64,
}

impl MuxerConfig {
    /// Creates a configuration with default output settings for the given
    /// input files.
    pub fn new(video_path: impl Into<PathBuf>, audio_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            audio_path: audio_path.into(),
            output_dir: PathBuf::from("."),
            segment_prefix: DEFAULT_SEGMENT_PREFIX.to_string(),
            playlist_name: DEFAULT_PLAYLIST_NAME.to_string(),
            segment_duration_ms: DEFAULT_SEGMENT_DURATION_MS,
            fps: DEFAULT_VIDEO_FPS,
            gop_frames: DEFAULT_GOP_FRAMES,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            psi_interval: DEFAULT_PSI_INTERVAL,
        }
    }

    /// Builds a configuration from `TSMUX_H264_FILE` and `TSMUX_ADTS_FILE`.
    pub fn from_env() -> Result<Self> {
        let video = env::var(ENV_H264_FILE)
            .map_err(|_| TsMuxError::Config(format!("{} is not set", ENV_H264_FILE)))?;
        let audio = env::var(ENV_ADTS_FILE)
            .map_err(|_| TsMuxError::Config(format!("{} is not set", ENV_ADTS_FILE)))?;
        Ok(Self::new(video, audio))
    }

    /// Sets the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the target segment duration.
    pub fn with_segment_duration_ms(mut self, ms: u64) -> Self {
        self.segment_duration_ms = ms;
        self
    }

    /// Sets the video frame rate.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// 90 kHz ticks per video frame (3600 at 25 fps).
    pub fn video_frame_clock(&self) -> u64 {
        90_000 / self.fps as u64
    }

    /// Video frames per segment before rotation is armed (100 at 4 s / 25 fps).
    pub fn target_segment_frames(&self) -> u32 {
        (self.segment_duration_ms * self.fps as u64 / 1000) as u32
    }

    /// Segment duration in whole seconds, for `#EXT-X-TARGETDURATION`.
    pub fn target_duration_secs(&self) -> u64 {
        self.segment_duration_ms / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MuxerConfig::new("in.h264", "in.aac");
        assert_eq!(config.segment_duration_ms, 4000);
        assert_eq!(config.fps, 25);
        assert_eq!(config.buffer_capacity, 32 * 1024 * 1024);
        assert_eq!(config.psi_interval, 40);
        assert_eq!(config.segment_prefix, "mux");
        assert_eq!(config.playlist_name, "playlist.m3u8");
    }

    #[test]
    fn test_derived_clocks() {
        let config = MuxerConfig::new("in.h264", "in.aac");
        assert_eq!(config.video_frame_clock(), 3600);
        assert_eq!(config.target_segment_frames(), 100);
        assert_eq!(config.target_duration_secs(), 4);

        let config = config.with_fps(30).with_segment_duration_ms(6000);
        assert_eq!(config.video_frame_clock(), 3000);
        assert_eq!(config.target_segment_frames(), 180);
    }

    #[test]
    fn test_from_env_requires_both_inputs() {
        std::env::remove_var(ENV_H264_FILE);
        std::env::remove_var(ENV_ADTS_FILE);
        assert!(MuxerConfig::from_env().is_err());
    }
}
