//! Per-stream input state.
//!
//! Each elementary stream owns its input file, one refill buffer, and at
//! most one extracted frame at a time. Frames are copied out of the
//! buffer so a refill can never invalidate bytes that still have to be
//! written; a frame is dropped only once its last byte has gone into a
//! PES payload.

use super::types::{AUDIO_FRAME_CLOCK, INITIAL_PCR, INITIAL_PTS, PID_ADTS, PID_H264};
use crate::codec::aac::{find_adts_frame, AdtsHeader, AdtsScan};
use crate::codec::h264::{find_nal_unit, nalu_kind, start_code_origin, NalScan, NaluKind};
use crate::error::Result;
use log::{debug, trace};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Which elementary stream a state machine feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// H.264 Annex-B input on PID 256
    Video,
    /// ADTS AAC input on PID 257
    Audio,
}

/// A frame lifted out of the refill buffer: one NAL unit including its
/// start code, or one ADTS frame including its header.
#[derive(Debug)]
pub struct Frame {
    data: Vec<u8>,
    consumed: usize,
}

impl Frame {
    fn new(data: Vec<u8>) -> Self {
        Self { data, consumed: 0 }
    }

    /// Bytes not yet written to a PES payload.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.consumed
    }

    /// Length of the frame as extracted.
    pub fn initial_len(&self) -> usize {
        self.data.len()
    }

    /// The unconsumed byte range.
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.consumed..]
    }

    /// The full frame, start code / header included.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Marks `n` bytes as written.
    pub fn advance(&mut self, n: usize) {
        self.consumed += n;
    }
}

/// State for one input elementary stream.
pub struct ElementaryStream {
    file: File,
    remaining_file_bytes: u64,
    buffer: Vec<u8>,
    cursor: usize,
    buffer_loads: u32,
    capacity: usize,
    kind: StreamKind,
    pid: u16,
    continuity: u8,
    pcr: u64,
    pts: u64,
    dts: u64,
    frames_read: u32,
    pes_initialized: bool,
    frame: Option<Frame>,
    video_frame_clock: u64,
}

impl ElementaryStream {
    /// Opens `path` and probes its size with a seek to the end.
    pub async fn open(
        path: &Path,
        kind: StreamKind,
        capacity: usize,
        video_frame_clock: u64,
    ) -> Result<Self> {
        let mut file = File::open(path).await?;
        let size = file.seek(SeekFrom::End(0)).await?;
        file.seek(SeekFrom::Start(0)).await?;

        debug!("opened {} input {:?}: {} bytes", kind_name(kind), path, size);

        Ok(Self {
            file,
            remaining_file_bytes: size,
            buffer: Vec::new(),
            cursor: 0,
            buffer_loads: 0,
            capacity,
            kind,
            pid: match kind {
                StreamKind::Video => PID_H264,
                StreamKind::Audio => PID_ADTS,
            },
            continuity: 0,
            pcr: INITIAL_PCR,
            pts: INITIAL_PTS,
            dts: INITIAL_PTS,
            frames_read: 0,
            pes_initialized: false,
            frame: None,
            video_frame_clock,
        })
    }

    /// Stream kind.
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// PID this stream's PES packets are sent on.
    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// Current presentation clock in 90 kHz units.
    pub fn pts(&self) -> u64 {
        self.pts
    }

    /// Current decode clock; equals the presentation clock for baseline
    /// video and audio.
    pub fn dts(&self) -> u64 {
        self.dts
    }

    /// Current program clock reference in 90 kHz units.
    pub fn pcr(&self) -> u64 {
        self.pcr
    }

    /// Frames extracted since the segment began.
    pub fn frames_read(&self) -> u32 {
        self.frames_read
    }

    /// Resets the per-segment frame counter.
    pub fn set_frames_read(&mut self, count: u32) {
        self.frames_read = count;
    }

    /// True while a PES packet payload is in progress; false when the
    /// next packet of this PID must open with a PES header.
    pub fn pes_initialized(&self) -> bool {
        self.pes_initialized
    }

    /// Flips the in-progress-PES flag.
    pub fn set_pes_initialized(&mut self, value: bool) {
        self.pes_initialized = value;
    }

    /// Returns the continuity counter for the next packet and advances it
    /// modulo 16.
    pub fn next_continuity(&mut self) -> u8 {
        let cc = self.continuity;
        self.continuity = (cc + 1) & 0x0F;
        cc
    }

    fn loaded(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// True while the stream can still produce payload bytes: unread file
    /// bytes, unscanned buffer bytes, or an unconsumed frame.
    pub fn has_input(&self) -> bool {
        self.remaining_file_bytes > 0 || self.loaded() > 0 || self.frame_remaining() > 0
    }

    /// Unconsumed bytes of the current frame, 0 when none is loaded.
    pub fn frame_remaining(&self) -> usize {
        self.frame.as_ref().map_or(0, Frame::remaining)
    }

    /// Initial length of the current frame, 0 when none is loaded.
    pub fn frame_initial_len(&self) -> usize {
        self.frame.as_ref().map_or(0, Frame::initial_len)
    }

    /// The current frame, if one is loaded.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Mutable access to the current frame.
    pub fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.frame.as_mut()
    }

    /// Drops the current frame.
    pub fn clear_frame(&mut self) {
        self.frame = None;
    }

    /// NAL kind of the current video frame, `None` for audio or when no
    /// frame is loaded.
    pub fn frame_kind(&self) -> Option<NaluKind> {
        match self.kind {
            StreamKind::Video => self.frame.as_ref().and_then(|f| nalu_kind(f.bytes())),
            StreamKind::Audio => None,
        }
    }

    /// Replaces the buffer with the next `min(capacity, remaining)` file
    /// bytes and rewinds the cursor. Any unscanned tail of the previous
    /// buffer is discarded, so the capacity must exceed the distance
    /// between frame boundaries.
    async fn refill(&mut self) -> Result<()> {
        let want = self.capacity.min(self.remaining_file_bytes as usize);
        let mut buffer = vec![0u8; want];
        self.file.read_exact(&mut buffer).await?;
        self.remaining_file_bytes -= want as u64;
        self.buffer = buffer;
        self.cursor = 0;
        self.buffer_loads += 1;
        debug!(
            "{} refill #{}: {} bytes loaded, {} left in file",
            kind_name(self.kind),
            self.buffer_loads,
            want,
            self.remaining_file_bytes
        );
        Ok(())
    }

    /// Ensures a frame is loaded, scanning (and refilling) as needed.
    ///
    /// At end of input the stream is left with no frame and an empty
    /// buffer, which [`has_input`](Self::has_input) reports as exhausted.
    pub async fn load_frame(&mut self) -> Result<()> {
        if self.frame.is_some() {
            return Ok(());
        }
        if self.loaded() == 0 {
            if self.remaining_file_bytes == 0 {
                return Ok(());
            }
            self.refill().await?;
        }
        match self.kind {
            StreamKind::Video => self.load_nal_unit().await,
            StreamKind::Audio => self.load_adts_frame().await,
        }
    }

    async fn load_nal_unit(&mut self) -> Result<()> {
        let (start, end) = loop {
            let window = &self.buffer[self.cursor..];
            match find_nal_unit(window) {
                NalScan::Found { start, end } => break (start_code_origin(window, start), end),
                NalScan::Incomplete { start } if self.remaining_file_bytes == 0 => {
                    break (start_code_origin(window, start), window.len());
                }
                NalScan::NoStart if self.remaining_file_bytes == 0 => {
                    self.buffer.clear();
                    self.cursor = 0;
                    return Ok(());
                }
                _ => self.refill().await?,
            }
        };

        self.extract(start, end);

        if let Some(kind) = self.frame_kind() {
            if kind.starts_access_unit() {
                self.frames_read += 1;
                self.pts += self.video_frame_clock;
                self.dts += self.video_frame_clock;
                self.pcr += self.video_frame_clock;
            }
        }
        Ok(())
    }

    async fn load_adts_frame(&mut self) -> Result<()> {
        let (start, end) = loop {
            let window = &self.buffer[self.cursor..];
            match find_adts_frame(window) {
                AdtsScan::Found { start, end } => break (start, end),
                AdtsScan::Incomplete { start } if self.remaining_file_bytes == 0 => {
                    break (start, window.len());
                }
                AdtsScan::NoStart if self.remaining_file_bytes == 0 => {
                    self.buffer.clear();
                    self.cursor = 0;
                    return Ok(());
                }
                _ => self.refill().await?,
            }
        };

        self.extract(start, end);

        if let Some(frame) = &self.frame {
            self.frames_read += 1;
            self.pcr += AUDIO_FRAME_CLOCK;
            match AdtsHeader::parse(frame.bytes()) {
                Ok(header) => {
                    self.pts += AUDIO_FRAME_CLOCK * header.raw_data_blocks() as u64;
                    self.dts = self.pts;
                    trace!(
                        "adts frame: declared {} bytes, scanned {} bytes, pts {}",
                        header.frame_length,
                        frame.initial_len(),
                        self.pts
                    );
                }
                Err(_) => {
                    // truncated tail frame: count a single block
                    self.pts += AUDIO_FRAME_CLOCK;
                    self.dts = self.pts;
                }
            }
        }
        Ok(())
    }

    /// Copies `start..end` (cursor-relative) out of the buffer into an
    /// owned frame and advances the cursor past it.
    fn extract(&mut self, start: usize, end: usize) {
        let abs_start = self.cursor + start;
        let abs_end = self.cursor + end;
        let data = self.buffer[abs_start..abs_end].to_vec();
        self.cursor = abs_end;
        self.frame = Some(Frame::new(data));
    }
}

fn kind_name(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Video => "h264",
        StreamKind::Audio => "adts",
    }
}
