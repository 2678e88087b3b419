//! The transport-stream writer: one loop, one 188-byte packet per
//! iteration.
//!
//! Each iteration the scheduler picks a packet class (PSI table, video
//! PES, audio PES, or end), the packet is assembled into a scratch
//! buffer, padded with `0xFF` to exactly 188 bytes, and appended to the
//! current segment. Audio drives the interleave: video packets are only
//! eligible while the audio presentation clock is ahead of the video
//! clock, which keeps decoder buffer occupancy bounded and the emitted
//! timestamps close to monotonic.

use super::hls::Segmenter;
use super::pes::{write_audio_pes_header, write_video_pes_header};
use super::psi::{build_pat_packet, build_pmt_packet, Pat, Pmt};
use super::stream::{ElementaryStream, StreamKind};
use super::types::{
    TsHeader, TsPacketType, AUD_NAL, PES_ADTS_HEADER_SIZE, PES_H264_HEADER_SIZE, PID_PMT,
    TS_HEADER_SIZE, TS_PACKET_SIZE,
};
use crate::codec::h264::NaluKind;
use crate::config::MuxerConfig;
use crate::error::{Result, TsMuxError};
use crate::utils::crc::Crc32Mpeg2;
use bytes::{BufMut, BytesMut};
use log::{debug, info};

/// Writes an MPEG-TS segment sequence plus HLS playlist from one H.264
/// and one ADTS elementary stream.
pub struct TsWriter {
    config: MuxerConfig,
    video: ElementaryStream,
    audio: ElementaryStream,
    segmenter: Segmenter,
    pat: Pat,
    pmt: Pmt,
    crc: Crc32Mpeg2,
    curr_packet_idx: i64,
    last_pat_idx: i64,
    last_pmt_idx: i64,
    pat_cc: u8,
    pmt_cc: u8,
}

impl TsWriter {
    /// Opens both inputs, segment 0, and the playlist.
    pub async fn open(config: MuxerConfig) -> Result<Self> {
        let video = ElementaryStream::open(
            &config.video_path,
            StreamKind::Video,
            config.buffer_capacity,
            config.video_frame_clock(),
        )
        .await?;
        let audio = ElementaryStream::open(
            &config.audio_path,
            StreamKind::Audio,
            config.buffer_capacity,
            config.video_frame_clock(),
        )
        .await?;
        let segmenter = Segmenter::create(
            &config.output_dir,
            &config.segment_prefix,
            &config.playlist_name,
            config.target_duration_secs(),
            config.fps,
        )
        .await?;

        Ok(Self {
            last_pat_idx: -config.psi_interval,
            last_pmt_idx: -config.psi_interval,
            config,
            video,
            audio,
            segmenter,
            pat: Pat::single_program(PID_PMT),
            pmt: Pmt::audio_video(),
            crc: Crc32Mpeg2::new(),
            curr_packet_idx: 0,
            pat_cc: 0,
            pmt_cc: 0,
        })
    }

    /// Runs the packet loop until both inputs are exhausted, then
    /// terminates the playlist.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "muxing {:?} + {:?} into {:?}",
            self.config.video_path, self.config.audio_path, self.config.output_dir
        );

        loop {
            let packet_type = self.next_packet_type();

            if packet_type == TsPacketType::VideoPes {
                // a video slot is the rotation point: deciding here lets
                // the fresh segment open with its tables before the
                // SPS-bearing PES goes out
                self.video.load_frame().await?;
                if self.should_rotate() {
                    self.rotate_segment().await?;
                    continue;
                }
            }

            match packet_type {
                TsPacketType::Pat => self.write_pat().await?,
                TsPacketType::Pmt => self.write_pmt().await?,
                TsPacketType::VideoPes | TsPacketType::AudioPes => {
                    self.write_pes_packet(packet_type).await?
                }
                TsPacketType::End => return self.finish().await,
            }

            self.curr_packet_idx += 1;
        }
    }

    /// Picks the packet class for the next slot.
    ///
    /// PSI repetition outranks payload. Video runs only while audio is
    /// ahead (or absent altogether) and no audio frame is mid-packet;
    /// otherwise audio drains first.
    fn next_packet_type(&self) -> TsPacketType {
        if self.curr_packet_idx - self.last_pat_idx >= self.config.psi_interval {
            return TsPacketType::Pat;
        }
        if self.curr_packet_idx - self.last_pmt_idx >= self.config.psi_interval {
            return TsPacketType::Pmt;
        }

        let audio_clear = !self.audio.has_input()
            || (self.audio.pts() > self.video.pts() && self.audio.frame_remaining() == 0);
        if self.video.has_input() && audio_clear {
            return TsPacketType::VideoPes;
        }
        if self.audio.has_input() {
            return TsPacketType::AudioPes;
        }
        TsPacketType::End
    }

    /// True when the pending video frame opens a keyframe group and the
    /// current segment has reached its target frame count.
    fn should_rotate(&self) -> bool {
        self.video.frames_read() >= self.config.target_segment_frames()
            && self.video.frame_kind() == Some(NaluKind::Sps)
    }

    async fn rotate_segment(&mut self) -> Result<()> {
        // the SPS that armed the rotation is already counted but belongs
        // to the segment being opened
        let closed_frames = self.video.frames_read().saturating_sub(1);
        self.segmenter.rotate(closed_frames).await?;
        self.video.set_frames_read(1);
        self.audio.set_frames_read(0);
        self.last_pat_idx = -self.config.psi_interval;
        self.last_pmt_idx = -self.config.psi_interval;
        debug!(
            "segment {} opened at packet {}",
            self.segmenter.segment_index(),
            self.curr_packet_idx
        );
        Ok(())
    }

    async fn finish(self) -> Result<()> {
        info!(
            "mux complete: {} segments, {} packets",
            self.segmenter.segment_index() + 1,
            self.curr_packet_idx
        );
        self.segmenter.finish(self.video.frames_read()).await
    }

    async fn write_pat(&mut self) -> Result<()> {
        let packet = build_pat_packet(&self.pat, self.pat_cc, &self.crc)?;
        self.segmenter.write_packet(&packet).await?;
        self.last_pat_idx = self.curr_packet_idx;
        self.pat_cc = (self.pat_cc + 1) & 0x0F;
        Ok(())
    }

    async fn write_pmt(&mut self) -> Result<()> {
        let packet = build_pmt_packet(&self.pmt, self.pmt_cc, &self.crc)?;
        self.segmenter.write_packet(&packet).await?;
        self.last_pmt_idx = self.curr_packet_idx;
        self.pmt_cc = (self.pmt_cc + 1) & 0x0F;
        Ok(())
    }

    async fn write_pes_packet(&mut self, packet_type: TsPacketType) -> Result<()> {
        let stream = match packet_type {
            TsPacketType::AudioPes => &mut self.audio,
            _ => &mut self.video,
        };
        stream.load_frame().await?;

        let mut packet = BytesMut::with_capacity(TS_PACKET_SIZE);
        assemble_pes_packet(stream, &mut packet).await?;

        if packet.len() > TS_PACKET_SIZE {
            return Err(TsMuxError::InvalidData(format!(
                "ts packet overflow: {} bytes on pid {}",
                packet.len(),
                stream.pid()
            )));
        }
        packet.resize(TS_PACKET_SIZE, 0xFF);

        self.segmenter.write_packet(&packet).await
    }
}

/// Assembles header, adaptation field, PES header, and payload for one
/// packet of `stream`'s PID.
async fn assemble_pes_packet(stream: &mut ElementaryStream, packet: &mut BytesMut) -> Result<()> {
    let af_len = adaptation_field_length(stream);

    let header = TsHeader {
        pid: stream.pid(),
        payload_unit_start: !stream.pes_initialized(),
        adaptation_field_exists: af_len > 0,
        continuity_counter: stream.next_continuity(),
        ..Default::default()
    };
    header.write_to(packet)?;

    write_adaptation_field(stream, af_len, packet);

    if !stream.pes_initialized() {
        match stream.kind() {
            StreamKind::Video => write_video_pes_header(packet, stream.pts(), stream.dts())?,
            StreamKind::Audio => {
                write_audio_pes_header(packet, stream.pts(), stream.frame_initial_len())?
            }
        }
        stream.set_pes_initialized(true);
    }

    write_pes_payload(stream, packet).await
}

/// True when this packet must carry a PCR: the program clock rides the
/// video PID and is stamped on every keyframe group boundary.
fn packet_has_pcr(stream: &ElementaryStream) -> bool {
    stream.kind() == StreamKind::Video && stream.frame_kind() == Some(NaluKind::Sps)
}

/// Sizes the adaptation field for the upcoming packet: 8 bytes when a
/// PCR is due, plus whatever stuffing is needed so that header, field,
/// PES header, delimiter, and the remaining frame bytes land on exactly
/// 188.
fn adaptation_field_length(stream: &ElementaryStream) -> usize {
    let has_pcr = packet_has_pcr(stream);
    let mut af_len = if has_pcr { 8 } else { 0 };

    let mut packet_size = TS_HEADER_SIZE + af_len;
    if has_pcr || !stream.pes_initialized() {
        packet_size += match stream.kind() {
            StreamKind::Video => PES_H264_HEADER_SIZE,
            StreamKind::Audio => PES_ADTS_HEADER_SIZE,
        };
    }
    if stream.frame_kind() == Some(NaluKind::Vcl) {
        packet_size += AUD_NAL.len();
    }

    let remaining = stream.frame_remaining();
    if TS_PACKET_SIZE > packet_size + remaining {
        af_len += TS_PACKET_SIZE - remaining - packet_size;
    }
    af_len
}

/// Writes the adaptation field: length byte, flags, optional PCR, then
/// `0xFF` stuffing. A field of length 1 is just the length byte (value
/// 0), which is how a single spare byte is burned.
fn write_adaptation_field(stream: &ElementaryStream, af_len: usize, packet: &mut BytesMut) {
    if af_len == 0 {
        return;
    }
    packet.put_u8((af_len - 1) as u8);
    if af_len == 1 {
        return;
    }

    let has_pcr = packet_has_pcr(stream);
    // PCR flag plus random-access indicator on keyframe group boundaries
    packet.put_u8(if has_pcr { 0x50 } else { 0x00 });
    let mut written = 2;

    if has_pcr {
        let pcr = stream.pcr();
        packet.put_u8((pcr >> 25) as u8);
        packet.put_u8((pcr >> 17) as u8);
        packet.put_u8((pcr >> 9) as u8);
        packet.put_u8((pcr >> 1) as u8);
        // last base bit, 6 reserved bits, then a 9-bit extension of 0
        packet.put_u8((((pcr & 0x01) << 7) as u8) | 0x7E);
        packet.put_u8(0x00);
        written += 6;
    }

    for _ in written..af_len {
        packet.put_u8(0xFF);
    }
}

/// Writes as much of the current frame as fits, prepending the access
/// unit delimiter on the first slice of a video access unit. On frame
/// completion the video path immediately pulls the next NAL unit so the
/// rotation check can see an upcoming SPS.
async fn write_pes_payload(stream: &mut ElementaryStream, packet: &mut BytesMut) -> Result<()> {
    let first_slice =
        stream.frame_remaining() > 0 && stream.frame_remaining() == stream.frame_initial_len();
    if first_slice
        && matches!(
            stream.frame_kind(),
            Some(NaluKind::Vcl) | Some(NaluKind::Sps)
        )
    {
        packet.put_slice(&AUD_NAL);
    }

    let available = TS_PACKET_SIZE.saturating_sub(packet.len());
    let count = available.min(stream.frame_remaining());
    if let Some(frame) = stream.frame_mut() {
        packet.put_slice(&frame.unconsumed()[..count]);
        frame.advance(count);
    }

    if stream.frame_remaining() == 0 {
        stream.clear_frame();
        match stream.kind() {
            StreamKind::Video => {
                stream.load_frame().await?;
                match stream.frame_kind() {
                    Some(kind) if kind.starts_access_unit() => stream.set_pes_initialized(false),
                    None => stream.set_pes_initialized(false),
                    _ => {} // parameter sets continue the open PES
                }
            }
            StreamKind::Audio => stream.set_pes_initialized(false),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_input(name: &str, data: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tsmux-muxer-{}-{}", std::process::id(), name));
        std::fs::write(&path, data).unwrap();
        path
    }

    async fn video_stream(name: &str, data: &[u8]) -> ElementaryStream {
        let path = temp_input(name, data);
        let stream = ElementaryStream::open(&path, StreamKind::Video, 1 << 20, 3600)
            .await
            .unwrap();
        std::fs::remove_file(path).unwrap();
        stream
    }

    #[tokio::test]
    async fn test_sps_packet_carries_pcr_and_fills_exactly() {
        let mut input = vec![0, 0, 0, 1, 0x67];
        input.extend_from_slice(&[0xAA; 20]);
        input.extend_from_slice(&[0, 0, 0, 1, 0x68, 0xBB]);
        let mut stream = video_stream("sps-pcr", &input).await;
        stream.load_frame().await.unwrap();
        assert!(packet_has_pcr(&stream));

        let mut packet = BytesMut::new();
        assemble_pes_packet(&mut stream, &mut packet).await.unwrap();
        assert_eq!(packet.len(), TS_PACKET_SIZE);

        // header: payload start, adaptation field + payload, video pid
        assert_eq!(&packet[..4], &[0x47, 0x41, 0x00, 0x30]);
        // adaptation flags: PCR + random access
        assert_eq!(packet[5], 0x50);
        // pcr base 66600 (one video frame past the initial clock)
        let b = &packet[6..12];
        let pcr = ((b[0] as u64) << 25)
            | ((b[1] as u64) << 17)
            | ((b[2] as u64) << 9)
            | ((b[3] as u64) << 1)
            | ((b[4] as u64) >> 7);
        assert_eq!(pcr, 66_600);
    }

    #[tokio::test]
    async fn test_vcl_continuation_has_no_pes_header() {
        let mut input = vec![0, 0, 0, 1, 0x41];
        input.extend_from_slice(&[0xCC; 400]);
        input.extend_from_slice(&[0, 0, 0, 1, 0x41, 0xDD]);
        let mut stream = video_stream("vcl-cont", &input).await;
        stream.load_frame().await.unwrap();

        let mut first = BytesMut::new();
        assemble_pes_packet(&mut stream, &mut first).await.unwrap();
        assert_eq!(first.len(), TS_PACKET_SIZE);
        assert_eq!(first[1] & 0x40, 0x40); // payload unit start
        assert!(stream.frame_remaining() > 0);

        let mut second = BytesMut::new();
        assemble_pes_packet(&mut stream, &mut second).await.unwrap();
        assert_eq!(second[1] & 0x40, 0x00); // continuation
        assert_eq!(second[3] & 0x0F, 1); // continuity advanced
    }

    #[tokio::test]
    async fn test_payload_resumes_after_aud_and_header() {
        let mut input = vec![0, 0, 0, 1, 0x41];
        input.extend_from_slice(&[0xCC; 30]);
        input.extend_from_slice(&[0, 0, 0, 1, 0x41, 0xDD]);
        let mut stream = video_stream("aud-prefix", &input).await;
        stream.load_frame().await.unwrap();

        let mut packet = BytesMut::new();
        assemble_pes_packet(&mut stream, &mut packet).await.unwrap();
        assert_eq!(packet.len(), TS_PACKET_SIZE);

        // the delimiter precedes the frame bytes inside the payload
        let aud_at = packet
            .windows(AUD_NAL.len())
            .position(|w| w == AUD_NAL)
            .unwrap();
        assert_eq!(
            &packet[aud_at + AUD_NAL.len()..aud_at + AUD_NAL.len() + 5],
            &[0, 0, 0, 1, 0x41]
        );
    }
}
