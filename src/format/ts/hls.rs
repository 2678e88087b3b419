//! HLS output: the vod playlist and segment file rotation.

use crate::error::Result;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Append-only writer for a finite (vod) `.m3u8` playlist.
///
/// The file is opened once; one `#EXTINF` entry is appended and flushed
/// per closed segment so a crash mid-run leaves a playable prefix.
pub struct PlaylistWriter {
    writer: BufWriter<File>,
    segments: u32,
}

impl PlaylistWriter {
    /// Creates the playlist and writes its header.
    pub async fn create(path: &Path, target_duration_secs: u64) -> Result<Self> {
        let file = File::create(path).await?;
        let mut writer = BufWriter::new(file);
        writer.write_all(b"#EXTM3U\n#EXT-X-VERSION:3\n").await?;
        writer
            .write_all(format!("#EXT-X-TARGETDURATION:{}\n", target_duration_secs).as_bytes())
            .await?;
        writer.flush().await?;
        Ok(Self {
            writer,
            segments: 0,
        })
    }

    /// Appends the entry for a closed segment.
    pub async fn add_segment(&mut self, filename: &str, duration_secs: f64) -> Result<()> {
        self.writer
            .write_all(format!("#EXTINF:{:.3}\n{}\n", duration_secs, filename).as_bytes())
            .await?;
        self.writer.flush().await?;
        self.segments += 1;
        Ok(())
    }

    /// Terminates the playlist.
    pub async fn finish(mut self) -> Result<()> {
        self.writer.write_all(b"#EXT-X-ENDLIST").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Entries written so far.
    pub fn segment_count(&self) -> u32 {
        self.segments
    }
}

/// Owns the current `.ts` segment file and the playlist, and rotates the
/// former on demand.
pub struct Segmenter {
    output_dir: PathBuf,
    prefix: String,
    fps: u32,
    segment_index: u32,
    segment: BufWriter<File>,
    playlist: PlaylistWriter,
}

impl Segmenter {
    /// Opens segment 0 and the playlist inside `output_dir`.
    pub async fn create(
        output_dir: &Path,
        prefix: &str,
        playlist_name: &str,
        target_duration_secs: u64,
        fps: u32,
    ) -> Result<Self> {
        let playlist =
            PlaylistWriter::create(&output_dir.join(playlist_name), target_duration_secs).await?;
        let first = output_dir.join(segment_filename(prefix, 0));
        let segment = BufWriter::new(File::create(&first).await?);
        debug!("opened segment {:?}", first);

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            prefix: prefix.to_string(),
            fps,
            segment_index: 0,
            segment,
            playlist,
        })
    }

    /// Appends one 188-byte packet to the current segment.
    pub async fn write_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.segment.write_all(packet).await?;
        Ok(())
    }

    /// Closes the current segment, records it in the playlist with the
    /// duration implied by `video_frames`, and opens the next file.
    pub async fn rotate(&mut self, video_frames: u32) -> Result<()> {
        self.publish_current(video_frames).await?;

        self.segment_index += 1;
        let next = self
            .output_dir
            .join(segment_filename(&self.prefix, self.segment_index));
        self.segment = BufWriter::new(File::create(&next).await?);
        debug!("rotated to segment {:?}", next);
        Ok(())
    }

    /// Closes the final segment and terminates the playlist.
    pub async fn finish(mut self, video_frames: u32) -> Result<()> {
        self.publish_current(video_frames).await?;
        self.playlist.finish().await
    }

    async fn publish_current(&mut self, video_frames: u32) -> Result<()> {
        self.segment.flush().await?;
        let duration = video_frames as f64 / self.fps as f64;
        self.playlist
            .add_segment(&segment_filename(&self.prefix, self.segment_index), duration)
            .await
    }

    /// Index of the segment currently being written.
    pub fn segment_index(&self) -> u32 {
        self.segment_index
    }
}

fn segment_filename(prefix: &str, index: u32) -> String {
    format!("{}-{}.ts", prefix, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tsmux-hls-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_playlist_format() {
        let dir = temp_dir("playlist");
        let path = dir.join("playlist.m3u8");

        let mut playlist = PlaylistWriter::create(&path, 4).await.unwrap();
        playlist.add_segment("mux-0.ts", 4.0).await.unwrap();
        playlist.add_segment("mux-1.ts", 2.0).await.unwrap();
        assert_eq!(playlist.segment_count(), 2);
        playlist.finish().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n\
             #EXTINF:4.000\nmux-0.ts\n#EXTINF:2.000\nmux-1.ts\n#EXT-X-ENDLIST"
        );

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_segment_rotation() {
        let dir = temp_dir("rotate");

        let mut segmenter = Segmenter::create(&dir, "mux", "playlist.m3u8", 4, 25)
            .await
            .unwrap();
        assert_eq!(segmenter.segment_index(), 0);

        segmenter.write_packet(&[0x47; 188]).await.unwrap();
        segmenter.rotate(100).await.unwrap();
        assert_eq!(segmenter.segment_index(), 1);

        segmenter.write_packet(&[0x47; 188]).await.unwrap();
        segmenter.finish(50).await.unwrap();

        assert_eq!(std::fs::metadata(dir.join("mux-0.ts")).unwrap().len(), 188);
        assert_eq!(std::fs::metadata(dir.join("mux-1.ts")).unwrap().len(), 188);

        let content = std::fs::read_to_string(dir.join("playlist.m3u8")).unwrap();
        assert!(content.contains("#EXTINF:4.000\nmux-0.ts\n"));
        assert!(content.contains("#EXTINF:2.000\nmux-1.ts\n"));
        assert!(content.ends_with("#EXT-X-ENDLIST"));

        std::fs::remove_dir_all(dir).unwrap();
    }
}
