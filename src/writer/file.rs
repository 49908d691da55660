//! File-backed asset writer.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::VideoFormat;
use crate::error::WriterError;
use crate::sample::{Sample, Track};
use crate::writer::AssetWriter;

// Container layout constants.
// 16-byte header followed by length-prefixed sample records.

/// Magic bytes identifying the container.
const MAGIC: &[u8; 4] = b"CBRC";

/// Container format version.
const VERSION: u16 = 1;

/// Byte offset of the record-count field in the header.
const RECORD_COUNT_OFFSET: u64 = 8;

/// Total header size in bytes.
const HEADER_SIZE: usize = 16;

/// Record tag for video samples.
const TAG_VIDEO: u8 = 0;

/// Record tag for audio samples.
const TAG_AUDIO: u8 = 1;

/// An [`AssetWriter`] that muxes samples into a simple container file.
///
/// The file is created on first append and finalized (record count updated)
/// on `finish()`. A recording that never accepted a sample therefore leaves
/// no file behind, which the recorder reports as an asset-write failure.
/// All file I/O runs in the blocking thread pool so the recorder task is
/// never stalled on disk.
///
/// Each record is `[tag: u8][pts_micros: u64 LE][len: u32 LE][payload]`.
pub struct FileAssetWriter {
    path: Arc<PathBuf>,
    format: VideoFormat,
    state: Arc<Mutex<FileState>>,
}

struct FileState {
    writer: Option<BufWriter<File>>,
    records_written: u64,
}

impl FileAssetWriter {
    /// Creates a writer targeting the given path.
    pub fn new(path: impl AsRef<Path>, format: VideoFormat) -> Self {
        Self {
            path: Arc::new(path.as_ref().to_path_buf()),
            format,
            state: Arc::new(Mutex::new(FileState {
                writer: None,
                records_written: 0,
            })),
        }
    }

    fn write_header(
        writer: &mut BufWriter<File>,
        format: VideoFormat,
        record_count: u64,
    ) -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        let format_tag: u8 = match format {
            VideoFormat::Mp4 => 0,
            VideoFormat::Mov => 1,
        };
        writer.write_all(&[format_tag, 0])?;
        writer.write_all(&record_count.to_le_bytes())?;
        Ok(())
    }

    fn update_header(writer: &mut BufWriter<File>, record_count: u64) -> std::io::Result<()> {
        writer.seek(SeekFrom::Start(RECORD_COUNT_OFFSET))?;
        writer.write_all(&record_count.to_le_bytes())?;
        writer.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn append_blocking(
        state: &mut FileState,
        path: &PathBuf,
        format: VideoFormat,
        sample: &Sample,
    ) -> Result<(), WriterError> {
        // Create file and header lazily on the first accepted sample
        if state.writer.is_none() {
            let file = File::create(path).map_err(|e| WriterError::file(path, e))?;
            let mut writer = BufWriter::new(file);
            Self::write_header(&mut writer, format, 0)
                .map_err(|e| WriterError::file(path, e))?;
            state.writer = Some(writer);
        }

        if let Some(ref mut writer) = state.writer {
            let tag = match sample.track {
                Track::Video => TAG_VIDEO,
                Track::Audio => TAG_AUDIO,
            };
            let pts_micros = sample.pts.as_micros() as u64;
            let len = sample.data.len() as u32;

            writer
                .write_all(&[tag])
                .and_then(|()| writer.write_all(&pts_micros.to_le_bytes()))
                .and_then(|()| writer.write_all(&len.to_le_bytes()))
                .and_then(|()| writer.write_all(&sample.data))
                .map_err(|e| WriterError::file(path, e))?;
            state.records_written += 1;
        }

        Ok(())
    }

    fn finish_blocking(state: &mut FileState, path: &PathBuf) -> Result<(), WriterError> {
        if let Some(ref mut writer) = state.writer {
            let count = state.records_written;
            Self::update_header(writer, count).map_err(|e| WriterError::file(path, e))?;
            writer.flush().map_err(|e| WriterError::file(path, e))?;
        }
        state.writer = None;
        Ok(())
    }
}

#[async_trait]
impl AssetWriter for FileAssetWriter {
    fn output_path(&self) -> &Path {
        &self.path
    }

    async fn start(&mut self) -> Result<(), WriterError> {
        // The sink confirms it can begin by validating the output location.
        match self.path.parent() {
            Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => Ok(()),
            Some(parent) => Err(WriterError::rejected(format!(
                "output directory does not exist: {}",
                parent.display()
            ))),
            None => Err(WriterError::rejected("output path has no parent directory")),
        }
    }

    async fn append(&mut self, sample: &Sample) -> Result<(), WriterError> {
        tracing::trace!(
            track = %sample.track,
            pts_us = sample.pts.as_micros() as u64,
            bytes = sample.byte_len(),
            "FileAssetWriter append"
        );

        let state = Arc::clone(&self.state);
        let path = Arc::clone(&self.path);
        let format = self.format;
        let sample = sample.clone();

        tokio::task::spawn_blocking(move || {
            let mut state = state.blocking_lock();
            Self::append_blocking(&mut state, &path, format, &sample)
        })
        .await
        .map_err(|e| WriterError::custom(format!("append task panicked: {e}")))?
    }

    async fn finish(&mut self) -> Result<(), WriterError> {
        let state = Arc::clone(&self.state);
        let path = Arc::clone(&self.path);

        tokio::task::spawn_blocking(move || {
            let mut state = state.blocking_lock();
            Self::finish_blocking(&mut state, &path)
        })
        .await
        .map_err(|e| WriterError::custom(format!("finish task panicked: {e}")))?
    }
}
