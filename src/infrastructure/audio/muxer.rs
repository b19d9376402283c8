use async_trait::async_trait;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("no segments to assemble")]
    NoSegments,
    #[error("failed to read segment {path}: {source}")]
    Segment { path: PathBuf, source: io::Error },
    #[error("failed to write assembled output: {0}")]
    Io(io::Error),
    #[error("ffmpeg unavailable: {0}")]
    NotFound(io::Error),
    #[error("ffmpeg invocation failed (exit {exit_code:?}): {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("assembled output is empty")]
    EmptyOutput,
}

/// Joins audio segment files, in order, into one output file
#[async_trait]
pub trait AudioMuxer: Send + Sync {
    async fn concatenate(&self, segments: &[PathBuf], output: &Path) -> Result<(), AssemblyError>;
}

/// Read the muxer output back, failing on a missing or zero-length file
pub async fn read_assembled(output: &Path) -> Result<Vec<u8>, AssemblyError> {
    let audio = match tokio::fs::read(output).await {
        Ok(audio) => audio,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(AssemblyError::EmptyOutput),
        Err(err) => return Err(AssemblyError::Io(err)),
    };

    if audio.is_empty() {
        return Err(AssemblyError::EmptyOutput);
    }
    Ok(audio)
}

/// Byte-level concatenation.
///
/// MP3 is a sequence of self-contained frames, so appending streams of the
/// same format yields a playable file without re-encoding.
#[derive(Debug, Clone, Default)]
pub struct StreamConcatMuxer;

#[async_trait]
impl AudioMuxer for StreamConcatMuxer {
    async fn concatenate(&self, segments: &[PathBuf], output: &Path) -> Result<(), AssemblyError> {
        if segments.is_empty() {
            return Err(AssemblyError::NoSegments);
        }

        let mut out = tokio::fs::File::create(output)
            .await
            .map_err(AssemblyError::Io)?;

        for path in segments {
            let mut segment =
                tokio::fs::File::open(path)
                    .await
                    .map_err(|source| AssemblyError::Segment {
                        path: path.clone(),
                        source,
                    })?;
            tokio::io::copy(&mut segment, &mut out)
                .await
                .map_err(|source| AssemblyError::Segment {
                    path: path.clone(),
                    source,
                })?;
        }

        out.flush().await.map_err(AssemblyError::Io)?;
        Ok(())
    }
}

/// Concatenation through the ffmpeg concat demuxer with stream copy
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    cli_path: PathBuf,
}

impl FfmpegMuxer {
    pub fn new(cli_path: PathBuf) -> Self {
        Self { cli_path }
    }
}

/// Concat demuxer list: one `file '<path>'` line per segment, quotes escaped
fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|path| {
            let escaped = path.to_string_lossy().replace('\'', "'\\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

#[async_trait]
impl AudioMuxer for FfmpegMuxer {
    async fn concatenate(&self, segments: &[PathBuf], output: &Path) -> Result<(), AssemblyError> {
        if segments.is_empty() {
            return Err(AssemblyError::NoSegments);
        }

        let list_path = output.with_extension("txt");
        tokio::fs::write(&list_path, concat_list(segments))
            .await
            .map_err(AssemblyError::Io)?;

        let started_at = Instant::now();
        let result = Command::new(&self.cli_path)
            .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
            .arg(&list_path)
            .args(["-c", "copy"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, cli = %self.cli_path.display(), "Failed to spawn ffmpeg");
                if err.kind() == ErrorKind::NotFound {
                    AssemblyError::NotFound(err)
                } else {
                    AssemblyError::Io(err)
                }
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).into_owned();
            tracing::warn!(
                exit_code = ?result.status.code(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                stderr = %stderr,
                "ffmpeg concatenation failed"
            );
            return Err(AssemblyError::Cli {
                exit_code: result.status.code(),
                stderr,
            });
        }

        tracing::debug!(
            segment_count = segments.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "ffmpeg concatenation completed"
        );
        Ok(())
    }
}
