use super::assets::PromptAssets;
use super::error::TtsServiceError;
use super::gate::{GateError, SynthesisGate, SynthesisRequest};
use super::progress::ProgressReporter;
use crate::infrastructure::audio::{read_assembled, unit_repeats, AssemblyError, AudioMuxer};
use bytes::Bytes;
use chrono::{DateTime, Local};
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Pause between the intro prompt and the first word
pub const LEAD_IN_SILENCE: Duration = Duration::from_secs(1);
/// Pause between the last word and the outro prompt
pub const OUTRO_SILENCE: Duration = Duration::from_secs(1);

/// One dictation recording to produce
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub words: Vec<String>,
    pub voice: String,
    pub rate: f32,
    pub repeat_count: u32,
    pub repeat_interval: Duration,
    pub grade: Option<String>,
    pub lesson: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Intro,
    Silence(Duration),
    /// Audio of the item at this index of the job's word list
    Item(usize),
    Outro,
}

/// Ordered list of segments making up the final recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyPlan {
    segments: Vec<Segment>,
}

impl AssemblyPlan {
    /// Lay out `items` (indices of the words that synthesized) between the
    /// prompts. Each item is repeated `repeat_count` times with `interval`
    /// between repeats and twice that between items. Zero-length pauses are
    /// left out.
    pub fn build(items: &[usize], repeat_count: u32, interval: Duration) -> Self {
        let mut plan = Self {
            segments: vec![Segment::Intro],
        };
        plan.silence(LEAD_IN_SILENCE);

        for (position, &item) in items.iter().enumerate() {
            for repeat in 0..repeat_count {
                plan.segments.push(Segment::Item(item));
                if repeat + 1 < repeat_count {
                    plan.silence(interval);
                }
            }
            if position + 1 < items.len() {
                plan.silence(interval * 2);
            }
        }

        plan.silence(OUTRO_SILENCE);
        plan.segments.push(Segment::Outro);
        plan
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn silence(&mut self, duration: Duration) {
        if !duration.is_zero() {
            self.segments.push(Segment::Silence(duration));
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("no word could be synthesized")]
    AllFailed { failed_words: Vec<String> },
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error("failed to prepare working directory: {0}")]
    Workspace(#[source] std::io::Error),
}

impl From<BatchError> for TtsServiceError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::AllFailed { failed_words } => TtsServiceError::GenerationFailed {
                message: "All words failed to generate".to_string(),
                failed_words,
            },
            BatchError::Assembly(e) => TtsServiceError::Assembly(e.to_string()),
            BatchError::Workspace(e) => TtsServiceError::Assembly(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub audio: Bytes,
    pub file_name: String,
    pub failed_words: Vec<String>,
    pub statuses: Vec<ItemStatus>,
}

/// Synthesizes a word list in bounded chunks and assembles the recording
pub struct BatchOrchestrator {
    muxer: Arc<dyn AudioMuxer>,
    assets: Arc<PromptAssets>,
    chunk_size: usize,
    work_root: Option<PathBuf>,
}

impl BatchOrchestrator {
    pub fn new(muxer: Arc<dyn AudioMuxer>, assets: Arc<PromptAssets>, chunk_size: usize) -> Self {
        Self {
            muxer,
            assets,
            chunk_size: chunk_size.max(1),
            work_root: None,
        }
    }

    /// Create per-batch working directories under `root` instead of the
    /// system temp directory
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    /// Synthesize every word through the gate, one chunk at a time.
    ///
    /// Results come back in word order regardless of completion order.
    pub async fn prefetch(
        &self,
        gate: &SynthesisGate,
        words: &[String],
        voice: &str,
        rate: f32,
        progress: &ProgressReporter,
    ) -> Vec<Result<Bytes, GateError>> {
        let mut results = Vec::with_capacity(words.len());

        for chunk in words.chunks(self.chunk_size) {
            let chunk_results = join_all(chunk.iter().map(|word| async move {
                let result = gate
                    .synthesize(SynthesisRequest::new(word, voice, rate))
                    .await;
                if let Err(err) = &result {
                    tracing::warn!(word = %word, error = %err, "Word synthesis failed");
                }
                progress.record(word, result.is_ok());
                result
            }))
            .await;
            results.extend(chunk_results);
        }

        progress.finish();
        results
    }

    pub async fn run(
        &self,
        gate: &SynthesisGate,
        job: &BatchJob,
        progress: &ProgressReporter,
    ) -> Result<BatchOutcome, BatchError> {
        let started_at = Instant::now();
        let results = self
            .prefetch(gate, &job.words, &job.voice, job.rate, progress)
            .await;

        let mut statuses = Vec::with_capacity(results.len());
        let mut succeeded = Vec::new();
        let mut audio = Vec::with_capacity(results.len());
        let mut failed_words = Vec::new();
        for (index, (word, result)) in job.words.iter().zip(results).enumerate() {
            match result {
                Ok(bytes) => {
                    statuses.push(ItemStatus::Succeeded);
                    succeeded.push(index);
                    audio.push(Some(bytes));
                }
                Err(err) => {
                    statuses.push(ItemStatus::Failed(err.to_string()));
                    failed_words.push(word.clone());
                    audio.push(None);
                }
            }
        }

        if succeeded.is_empty() {
            return Err(BatchError::AllFailed { failed_words });
        }

        let plan = AssemblyPlan::build(&succeeded, job.repeat_count, job.repeat_interval);
        let assembled = self.assemble(&plan, &audio).await?;

        let file_name = output_name(job.grade.as_deref(), job.lesson.as_deref(), Local::now());
        tracing::info!(
            file_name = %file_name,
            word_count = job.words.len(),
            failed_count = failed_words.len(),
            segment_count = plan.segments().len(),
            audio_size = assembled.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Dictation assembled"
        );

        Ok(BatchOutcome {
            audio: Bytes::from(assembled),
            file_name,
            failed_words,
            statuses,
        })
    }

    /// Write every segment into a private working directory and concatenate.
    /// The directory is removed when this returns, on success or failure.
    async fn assemble(
        &self,
        plan: &AssemblyPlan,
        audio: &[Option<Bytes>],
    ) -> Result<Vec<u8>, BatchError> {
        let workdir = self.workdir()?;
        let dir = workdir.path();

        let intro = write_segment(dir, "intro.mp3", &self.assets.intro).await?;
        let outro = write_segment(dir, "outro.mp3", &self.assets.outro).await?;
        let silence = write_segment(dir, "silence.mp3", &self.assets.silence_unit).await?;

        let mut paths = Vec::with_capacity(plan.segments().len());
        let mut written = HashSet::new();
        for segment in plan.segments() {
            match segment {
                Segment::Intro => paths.push(intro.clone()),
                Segment::Outro => paths.push(outro.clone()),
                Segment::Silence(duration) => {
                    paths.extend(std::iter::repeat(silence.clone()).take(unit_repeats(*duration)))
                }
                Segment::Item(index) => {
                    let path = dir.join(format!("item_{}.mp3", index));
                    if written.insert(*index) {
                        let bytes = audio
                            .get(*index)
                            .and_then(Option::as_ref)
                            .ok_or(AssemblyError::NoSegments)?;
                        tokio::fs::write(&path, bytes)
                            .await
                            .map_err(BatchError::Workspace)?;
                    }
                    paths.push(path);
                }
            }
        }

        let output = dir.join("dictation.mp3");
        self.muxer.concatenate(&paths, &output).await?;
        Ok(read_assembled(&output).await?)
    }

    fn workdir(&self) -> Result<TempDir, BatchError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("dictation-");
        match &self.work_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(BatchError::Workspace)
    }
}

async fn write_segment(dir: &Path, name: &str, data: &Bytes) -> Result<PathBuf, BatchError> {
    let path = dir.join(name);
    tokio::fs::write(&path, data)
        .await
        .map_err(BatchError::Workspace)?;
    Ok(path)
}

fn sanitize_label(label: Option<&str>) -> Option<String> {
    let cleaned: String = label?.chars().filter(char::is_ascii_alphanumeric).collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// `dictation_<grade>_<lesson>.mp3` when both labels survive sanitizing,
/// otherwise a timestamped name
pub fn output_name(grade: Option<&str>, lesson: Option<&str>, now: DateTime<Local>) -> String {
    match (sanitize_label(grade), sanitize_label(lesson)) {
        (Some(grade), Some(lesson)) => format!("dictation_{}_{}.mp3", grade, lesson),
        _ => format!("dictation_{}.mp3", now.format("%Y%m%d_%H%M%S")),
    }
}
