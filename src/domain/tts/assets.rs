use super::gate::{SynthesisGate, SynthesisRequest};
use crate::infrastructure::audio::{silent_mp3, SILENCE_UNIT};
use crate::infrastructure::cache::write_atomic;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::Path;

const INTRO_FILE: &str = "intro.mp3";
const OUTRO_FILE: &str = "outro.mp3";
const SILENCE_FILE: &str = "silence.mp3";

/// Fixed audio placed around every dictation recording
#[derive(Debug, Clone)]
pub struct PromptAssets {
    pub intro: Bytes,
    pub outro: Bytes,
    /// Unit clip of [`SILENCE_UNIT`] from which every pause is built
    pub silence_unit: Bytes,
}

impl PromptAssets {
    pub fn from_parts(intro: Bytes, outro: Bytes, silence_unit: Bytes) -> Self {
        Self {
            intro,
            outro,
            silence_unit,
        }
    }

    /// Load the prompts and silence clip from `dir`, producing missing ones.
    ///
    /// Prompts are synthesized through `gate`. A prompt that cannot be
    /// synthesized is replaced by the silence clip for this run and left
    /// unpersisted, so the next start tries again.
    pub async fn load_or_create(
        dir: &Path,
        gate: &SynthesisGate,
        voice: &str,
        intro_text: &str,
        outro_text: &str,
    ) -> anyhow::Result<Self> {
        let silence_path = dir.join(SILENCE_FILE);
        let silence_unit = match read_existing(&silence_path).await? {
            Some(clip) => clip,
            None => {
                let clip = Bytes::from(silent_mp3(SILENCE_UNIT));
                write_atomic(&silence_path, clip.clone()).await?;
                tracing::info!(path = %silence_path.display(), "Silence clip created");
                clip
            }
        };

        let intro = load_prompt(dir, INTRO_FILE, gate, voice, intro_text).await?;
        let outro = load_prompt(dir, OUTRO_FILE, gate, voice, outro_text).await?;

        Ok(Self {
            intro: intro.unwrap_or_else(|| silence_unit.clone()),
            outro: outro.unwrap_or_else(|| silence_unit.clone()),
            silence_unit,
        })
    }
}

async fn read_existing(path: &Path) -> std::io::Result<Option<Bytes>> {
    match tokio::fs::read(path).await {
        Ok(data) if !data.is_empty() => Ok(Some(Bytes::from(data))),
        Ok(_) => Ok(None),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

async fn load_prompt(
    dir: &Path,
    file: &str,
    gate: &SynthesisGate,
    voice: &str,
    text: &str,
) -> anyhow::Result<Option<Bytes>> {
    let path = dir.join(file);
    if let Some(prompt) = read_existing(&path).await? {
        return Ok(Some(prompt));
    }

    match gate.synthesize(SynthesisRequest::new(text, voice, 1.0)).await {
        Ok(prompt) => {
            write_atomic(&path, prompt.clone()).await?;
            tracing::info!(path = %path.display(), text, "Prompt created");
            Ok(Some(prompt))
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "Failed to synthesize prompt; using silence instead"
            );
            Ok(None)
        }
    }
}
