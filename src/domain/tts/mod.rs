pub mod assets;
pub mod batch;
pub mod cache_key;
pub mod dto;
pub mod engine;
pub mod error;
pub mod gate;
pub mod progress;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use assets::PromptAssets;
pub use batch::{output_name, AssemblyPlan, BatchError, BatchJob, BatchOrchestrator, BatchOutcome, Segment};
pub use cache_key::{CacheKey, SpeechRate};
pub use dto::{BatchTtsRequest, CheckCacheRequest, TtsRequest, VoiceInfo, VoicesQuery};
pub use engine::Engine;
pub use error::TtsServiceError;
pub use gate::{GateError, RetryPolicy, SynthesisGate, SynthesisRequest};
pub use progress::{ProgressReporter, ProgressUpdate};
pub use service::{EngineHandle, SynthesisOutcome, TtsService, TtsServiceApi};
