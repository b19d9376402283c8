pub mod muxer;
pub mod silence;

pub use muxer::{read_assembled, AssemblyError, AudioMuxer, FfmpegMuxer, StreamConcatMuxer};
pub use silence::{silent_mp3, unit_repeats, SILENCE_UNIT};
