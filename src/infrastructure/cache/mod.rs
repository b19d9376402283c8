pub mod audio_store;
pub mod stale;

pub use audio_store::{write_atomic, AudioStore, CacheError};
pub use stale::StaleCache;
