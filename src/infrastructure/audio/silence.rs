//! In-process silence clips.
//!
//! A Layer III frame whose side information is all zeros carries no spectral
//! data and decodes to silence, so silence can be produced without an encoder.
//! Frames are MPEG-2 Layer III, 48 kbit/s, 24 kHz mono. Speech backends are
//! asked for 24 kHz MP3 as well, which keeps stream-level concatenation uniform.

use std::time::Duration;

/// Sync word, MPEG-2, Layer III, no CRC / 48 kbit/s, 24 kHz, no padding / mono
const FRAME_HEADER: [u8; 4] = [0xFF, 0xF3, 0x64, 0xC0];

/// 72 * 48_000 / 24_000
const FRAME_LEN: usize = 144;

/// 576 samples at 24 kHz
const FRAME_MICROS: u128 = 24_000;

/// Duration of the well-known silence clip used to build longer pauses
pub const SILENCE_UNIT: Duration = Duration::from_millis(500);

/// Silent MP3 stream lasting at least `duration` (one frame minimum)
pub fn silent_mp3(duration: Duration) -> Vec<u8> {
    let frames = duration.as_micros().div_ceil(FRAME_MICROS).max(1) as usize;
    let mut audio = Vec::with_capacity(frames * FRAME_LEN);
    for _ in 0..frames {
        audio.extend_from_slice(&FRAME_HEADER);
        audio.resize(audio.len() + FRAME_LEN - FRAME_HEADER.len(), 0);
    }
    audio
}

/// How many [`SILENCE_UNIT`] clips approximate `duration`.
///
/// Rounds to the nearest unit; any positive duration yields at least one.
pub fn unit_repeats(duration: Duration) -> usize {
    if duration.is_zero() {
        return 0;
    }
    let unit = SILENCE_UNIT.as_millis();
    ((duration.as_millis() + unit / 2) / unit).max(1) as usize
}
