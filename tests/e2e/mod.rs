// End-to-end tests for the dictation backend API
//
// Each test starts the full router on an ephemeral port. The speech backend is
// scripted in-process and lessons live in memory, so no external services are
// needed and tests run in parallel.

mod helpers;
mod test_admission;
mod test_lessons;
mod test_tts;
