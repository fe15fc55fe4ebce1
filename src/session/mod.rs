//! Exclusive recording and playback sessions.

pub mod playback;
pub mod recording;

pub use playback::{PlaybackSession, PlaybackState};
pub use recording::{RecordingSession, RecordingState};
