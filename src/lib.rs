//! **phonic-scrub** is a real-time audio scrubbing engine.
//!
//! It renders a smooth, glitch free audio stream which follows an arbitrary, continuously
//! changing playhead position in a (possibly long) audio source, as done when dragging the
//! playhead of an audio or video editor's timeline.
//!
//! The source is decoded in small chunks on demand, so it never needs to live in memory as
//! a whole. Overlapping, Hann windowed grains are spawned at an interpolated playhead
//! position, using grain durations which adapt to the scrub speed.
//!
//! ### Example
//!
//! ```rust,no_run
//! use phonic_scrub::{FileScrubDecoder, Scrubber, ScrubberOptions};
//!
//! # fn main() -> Result<(), phonic_scrub::Error> {
//! let decoder = FileScrubDecoder::from_file("path/to/some/file.wav")?;
//! let mut scrubber = Scrubber::new(decoder, 48000, 2, 0.0, ScrubberOptions::default())?;
//!
//! // control the scrubber from e.g. the UI thread
//! let handle = scrubber.handle();
//! handle.set_is_scrubbing(true);
//! handle.set_playhead_time(2.5);
//!
//! // render the scrubbed audio in the audio thread
//! let mut output = vec![0.0; 512 * 2];
//! scrubber.render_audio(&mut output);
//! # Ok(())
//! # }
//! ```

// private mods (will be partly re-exported)
mod error;
mod scrubber;

// public, flat re-exports
pub use error::Error;

pub use decoder::{buffer::BufferScrubDecoder, file::FileScrubDecoder, ScrubDecoder};
pub use scrubber::{Scrubber, ScrubberHandle, ScrubberOptions, GRAIN_DURATION_LIMITS};
pub use utils::resampler::ResamplingQuality;

// public mods
pub mod decoder;
pub mod utils;
