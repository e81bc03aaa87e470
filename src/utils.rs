//! Buffer and resampling helpers used by the decoder adapter and the grain renderer.

pub mod buffer;
pub mod resampler;

// -------------------------------------------------------------------------------------------------

/// Convert a time in seconds to sample frames at the given sample rate, rounding to the nearest
/// frame, so frame -> seconds -> frame conversions are lossless.
#[inline]
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    debug_assert!(sample_rate > 0, "Invalid sample rate");
    (seconds.max(0.0) * sample_rate as f64).round() as usize
}

/// Convert a number of sample frames to seconds at the given sample rate.
#[inline]
pub fn frames_to_seconds(frames: usize, sample_rate: u32) -> f64 {
    debug_assert!(sample_rate > 0, "Invalid sample rate");
    frames as f64 / sample_rate as f64
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_conversion() {
        assert_eq!(seconds_to_frames(1.0, 48000), 48000);
        assert_eq!(seconds_to_frames(-1.0, 48000), 0);
        assert_eq!(seconds_to_frames(0.5, 44100), 22050);
        for frame in [37, 1001, 44099, 480001] {
            assert_eq!(seconds_to_frames(frames_to_seconds(frame, 48000), 48000), frame);
        }
        assert!((frames_to_seconds(24000, 48000) - 0.5).abs() < 1e-12);
    }
}
