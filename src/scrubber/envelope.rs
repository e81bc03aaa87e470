//! Precomputed Hann window, which amplitude shapes every grain.

use std::sync::LazyLock;

// -------------------------------------------------------------------------------------------------

/// Envelope table resolution, must be a pow2 value.
const ENVELOPE_SIZE: usize = 2048;

const _VERIFY_ENVELOPE_SIZE: () = assert!(
    ENVELOPE_SIZE.is_power_of_two(),
    "Grain envelope size must be a pow2 value"
);

/// Precomputed symmetric Hann window lookup table.
///
/// The table holds `SIZE + 1` points, so both window ends are exactly zero and window halves
/// which are `SIZE / 2` points apart exactly sum up to one: grains which overlap by 50% cross-fade
/// with a constant gain.
pub(crate) struct GrainEnvelope {
    lut: [f32; ENVELOPE_SIZE + 1],
}

impl GrainEnvelope {
    const SIZE: usize = ENVELOPE_SIZE;

    pub fn new() -> Self {
        let mut lut = [0.0; ENVELOPE_SIZE + 1];
        for (i, value) in lut.iter_mut().enumerate() {
            let phase = i as f64 / Self::SIZE as f64; // [0.0, 1.0]
            *value = (0.5 * (1.0 - (2.0 * std::f64::consts::PI * phase).cos())) as f32;
        }
        Self { lut }
    }

    /// Evaluate the window at normalized phase [0.0, 1.0] with linear interpolation.
    #[inline]
    pub fn sample(&self, phase: f64) -> f32 {
        debug_assert!((0.0..=1.0).contains(&phase), "Invalid phase: {phase}");

        let index_float = phase.clamp(0.0, 1.0) * Self::SIZE as f64;
        let index = (index_float as usize).min(Self::SIZE - 1);
        let fraction = (index_float - index as f64) as f32;
        self.lut[index] * (1.0 - fraction) + self.lut[index + 1] * fraction
    }

    /// Window amplitude of the given frame in a grain of `duration` frames.
    #[inline]
    pub fn sample_frame(&self, frame: usize, duration: usize) -> f32 {
        debug_assert!(duration > 0, "Invalid grain duration");
        self.sample(frame as f64 / duration as f64)
    }
}

/// Static, shared envelope lookup table.
pub(crate) static GRAIN_ENVELOPE: LazyLock<GrainEnvelope> = LazyLock::new(GrainEnvelope::new);

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_shape() {
        let envelope = &*GRAIN_ENVELOPE;
        assert_eq!(envelope.sample(0.0), 0.0);
        assert!(envelope.sample(1.0).abs() < 1e-6);
        assert!((envelope.sample(0.5) - 1.0).abs() < 1e-6);
        // symmetric
        for phase in [0.1, 0.25, 0.333, 0.49] {
            assert!((envelope.sample(phase) - envelope.sample(1.0 - phase)).abs() < 1e-4);
        }
    }

    #[test]
    fn overlap_add_sums_to_one() {
        let envelope = &*GRAIN_ENVELOPE;
        let duration = 4800;
        let half = duration / 2;
        for frame in (0..half).step_by(7) {
            let sum = envelope.sample_frame(frame, duration)
                + envelope.sample_frame(frame + half, duration);
            assert!((sum - 1.0).abs() < 1e-4, "sum at {frame} is {sum}");
        }
    }
}
