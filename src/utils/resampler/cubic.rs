use super::{AudioResampler, ResamplingSpecs};
use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Interpolate a single channel of interleaved audio with cubic interpolation.
#[derive(Clone)]
struct CubicInterpolator {
    history: [f32; 4],
    position: f64,
    ratio: f64,
}

impl CubicInterpolator {
    /// Number of input samples which need to be pushed before the first output can be produced.
    const PRELOAD_SAMPLES: f64 = 3.0;

    pub fn new(ratio: f64) -> Self {
        debug_assert!(ratio > 0.0, "Invalid resampling ratio");
        Self {
            history: [0.0; 4],
            position: Self::PRELOAD_SAMPLES,
            ratio,
        }
    }

    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.position = Self::PRELOAD_SAMPLES;
    }

    pub fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        channel_index: usize,
        channel_count: usize,
    ) -> (usize, usize) {
        debug_assert!(input.len() % channel_count == 0);
        debug_assert!(output.len() % channel_count == 0);

        let mut input_frames = input.iter().skip(channel_index).step_by(channel_count);
        let mut num_consumed = 0;
        let mut num_produced = 0;

        'outer: for sample in output.iter_mut().skip(channel_index).step_by(channel_count) {
            while self.position >= 1.0 {
                match input_frames.next() {
                    Some(value) => {
                        self.push_sample(*value);
                        num_consumed += 1;
                        self.position -= 1.0;
                    }
                    None => break 'outer,
                }
            }
            *sample = self.interpolate(self.position as f32);
            num_produced += 1;
            self.position += self.ratio;
        }

        (num_consumed * channel_count, num_produced * channel_count)
    }

    #[inline]
    fn push_sample(&mut self, new_value: f32) {
        self.history.rotate_right(1);
        self.history[0] = new_value;
    }

    #[inline]
    fn interpolate(&self, fraction: f32) -> f32 {
        debug_assert!((0.0..=1.0).contains(&fraction));

        // 4-point, 3rd-order Hermite interpolation (x-form) between y0 and y1, from "Polynomial
        // Interpolators for High-Quality Resampling of Oversampled Audio" by Olli Niemitalo.
        let ym1 = self.history[3];
        let y0 = self.history[2];
        let y1 = self.history[1];
        let y2 = self.history[0];
        let c0 = y0;
        let c1 = (y1 - ym1) * 0.5;
        let c2 = ym1 - y0 * 2.5 + y1 * 2.0 - y2 * 0.5;
        let c3 = (y2 - ym1) * 0.5 + (y0 - y1) * 1.5;
        ((c3 * fraction + c2) * fraction + c1) * fraction + c0
    }
}

// -------------------------------------------------------------------------------------------------

/// Simple cubic interpolater without bandlimiting. Designed to sound good while being fast and
/// not necessarily as HQ as possible. Suitable for decoding chunks in the audio thread.
pub struct CubicResampler {
    interpolators: Vec<CubicInterpolator>,
}

impl CubicResampler {
    pub fn new(spec: ResamplingSpecs) -> Result<Self, Error> {
        if spec.input_rate == 0 || spec.output_rate == 0 || spec.channel_count == 0 {
            return Err(Error::ParameterError(format!(
                "invalid resampling specs: {spec:?}"
            )));
        }
        Ok(Self {
            interpolators: vec![CubicInterpolator::new(spec.input_ratio()); spec.channel_count],
        })
    }
}

impl AudioResampler for CubicResampler {
    fn required_input_buffer_size(&self) -> Option<usize> {
        None
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(usize, usize), Error> {
        let channel_count = self.interpolators.len();
        let mut result = (0, 0);
        for (channel_index, interpolator) in self.interpolators.iter_mut().enumerate() {
            result = interpolator.process(input, output, channel_index, channel_count);
        }
        Ok(result)
    }

    fn reset(&mut self) {
        for interpolator in &mut self.interpolators {
            interpolator.reset();
        }
    }
}

// -------------------------------------------------------------------------------------------------
