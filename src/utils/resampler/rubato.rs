use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::{
    utils::{
        buffer::{interleaved_to_planar, planar_to_interleaved},
        resampler::{AudioResampler, ResamplingSpecs},
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// `AudioResampler` impl which is using a bandlimited SincFixedIn `rubato` resampler.
///
/// The resampler's delay is compensated: the first `output_delay` frames after a reset are
/// dropped, so outputs line up with the inputs.
pub struct RubatoResampler {
    spec: ResamplingSpecs,
    resampler: SincFixedIn<f32>,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
    pending: Vec<f32>,
    pending_pos: usize,
    delay_frames: usize,
}

impl RubatoResampler {
    const CHUNK_SIZE: usize = 256;

    pub fn new(spec: ResamplingSpecs) -> Result<Self, Error> {
        if spec.input_rate == 0 || spec.output_rate == 0 || spec.channel_count == 0 {
            return Err(Error::ParameterError(format!(
                "invalid resampling specs: {spec:?}"
            )));
        }
        let parameters = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };
        let resampler = SincFixedIn::new(
            spec.output_ratio(),
            1.0,
            parameters,
            Self::CHUNK_SIZE,
            spec.channel_count,
        )
        .map_err(|err| Error::ResamplingError(Box::new(err)))?;

        let input = resampler.input_buffer_allocate(true);
        let output = resampler.output_buffer_allocate(true);
        let pending = Vec::with_capacity(resampler.output_frames_max() * spec.channel_count);
        let pending_pos = 0;
        let delay_frames = resampler.output_delay();
        Ok(Self {
            spec,
            resampler,
            input,
            output,
            pending,
            pending_pos,
            delay_frames,
        })
    }
}

impl AudioResampler for RubatoResampler {
    fn required_input_buffer_size(&self) -> Option<usize> {
        Some(Self::CHUNK_SIZE * self.spec.channel_count)
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(usize, usize), Error> {
        let channel_count = self.spec.channel_count;

        // resample a new chunk when all pending outputs got consumed
        let mut consumed = 0;
        if self.pending_pos >= self.pending.len() {
            debug_assert_eq!(
                input.len(),
                Self::CHUNK_SIZE * channel_count,
                "invalid input buffer size"
            );
            interleaved_to_planar(input, &mut self.input);
            let (_, frames_written) = self
                .resampler
                .process_into_buffer(&self.input, &mut self.output, None)
                .map_err(|err| Error::ResamplingError(Box::new(err)))?;
            consumed = input.len();

            self.pending.resize(frames_written * channel_count, 0.0);
            for channel in self.output.iter_mut() {
                channel.truncate(frames_written);
            }
            planar_to_interleaved(&self.output, &mut self.pending);
            for channel in self.output.iter_mut() {
                channel.resize(self.resampler.output_frames_max(), 0.0);
            }

            // skip resampler delay
            let skipped_frames = self.delay_frames.min(frames_written);
            self.delay_frames -= skipped_frames;
            self.pending_pos = skipped_frames * channel_count;
        }

        let available = &self.pending[self.pending_pos..];
        let written = available.len().min(output.len());
        output[..written].copy_from_slice(&available[..written]);
        self.pending_pos += written;

        Ok((consumed, written))
    }

    fn reset(&mut self) {
        self.resampler.reset();
        self.pending.clear();
        self.pending_pos = 0;
        self.delay_frames = self.resampler.output_delay();
    }
}

