//! AudioResampler trait for resampling interleaved decode chunks.

use crate::Error;

pub(crate) mod cubic;
pub(crate) mod rubato;

// -------------------------------------------------------------------------------------------------

/// The resampler quality decoded chunks are converted to the output rate with.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum ResamplingQuality {
    /// Simple and fast, non bandlimited cubic interpolation. Downsampling may cause aliasing,
    /// which usually is fine for scrubbing.
    #[default]
    Default,
    /// HQ resampling performed via bandlimited `rubato` resampler. Decoding chunks gets a lot
    /// more expensive with this mode.
    HighQuality,
}

// -------------------------------------------------------------------------------------------------

/// AudioResampler specs.
#[derive(Copy, Clone, Debug)]
pub struct ResamplingSpecs {
    pub input_rate: u32,
    pub output_rate: u32,
    pub channel_count: usize,
}

impl ResamplingSpecs {
    pub fn new(input_rate: u32, output_rate: u32, channel_count: usize) -> Self {
        Self {
            input_rate,
            output_rate,
            channel_count,
        }
    }

    pub fn input_ratio(&self) -> f64 {
        self.input_rate as f64 / self.output_rate as f64
    }
    pub fn output_ratio(&self) -> f64 {
        self.output_rate as f64 / self.input_rate as f64
    }
}

// -------------------------------------------------------------------------------------------------

/// Audio resampler interface.
///
/// Depending on the implementation, there might be an constrain on the input buffer size which
/// is fed into the resampler in order to process something. Outputs never should have such
/// constrains.
pub trait AudioResampler: Send {
    /// required input buffer length in samples in order to process some output.
    fn required_input_buffer_size(&self) -> Option<usize>;

    /// process interleaved input samples to the given interleaved output buffers.
    /// Input buffer size must fit the given required_input_buffer_size constrain, if there is
    /// some. Resamplers may consume nothing when they still have pending outputs.
    /// returns ResamplerError or (input_consumed, output_written) on success.
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<(usize, usize), Error>;

    /// Reset internal resampler state. Make an existing resampler ready for a new chunk.
    fn reset(&mut self);
}

/// Create a new resampler for the given specs and quality.
pub fn new_resampler(
    specs: ResamplingSpecs,
    quality: ResamplingQuality,
) -> Result<Box<dyn AudioResampler>, Error> {
    Ok(match quality {
        ResamplingQuality::Default => Box::new(cubic::CubicResampler::new(specs)?),
        ResamplingQuality::HighQuality => Box::new(rubato::RubatoResampler::new(specs)?),
    })
}

// -------------------------------------------------------------------------------------------------

/// Resample an entire interleaved input buffer into `output`, which gets resized to the
/// expected output length. The resampler gets reset before processing and is flushed with
/// silence at the end, so it's latency free.
///
/// Returns the number of output frames written.
pub fn resample_buffer(
    resampler: &mut dyn AudioResampler,
    specs: ResamplingSpecs,
    input: &[f32],
    output: &mut Vec<f32>,
) -> Result<usize, Error> {
    let channel_count = specs.channel_count;
    debug_assert!(input.len() % channel_count == 0);

    let input_frames = input.len() / channel_count;
    let output_frames = (input_frames as f64 * specs.output_ratio()).round() as usize;
    output.clear();
    output.resize(output_frames * channel_count, 0.0);
    if output_frames == 0 {
        return Ok(0);
    }

    resampler.reset();

    // fixed size inputs need to be padded, the last input must be padded with silence
    const PADDING_FRAMES: usize = 64;
    let padding_len = resampler
        .required_input_buffer_size()
        .unwrap_or(PADDING_FRAMES * channel_count);
    let mut padded_input = vec![0.0; padding_len];

    let mut input_pos = 0;
    let mut output_pos = 0;
    let mut stalled_runs = 0;
    while output_pos < output.len() {
        let remaining_input = &input[input_pos..];
        let chunk = match resampler.required_input_buffer_size() {
            Some(required) if remaining_input.len() >= required => &remaining_input[..required],
            _ if remaining_input.len() >= padded_input.len() => remaining_input,
            _ => {
                padded_input[..remaining_input.len()].copy_from_slice(remaining_input);
                padded_input[remaining_input.len()..].fill(0.0);
                &padded_input[..]
            }
        };
        let (consumed, written) = resampler.process(chunk, &mut output[output_pos..])?;
        input_pos = (input_pos + consumed).min(input.len());
        output_pos += written;
        if consumed == 0 && written == 0 {
            stalled_runs += 1;
            if stalled_runs > 4 {
                log::warn!(
                    "Resampler stalled: wrote {output_pos} of {} samples",
                    output.len()
                );
                break;
            }
        } else {
            stalled_runs = 0;
        }
    }
    output.truncate(output_pos);
    Ok(output_pos / channel_count)
}

// -------------------------------------------------------------------------------------------------
