//! Decoding of fixed duration chunks from a scrubbed audio source.

use std::time::Duration;

use crate::{
    utils::{
        buffer::map_channels,
        frames_to_seconds,
        resampler::{
            new_resampler, resample_buffer, AudioResampler, ResamplingQuality, ResamplingSpecs,
        },
        seconds_to_frames,
    },
    Error,
};

pub mod buffer;
pub mod file;

// -------------------------------------------------------------------------------------------------

/// A seekable, decodable audio source which can be scrubbed.
///
/// Implementations only need to deliver interleaved PCM at the source's own sample rate and
/// channel layout. Channel mapping and sample rate conversion is done by the [`ChunkDecoder`].
pub trait ScrubDecoder: Send + 'static {
    /// Sample rate of the decoded PCM.
    fn sample_rate(&self) -> u32;
    /// Channel count of the decoded, interleaved PCM.
    fn channel_count(&self) -> usize;
    /// Total duration of the source.
    fn duration(&self) -> Duration;

    /// Seek to `position` and read up to `frame_count` interleaved frames into `output`,
    /// replacing its content. Returns the number of frames read, which may be less than
    /// `frame_count` at the end of the source.
    fn read_frames(
        &mut self,
        position: Duration,
        frame_count: usize,
        output: &mut Vec<f32>,
    ) -> Result<usize, Error>;
}

// -------------------------------------------------------------------------------------------------

/// Decodes fixed duration chunks from a [`ScrubDecoder`] and converts them to the output's
/// sample rate and channel layout.
pub struct ChunkDecoder {
    decoder: Box<dyn ScrubDecoder>,
    output_sample_rate: u32,
    output_channel_count: usize,
    chunk_duration: f64,
    resampler: Option<(Box<dyn AudioResampler>, ResamplingSpecs)>,
    source_buffer: Vec<f32>,
    mapped_buffer: Vec<f32>,
}

impl ChunkDecoder {
    pub fn new(
        decoder: Box<dyn ScrubDecoder>,
        output_sample_rate: u32,
        output_channel_count: usize,
        chunk_duration: f64,
        resampling_quality: ResamplingQuality,
    ) -> Result<Self, Error> {
        if decoder.sample_rate() == 0 || decoder.channel_count() == 0 {
            return Err(Error::ParameterError(format!(
                "invalid source signal: {} channels at {} Hz",
                decoder.channel_count(),
                decoder.sample_rate()
            )));
        }
        if decoder.duration().is_zero() {
            return Err(Error::ParameterError("source has no duration".to_string()));
        }
        if output_sample_rate == 0 || output_channel_count == 0 {
            return Err(Error::ParameterError(format!(
                "invalid output signal: {output_channel_count} channels at {output_sample_rate} Hz",
            )));
        }
        if chunk_duration <= 0.0 || !chunk_duration.is_finite() {
            return Err(Error::ParameterError(format!(
                "invalid chunk duration: {chunk_duration}"
            )));
        }
        let resampler = if decoder.sample_rate() != output_sample_rate {
            let specs = ResamplingSpecs::new(
                decoder.sample_rate(),
                output_sample_rate,
                output_channel_count,
            );
            Some((new_resampler(specs, resampling_quality)?, specs))
        } else {
            None
        };
        let source_frames = seconds_to_frames(chunk_duration, decoder.sample_rate());
        let source_buffer = Vec::with_capacity(source_frames * decoder.channel_count());
        let mapped_buffer = Vec::with_capacity(source_frames * output_channel_count);
        Ok(Self {
            decoder,
            output_sample_rate,
            output_channel_count,
            chunk_duration,
            resampler,
            source_buffer,
            mapped_buffer,
        })
    }

    /// Sample rate of the wrapped source.
    pub fn source_sample_rate(&self) -> u32 {
        self.decoder.sample_rate()
    }

    /// Duration of the wrapped source in seconds.
    pub fn source_duration(&self) -> f64 {
        self.decoder.duration().as_secs_f64()
    }

    /// Duration of the wrapped source in output sample frames.
    pub fn source_frame_count(&self) -> usize {
        seconds_to_frames(self.source_duration(), self.output_sample_rate)
    }

    /// Channel count of the decoded chunks.
    pub fn output_channel_count(&self) -> usize {
        self.output_channel_count
    }

    /// Nominal length of a decoded chunk in interleaved output samples. Decoded chunks may be
    /// a bit shorter or longer after sample rate conversion, and are shorter at the source's end.
    pub fn nominal_chunk_len(&self) -> usize {
        seconds_to_frames(self.chunk_duration, self.output_sample_rate) * self.output_channel_count
    }

    /// Decode a single chunk starting at the given source time in seconds into `pcm`,
    /// replacing its content. Returns the number of output frames in `pcm`.
    pub fn decode_chunk(&mut self, seek_time: f64, pcm: &mut Vec<f32>) -> Result<usize, Error> {
        pcm.clear();
        if seek_time < 0.0 || seek_time >= self.source_duration() {
            return Ok(0);
        }
        let source_sample_rate = self.decoder.sample_rate();
        let source_channel_count = self.decoder.channel_count();
        let source_frames = seconds_to_frames(self.chunk_duration, source_sample_rate);

        let frames_read = self.decoder.read_frames(
            Duration::from_secs_f64(seek_time),
            source_frames,
            &mut self.source_buffer,
        )?;
        self.source_buffer.truncate(frames_read * source_channel_count);
        if frames_read < source_frames {
            log::debug!(
                "Decoded a short chunk at {seek_time:.3}s: {frames_read} of {source_frames} frames"
            );
        }

        match &mut self.resampler {
            Some((resampler, specs)) => {
                self.mapped_buffer.clear();
                map_channels(
                    &self.source_buffer,
                    source_channel_count,
                    &mut self.mapped_buffer,
                    self.output_channel_count,
                );
                resample_buffer(resampler.as_mut(), *specs, &self.mapped_buffer, pcm)
            }
            None => {
                map_channels(
                    &self.source_buffer,
                    source_channel_count,
                    pcm,
                    self.output_channel_count,
                );
                Ok(pcm.len() / self.output_channel_count)
            }
        }
    }

    /// Source time in seconds of the given output frame.
    pub fn frame_to_seconds(&self, frame: usize) -> f64 {
        frames_to_seconds(frame, self.output_sample_rate)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{buffer::BufferScrubDecoder, *};

    fn ramp_decoder(sample_rate: u32, channel_count: usize, seconds: usize) -> BufferScrubDecoder {
        let frames = sample_rate as usize * seconds;
        let buffer = (0..frames * channel_count)
            .map(|i| (i / channel_count) as f32 / frames as f32)
            .collect::<Vec<_>>();
        BufferScrubDecoder::new(Arc::new(buffer), sample_rate, channel_count).unwrap()
    }

    #[test]
    fn decode_without_conversion() {
        let decoder = ramp_decoder(48000, 2, 3);
        let mut chunk_decoder =
            ChunkDecoder::new(Box::new(decoder), 48000, 2, 1.0, ResamplingQuality::Default)
                .unwrap();
        assert_eq!(chunk_decoder.nominal_chunk_len(), 48000 * 2);
        assert_eq!(chunk_decoder.source_frame_count(), 48000 * 3);

        let mut pcm = Vec::new();
        let frames = chunk_decoder.decode_chunk(1.0, &mut pcm).unwrap();
        assert_eq!(frames, 48000);
        assert_eq!(pcm.len(), 48000 * 2);
        assert!((pcm[0] - 1.0 / 3.0).abs() < 0.0001);

        // short final chunk
        let frames = chunk_decoder.decode_chunk(2.5, &mut pcm).unwrap();
        assert_eq!(frames, 24000);

        // beyond the source's end
        let frames = chunk_decoder.decode_chunk(3.0, &mut pcm).unwrap();
        assert_eq!(frames, 0);
        assert!(pcm.is_empty());
    }

    #[test]
    fn decode_with_conversion() {
        let decoder = ramp_decoder(44100, 1, 2);
        let mut chunk_decoder =
            ChunkDecoder::new(Box::new(decoder), 48000, 2, 0.5, ResamplingQuality::Default)
                .unwrap();
        assert_eq!(chunk_decoder.source_sample_rate(), 44100);

        let mut pcm = Vec::new();
        let frames = chunk_decoder.decode_chunk(0.5, &mut pcm).unwrap();
        assert_eq!(frames, 24000);
        assert_eq!(pcm.len(), 24000 * 2);
        // mono is copied to both channels
        assert_eq!(pcm[100], pcm[101]);
        assert!((pcm[100] - 0.25).abs() < 0.01);
    }

    #[test]
    fn invalid_configurations() {
        assert!(ChunkDecoder::new(
            Box::new(ramp_decoder(44100, 1, 1)),
            0,
            2,
            1.0,
            ResamplingQuality::Default
        )
        .is_err());
        assert!(ChunkDecoder::new(
            Box::new(ramp_decoder(44100, 1, 1)),
            48000,
            2,
            0.0,
            ResamplingQuality::Default
        )
        .is_err());
    }
}
