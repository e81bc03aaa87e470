use std::{fs::File, io, path::Path, time::Duration};

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use super::ScrubDecoder;
use crate::Error;

// -------------------------------------------------------------------------------------------------

/// A [`ScrubDecoder`] which decodes an audio file or encoded buffer via Symphonia.
///
/// Only the requested chunks get decoded: the file never is loaded into memory as a whole.
/// Seeking expects track timestamps to be sample frames, which is the case for all formats
/// Symphonia can decode.
pub struct FileScrubDecoder {
    track_id: u32, // Internal track index.
    decoder: Box<dyn Decoder>,
    format: Box<dyn FormatReader>,
    sample_rate: u32,
    channel_count: usize,
    total_frames: u64,
    sample_buffer: Option<SampleBuffer<f32>>,
}

impl FileScrubDecoder {
    /// Create a new decoder from the given file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref()).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::MediaFileNotFound,
            _ => Error::IoError(err),
        })?;
        let mut hint = Hint::new();
        if let Some(extension) = path.as_ref().extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }
        let source_stream = MediaSourceStream::new(Box::new(file), Default::default());
        Self::from_source_stream(source_stream, hint)
    }

    /// Create a new decoder from the given encoded buffer.
    pub fn from_buffer(buffer: Vec<u8>) -> Result<Self, Error> {
        let cursor = Box::new(io::Cursor::new(buffer));
        let source_stream = MediaSourceStream::new(cursor, Default::default());
        Self::from_source_stream(source_stream, Hint::new())
    }

    /// Create a new decoder from the given Symphonia MediaSourceStream.
    pub fn from_source_stream(source_stream: MediaSourceStream, hint: Hint) -> Result<Self, Error> {
        // Use the default options when reading and decoding.
        let format_opts: FormatOptions = Default::default();
        let metadata_opts: MetadataOptions = Default::default();
        let decoder_opts: DecoderOptions = Default::default();

        // Probe the media source stream for a format.
        let probed = symphonia::default::get_probe()
            .format(&hint, source_stream, &format_opts, &metadata_opts)
            .map_err(|_| Error::MediaFileProbeError)?;
        let format = probed.format;

        // Get the default track and its signal specs.
        let track = format.default_track().ok_or(Error::MediaFileNotFound)?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or(Error::MediaFileProbeError)?;
        let channel_count = track
            .codec_params
            .channels
            .map(|channels| channels.count())
            .ok_or(Error::MediaFileProbeError)?;
        // scrubbing needs to know the duration upfront
        let total_frames = track
            .codec_params
            .n_frames
            .ok_or(Error::MediaFileProbeError)?;

        // Create a decoder for the track.
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &decoder_opts)
            .map_err(|err| Error::AudioDecodingError(Box::new(err)))?;

        log::debug!(
            "Opened scrub decoder: {channel_count} channels, {sample_rate} Hz, {total_frames} frames"
        );

        Ok(Self {
            track_id,
            decoder,
            format,
            sample_rate,
            channel_count,
            total_frames,
            sample_buffer: None,
        })
    }

    fn seek(&mut self, position: Duration) -> Result<u64, Error> {
        let seeked_to = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: position.as_secs_f64().into(),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|_| Error::MediaFileSeekError)?;
        // decoders must be reset after seeking
        self.decoder.reset();
        Ok(seeked_to.required_ts)
    }
}

impl ScrubDecoder for FileScrubDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_frames as f64 / self.sample_rate as f64)
    }

    fn read_frames(
        &mut self,
        position: Duration,
        frame_count: usize,
        output: &mut Vec<f32>,
    ) -> Result<usize, Error> {
        output.clear();
        let required_ts = self.seek(position)?;
        let channel_count = self.channel_count;
        let required_len = frame_count * channel_count;

        while output.len() < required_len {
            // Demux an encoded packet from the media format.
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    break; // End of this stream.
                }
                Err(err) => {
                    log::error!("Scrub decoder format error: {err}");
                    break; // We cannot recover from format errors, return what we have.
                }
            };
            // If the packet does not belong to the selected track, skip over it.
            if packet.track_id() != self.track_id {
                continue;
            }
            // Decode the packet into an audio buffer.
            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::IoError(err)) => {
                    // The packet failed to decode due to an IO error, skip the packet.
                    log::error!("Scrub decoder I/O error: {err}");
                    continue;
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    // The packet failed to decode due to invalid data, skip the packet.
                    log::error!("Scrub decoder error: {err}");
                    continue;
                }
                Err(err) => {
                    log::error!("Scrub decoder fatal error: {err}");
                    return Err(Error::AudioDecodingError(Box::new(err)));
                }
            };
            // Interleave the samples into our sample buffer, growing it when needed.
            let capacity = decoded.capacity() as u64;
            let spec = *decoded.spec();
            let required_capacity = decoded.capacity() * spec.channels.count();
            if self
                .sample_buffer
                .as_ref()
                .is_none_or(|buffer| buffer.capacity() < required_capacity)
            {
                self.sample_buffer = Some(SampleBuffer::new(capacity, spec));
            }
            let Some(sample_buffer) = self.sample_buffer.as_mut() else {
                continue;
            };
            sample_buffer.copy_interleaved_ref(decoded);

            // Skip frames before the seek target, which accurate seeking may deliver.
            let samples = sample_buffer.samples();
            let skipped_frames = required_ts.saturating_sub(packet.ts()) as usize;
            let skipped_len = (skipped_frames * channel_count).min(samples.len());
            let samples = &samples[skipped_len..];

            let remaining_len = required_len - output.len();
            output.extend_from_slice(&samples[..remaining_len.min(samples.len())]);
        }

        Ok(output.len() / channel_count)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_wav(sample_rate: u32, channel_count: u16, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: channel_count,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for frame in 0..frames {
                for _ in 0..channel_count {
                    writer.write_sample(frame as f32 / frames as f32).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decode_wav_chunks() {
        let mut decoder = FileScrubDecoder::from_buffer(encode_wav(44100, 2, 44100)).unwrap();
        assert_eq!(decoder.sample_rate(), 44100);
        assert_eq!(decoder.channel_count(), 2);
        assert_eq!(decoder.duration(), Duration::from_secs(1));

        let mut output = Vec::new();
        let read = decoder
            .read_frames(Duration::from_millis(500), 1000, &mut output)
            .unwrap();
        assert_eq!(read, 1000);
        assert_eq!(output.len(), 2000);
        assert!((output[0] - 0.5).abs() < 0.001, "first sample is {}", output[0]);

        // seeking backwards again works
        let read = decoder.read_frames(Duration::ZERO, 10, &mut output).unwrap();
        assert_eq!(read, 10);
        assert_eq!(output[0], 0.0);

        // short reads at the end of the file
        let read = decoder
            .read_frames(Duration::from_millis(990), 1000, &mut output)
            .unwrap();
        assert!(read < 1000 && read > 0);
    }

    #[test]
    fn invalid_files() {
        assert!(matches!(
            FileScrubDecoder::from_file("this/file/does/not/exist.wav"),
            Err(Error::MediaFileNotFound)
        ));
        assert!(FileScrubDecoder::from_buffer(vec![0; 128]).is_err());
    }
}
