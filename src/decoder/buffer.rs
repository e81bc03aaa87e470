use std::{sync::Arc, time::Duration};

use super::ScrubDecoder;
use crate::{utils::seconds_to_frames, Error};

// -------------------------------------------------------------------------------------------------

/// A [`ScrubDecoder`] which reads from an already decoded, interleaved sample buffer.
///
/// Buffers are shared (wrapped in an Arc), so cloning a decoder is very cheap as this only copies
/// a buffer reference and not the buffer itself.
#[derive(Clone)]
pub struct BufferScrubDecoder {
    buffer: Arc<Vec<f32>>,
    sample_rate: u32,
    channel_count: usize,
}

impl BufferScrubDecoder {
    pub fn new(buffer: Arc<Vec<f32>>, sample_rate: u32, channel_count: usize) -> Result<Self, Error> {
        if sample_rate == 0 || channel_count == 0 {
            return Err(Error::ParameterError(format!(
                "invalid buffer signal: {channel_count} channels at {sample_rate} Hz"
            )));
        }
        if buffer.is_empty() || buffer.len() % channel_count != 0 {
            return Err(Error::ParameterError(format!(
                "invalid buffer length {} for {channel_count} channels",
                buffer.len()
            )));
        }
        Ok(Self {
            buffer,
            sample_rate,
            channel_count,
        })
    }

    fn frame_count(&self) -> usize {
        self.buffer.len() / self.channel_count
    }
}

impl ScrubDecoder for BufferScrubDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    fn read_frames(
        &mut self,
        position: Duration,
        frame_count: usize,
        output: &mut Vec<f32>,
    ) -> Result<usize, Error> {
        output.clear();
        let start = seconds_to_frames(position.as_secs_f64(), self.sample_rate);
        let end = (start + frame_count).min(self.frame_count());
        if start >= end {
            return Ok(0);
        }
        output.extend_from_slice(
            &self.buffer[start * self.channel_count..end * self.channel_count],
        );
        Ok(end - start)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_frames() {
        let buffer = Arc::new((0..20).map(|v| v as f32).collect::<Vec<_>>());
        let mut decoder = BufferScrubDecoder::new(buffer, 10, 2).unwrap();
        assert_eq!(decoder.duration(), Duration::from_secs(1));

        let mut output = Vec::new();
        let read = decoder
            .read_frames(Duration::from_millis(200), 3, &mut output)
            .unwrap();
        assert_eq!(read, 3);
        assert_eq!(output, vec![4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);

        let read = decoder
            .read_frames(Duration::from_millis(800), 5, &mut output)
            .unwrap();
        assert_eq!(read, 2);
        assert_eq!(output.len(), 4);

        let read = decoder
            .read_frames(Duration::from_secs(2), 5, &mut output)
            .unwrap();
        assert_eq!(read, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn invalid_buffers() {
        assert!(BufferScrubDecoder::new(Arc::new(vec![]), 44100, 1).is_err());
        assert!(BufferScrubDecoder::new(Arc::new(vec![0.0; 3]), 44100, 2).is_err());
        assert!(BufferScrubDecoder::new(Arc::new(vec![0.0; 4]), 0, 2).is_err());
    }
}
