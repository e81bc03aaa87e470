//! Fixed capacity pool of decoded, reference counted audio chunks.

use crate::decoder::ChunkDecoder;

// -------------------------------------------------------------------------------------------------

/// A decoded buffer of audio at the output's sample rate and channel layout, which covers
/// the source frames `[frame_start, frame_start + frame_count)`.
pub(crate) struct DecodedChunk {
    /// First output rate frame in the source this chunk's audio corresponds to.
    frame_start: usize,
    /// Interleaved output samples. Its length is authoritative: it may be shorter or longer
    /// than the nominal chunk length after rate conversion or at the end of the source.
    pcm: Vec<f32>,
    /// Number of grains which currently read from this chunk.
    ref_count: usize,
}

impl DecodedChunk {
    fn new(capacity: usize) -> Self {
        Self {
            frame_start: 0,
            pcm: Vec::with_capacity(capacity),
            ref_count: 0,
        }
    }

    #[cfg(test)]
    pub fn frame_start(&self) -> usize {
        self.frame_start
    }

    pub fn frame_count(&self, channel_count: usize) -> usize {
        self.pcm.len() / channel_count
    }

    #[cfg(test)]
    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    pub fn is_free(&self) -> bool {
        self.ref_count == 0
    }

    /// True when the chunk's half-open frame window contains `frame`.
    pub fn contains(&self, frame: usize, channel_count: usize) -> bool {
        frame >= self.frame_start && frame < self.frame_start + self.frame_count(channel_count)
    }

    /// Number of frames which can be read from this chunk, starting at `frame`.
    pub fn frames_from(&self, frame: usize, channel_count: usize) -> usize {
        if self.contains(frame, channel_count) {
            self.frame_start + self.frame_count(channel_count) - frame
        } else {
            0
        }
    }

    /// Interleaved samples starting at the given source frame, up to the chunk's end.
    pub fn samples_from(&self, frame: usize, channel_count: usize) -> &[f32] {
        debug_assert!(self.contains(frame, channel_count));
        &self.pcm[(frame - self.frame_start) * channel_count..]
    }
}

// -------------------------------------------------------------------------------------------------

/// A small pool of [`DecodedChunk`]s, which decodes chunks on demand and reuses chunks which
/// no longer are referenced by grains.
///
/// Chunks are referenced by index, so grains don't need to hold references into the pool.
pub(crate) struct DecodedChunkCache {
    decoder: ChunkDecoder,
    chunks: Vec<DecodedChunk>,
    channel_count: usize,
    source_frame_count: usize,
}

impl DecodedChunkCache {
    /// Minimum number of preallocated chunks: two to double-buffer the active grains and
    /// one to decode ahead.
    pub const MIN_CHUNK_COUNT: usize = 3;

    pub fn new(decoder: ChunkDecoder, initial_chunk_count: usize) -> Self {
        let channel_count = decoder.output_channel_count();
        let source_frame_count = decoder.source_frame_count();
        // resampling may produce a few more frames than nominally expected
        let chunk_capacity = decoder.nominal_chunk_len() + 16 * channel_count;
        let chunks = (0..initial_chunk_count.max(Self::MIN_CHUNK_COUNT))
            .map(|_| DecodedChunk::new(chunk_capacity))
            .collect();
        Self {
            decoder,
            chunks,
            channel_count,
            source_frame_count,
        }
    }

    /// Number of allocated chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Duration of the source in output sample frames.
    pub fn source_frame_count(&self) -> usize {
        self.source_frame_count
    }

    pub fn chunk(&self, index: usize) -> &DecodedChunk {
        &self.chunks[index]
    }

    /// Find the first chunk which contains the given output frame, without decoding.
    pub fn find_chunk_for(&self, frame: usize) -> Option<usize> {
        self.chunks
            .iter()
            .position(|chunk| chunk.contains(frame, self.channel_count))
    }

    /// Find or decode a chunk which contains the given output frame.
    ///
    /// When no chunk contains the frame, the first unreferenced chunk gets decoded, or a new
    /// chunk is appended to the pool when all chunks are in use. The returned chunk may not
    /// contain the frame when decoding failed or the frame is beyond the source's end.
    pub fn chunk_for(&mut self, frame: usize) -> usize {
        if let Some(index) = self.find_chunk_for(frame) {
            return index;
        }
        let index = match self.chunks.iter().position(DecodedChunk::is_free) {
            Some(index) => index,
            None => {
                let capacity = self.chunks.first().map_or(0, |chunk| chunk.pcm.capacity());
                self.chunks.push(DecodedChunk::new(capacity));
                log::debug!(
                    "All decode chunks are in use: grew pool to {} chunks",
                    self.chunks.len()
                );
                self.chunks.len() - 1
            }
        };
        self.decode_into(index, frame);
        index
    }

    /// Add a grain reference to the given chunk.
    pub fn acquire(&mut self, index: usize) {
        self.chunks[index].ref_count += 1;
    }

    /// Remove a grain reference from the given chunk.
    pub fn release(&mut self, index: usize) {
        let chunk = &mut self.chunks[index];
        debug_assert!(chunk.ref_count > 0, "Releasing an unreferenced chunk");
        chunk.ref_count = chunk.ref_count.saturating_sub(1);
    }

    fn decode_into(&mut self, index: usize, frame: usize) {
        let chunk = &mut self.chunks[index];
        debug_assert!(chunk.is_free(), "Decoding into a referenced chunk");
        chunk.frame_start = frame;
        let seek_time = self.decoder.frame_to_seconds(frame);
        match self.decoder.decode_chunk(seek_time, &mut chunk.pcm) {
            Ok(frames) => {
                log::debug!("Decoded chunk #{index} at {seek_time:.3}s with {frames} frames");
            }
            Err(err) => {
                log::error!("Failed to decode chunk at {seek_time:.3}s: {err}");
                chunk.pcm.clear();
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
