//! Grain scheduling and rendering for the scrubber.

use super::{chunks::DecodedChunkCache, envelope::GRAIN_ENVELOPE};

// -------------------------------------------------------------------------------------------------

/// Map a scrub velocity to a grain duration in seconds.
///
/// Velocities in range `[0, lerp_duration]` map linearly to `[max, min]` of the given duration
/// range: a still playhead plays long grains, fast scrubbing short ones.
pub(crate) fn grain_duration(velocity: f64, lerp_duration: f64, range: (f64, f64)) -> f64 {
    let (min, max) = range;
    let amount = if lerp_duration > 0.0 {
        (velocity / lerp_duration).clamp(0.0, 1.0)
    } else {
        1.0
    };
    max + (min - max) * amount
}

// -------------------------------------------------------------------------------------------------

/// A single windowed voice, which reads from a decoded chunk.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Grain {
    /// Number of frames this grain rendered so far.
    rendered_frames: usize,
    /// Index of the chunk in the chunk cache this grain currently reads from.
    chunk_index: usize,
    /// Absolute output frame in the source this grain reads next.
    read_frame: usize,
    /// Total length of the grain in frames.
    duration_frames: usize,
}

impl Grain {
    #[cfg(test)]
    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    #[cfg(test)]
    pub fn read_frame(&self) -> usize {
        self.read_frame
    }

    pub fn is_finished(&self) -> bool {
        self.rendered_frames >= self.duration_frames
    }

    fn remaining_frames(&self) -> usize {
        self.duration_frames.saturating_sub(self.rendered_frames)
    }

    fn advance(&mut self, frames: usize) {
        self.rendered_frames += frames;
        self.read_frame += frames;
    }
}

// -------------------------------------------------------------------------------------------------

/// Result of rendering a single grain into a span of the output buffer.
enum GrainRenderResult {
    /// The grain still plays or just finished and still holds its chunk reference.
    Playing,
    /// The grain lost its chunk and must be dropped. Its chunk reference already was released.
    Aborted,
}

// -------------------------------------------------------------------------------------------------

/// Spawns and mixes overlapping grains, following the scrubber's playhead.
///
/// A new grain gets spawned every half grain duration, so Hann windowed grains overlap by
/// 50% and cross-fade with a constant gain. Grains are kept in spawn order, so the first
/// grain always is the oldest one.
pub(crate) struct GrainScheduler {
    grains: Vec<Grain>,
    max_active_grains: usize,
    frames_until_next_spawn: usize,
}

impl GrainScheduler {
    pub fn new(max_active_grains: usize) -> Self {
        debug_assert!(max_active_grains >= 2, "Need at least two grains to cross-fade");
        let max_active_grains = max_active_grains.max(2);
        Self {
            grains: Vec::with_capacity(max_active_grains),
            max_active_grains,
            frames_until_next_spawn: 0,
        }
    }

    #[cfg(test)]
    pub fn active_grains(&self) -> &[Grain] {
        &self.grains
    }

    pub fn active_grain_count(&self) -> usize {
        self.grains.len()
    }

    /// Render `frame_count` frames of grains into the interleaved output buffer, spawning new
    /// grains at the given playhead frame whenever the spawn counter elapses.
    ///
    /// `grain_duration_frames` must be even: its half is the spawn interval.
    pub fn process(
        &mut self,
        cache: &mut DecodedChunkCache,
        output: &mut [f32],
        playhead_frame: usize,
        grain_duration_frames: usize,
    ) {
        debug_assert!(
            grain_duration_frames >= 2 && grain_duration_frames % 2 == 0,
            "Invalid grain duration: {grain_duration_frames}"
        );
        let channel_count = cache.channel_count();
        let frame_count = output.len() / channel_count;
        let spawn_interval = (grain_duration_frames / 2).max(1);

        if self.grains.is_empty() {
            self.spawn_grain(cache, playhead_frame, grain_duration_frames);
            self.frames_until_next_spawn = spawn_interval;
        }

        let mut frame_offset = 0;
        while frame_offset < frame_count {
            let span = self.frames_until_next_spawn.min(frame_count - frame_offset);
            self.render_active_grains(cache, output, frame_offset, span);
            frame_offset += span;
            self.frames_until_next_spawn -= span;
            if self.frames_until_next_spawn == 0 {
                self.spawn_grain(cache, playhead_frame, grain_duration_frames);
                self.frames_until_next_spawn = spawn_interval;
            }
        }
    }

    /// Spawn a new grain which starts reading at the given absolute output frame.
    pub fn spawn_grain(
        &mut self,
        cache: &mut DecodedChunkCache,
        start_frame: usize,
        duration_frames: usize,
    ) {
        if self.grains.len() >= self.max_active_grains {
            log::warn!(
                "Reached the maximum of {} active grains: retiring the oldest grain",
                self.max_active_grains
            );
            let oldest = self.grains.remove(0);
            cache.release(oldest.chunk_index);
        }
        let chunk_index = permit_alloc(|| cache.chunk_for(start_frame));
        cache.acquire(chunk_index);
        self.grains.push(Grain {
            rendered_frames: 0,
            chunk_index,
            read_frame: start_frame,
            duration_frames: duration_frames.max(1),
        });
    }

    /// Additively mix all active grains into the frames `[start_frame, start_frame + frame_count)`
    /// of the interleaved output buffer and retire grains which finished.
    pub fn render_active_grains(
        &mut self,
        cache: &mut DecodedChunkCache,
        output: &mut [f32],
        start_frame: usize,
        frame_count: usize,
    ) {
        let channel_count = cache.channel_count();
        debug_assert!(
            (start_frame + frame_count) * channel_count <= output.len(),
            "Output buffer is too small"
        );
        let output =
            &mut output[start_frame * channel_count..(start_frame + frame_count) * channel_count];

        assert_no_alloc(|| {
            let mut grain_index = 0;
            while grain_index < self.grains.len() {
                let grain = &mut self.grains[grain_index];
                match Self::render_grain(grain, cache, output) {
                    GrainRenderResult::Playing if !grain.is_finished() => {
                        grain_index += 1;
                    }
                    GrainRenderResult::Playing => {
                        cache.release(grain.chunk_index);
                        self.grains.remove(grain_index);
                    }
                    GrainRenderResult::Aborted => {
                        self.grains.remove(grain_index);
                    }
                }
            }
        });
    }

    fn render_grain(
        grain: &mut Grain,
        cache: &mut DecodedChunkCache,
        output: &mut [f32],
    ) -> GrainRenderResult {
        let channel_count = cache.channel_count();
        let source_frame_count = cache.source_frame_count();
        let frame_count = output.len() / channel_count;

        let mut frame_offset = 0;
        while frame_offset < frame_count && !grain.is_finished() {
            let frames_left = frame_count - frame_offset;

            // grains which run out of the source play silence until they finished
            if grain.read_frame >= source_frame_count {
                let frames = grain.remaining_frames().min(frames_left);
                grain.advance(frames);
                frame_offset += frames;
                continue;
            }

            let available_frames = cache
                .chunk(grain.chunk_index)
                .frames_from(grain.read_frame, channel_count);
            if available_frames == 0 {
                // roll over to the chunk which continues the grain
                cache.release(grain.chunk_index);
                let chunk_index = permit_alloc(|| cache.chunk_for(grain.read_frame));
                if !cache.chunk(chunk_index).contains(grain.read_frame, channel_count) {
                    permit_alloc(|| {
                        log::error!(
                            "Failed to fetch a chunk for grain at frame {}: retiring grain",
                            grain.read_frame
                        );
                    });
                    return GrainRenderResult::Aborted;
                }
                cache.acquire(chunk_index);
                grain.chunk_index = chunk_index;
                continue;
            }

            let frames = grain
                .remaining_frames()
                .min(available_frames)
                .min(frames_left);
            let samples = &cache
                .chunk(grain.chunk_index)
                .samples_from(grain.read_frame, channel_count)[..frames * channel_count];
            let span = &mut output
                [frame_offset * channel_count..(frame_offset + frames) * channel_count];
            let envelope = &*GRAIN_ENVELOPE;
            for (frame_index, (output_frame, input_frame)) in span
                .chunks_exact_mut(channel_count)
                .zip(samples.chunks_exact(channel_count))
                .enumerate()
            {
                let gain = envelope
                    .sample_frame(grain.rendered_frames + frame_index, grain.duration_frames);
                for (o, i) in output_frame.iter_mut().zip(input_frame) {
                    *o += *i * gain;
                }
            }
            grain.advance(frames);
            frame_offset += frames;
        }

        GrainRenderResult::Playing
    }
}

// -------------------------------------------------------------------------------------------------

#[inline]
fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    #[cfg(feature = "assert-allocs")]
    return assert_no_alloc::assert_no_alloc::<T, F>(func);

    #[cfg(not(feature = "assert-allocs"))]
    return func();
}

#[inline]
fn permit_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    #[cfg(feature = "assert-allocs")]
    return assert_no_alloc::permit_alloc::<T, F>(func);

    #[cfg(not(feature = "assert-allocs"))]
    return func();
}

// -------------------------------------------------------------------------------------------------
