//! Granular scrub playback of a seekable audio source.

use std::sync::{Arc, Mutex};

use crate::{
    decoder::{ChunkDecoder, ScrubDecoder},
    utils::{frames_to_seconds, resampler::ResamplingQuality, seconds_to_frames},
    Error,
};

// -------------------------------------------------------------------------------------------------

pub(crate) mod chunks;
pub(crate) mod envelope;
pub(crate) mod grain;
pub(crate) mod playhead;

use chunks::DecodedChunkCache;
use grain::{grain_duration, GrainScheduler};
use playhead::{
    clamp_grain_duration_range, wrap_time, PlayheadController, PlayheadSettings, ScrubTargets,
};

pub use playhead::{ScrubberHandle, GRAIN_DURATION_LIMITS};

// -------------------------------------------------------------------------------------------------

/// Options to configure a [`Scrubber`].
#[derive(Debug, Clone, Copy)]
pub struct ScrubberOptions {
    /// By default 1 second. Duration of a single decoded chunk in seconds. Must be at least
    /// as long as the longest possible grain.
    pub chunk_duration: f64,

    /// By default 3. Number of decode chunks which are allocated upfront. More chunks get
    /// allocated on the fly only when all chunks are in use.
    pub initial_chunk_count: usize,

    /// By default 0.2 seconds. Time in which the interpolated playhead reaches a new target.
    pub lerp_duration: f64,

    /// By default 0.5 seconds. Playhead changes larger than this are treated as jumps and are
    /// applied without interpolation.
    pub jump_threshold: f64,

    /// By default 0.001 seconds. Playhead movements below this are treated as stationary.
    pub stationary_epsilon: f64,

    /// By default 0.1 seconds. Time after which a stationary playhead mutes the scrubber,
    /// unless `scrub_while_stationary` is enabled.
    pub stationary_grace: f64,

    /// By default 0.05 to 0.4 seconds. Grain durations for fast and slow scrubbing.
    pub grain_duration_range: (f64, f64),

    /// By default 8. Upper limit for overlapping grains. When exceeded, the oldest grain
    /// gets retired.
    pub max_active_grains: usize,

    /// By default [`ResamplingQuality::Default`]. Resampler quality used when the source's
    /// sample rate differs from the output's sample rate.
    pub resampling_quality: ResamplingQuality,

    /// By default false. When true, keep playing grains while the playhead does not move.
    pub scrub_while_stationary: bool,
}

impl Default for ScrubberOptions {
    fn default() -> Self {
        Self {
            chunk_duration: 1.0,
            initial_chunk_count: DecodedChunkCache::MIN_CHUNK_COUNT,
            lerp_duration: 0.2,
            jump_threshold: 0.5,
            stationary_epsilon: 0.001,
            stationary_grace: 0.1,
            grain_duration_range: (0.05, 0.4),
            max_active_grains: 8,
            resampling_quality: ResamplingQuality::Default,
            scrub_while_stationary: false,
        }
    }
}

impl ScrubberOptions {
    pub fn chunk_duration(mut self, seconds: f64) -> Self {
        self.chunk_duration = seconds;
        self
    }

    pub fn initial_chunk_count(mut self, count: usize) -> Self {
        self.initial_chunk_count = count;
        self
    }

    pub fn lerp_duration(mut self, seconds: f64) -> Self {
        self.lerp_duration = seconds;
        self
    }

    pub fn jump_threshold(mut self, seconds: f64) -> Self {
        self.jump_threshold = seconds;
        self
    }

    pub fn stationary_epsilon(mut self, seconds: f64) -> Self {
        self.stationary_epsilon = seconds;
        self
    }

    pub fn stationary_grace(mut self, seconds: f64) -> Self {
        self.stationary_grace = seconds;
        self
    }

    /// Set the grain duration range. Both values get clamped to [`GRAIN_DURATION_LIMITS`].
    pub fn grain_duration_range(mut self, min: f64, max: f64) -> Self {
        self.grain_duration_range = clamp_grain_duration_range(min, max);
        self
    }

    pub fn max_active_grains(mut self, count: usize) -> Self {
        self.max_active_grains = count;
        self
    }

    pub fn resampling_quality(mut self, quality: ResamplingQuality) -> Self {
        self.resampling_quality = quality;
        self
    }

    pub fn scrub_while_stationary(mut self, enabled: bool) -> Self {
        self.scrub_while_stationary = enabled;
        self
    }

    /// Validate all parameters. Returns Error::ParameterError on errors.
    pub fn validate(&self) -> Result<(), Error> {
        let is_positive = |value: f64| value.is_finite() && value > 0.0;
        let is_not_negative = |value: f64| value.is_finite() && value >= 0.0;

        if !is_positive(self.chunk_duration) || self.chunk_duration < GRAIN_DURATION_LIMITS.1 {
            return Err(Error::ParameterError(format!(
                "scrubber options 'chunk_duration' value is '{}', must be >= {}",
                self.chunk_duration, GRAIN_DURATION_LIMITS.1
            )));
        }
        if self.initial_chunk_count < DecodedChunkCache::MIN_CHUNK_COUNT {
            return Err(Error::ParameterError(format!(
                "scrubber options 'initial_chunk_count' value is '{}', must be >= {}",
                self.initial_chunk_count,
                DecodedChunkCache::MIN_CHUNK_COUNT
            )));
        }
        if !is_not_negative(self.lerp_duration) {
            return Err(Error::ParameterError(format!(
                "scrubber options 'lerp_duration' value is '{}'",
                self.lerp_duration
            )));
        }
        if !is_positive(self.jump_threshold) {
            return Err(Error::ParameterError(format!(
                "scrubber options 'jump_threshold' value is '{}'",
                self.jump_threshold
            )));
        }
        if !is_not_negative(self.stationary_epsilon) {
            return Err(Error::ParameterError(format!(
                "scrubber options 'stationary_epsilon' value is '{}'",
                self.stationary_epsilon
            )));
        }
        if !is_not_negative(self.stationary_grace) {
            return Err(Error::ParameterError(format!(
                "scrubber options 'stationary_grace' value is '{}'",
                self.stationary_grace
            )));
        }
        let (min, max) = self.grain_duration_range;
        let (lower, upper) = GRAIN_DURATION_LIMITS;
        if !(lower..=upper).contains(&min) || !(lower..=upper).contains(&max) || min > max {
            return Err(Error::ParameterError(format!(
                "scrubber options 'grain_duration_range' value is '{min}..{max}', \
                 must be an ordered range within {lower}..{upper}"
            )));
        }
        if self.max_active_grains < 2 {
            return Err(Error::ParameterError(format!(
                "scrubber options 'max_active_grains' value is '{}', must be >= 2",
                self.max_active_grains
            )));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Renders a smooth, glitch free granular audio stream which follows a continuously changing
/// playhead in a [`ScrubDecoder`] source.
///
/// The source is decoded in small chunks on demand only, so it never needs to be loaded into
/// memory as a whole. Overlapping Hann windowed grains get spawned at the interpolated
/// playhead position, with grain durations which adapt to the scrub speed.
///
/// [`Scrubber::render_audio`] is meant to be called from an audio thread. The scrubber can be
/// controlled from other threads via its [`ScrubberHandle`].
pub struct Scrubber {
    cache: DecodedChunkCache,
    scheduler: GrainScheduler,
    playhead: PlayheadController,
    handle: ScrubberHandle,
    output_sample_rate: u32,
    output_channel_count: usize,
}

impl Scrubber {
    /// Create a new scrubber for the given source decoder and output signal specs.
    ///
    /// Decodes the first chunk around the initial playhead time. Scrubbing is initially
    /// disabled: enable it via [`Self::set_is_scrubbing`].
    pub fn new<D: ScrubDecoder>(
        decoder: D,
        output_sample_rate: u32,
        output_channel_count: usize,
        initial_playhead_time: f64,
        options: ScrubberOptions,
    ) -> Result<Self, Error> {
        options.validate()?;

        let chunk_decoder = ChunkDecoder::new(
            Box::new(decoder),
            output_sample_rate,
            output_channel_count,
            options.chunk_duration,
            options.resampling_quality,
        )?;
        let source_duration = chunk_decoder.source_duration();

        let targets = Arc::new(Mutex::new(ScrubTargets {
            playhead_time: wrap_time(initial_playhead_time, source_duration),
            is_scrubbing: false,
            scrub_while_stationary: options.scrub_while_stationary,
            grain_duration_range: options.grain_duration_range,
        }));
        let handle = ScrubberHandle::new(Arc::clone(&targets), source_duration);
        let playhead = PlayheadController::new(
            targets,
            PlayheadSettings {
                lerp_duration: options.lerp_duration,
                jump_threshold: options.jump_threshold,
                stationary_epsilon: options.stationary_epsilon,
                stationary_grace: options.stationary_grace,
            },
        );

        let mut cache = DecodedChunkCache::new(chunk_decoder, options.initial_chunk_count);
        let scheduler = GrainScheduler::new(options.max_active_grains);

        // decode the first chunk centered around the initial playhead
        let playhead_frame = seconds_to_frames(playhead.current_time(), output_sample_rate);
        let half_chunk_frames = seconds_to_frames(options.chunk_duration / 2.0, output_sample_rate);
        cache.chunk_for(playhead_frame.saturating_sub(half_chunk_frames));

        log::info!(
            "Created scrubber for a {source_duration:.2}s source: \
             {output_channel_count} channels at {output_sample_rate} Hz"
        );

        Ok(Self {
            cache,
            scheduler,
            playhead,
            handle,
            output_sample_rate,
            output_channel_count,
        })
    }

    /// A cloneable handle to control the scrubber from other threads.
    pub fn handle(&self) -> ScrubberHandle {
        self.handle.clone()
    }

    /// Duration of the scrubbed source in seconds.
    pub fn source_duration(&self) -> f64 {
        self.handle.source_duration()
    }

    /// Sample rate of the rendered audio.
    pub fn output_sample_rate(&self) -> u32 {
        self.output_sample_rate
    }

    /// Channel count of the rendered, interleaved audio.
    pub fn output_channel_count(&self) -> usize {
        self.output_channel_count
    }

    /// The interpolated playhead time in seconds, as used in the last render call.
    pub fn current_playhead_time(&self) -> f64 {
        self.playhead.current_time()
    }

    /// Number of currently playing grains.
    pub fn active_grain_count(&self) -> usize {
        self.scheduler.active_grain_count()
    }

    /// Number of allocated decode chunks.
    pub fn chunk_count(&self) -> usize {
        self.cache.len()
    }

    /// See [`ScrubberHandle::set_is_scrubbing`].
    pub fn set_is_scrubbing(&self, is_scrubbing: bool) {
        self.handle.set_is_scrubbing(is_scrubbing);
    }

    /// See [`ScrubberHandle::set_is_scrubbing_while_stationary`].
    pub fn set_is_scrubbing_while_stationary(&self, scrub_while_stationary: bool) {
        self.handle
            .set_is_scrubbing_while_stationary(scrub_while_stationary);
    }

    /// See [`ScrubberHandle::set_playhead_time`].
    pub fn set_playhead_time(&self, time: f64) {
        self.handle.set_playhead_time(time);
    }

    /// See [`ScrubberHandle::set_grain_duration_range`].
    pub fn set_grain_duration_range(&self, min: f64, max: f64) {
        self.handle.set_grain_duration_range(min, max);
    }

    /// Render grains into the given interleaved output buffer.
    ///
    /// Grains are **added** to the buffer's content: clear the buffer before when needed.
    /// When scrubbing is disabled or the playhead is stationary, the buffer is left untouched
    /// and active grains are paused until rendering resumes.
    ///
    /// Returns the number of frames produced, which always is the number of frames in the buffer.
    pub fn render_audio(&mut self, output: &mut [f32]) -> usize {
        let channel_count = self.output_channel_count;
        debug_assert!(
            output.len() % channel_count == 0,
            "Output buffer length must be a multiple of the channel count"
        );
        let frame_count = output.len() / channel_count;
        if frame_count == 0 {
            return 0;
        }

        self.playhead.fetch_targets();
        let delta_time = frames_to_seconds(frame_count, self.output_sample_rate);
        let update = self.playhead.advance(delta_time);
        let targets = *self.playhead.targets();

        if targets.is_scrubbing && update.is_rendering_allowed {
            let grain_duration = grain_duration(
                update.velocity,
                self.playhead.lerp_duration(),
                targets.grain_duration_range,
            );
            // even grain durations, so grains overlap by exactly 50%
            let half_grain_frames =
                seconds_to_frames(grain_duration / 2.0, self.output_sample_rate).max(1);
            let last_source_frame = self.cache.source_frame_count().saturating_sub(1);
            let playhead_frame =
                seconds_to_frames(update.current_time, self.output_sample_rate)
                    .min(last_source_frame);
            self.scheduler.process(
                &mut self.cache,
                &mut output[..frame_count * channel_count],
                playhead_frame,
                2 * half_grain_frames,
            );
        }

        frame_count
    }
}

// -------------------------------------------------------------------------------------------------
