//! Target and interpolated playhead state, shared between control and audio threads.

use std::sync::{Arc, Mutex, PoisonError, TryLockError};

// -------------------------------------------------------------------------------------------------

/// Allowed range for grain durations in seconds.
pub const GRAIN_DURATION_LIMITS: (f64, f64) = (0.05, 0.5);

/// Wrap the given time into `[0, duration)`.
pub(crate) fn wrap_time(time: f64, duration: f64) -> f64 {
    if !time.is_finite() || duration <= 0.0 {
        return 0.0;
    }
    let wrapped = time.rem_euclid(duration);
    // rem_euclid may round up to `duration` for tiny negative values
    if wrapped >= duration {
        0.0
    } else {
        wrapped
    }
}

/// Clamp both ends of a grain duration range into [`GRAIN_DURATION_LIMITS`], returning a
/// `(min, max)` ordered range.
pub(crate) fn clamp_grain_duration_range(min: f64, max: f64) -> (f64, f64) {
    let (lower, upper) = GRAIN_DURATION_LIMITS;
    let sanitize = |value: f64| {
        if value.is_nan() {
            lower
        } else {
            value.clamp(lower, upper)
        }
    };
    let (min, max) = (sanitize(min), sanitize(max));
    if min <= max {
        (min, max)
    } else {
        (max, min)
    }
}

// -------------------------------------------------------------------------------------------------

/// Parameters which are written by control threads and read once per render call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScrubTargets {
    pub playhead_time: f64,
    pub is_scrubbing: bool,
    pub scrub_while_stationary: bool,
    pub grain_duration_range: (f64, f64),
}

type SharedScrubTargets = Arc<Mutex<ScrubTargets>>;

// -------------------------------------------------------------------------------------------------

/// A cloneable, thread-safe handle to control a [`Scrubber`](crate::Scrubber) from any thread.
///
/// All setters only briefly lock the shared target state. Changes are applied by the scrubber
/// in its next render call.
#[derive(Debug, Clone)]
pub struct ScrubberHandle {
    targets: SharedScrubTargets,
    source_duration: f64,
}

impl ScrubberHandle {
    pub(crate) fn new(targets: SharedScrubTargets, source_duration: f64) -> Self {
        Self {
            targets,
            source_duration,
        }
    }

    /// Duration of the scrubbed source in seconds.
    pub fn source_duration(&self) -> f64 {
        self.source_duration
    }

    /// Enable or disable scrubbing. When disabled, the scrubber no longer renders anything.
    pub fn set_is_scrubbing(&self, is_scrubbing: bool) {
        self.with_targets(|targets| targets.is_scrubbing = is_scrubbing);
    }

    /// When enabled, grains keep playing while the playhead does not move. When disabled,
    /// the scrubber mutes shortly after the playhead stopped moving.
    pub fn set_is_scrubbing_while_stationary(&self, scrub_while_stationary: bool) {
        self.with_targets(|targets| targets.scrub_while_stationary = scrub_while_stationary);
    }

    /// Set a new target playhead time in seconds. Times outside of the source's duration are
    /// wrapped into the source.
    pub fn set_playhead_time(&self, time: f64) {
        let time = wrap_time(time, self.source_duration);
        self.with_targets(|targets| targets.playhead_time = time);
    }

    /// Set the range of grain durations in seconds. Slow scrubbing uses long grains, fast
    /// scrubbing short ones. Both values are clamped to [`GRAIN_DURATION_LIMITS`].
    pub fn set_grain_duration_range(&self, min: f64, max: f64) {
        let range = clamp_grain_duration_range(min, max);
        self.with_targets(|targets| targets.grain_duration_range = range);
    }

    /// Current target playhead time in seconds.
    pub fn playhead_time(&self) -> f64 {
        self.with_targets(|targets| targets.playhead_time)
    }

    /// Current grain duration range in seconds.
    pub fn grain_duration_range(&self) -> (f64, f64) {
        self.with_targets(|targets| targets.grain_duration_range)
    }

    fn with_targets<T>(&self, f: impl FnOnce(&mut ScrubTargets) -> T) -> T {
        // targets are plain values: a poisoned lock still holds a valid state
        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut targets)
    }
}

// -------------------------------------------------------------------------------------------------

/// Result of a [`PlayheadController::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlayheadUpdate {
    /// Interpolated playhead time in seconds.
    pub current_time: f64,
    /// Distance of the interpolated to the target playhead time: a scrub speed proxy.
    pub velocity: f64,
    /// False when grains should no longer be rendered because the playhead is stationary.
    pub is_rendering_allowed: bool,
}

/// Playhead interpolation settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlayheadSettings {
    pub lerp_duration: f64,
    pub jump_threshold: f64,
    pub stationary_epsilon: f64,
    pub stationary_grace: f64,
}

/// Moves the interpolated playhead towards the target playhead in the audio thread.
///
/// Small target changes are interpolated within the lerp duration, changes larger than the
/// jump threshold are treated as seeks and applied immediately.
pub(crate) struct PlayheadController {
    targets: SharedScrubTargets,
    snapshot: ScrubTargets,
    settings: PlayheadSettings,
    current_time: f64,
    time_since_stationary: f64,
}

impl PlayheadController {
    pub fn new(targets: SharedScrubTargets, settings: PlayheadSettings) -> Self {
        let snapshot = *targets.lock().unwrap_or_else(PoisonError::into_inner);
        let current_time = snapshot.playhead_time;
        Self {
            targets,
            snapshot,
            settings,
            current_time,
            time_since_stationary: 0.0,
        }
    }

    /// Last fetched target state.
    pub fn targets(&self) -> &ScrubTargets {
        &self.snapshot
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    #[cfg(test)]
    pub fn time_since_stationary(&self) -> f64 {
        self.time_since_stationary
    }

    pub fn lerp_duration(&self) -> f64 {
        self.settings.lerp_duration
    }

    /// Fetch the latest target state from the control threads. Never blocks: when the state
    /// is locked, the last fetched state is used.
    pub fn fetch_targets(&mut self) {
        match self.targets.try_lock() {
            Ok(targets) => self.snapshot = *targets,
            Err(TryLockError::Poisoned(poisoned)) => self.snapshot = *poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                log::trace!("Scrub targets are locked: using last known targets");
            }
        }
    }

    /// Advance the interpolated playhead by `delta_time` seconds.
    pub fn advance(&mut self, delta_time: f64) -> PlayheadUpdate {
        let target_time = self.snapshot.playhead_time;
        let previous_time = self.current_time;

        if (target_time - self.current_time).abs() > self.settings.jump_threshold {
            self.current_time = target_time;
        } else if self.settings.lerp_duration > 0.0 {
            let amount = (delta_time / self.settings.lerp_duration).clamp(0.0, 1.0);
            self.current_time += (target_time - self.current_time) * amount;
        } else {
            self.current_time = target_time;
        }

        if (self.current_time - previous_time).abs() < self.settings.stationary_epsilon {
            self.time_since_stationary += delta_time;
        } else {
            self.time_since_stationary = 0.0;
        }

        let is_rendering_allowed = self.snapshot.scrub_while_stationary
            || self.time_since_stationary < self.settings.stationary_grace;
        let velocity = (target_time - self.current_time).abs();

        PlayheadUpdate {
            current_time: self.current_time,
            velocity,
            is_rendering_allowed,
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: PlayheadSettings = PlayheadSettings {
        lerp_duration: 0.2,
        jump_threshold: 0.5,
        stationary_epsilon: 0.001,
        stationary_grace: 0.1,
    };

    fn shared_targets(playhead: f64) -> SharedScrubTargets {
        Arc::new(Mutex::new(ScrubTargets {
            playhead_time: playhead,
            is_scrubbing: false,
            scrub_while_stationary: false,
            grain_duration_range: (0.05, 0.4),
        }))
    }

    fn controller(duration: f64, playhead: f64) -> (ScrubberHandle, PlayheadController) {
        let targets = shared_targets(playhead);
        let handle = ScrubberHandle::new(Arc::clone(&targets), duration);
        let controller = PlayheadController::new(targets, SETTINGS);
        (handle, controller)
    }

    #[test]
    fn playhead_clamping() {
        let (handle, _) = controller(10.0, 0.0);
        for (time, expected) in [
            (2.5, 2.5),
            (10.0, 0.0),
            (12.5, 2.5),
            (-2.5, 7.5),
            (-10.0, 0.0),
            (1e9 + 0.25, 0.25),
        ] {
            handle.set_playhead_time(time);
            let wrapped = handle.playhead_time();
            assert!((0.0..10.0).contains(&wrapped));
            assert!((wrapped - expected).abs() < 1e-6, "{time} -> {wrapped}");
        }
        for time in [-1e-18, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            handle.set_playhead_time(time);
            assert!((0.0..10.0).contains(&handle.playhead_time()));
        }
    }

    #[test]
    fn grain_duration_range_clamping() {
        let (handle, _) = controller(10.0, 0.0);
        handle.set_grain_duration_range(0.01, 2.0);
        assert_eq!(handle.grain_duration_range(), GRAIN_DURATION_LIMITS);
        handle.set_grain_duration_range(0.3, 0.1);
        assert_eq!(handle.grain_duration_range(), (0.1, 0.3));
        handle.set_grain_duration_range(f64::NAN, 0.2);
        assert_eq!(handle.grain_duration_range(), (0.05, 0.2));
    }

    #[test]
    fn jump_vs_scrub() {
        let delta_time = 512.0 / 48000.0;

        // jumps just above the threshold are applied immediately
        let (handle, mut controller) = controller(10.0, 2.0);
        handle.set_playhead_time(2.51);
        controller.fetch_targets();
        let update = controller.advance(delta_time);
        assert_eq!(update.current_time, 2.51);
        assert_eq!(update.velocity, 0.0);

        // jumps just below are interpolated
        handle.set_playhead_time(2.51 + 0.49);
        controller.fetch_targets();
        let update = controller.advance(delta_time);
        assert!(update.current_time > 2.51 && update.current_time < 3.0);
        assert!(update.velocity > 0.0 && update.velocity < 0.49);

        // and eventually reach the target
        for _ in 0..200 {
            controller.advance(delta_time);
        }
        assert!((controller.current_time() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn targets_are_applied_on_fetch_only() {
        let (handle, mut controller) = controller(10.0, 2.0);
        handle.set_is_scrubbing(true);
        handle.set_playhead_time(5.0);
        assert!(!controller.targets().is_scrubbing);
        let update = controller.advance(0.01);
        assert_eq!(update.current_time, 2.0);

        controller.fetch_targets();
        assert!(controller.targets().is_scrubbing);
        assert_eq!(controller.advance(0.01).current_time, 5.0);
    }

    #[test]
    fn locked_targets_keep_last_snapshot() {
        let targets = shared_targets(2.0);
        let mut controller = PlayheadController::new(Arc::clone(&targets), SETTINGS);

        let mut guard = targets.lock().unwrap();
        guard.playhead_time = 5.0;
        guard.is_scrubbing = true;
        controller.fetch_targets();
        assert_eq!(controller.targets().playhead_time, 2.0);
        assert!(!controller.targets().is_scrubbing);
        assert_eq!(controller.advance(0.01).current_time, 2.0);

        drop(guard);
        controller.fetch_targets();
        assert_eq!(controller.targets().playhead_time, 5.0);
        assert!(controller.targets().is_scrubbing);
    }

    #[test]
    fn poisoned_targets_are_recovered() {
        let targets = shared_targets(2.0);
        let handle = ScrubberHandle::new(Arc::clone(&targets), 10.0);
        let mut controller = PlayheadController::new(Arc::clone(&targets), SETTINGS);

        let writer = std::thread::spawn({
            let targets = Arc::clone(&targets);
            move || {
                let mut guard = targets.lock().unwrap();
                guard.playhead_time = 3.0;
                panic!("writer panicked while holding the targets");
            }
        });
        assert!(writer.join().is_err());
        assert!(targets.is_poisoned());

        controller.fetch_targets();
        assert_eq!(controller.targets().playhead_time, 3.0);

        // handles keep working on a poisoned lock
        handle.set_playhead_time(4.0);
        handle.set_is_scrubbing(true);
        assert_eq!(handle.playhead_time(), 4.0);
        controller.fetch_targets();
        assert_eq!(controller.targets().playhead_time, 4.0);
        assert!(controller.targets().is_scrubbing);
    }

    #[test]
    fn stationary_muting() {
        let (handle, mut controller) = controller(10.0, 2.0);
        let delta_time = 0.01;

        // a stationary playhead renders within the grace period only
        let allowed = (0..20)
            .map(|_| controller.advance(delta_time).is_rendering_allowed)
            .collect::<Vec<_>>();
        assert!(allowed[0]);
        assert!(!allowed[19]);
        assert!(controller.time_since_stationary() > 0.1);

        // moving resets the stationary time
        handle.set_playhead_time(2.2);
        controller.fetch_targets();
        let update = controller.advance(delta_time);
        assert!(update.is_rendering_allowed);
        assert_eq!(controller.time_since_stationary(), 0.0);

        // scrubbing while stationary always renders
        handle.set_is_scrubbing_while_stationary(true);
        controller.fetch_targets();
        for _ in 0..100 {
            controller.advance(delta_time);
        }
        assert!(controller.advance(delta_time).is_rendering_allowed);
    }
}
