//! The feedback loop which picks an image resolution for each frame.

use crate::math::FreeCoordinate;
use crate::raycaster::config::{
    ADJUSTABLE_LEVEL, ConfigError, STATIC_LEVEL_COUNT, ScaleTable, Tuning, logged,
};
use crate::time::Duration;

/// Slot in [`AdaptiveResolutionController::render_times`] for frames at full resolution.
const FULL_TIME: usize = 0;
/// Slot in [`AdaptiveResolutionController::render_times`] for frames at the adjustable level.
const ADJUSTABLE_TIME: usize = 1;

/// Value of `frames_since_adjustment` meaning “adjust as soon as there is reason to”.
const READY: u32 = u32::MAX;

/// Chooses the image scale for each frame so that rendering takes about as long as
/// the scene allows.
///
/// Render time is modeled as proportional to the number of pixels, i.e. to the square of
/// the scale. When the last full-resolution frame took longer than the budget, the
/// adjustable level is selected and its scale is re-estimated from the last measured
/// time at that scale. Estimates are only adopted when they differ noticeably from the
/// current scale, and not more often than every few frames, because frame times are
/// noisy and a flickering resolution is distracting.
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptiveResolutionController {
    table: ScaleTable,
    tuning: Tuning,
    automatic: bool,
    lower_limit: FreeCoordinate,
    selected_level: usize,
    /// Most recent render time in seconds at full resolution and at the adjustable level.
    /// Zero if not yet measured.
    render_times: [f64; 2],
    frames_since_adjustment: u32,
    previous_budget: f64,
}

impl Default for AdaptiveResolutionController {
    fn default() -> Self {
        Self {
            table: ScaleTable::default(),
            tuning: Tuning::default(),
            automatic: true,
            lower_limit: 0.15,
            selected_level: 0,
            render_times: [0.0; 2],
            frames_since_adjustment: READY,
            previous_budget: 0.0,
        }
    }
}

impl AdaptiveResolutionController {
    /// Creates a controller with default configuration and the given tuning constants.
    pub fn new(tuning: Tuning) -> Self {
        Self {
            tuning,
            ..Self::default()
        }
    }

    /// Decides the scale for the next frame.
    ///
    /// `has_scalable_volumes` tells whether any visible volume will be ray cast or
    /// software rendered, and `allocated_time` is the frame's budget in seconds
    /// (0 meaning unlimited). Call this exactly once per frame.
    pub fn scale_factor(&mut self, has_scalable_volumes: bool, allocated_time: f64) -> FreeCoordinate {
        if !has_scalable_volumes {
            self.selected_level = 0;
            return 1.0;
        }
        if !self.automatic {
            return self.current_scale();
        }

        let budget = if allocated_time > 0.0 {
            allocated_time
        } else {
            self.tuning.unlimited_budget
        };
        if (budget - self.previous_budget).abs() > self.tuning.budget_change_threshold {
            self.frames_since_adjustment = READY;
        }
        self.previous_budget = budget;

        if self.render_times[FULL_TIME] > budget {
            self.selected_level = ADJUSTABLE_LEVEL;
            if self.frames_since_adjustment > self.tuning.stable_frames {
                self.adjust(budget);
            } else {
                self.frames_since_adjustment = self.frames_since_adjustment.saturating_add(1);
            }
        } else {
            self.frames_since_adjustment = READY;
            self.selected_level = 0;
        }
        self.current_scale()
    }

    fn adjust(&mut self, budget: f64) {
        let current = self.table.scale(ADJUSTABLE_LEVEL).unwrap_or(1.0);
        let estimate = if self.render_times[ADJUSTABLE_TIME] == 0.0 {
            let full_time = self.render_times[FULL_TIME];
            if full_time != 0.0 {
                (budget / full_time).sqrt()
            } else {
                self.tuning.initial_guess
            }
        } else {
            current * (budget / self.render_times[ADJUSTABLE_TIME]).sqrt()
        }
        .clamp(self.lower_limit, 1.0);

        if (estimate - current).abs() > self.tuning.hysteresis {
            log::trace!("adjusting image scale from {current:.3} to {estimate:.3}");
            self.table.set_adjustable_scale(estimate);
            self.frames_since_adjustment = 0;
        } else {
            self.frames_since_adjustment = self.frames_since_adjustment.saturating_add(1);
        }
    }

    /// Records how long the frame rendered at the selected level took.
    ///
    /// Has no effect when automatic adjustment is off.
    pub fn record_render_time(&mut self, elapsed: Duration) {
        if self.automatic {
            let slot = if self.selected_level == 0 {
                FULL_TIME
            } else {
                ADJUSTABLE_TIME
            };
            self.render_times[slot] = elapsed.as_secs_f64();
        }
    }

    /// The level chosen for the current frame.
    pub fn selected_level(&self) -> usize {
        self.selected_level
    }

    /// The scale of the level chosen for the current frame.
    pub fn current_scale(&self) -> FreeCoordinate {
        self.table.scale(self.selected_level).unwrap_or(1.0)
    }

    /// The ray step size multiplier for the current frame; always 1 at the adjustable
    /// level.
    pub fn current_step_size(&self) -> FreeCoordinate {
        if self.selected_level < STATIC_LEVEL_COUNT {
            self.table.step_size(self.selected_level).unwrap_or(1.0)
        } else {
            1.0
        }
    }

    /// The configured scales and step sizes.
    pub fn scale_table(&self) -> &ScaleTable {
        &self.table
    }

    /// The feedback loop constants.
    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    /// Most recent render times, in seconds, at full resolution and at the adjustable
    /// level, or zero where not yet measured.
    pub fn render_times(&self) -> [f64; 2] {
        self.render_times
    }

    /// Whether the scale is chosen automatically.
    pub fn automatic(&self) -> bool {
        self.automatic
    }

    /// The lowest scale automatic adjustment may choose.
    pub fn lower_limit(&self) -> FreeCoordinate {
        self.lower_limit
    }

    /// Sets the scale of a static level; see [`ScaleTable::set_scale()`].
    pub fn set_image_scale(&mut self, level: usize, scale: FreeCoordinate) -> Result<(), ConfigError> {
        logged(self.table.set_scale(level, scale))
    }

    /// Sets the ray step size of a static level; see [`ScaleTable::set_step_size()`].
    pub fn set_step_size(&mut self, level: usize, step: FreeCoordinate) -> Result<(), ConfigError> {
        logged(self.table.set_step_size(level, step))
    }

    /// Turns automatic scale adjustment on or off.
    ///
    /// Turning it off returns to full resolution until another level is selected.
    pub fn set_automatic(&mut self, automatic: bool) {
        self.automatic = automatic;
        if !automatic {
            self.selected_level = 0;
        }
    }

    /// Sets the lowest scale automatic adjustment may choose.
    pub fn set_lower_limit(&mut self, limit: FreeCoordinate) -> Result<(), ConfigError> {
        logged(if limit > 0.0 && limit <= 1.0 {
            self.lower_limit = limit;
            Ok(())
        } else {
            Err(ConfigError::LowerLimitOutOfRange { limit })
        })
    }

    /// Selects a static level to use while automatic adjustment is off.
    pub fn select_level(&mut self, level: usize) -> Result<(), ConfigError> {
        logged(if level < STATIC_LEVEL_COUNT {
            self.selected_level = level;
            Ok(())
        } else {
            Err(ConfigError::LevelOutOfRange {
                level,
                min: 0,
                max: STATIC_LEVEL_COUNT - 1,
            })
        })
    }

    /// Replaces the feedback loop constants.
    pub fn set_tuning(&mut self, tuning: Tuning) {
        self.tuning = tuning;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Runs frames whose render time is exactly quadratic in scale, and returns the scale
    /// chosen for each frame.
    fn run_quadratic(
        controller: &mut AdaptiveResolutionController,
        full_time: f64,
        budget: f64,
        frames: usize,
    ) -> Vec<FreeCoordinate> {
        (0..frames)
            .map(|_| {
                let scale = controller.scale_factor(true, budget);
                controller.record_render_time(Duration::from_secs_f64(full_time * scale * scale));
                scale
            })
            .collect()
    }

    #[test]
    fn nothing_to_scale_means_full_resolution() {
        let mut controller = AdaptiveResolutionController::default();
        controller.render_times = [5.0, 0.0];
        controller.selected_level = ADJUSTABLE_LEVEL;
        assert_eq!(controller.scale_factor(false, 0.1), 1.0);
        assert_eq!(controller.selected_level(), 0);
    }

    #[test]
    fn fast_enough_stays_at_full_resolution() {
        let mut controller = AdaptiveResolutionController::default();
        let scales = run_quadratic(&mut controller, 0.01, 0.1, 5);
        assert_eq!(scales, vec![1.0; 5]);
    }

    #[test]
    fn unlimited_budget() {
        let mut controller = AdaptiveResolutionController::default();
        let scales = run_quadratic(&mut controller, 100.0, 0.0, 3);
        assert_eq!(scales, vec![1.0; 3]);
    }

    #[rstest::rstest]
    #[case(1.0, 0.25)]
    #[case(1.0, 0.5)]
    #[case(0.4, 0.1)]
    #[case(2.0, 0.9)]
    fn converges_to_square_root_of_time_ratio(#[case] full_time: f64, #[case] budget: f64) {
        let mut controller = AdaptiveResolutionController::default();
        let scales = run_quadratic(&mut controller, full_time, budget, 20);
        let target = (budget / full_time).sqrt().max(controller.lower_limit());

        // Stable within 10 frames...
        let settled = scales[10];
        assert!(
            scales[10..].iter().all(|&s| s == settled),
            "oscillating: {scales:?}"
        );
        // ...and close to the model's answer.
        assert!(
            (settled - target).abs() <= controller.tuning().hysteresis,
            "settled at {settled}, target {target}: {scales:?}"
        );
    }

    #[test]
    fn lower_limit_is_respected() {
        let mut controller = AdaptiveResolutionController::default();
        controller.set_lower_limit(0.3).unwrap();
        let scales = run_quadratic(&mut controller, 10.0, 0.1, 10);
        assert_eq!(scales[9], 0.3);
    }

    #[test]
    fn waits_for_stable_frames_between_adjustments() {
        let mut controller = AdaptiveResolutionController::default();
        controller.render_times = [1.0, 0.0];
        controller.set_adjustable_scale_for_test(0.9);
        // First estimate is made immediately.
        assert_eq!(controller.scale_factor(true, 0.25), 0.5);
        // Pretend the adjustable level is much too slow; no change until 4 frames pass.
        controller.set_adjustable_scale_for_test(0.9);
        for _ in 0..4 {
            controller.render_times[ADJUSTABLE_TIME] = 1.0;
            assert_eq!(controller.scale_factor(true, 0.25), 0.9);
        }
        controller.render_times[ADJUSTABLE_TIME] = 1.0;
        assert_eq!(controller.scale_factor(true, 0.25), 0.9 * 0.5);
    }

    #[test]
    fn budget_change_permits_immediate_adjustment() {
        let mut controller = AdaptiveResolutionController::default();
        let scales = run_quadratic(&mut controller, 1.0, 0.5, 3);
        assert!((scales[2] - 0.5f64.sqrt()).abs() < 1e-9, "{scales:?}");
        // Budget changes by more than the threshold, so the next frame re-estimates even
        // though the last adjustment was recent.
        let scale = controller.scale_factor(true, 0.04);
        assert!((scale - 0.2).abs() < 1e-6, "{scale}");
    }

    #[test]
    fn manual_level_selection() {
        let mut controller = AdaptiveResolutionController::default();
        controller.set_automatic(false);
        controller.select_level(2).unwrap();
        assert_eq!(controller.scale_factor(true, 0.001), 0.25);
        assert_eq!(
            controller.select_level(ADJUSTABLE_LEVEL),
            Err(ConfigError::LevelOutOfRange {
                level: ADJUSTABLE_LEVEL,
                min: 0,
                max: 3
            })
        );
        assert_eq!(controller.selected_level(), 2);
        // Timing is not recorded in manual mode.
        controller.record_render_time(Duration::from_secs(3));
        assert_eq!(controller.render_times(), [0.0, 0.0]);
        // Turning automatic mode off again resets to full resolution.
        controller.set_automatic(false);
        assert_eq!(controller.selected_level(), 0);
    }

    #[test]
    fn step_size_follows_level() {
        let mut controller = AdaptiveResolutionController::default();
        controller.set_step_size(1, 4.0).unwrap();
        controller.set_automatic(false);
        controller.select_level(1).unwrap();
        assert_eq!(controller.current_step_size(), 4.0);
        controller.selected_level = ADJUSTABLE_LEVEL;
        assert_eq!(controller.current_step_size(), 1.0);
    }

    #[test]
    fn lower_limit_validation() {
        let mut controller = AdaptiveResolutionController::default();
        assert_eq!(
            controller.set_lower_limit(0.0),
            Err(ConfigError::LowerLimitOutOfRange { limit: 0.0 })
        );
        assert_eq!(controller.lower_limit(), 0.15);
    }

    impl AdaptiveResolutionController {
        fn set_adjustable_scale_for_test(&mut self, scale: FreeCoordinate) {
            self.table.set_adjustable_scale(scale);
        }
    }
}
