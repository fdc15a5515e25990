//! Resolution levels and the parameters of the feedback loop that chooses between them.

use crate::math::FreeCoordinate;

/// Number of resolution levels whose scale is set by configuration.
/// Level 0 is always full resolution.
pub const STATIC_LEVEL_COUNT: usize = 4;

/// The level whose scale is recomputed every frame by
/// [`AdaptiveResolutionController`](super::AdaptiveResolutionController).
pub const ADJUSTABLE_LEVEL: usize = STATIC_LEVEL_COUNT;

/// Total number of resolution levels, including the adjustable one.
pub const LEVEL_COUNT: usize = STATIC_LEVEL_COUNT + 1;

/// Smallest scale that may be configured for a static level.
pub const MIN_IMAGE_SCALE: FreeCoordinate = 0.01;

/// Range of acceptable ray step size multipliers.
pub const STEP_SIZE_RANGE: core::ops::RangeInclusive<FreeCoordinate> = 0.01..=100.0;

/// An invalid configuration value was rejected. The previous value remains in effect.
#[derive(Clone, Copy, Debug, PartialEq, displaydoc::Display)]
#[non_exhaustive]
pub enum ConfigError {
    /// level {level} is not one of the adjustable levels {min}..={max}
    LevelOutOfRange {
        /// The level given.
        level: usize,
        /// Lowest permitted level.
        min: usize,
        /// Highest permitted level.
        max: usize,
    },
    /// image scale {scale} is outside the range 0.01..=1
    ScaleOutOfRange {
        /// The scale given.
        scale: FreeCoordinate,
    },
    /// image scale {scale} for level {level} is not less than {previous}, the scale of the level before it
    ScaleNotBelowPrevious {
        /// The level being set.
        level: usize,
        /// The scale given.
        scale: FreeCoordinate,
        /// The scale of `level - 1`.
        previous: FreeCoordinate,
    },
    /// image scale {scale} for level {level} is not greater than {next}, the scale of the level after it
    ScaleNotAboveNext {
        /// The level being set.
        level: usize,
        /// The scale given.
        scale: FreeCoordinate,
        /// The scale of `level + 1`.
        next: FreeCoordinate,
    },
    /// ray step size {step} is outside the range 0.01..=100
    StepSizeOutOfRange {
        /// The step size given.
        step: FreeCoordinate,
    },
    /// automatic scale lower limit {limit} is outside the range (0, 1]
    LowerLimitOutOfRange {
        /// The limit given.
        limit: FreeCoordinate,
    },
    /// thread count must be at least 1
    ZeroThreads,
}

impl std::error::Error for ConfigError {}

/// Logs a rejected configuration change and passes the result through.
pub(crate) fn logged<T>(result: Result<T, ConfigError>) -> Result<T, ConfigError> {
    if let Err(error) = &result {
        log::error!("ignoring invalid ray caster configuration: {error}");
    }
    result
}

// -------------------------------------------------------------------------------------------------

/// Image scale and ray step size for each resolution level.
///
/// Scales of the static levels are strictly decreasing with level.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ScaleTable {
    scales: [FreeCoordinate; LEVEL_COUNT],
    step_sizes: [FreeCoordinate; LEVEL_COUNT],
}

impl Default for ScaleTable {
    /// Each static level has half the resolution of the one before it; the adjustable
    /// level starts at one half.
    fn default() -> Self {
        let mut scales = [0.5; LEVEL_COUNT];
        let mut scale = 1.0;
        for slot in &mut scales[..STATIC_LEVEL_COUNT] {
            *slot = scale;
            scale /= 2.0;
        }
        Self {
            scales,
            step_sizes: [1.0; LEVEL_COUNT],
        }
    }
}

impl ScaleTable {
    /// Returns the scale of `level`, or [`None`] if there is no such level.
    pub fn scale(&self, level: usize) -> Option<FreeCoordinate> {
        self.scales.get(level).copied()
    }

    /// Sets the scale of a static level other than level 0.
    ///
    /// The new scale must lie strictly between the scales of its neighboring static
    /// levels.
    pub fn set_scale(&mut self, level: usize, scale: FreeCoordinate) -> Result<(), ConfigError> {
        if !(1..STATIC_LEVEL_COUNT).contains(&level) {
            return Err(ConfigError::LevelOutOfRange {
                level,
                min: 1,
                max: STATIC_LEVEL_COUNT - 1,
            });
        }
        if !(MIN_IMAGE_SCALE..=1.0).contains(&scale) {
            return Err(ConfigError::ScaleOutOfRange { scale });
        }
        let previous = self.scales[level - 1];
        if scale >= previous {
            return Err(ConfigError::ScaleNotBelowPrevious {
                level,
                scale,
                previous,
            });
        }
        if level + 1 < STATIC_LEVEL_COUNT {
            let next = self.scales[level + 1];
            if scale <= next {
                return Err(ConfigError::ScaleNotAboveNext { level, scale, next });
            }
        }
        self.scales[level] = scale;
        Ok(())
    }

    /// Scale of the adjustable level. Only the controller changes it.
    pub(crate) fn set_adjustable_scale(&mut self, scale: FreeCoordinate) {
        self.scales[ADJUSTABLE_LEVEL] = scale;
    }

    /// Returns the ray step size multiplier of `level`, or [`None`] if there is no such
    /// level.
    pub fn step_size(&self, level: usize) -> Option<FreeCoordinate> {
        self.step_sizes.get(level).copied()
    }

    /// Sets the ray step size multiplier of a static level.
    pub fn set_step_size(&mut self, level: usize, step: FreeCoordinate) -> Result<(), ConfigError> {
        if level >= STATIC_LEVEL_COUNT {
            return Err(ConfigError::LevelOutOfRange {
                level,
                min: 0,
                max: STATIC_LEVEL_COUNT - 1,
            });
        }
        if !STEP_SIZE_RANGE.contains(&step) {
            return Err(ConfigError::StepSizeOutOfRange { step });
        }
        self.step_sizes[level] = step;
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Constants of the resolution feedback loop.
///
/// The defaults were found to work well empirically; none of them is essential to
/// correctness.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct Tuning {
    /// A newly estimated scale is only adopted if it differs from the current one by more
    /// than this.
    pub hysteresis: FreeCoordinate,
    /// Number of frames after an adjustment before the next adjustment may be made.
    pub stable_frames: u32,
    /// A change in the allocated render time of more than this many seconds permits an
    /// immediate adjustment.
    pub budget_change_threshold: f64,
    /// Render time budget, in seconds, that stands for “unlimited”.
    pub unlimited_budget: f64,
    /// Scale to try when there is no timing information to estimate from.
    pub initial_guess: FreeCoordinate,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            hysteresis: 0.02,
            stable_frames: 3,
            budget_change_threshold: 0.05,
            unlimited_budget: 10000.0,
            initial_guess: 0.1,
        }
    }
}
