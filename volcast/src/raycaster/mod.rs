//! The ray caster: choosing a resolution, casting rays on worker threads, and compositing
//! the results into the window.

mod buffers;
pub use buffers::FrameBuffers;

mod cast;

mod composite;
pub use composite::{CompositeSample, SampleList, composite_back_to_front};

mod config;
pub use config::{
    ADJUSTABLE_LEVEL, ConfigError, LEVEL_COUNT, MIN_IMAGE_SCALE, STATIC_LEVEL_COUNT,
    STEP_SIZE_RANGE, ScaleTable, Tuning,
};

mod controller;
pub use controller::AdaptiveResolutionController;

mod renderer;
pub use renderer::{FrameInfo, RayCaster, RenderContext};

mod row_bounds;
pub use row_bounds::RowBounds;

mod schedule;
pub use schedule::{WorkerPool, default_thread_count, partition_rows, rows_for_thread};
