//! Recording session pipeline: queue, writer task, lifecycle.

mod pipeline;

pub use pipeline::{Recorder, RecorderState};
