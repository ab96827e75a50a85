mod accumulator;
mod classify;
mod pipeline;
mod recorder;

pub use accumulator::{Accumulator, AccumulatorSettings, AccumulatorState, PendingInput};
pub use classify::{keyword_regex, SubmitClassifier, DEFAULT_FIELD_KEYWORDS, DEFAULT_SUBMIT_KEYWORDS};
pub use pipeline::{build_pipeline, CaptureToStore, SessionOptions, SessionPipeline, StoreToResolver, Tick};
pub use recorder::{transition, CommandKind, CommandOutcome, Recorder, RecorderHandle};
