//! Engine module housing the capture pipeline.
//!
//! `backend` abstracts the audio source, `session` owns one running pipeline
//! and its dispatcher thread, `gate` arbitrates triggered capture cycles and
//! `sink` delivers results to the action layer.

pub mod backend;
pub(crate) mod dispatcher;
pub mod gate;
pub mod session;
pub mod sink;

pub use backend::{CaptureBackend, CpalBackend, FixtureBackend, FixtureFeeder};
pub use gate::{CycleState, TriggerOutcome};
pub use session::{PipelineSession, SessionBuilder, SessionSummary, TriggerHandle};
pub use sink::{BroadcastSink, ChannelSink, ClassificationEvent, CommandSink, LogSink, ResultSink};
