//! In-process engine tests.

pub mod dispatch_test;
pub mod interactive_test;
pub mod persistence_test;
pub mod pipeline_test;

use termcore::input::InputHandle;
use termcore::io::CaptureSink;
use termcore::{EngineSession, ProcessorDescriptor};

/// Builds a session with the built-ins plus `extra`, capturing output.
pub async fn session_with(
    extra: Vec<ProcessorDescriptor>,
) -> (EngineSession, InputHandle, CaptureSink) {
    let sink = CaptureSink::new();
    let (mut session, handle) = EngineSession::builder()
        .output(sink.clone())
        .build()
        .await
        .unwrap();
    for descriptor in extra {
        session.register_processor(descriptor).unwrap();
    }
    (session, handle, sink)
}
