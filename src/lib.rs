//! termcore - an embeddable command engine for web terminals.
//!
//! The host owns rendering and the transport; the engine turns key events
//! into command lines, dispatches them to registered processors, and keeps
//! per-session history and state.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod input;
pub mod io;
pub mod logging;
pub mod persistence;
pub mod session;

pub use commands::{
    CommandProcessor, CommandResult, CommandStatus, ExecutionContext, Parameter, ParameterType,
    ProcessCommand, ProcessorDescriptor, StateConfiguration,
};
pub use error::{EngineError, Result};
pub use input::{InputHandle, Interrupter, Key};
pub use io::{OutputSink, Writer};
pub use session::{EngineSession, SessionBuilder};
