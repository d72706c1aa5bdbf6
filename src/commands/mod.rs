//! Command parsing, registration and dispatch.
//!
//! A line flows through [`tokenizer`] and [`parser`], is resolved against the
//! [`registry`], and is run by the [`dispatcher`] with an
//! [`ExecutionContext`](context::ExecutionContext).

pub mod builtins;
pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod help;
pub mod parser;
pub mod registry;
pub mod tokenizer;

pub use context::{ExecutionContext, Process, Services};
pub use descriptor::{
    CommandProcessor, Parameter, ParameterType, ProcessorDescriptor, ProcessorMetadata,
    StateConfiguration,
};
pub use dispatcher::{CommandResult, CommandStatus};
pub use parser::{parse, parse_with, split_pipeline, ParsedCommand, ProcessCommand};
pub use registry::{HostVersions, ProcessorRegistry, Resolved};
pub use tokenizer::{ParseError, Token};
