//! Compilation Orchestrator
//!
//! The engine itself is an external collaborator reached through
//! [`engine::CompilerEngine`]. This module feeds it the tracked documents,
//! serves its file reads and turns its output into published diagnostics.
//! - engine.rs: collaborator interface and AST/diagnostic model
//! - paths.rs: URI <-> source unit name
//! - reader.rs: on-demand read callback
//! - snapshot.rs: latest compiled program
//! - diagnostics.rs: wire conversion
//! - orchestrator.rs: compile / validate / validate_all

pub mod diagnostics;
pub mod engine;
pub mod orchestrator;
pub mod paths;
pub mod reader;
pub mod snapshot;

pub use engine::{CompilerEngine, CompilerOutput, ReadCallback};
pub use orchestrator::{CompileInputs, Orchestrator};
pub use snapshot::ProgramSnapshot;
