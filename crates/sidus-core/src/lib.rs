//! Dependency injection, skill planning and execution engine for Sidus.
//!
//! An [`Agent`](runtime::Agent) collects registrations (component builders,
//! skills, tasks, loops, exception routes), resolves them into a built
//! application at startup, and then runs tasks through their skill plans on
//! a bounded worker pool.
//!
//! This crate depends only on `sidus-types` for shared types. Log output is
//! configured by `sidus-observe`.

pub mod config;
pub mod context;
pub mod error;
pub mod inject;
pub mod plan;
pub mod plugin;
pub mod runtime;
pub mod task;

pub use error::{ExecError, InvocationError};
pub use inject::{Args, Component, Executable, Key, Secondary, TypedRegistry, Value};
pub use runtime::{Agent, AgentHandle};
pub use task::{CompletedTask, Task, TaskInstance};
