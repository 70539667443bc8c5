//! The running agent.
//!
//! - [`Agent`]: registration facade, startup and the run loop
//! - [`AgentHandle`]: cheap clone handed to components and tasks
//! - task pipeline, loop scheduler, worker pool and exception routing

mod agent;
mod handle;
mod pipeline;
mod pool;
mod routes;
mod scheduler;

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

pub use agent::Agent;
pub use handle::AgentHandle;
pub use routes::ExceptionRoute;

use crate::context::CompiledTask;
use crate::inject::{Component, Executable, TypedRegistry};
use pool::WorkerPool;
use scheduler::LoopEntry;

/// State of a built agent. Immutable apart from skill plans and loop
/// bookkeeping, which carry their own locks.
pub(crate) struct Application {
    pub(crate) name: String,
    pub(crate) components: TypedRegistry<Component>,
    pub(crate) skills: HashMap<String, Executable>,
    pub(crate) tasks: TypedRegistry<CompiledTask>,
    pub(crate) loops: Vec<LoopEntry>,
    pub(crate) routes: Vec<ExceptionRoute>,
    pub(crate) pool: WorkerPool,
    pub(crate) halt: CancellationToken,
}

impl Application {
    pub(crate) fn components(&self) -> &TypedRegistry<Component> {
        &self.components
    }
}
