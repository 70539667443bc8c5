//! Skill plans: per-task graphs whose cheapest path is the skill sequence.
//!
//! A plan is compiled once at startup from the task's declared sequence and
//! queried on every run, so weight changes made while the agent is running
//! take effect on the next execution of that task.

mod graph;
mod shortest;

pub use graph::{SkillPlan, Slot};
