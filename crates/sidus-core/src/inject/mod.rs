//! Registration-time dependency injection.
//!
//! - [`registry`]: name- and type-indexed storage with supertype lookup
//! - [`executable`]: callable units with declared parameters and produced type
//! - [`component`]: built singletons and their supertype views
//! - [`naming`]: default names derived from types and `fn` items

pub mod component;
pub mod executable;
pub mod naming;
pub mod registry;

pub use component::Component;
pub use executable::{Args, Executable, ExecutableBuilder, Object, Param, ParamKind, Secondary, UnitKind, Value};
pub use registry::{Key, Typed, TypedRegistry};
