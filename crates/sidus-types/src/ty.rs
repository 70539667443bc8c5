//! Registration-time type identity.
//!
//! Every injectable unit declares its dependency types and produced type as
//! [`TypeKey`]s when it is registered. Nothing is inspected at run time:
//! subtype relations are declared explicitly (component views, error lineage)
//! and indexed when the declaration is made.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a Rust type used as an injection key.
///
/// Works for unsized types too, so `TypeKey::of::<dyn Trait>()` names a
/// trait-object view of a component.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name as reported by the compiler.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module path or generic arguments.
    ///
    /// `alloc::sync::Arc<my_app::ChatClient>` becomes `Arc`,
    /// `dyn my_app::Notifier + Send + Sync` becomes `Notifier`.
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }
}

/// Strip module paths, generic arguments and `dyn` bounds from a type name.
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.strip_prefix("dyn ").unwrap_or(full);
    let base = base.split(['<', ' ']).next().unwrap_or(base);
    base.rsplit("::").next().unwrap_or(base)
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
