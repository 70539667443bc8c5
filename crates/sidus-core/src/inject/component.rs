//! Built component instances.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use sidus_types::ty::TypeKey;

use super::registry::Typed;

/// A type-erased `Arc<T>`.
pub(crate) type Handle = Box<dyn Any + Send + Sync>;

/// A shared singleton produced by a component builder.
///
/// Holds the instance under its concrete type plus any declared views, such
/// as `Arc<dyn Notifier + Send + Sync>`. Views make the component resolvable
/// by those supertypes.
pub struct Component {
    ty: TypeKey,
    handle: Handle,
    views: Vec<(TypeKey, Handle)>,
}

impl Component {
    pub fn new<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            ty: TypeKey::of::<T>(),
            handle: Box::new(value),
            views: Vec::new(),
        }
    }

    /// Add a supertype view of the same instance.
    pub fn with_view<S: ?Sized + Send + Sync + 'static>(mut self, view: Arc<S>) -> Self {
        self.views.push((TypeKey::of::<S>(), Box::new(view)));
        self
    }

    pub(crate) fn from_parts(ty: TypeKey, handle: Handle, views: Vec<(TypeKey, Handle)>) -> Self {
        Self { ty, handle, views }
    }

    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    /// The instance as `T`, either its concrete type or a declared view.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        std::iter::once(&self.handle)
            .chain(self.views.iter().map(|(_, h)| h))
            .find_map(|h| h.downcast_ref::<Arc<T>>().cloned())
    }
}

impl Typed for Component {
    fn type_key(&self) -> Option<TypeKey> {
        Some(self.ty)
    }

    fn supertypes(&self) -> Vec<TypeKey> {
        self.views.iter().map(|(ty, _)| *ty).collect()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("type", &self.ty.short_name())
            .field(
                "views",
                &self.views.iter().map(|(ty, _)| ty.short_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
