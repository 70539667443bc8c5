//! Name- and type-indexed registry.
//!
//! Every item is stored under exactly one name and one type, and both map to
//! the same entry. Lookups by type also consider declared supertypes, so a
//! component registered as `MailNotifier` with a `dyn Notifier` view answers
//! a lookup for `dyn Notifier` as long as it is the only candidate.

use std::collections::HashMap;
use std::fmt;

use sidus_types::error::RegistryError;
use sidus_types::ty::TypeKey;

/// An item that knows its own type key.
pub trait Typed {
    /// The type the item is registered under when none is given.
    fn type_key(&self) -> Option<TypeKey>;

    /// Additional types the item can be resolved by.
    fn supertypes(&self) -> Vec<TypeKey> {
        Vec::new()
    }
}

/// Lookup key for a [`TypedRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    Name(&'a str),
    Type(TypeKey),
}

impl Key<'static> {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key::Type(TypeKey::of::<T>())
    }
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(name: &'a str) -> Self {
        Key::Name(name)
    }
}

impl<'a> From<&'a String> for Key<'a> {
    fn from(name: &'a String) -> Self {
        Key::Name(name.as_str())
    }
}

impl From<TypeKey> for Key<'_> {
    fn from(ty: TypeKey) -> Self {
        Key::Type(ty)
    }
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Type(ty) => f.write_str(ty.short_name()),
        }
    }
}

struct Entry<V> {
    name: String,
    ty: TypeKey,
    item: V,
}

/// A registry keeping a 1:1 association between names and types.
pub struct TypedRegistry<V> {
    entries: Vec<Entry<V>>,
    names: HashMap<String, usize>,
    types: HashMap<TypeKey, usize>,
    supertypes: HashMap<TypeKey, Vec<usize>>,
}

impl<V> Default for TypedRegistry<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            names: HashMap::new(),
            types: HashMap::new(),
            supertypes: HashMap::new(),
        }
    }
}

impl<V: Typed> TypedRegistry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `item` under `name`.
    ///
    /// The type is taken from `ty` when given, otherwise from the item.
    /// Fails when the name or the type already belongs to another entry, and
    /// when the exact pair is registered twice.
    pub fn put(
        &mut self,
        item: V,
        name: impl Into<String>,
        ty: Option<TypeKey>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let ty = ty
            .or_else(|| item.type_key())
            .ok_or_else(|| RegistryError::MissingType(name.clone()))?;

        match (self.names.get(&name), self.types.get(&ty)) {
            (Some(by_name), Some(by_type)) if by_name == by_type => {
                return Err(RegistryError::AlreadyRegistered {
                    name,
                    ty: ty.short_name().to_string(),
                });
            }
            (Some(_), Some(_)) => {
                return Err(RegistryError::NameTypeMismatch {
                    name,
                    ty: ty.short_name().to_string(),
                });
            }
            (Some(_), None) => return Err(RegistryError::NameTaken(name)),
            (None, Some(_)) => {
                return Err(RegistryError::TypeTaken {
                    name,
                    ty: ty.short_name().to_string(),
                });
            }
            (None, None) => {}
        }

        let index = self.entries.len();
        for supertype in item.supertypes() {
            if supertype != ty {
                self.supertypes.entry(supertype).or_default().push(index);
            }
        }
        self.names.insert(name.clone(), index);
        self.types.insert(ty, index);
        self.entries.push(Entry { name, ty, item });
        Ok(())
    }
}

impl<V> TypedRegistry<V> {
    fn index_of(&self, key: Key<'_>) -> Result<Option<usize>, RegistryError> {
        match key {
            Key::Name(name) => Ok(self.names.get(name).copied()),
            Key::Type(ty) => {
                if let Some(&index) = self.types.get(&ty) {
                    return Ok(Some(index));
                }
                match self.supertypes.get(&ty).map(Vec::as_slice) {
                    None | Some([]) => Ok(None),
                    Some([index]) => Ok(Some(*index)),
                    Some(candidates) => Err(RegistryError::Ambiguous {
                        ty: ty.short_name().to_string(),
                        candidates: candidates
                            .iter()
                            .map(|&i| self.entries[i].name.clone())
                            .collect(),
                    }),
                }
            }
        }
    }

    /// Look up an item by name or by type.
    ///
    /// A type lookup prefers an exact match and falls back to the unique
    /// entry declaring that type as a supertype.
    pub fn get<'k>(&self, key: impl Into<Key<'k>>) -> Result<Option<&V>, RegistryError> {
        Ok(self.index_of(key.into())?.map(|i| &self.entries[i].item))
    }

    /// Like [`get`](Self::get) but also returns the entry's name and type.
    pub fn get_entry<'k>(
        &self,
        key: impl Into<Key<'k>>,
    ) -> Result<Option<(&str, TypeKey, &V)>, RegistryError> {
        Ok(self.index_of(key.into())?.map(|i| {
            let entry = &self.entries[i];
            (entry.name.as_str(), entry.ty, &entry.item)
        }))
    }

    /// True when `key` matches at least one entry, ambiguity included.
    pub fn contains<'k>(&self, key: impl Into<Key<'k>>) -> bool {
        match self.index_of(key.into()) {
            Ok(found) => found.is_some(),
            Err(_) => true,
        }
    }

    pub fn name_of(&self, ty: TypeKey) -> Option<&str> {
        self.types.get(&ty).map(|&i| self.entries[i].name.as_str())
    }

    /// All entries as `(name, type, item)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TypeKey, &V)> {
        self.entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.ty, &entry.item))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
