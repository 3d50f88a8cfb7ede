//! The type pool.
//!
//! An explicitly owned registry of types under construction and finalized
//! snapshots, keyed by qualified name. `resolve_or_create` is atomic per name,
//! so concurrent callers racing on the same name observe exactly one working
//! descriptor. Finalization is the single point where a working descriptor's
//! memory is reclaimed; `release` covers the rollback path.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::artifact::FrozenType;
use crate::descriptor::{CtorDef, DescriptorState, TypeDescriptor, TypeKind};
use crate::error::SynthesisError;

/// Qualified name of the pre-registered runtime base type every
/// implementation links against.
pub const RUNTIME_BASE: &str = "epkit.EndpointApi";

enum PoolEntry {
    Working {
        kind: TypeKind,
        descriptor: Arc<Mutex<TypeDescriptor>>,
    },
    Frozen(Arc<FrozenType>),
}

enum HandleInner {
    Working(Arc<Mutex<TypeDescriptor>>),
    Frozen(Arc<FrozenType>),
}

/// A pool-issued reference to a named type.
///
/// Working handles grant mutation through [`TypeHandle::with`]; handles to
/// finalized types can only be read, and any mutation attempt through them
/// fails with [`SynthesisError::FrozenType`].
pub struct TypeHandle {
    name: String,
    kind: TypeKind,
    inner: HandleInner,
}

impl TypeHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// The frozen snapshot, when this handle points at a finalized type.
    pub fn frozen(&self) -> Option<&Arc<FrozenType>> {
        match &self.inner {
            HandleInner::Frozen(frozen) => Some(frozen),
            HandleInner::Working(_) => None,
        }
    }

    /// Run a mutation against the working descriptor.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&mut TypeDescriptor) -> Result<T, SynthesisError>,
    ) -> Result<T, SynthesisError> {
        match &self.inner {
            HandleInner::Working(descriptor) => f(&mut descriptor.lock()),
            HandleInner::Frozen(_) => Err(SynthesisError::FrozenType {
                name: self.name.clone(),
            }),
        }
    }
}

impl std::fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHandle")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field(
                "frozen",
                &matches!(self.inner, HandleInner::Frozen(_)),
            )
            .finish()
    }
}

/// Registry of working descriptors and frozen snapshots, keyed by name.
pub struct TypePool {
    entries: DashMap<String, PoolEntry>,
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

impl TypePool {
    /// Create a pool with the runtime base type pre-registered and frozen.
    ///
    /// The base carries a default constructor and the handler-injecting one,
    /// so implementation types always have the expected supertype shape to
    /// link and construct against.
    pub fn new() -> Self {
        let pool = Self {
            entries: DashMap::new(),
        };

        let mut base = TypeDescriptor::new(RUNTIME_BASE, TypeKind::Class);
        base.constructors = vec![CtorDef::default_ctor(), CtorDef::handler_ctor()];
        pool.entries.insert(
            RUNTIME_BASE.to_owned(),
            PoolEntry::Frozen(Arc::new(FrozenType::from_descriptor(base))),
        );
        pool
    }

    /// Get the existing type under `name` or atomically create a working
    /// descriptor for it.
    ///
    /// A kind mismatch against the existing entry is a [`SynthesisError::NameConflict`].
    /// Resolving a finalized name of the same kind yields a read-only handle
    /// to the frozen shape.
    pub fn resolve_or_create(
        &self,
        name: &str,
        kind: TypeKind,
    ) -> Result<TypeHandle, SynthesisError> {
        match self.entries.entry(name.to_owned()) {
            Entry::Occupied(occupied) => match occupied.get() {
                PoolEntry::Working {
                    kind: existing,
                    descriptor,
                } => {
                    if *existing != kind {
                        return Err(SynthesisError::NameConflict {
                            name: name.to_owned(),
                            existing: *existing,
                            requested: kind,
                        });
                    }
                    Ok(TypeHandle {
                        name: name.to_owned(),
                        kind,
                        inner: HandleInner::Working(Arc::clone(descriptor)),
                    })
                }
                PoolEntry::Frozen(frozen) => {
                    if frozen.kind() != kind {
                        return Err(SynthesisError::NameConflict {
                            name: name.to_owned(),
                            existing: frozen.kind(),
                            requested: kind,
                        });
                    }
                    Ok(TypeHandle {
                        name: name.to_owned(),
                        kind,
                        inner: HandleInner::Frozen(Arc::clone(frozen)),
                    })
                }
            },
            Entry::Vacant(vacant) => {
                tracing::debug!(type_name = %name, kind = %kind, "creating working descriptor");
                let descriptor = Arc::new(Mutex::new(TypeDescriptor::new(name, kind)));
                vacant.insert(PoolEntry::Working {
                    kind,
                    descriptor: Arc::clone(&descriptor),
                });
                Ok(TypeHandle {
                    name: name.to_owned(),
                    kind,
                    inner: HandleInner::Working(descriptor),
                })
            }
        }
    }

    /// Snapshot the working descriptor behind `handle` into an immutable
    /// [`FrozenType`], replace the pool entry and reclaim the working memory.
    ///
    /// Finalizing a handle whose type is already frozen returns the existing
    /// snapshot. A handle whose descriptor was released fails with
    /// [`SynthesisError::FrozenType`].
    pub fn finalize(&self, handle: &TypeHandle) -> Result<Arc<FrozenType>, SynthesisError> {
        let descriptor = match &handle.inner {
            HandleInner::Frozen(frozen) => return Ok(Arc::clone(frozen)),
            HandleInner::Working(descriptor) => descriptor,
        };

        let mut guard = descriptor.lock();
        match guard.state {
            DescriptorState::Open => {
                let taken = guard.drain(DescriptorState::Finalized);
                drop(guard);
                let frozen = Arc::new(FrozenType::from_descriptor(taken));
                self.entries
                    .insert(handle.name.clone(), PoolEntry::Frozen(Arc::clone(&frozen)));
                tracing::info!(
                    type_name = %handle.name,
                    kind = %handle.kind,
                    operations = frozen.operations().len(),
                    "type finalized"
                );
                Ok(frozen)
            }
            DescriptorState::Finalized => {
                drop(guard);
                self.lookup(&handle.name)
                    .ok_or_else(|| SynthesisError::FrozenType {
                        name: handle.name.clone(),
                    })
            }
            DescriptorState::Released => Err(SynthesisError::FrozenType {
                name: handle.name.clone(),
            }),
        }
    }

    /// Discard a working descriptor without finalizing it (rollback). The
    /// name becomes available again.
    pub fn release(&self, handle: &TypeHandle) -> Result<(), SynthesisError> {
        let descriptor = match &handle.inner {
            HandleInner::Frozen(_) => {
                return Err(SynthesisError::FrozenType {
                    name: handle.name.clone(),
                })
            }
            HandleInner::Working(descriptor) => descriptor,
        };

        {
            let mut guard = descriptor.lock();
            if guard.state != DescriptorState::Open {
                return Err(SynthesisError::FrozenType {
                    name: handle.name.clone(),
                });
            }
            guard.drain(DescriptorState::Released);
        }
        self.entries.remove_if(&handle.name, |_, entry| {
            matches!(entry, PoolEntry::Working { descriptor: d, .. } if Arc::ptr_eq(d, descriptor))
        });
        tracing::debug!(type_name = %handle.name, "working descriptor released");
        Ok(())
    }

    /// The frozen snapshot under `name`, when one exists.
    pub fn lookup(&self, name: &str) -> Option<Arc<FrozenType>> {
        self.entries.get(name).and_then(|entry| match entry.value() {
            PoolEntry::Frozen(frozen) => Some(Arc::clone(frozen)),
            PoolEntry::Working { .. } => None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::TypeRef;
    use crate::descriptor::FieldDef;

    #[test]
    fn runtime_base_is_pre_registered() {
        let pool = TypePool::new();
        let base = pool.lookup(RUNTIME_BASE).expect("base type");
        assert!(base.has_constructor(&CtorDef::default_ctor()));
        assert!(base.has_constructor(&CtorDef::handler_ctor()));
    }

    #[test]
    fn resolve_returns_the_same_working_descriptor() {
        let pool = TypePool::new();
        let first = pool
            .resolve_or_create("demo.Api", TypeKind::Interface)
            .unwrap();
        let second = pool
            .resolve_or_create("demo.Api", TypeKind::Interface)
            .unwrap();

        first
            .with(|desc| {
                desc.add_field(FieldDef {
                    ty: TypeRef::String,
                    name: "uid".to_owned(),
                    initial_value: None,
                })
            })
            .unwrap();
        let seen = second.with(|desc| Ok(desc.fields.len())).unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn kind_mismatch_is_a_name_conflict() {
        let pool = TypePool::new();
        pool.resolve_or_create("demo.Api", TypeKind::Interface)
            .unwrap();
        assert!(matches!(
            pool.resolve_or_create("demo.Api", TypeKind::Class),
            Err(SynthesisError::NameConflict { .. })
        ));
        assert!(matches!(
            pool.resolve_or_create(RUNTIME_BASE, TypeKind::Interface),
            Err(SynthesisError::NameConflict { .. })
        ));
    }

    #[test]
    fn finalize_is_idempotent_and_blocks_mutation() {
        let pool = TypePool::new();
        let handle = pool
            .resolve_or_create("demo.Api", TypeKind::Interface)
            .unwrap();
        let frozen = pool.finalize(&handle).unwrap();
        let again = pool.finalize(&handle).unwrap();
        assert_eq!(frozen.name(), again.name());

        assert!(matches!(
            handle.with(|desc| desc.remove_field("anything")),
            Err(SynthesisError::FrozenType { .. })
        ));

        let reread = pool
            .resolve_or_create("demo.Api", TypeKind::Interface)
            .unwrap();
        assert!(reread.frozen().is_some());
    }

    #[test]
    fn release_makes_the_name_available_again() {
        let pool = TypePool::new();
        let handle = pool
            .resolve_or_create("demo.Api", TypeKind::Interface)
            .unwrap();
        pool.release(&handle).unwrap();
        assert!(!pool.contains("demo.Api"));

        let fresh = pool
            .resolve_or_create("demo.Api", TypeKind::Interface)
            .unwrap();
        let fields = fresh.with(|desc| Ok(desc.fields.len())).unwrap();
        assert_eq!(fields, 0);
    }
}
