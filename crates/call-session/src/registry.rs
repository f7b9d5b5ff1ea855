//! Render surface bookkeeping.
//!
//! [`RenderSurfaceRegistry`] maps each participant (and the reserved
//! [`BindingKey::Local`] preview) to exactly one [`SurfaceHandle`]. Lookups are
//! keyed; there is no scan over existing surfaces.
//!
//! # Teardown order
//!
//! Handles are allocated from a per-registry counter and never reused, so
//! handle order is creation order. [`RenderSurfaceRegistry::unbind_all`]
//! releases in reverse creation order: remote surfaces first, the local
//! preview (created before joining) last.

use crate::errors::RegistryError;

use common::types::ParticipantId;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Registry key: the local preview or a remote participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKey {
    Local,
    Remote(ParticipantId),
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKey::Local => write!(f, "local"),
            BindingKey::Remote(id) => write!(f, "remote:{id}"),
        }
    }
}

impl From<ParticipantId> for BindingKey {
    fn from(id: ParticipantId) -> Self {
        BindingKey::Remote(id)
    }
}

/// Opaque drawing target identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    /// Raw handle value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// One registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RenderBinding {
    pub key: BindingKey,
    pub handle: SurfaceHandle,
}

/// One-binding-per-key registry of render surfaces.
#[derive(Debug, Default)]
pub struct RenderSurfaceRegistry {
    bindings: HashMap<BindingKey, SurfaceHandle>,
    next_handle: u64,
}

impl RenderSurfaceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to a surface.
    ///
    /// Returns the existing handle with `created = false` when `key` is
    /// already bound; repeated "video starting" notifications land here.
    pub fn bind(&mut self, key: impl Into<BindingKey>) -> (SurfaceHandle, bool) {
        let key = key.into();
        if let Some(handle) = self.bindings.get(&key) {
            return (*handle, false);
        }

        self.next_handle += 1;
        let handle = SurfaceHandle(self.next_handle);
        self.bindings.insert(key, handle);
        (handle, true)
    }

    /// Remove the binding for `key`.
    ///
    /// `NotFound` is expected when a participant leaves without ever having
    /// started video; callers treat it as a no-op.
    pub fn unbind(&mut self, key: impl Into<BindingKey>) -> Result<SurfaceHandle, RegistryError> {
        let key = key.into();
        self.bindings
            .remove(&key)
            .ok_or(RegistryError::NotFound(key))
    }

    /// Remove every binding, newest first.
    pub fn unbind_all(&mut self) -> Vec<RenderBinding> {
        let mut released: Vec<RenderBinding> = self
            .bindings
            .drain()
            .map(|(key, handle)| RenderBinding { key, handle })
            .collect();
        released.sort_by(|a, b| b.handle.cmp(&a.handle));
        released
    }

    #[must_use]
    pub fn get(&self, key: impl Into<BindingKey>) -> Option<SurfaceHandle> {
        self.bindings.get(&key.into()).copied()
    }

    #[must_use]
    pub fn contains(&self, key: impl Into<BindingKey>) -> bool {
        self.bindings.contains_key(&key.into())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// All bindings sorted by key (`Local` first, then remotes ascending).
    #[must_use]
    pub fn bindings(&self) -> Vec<RenderBinding> {
        let mut all: Vec<RenderBinding> = self
            .bindings
            .iter()
            .map(|(key, handle)| RenderBinding {
                key: *key,
                handle: *handle,
            })
            .collect();
        all.sort_by_key(|binding| binding.key);
        all
    }

    /// Remote participants that currently have a surface.
    #[must_use]
    pub fn remote_participants(&self) -> BTreeSet<ParticipantId> {
        self.bindings
            .keys()
            .filter_map(|key| match key {
                BindingKey::Remote(id) => Some(*id),
                BindingKey::Local => None,
            })
            .collect()
    }
}
