//! Lifecycle of handles to converted output.
//!
//! Every converted image gets one [`ManagedHandle`], an opaque
//! `blob:pixelgate/<n>` reference that the host can hand to a viewer or a
//! download link. The [`HandleRegistry`] owns the bytes behind each live
//! handle and guarantees each handle is released exactly once:
//!
//! - explicitly, via [`HandleRegistry::release`] (idempotent),
//! - when the host reports the element showing it was removed
//!   ([`HandleRegistry::detached`]),
//! - in bulk on [`HandleRegistry::release_all`] (clear / regenerate),
//! - or finally when the registry itself is dropped.
//!
//! Released handles never resolve again, and ids are never reused.

use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const SCHEME: &str = "blob:pixelgate/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagedHandle(u64);

impl ManagedHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ManagedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}", self.0)
    }
}

impl Serialize for ManagedHandle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Default)]
pub struct HandleRegistry {
    next_id: u64,
    live: HashMap<u64, Arc<[u8]>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a fresh handle to `bytes`.
    pub fn register(&mut self, bytes: Arc<[u8]>) -> ManagedHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id, bytes);
        ManagedHandle(id)
    }

    /// The bytes behind a live handle.
    pub fn resolve(&self, handle: ManagedHandle) -> Option<Arc<[u8]>> {
        self.live.get(&handle.0).cloned()
    }

    pub fn is_live(&self, handle: ManagedHandle) -> bool {
        self.live.contains_key(&handle.0)
    }

    /// Release one handle. Returns `false` if it was already released or
    /// never issued by this registry.
    pub fn release(&mut self, handle: ManagedHandle) -> bool {
        let released = self.live.remove(&handle.0).is_some();
        if released {
            debug!("Released {handle}");
        }
        released
    }

    /// The element displaying `handle` went away.
    pub fn detached(&mut self, handle: ManagedHandle) -> bool {
        self.release(handle)
    }

    /// Release every live handle, returning how many there were.
    pub fn release_all(&mut self) -> usize {
        let count = self.live.len();
        self.live.clear();
        if count > 0 {
            debug!("Released {count} handle(s)");
        }
        count
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl Drop for HandleRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}
