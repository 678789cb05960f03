//! In-process virtual document dispatch: `(path, method)` -> handler,
//! looked up by a chained murmur3 hash of the two.

use std::collections::HashMap;

use wayside_parser::Method;

use crate::conn::ConnState;
use crate::error::ConfigError;
use crate::murmur3::virtspace_key;

/// A virtual-document handler. Called with the connection's state; must set
/// `resp.content_length` and `resp.done` (left at the "unset" defaults, a
/// handler that returns without touching them gets an empty `200 OK`, same
/// as the reference implementation's fallback).
pub type VirtHandler = fn(&mut ConnState);

/// `(path, method)` -> handler map.
#[derive(Clone, Default)]
pub struct VirtspaceMap {
    by_key: HashMap<u32, VirtHandler>,
    registered_paths: Vec<(String, String)>,
}

impl VirtspaceMap {
    /// Registers a handler for `(path, method)`. Errors if the same pair was
    /// already registered.
    pub fn insert(&mut self, path: &str, method: Method, handler: VirtHandler) -> Result<(), ConfigError> {
        let method_str = method.to_string();
        if self
            .registered_paths
            .iter()
            .any(|(p, m)| p == path && m == method_str.as_str())
        {
            return Err(ConfigError::DuplicateVirtspaceEntry {
                path: path.to_string(),
            });
        }
        let key = virtspace_key(path.as_bytes(), method_str.as_bytes());
        self.by_key.insert(key, handler);
        self.registered_paths.push((path.to_string(), method_str));
        Ok(())
    }

    /// Looks up a handler for `(path, method)` by their raw wire bytes,
    /// exactly as the request filter has them (no need to re-format the
    /// method to a string on the hot path).
    pub fn lookup(&self, path: &[u8], method: &[u8]) -> Option<VirtHandler> {
        let key = virtspace_key(path, method);
        self.by_key.get(&key).copied()
    }
}

impl std::fmt::Debug for VirtspaceMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtspaceMap")
            .field("registered_paths", &self.registered_paths)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn handler(c: &mut ConnState) {
        c.resp.content_length = Some(0);
        c.resp.done = true;
    }

    #[test]
    fn lookup_finds_a_registered_handler() {
        let mut map = VirtspaceMap::default();
        map.insert("/status", Method::Get, handler).unwrap();
        assert!(map.lookup(b"/status", b"GET").is_some());
        assert!(map.lookup(b"/status", b"POST").is_none());
        assert!(map.lookup(b"/other", b"GET").is_none());
    }

    #[test]
    fn insert_rejects_duplicate_registration() {
        let mut map = VirtspaceMap::default();
        map.insert("/status", Method::Get, handler).unwrap();
        assert!(map.insert("/status", Method::Get, handler).is_err());
    }
}
