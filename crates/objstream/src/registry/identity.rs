// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object-identity table.
//!
//! Identity tokens name objects across independent graphs (another message,
//! another file, another process). Each token carries a label so the peer can
//! resolve what the token stands for.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

/// Global object-identity token. `0` means "no object".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityToken(pub u64);

impl IdentityToken {
    pub const NULL: IdentityToken = IdentityToken(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id:{:#x}", self.0)
    }
}

#[derive(Debug, Default)]
struct Inner {
    labels: HashMap<IdentityToken, String>,
    next: u64,
}

/// Thread-safe token -> label table.
#[derive(Debug, Default)]
pub struct IdentityTable {
    inner: RwLock<Inner>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh token for `label`.
    pub fn assign(&self, label: impl Into<String>) -> IdentityToken {
        let label = label.into();
        let mut inner = self.inner.write();
        loop {
            inner.next += 1;
            let token = IdentityToken(inner.next);
            if !inner.labels.contains_key(&token) {
                inner.labels.insert(token, label);
                return token;
            }
        }
    }

    /// Record a token learned from a peer. Returns false if it was already known.
    ///
    /// Known tokens keep their original label.
    pub fn register(&self, token: IdentityToken, label: impl Into<String>) -> bool {
        if token.is_null() {
            return false;
        }
        let mut inner = self.inner.write();
        if inner.labels.contains_key(&token) {
            return false;
        }
        inner.labels.insert(token, label.into());
        true
    }

    pub fn label(&self, token: IdentityToken) -> Option<String> {
        self.inner.read().labels.get(&token).cloned()
    }

    pub fn contains(&self, token: IdentityToken) -> bool {
        self.inner.read().labels.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.inner.read().labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_and_register() {
        let table = IdentityTable::new();
        let a = table.assign("detector");
        let b = table.assign("run-7");
        assert_ne!(a, b);
        assert!(!a.is_null());

        // A peer token colliding with the local counter is skipped by assign.
        assert!(table.register(IdentityToken(3), "remote"));
        assert!(!table.register(IdentityToken(3), "again"));
        assert_eq!(table.label(IdentityToken(3)).as_deref(), Some("remote"));
        let c = table.assign("next");
        assert_eq!(c, IdentityToken(4));

        assert!(!table.register(IdentityToken::NULL, "null"));
        assert_eq!(table.len(), 4);
    }
}
