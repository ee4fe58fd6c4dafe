// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-connection cross-reference tables.
//!
//! Remember which descriptors and identity tokens already crossed this
//! connection in each direction, so each is transmitted at most once.
//! The tables only grow; they are dropped with the connection.
//!
//! Descriptors are keyed by the local [`DescriptorToken`] (the sender's token
//! for outgoing descriptors, the token assigned on registration for incoming
//! ones). Tables are owned by one connection and need no locking.

use crate::registry::{DescriptorToken, IdentityToken};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct CrossRefTables {
    descriptors_sent: HashSet<DescriptorToken>,
    descriptors_received: HashSet<DescriptorToken>,
    identities_sent: HashSet<IdentityToken>,
    identities_received: HashSet<IdentityToken>,
}

impl CrossRefTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `token` is sent: a schema update must precede the payload.
    pub fn note_descriptor_sent(&mut self, token: DescriptorToken) -> bool {
        self.descriptors_sent.insert(token)
    }

    /// True the first time `token` arrives from the peer.
    pub fn note_descriptor_received(&mut self, token: DescriptorToken) -> bool {
        self.descriptors_received.insert(token)
    }

    /// True the first time `token` is sent. The null token is never sent.
    pub fn note_identity_sent(&mut self, token: IdentityToken) -> bool {
        !token.is_null() && self.identities_sent.insert(token)
    }

    pub fn note_identity_received(&mut self, token: IdentityToken) -> bool {
        !token.is_null() && self.identities_received.insert(token)
    }

    pub fn descriptor_was_sent(&self, token: DescriptorToken) -> bool {
        self.descriptors_sent.contains(&token)
    }

    pub fn identity_was_sent(&self, token: IdentityToken) -> bool {
        self.identities_sent.contains(&token)
    }

    /// (descriptors sent, descriptors received, identities sent, identities received)
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.descriptors_sent.len(),
            self.descriptors_received.len(),
            self.identities_sent.len(),
            self.identities_received.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_note_only() {
        let mut x = CrossRefTables::new();
        assert!(x.note_descriptor_sent(DescriptorToken(3)));
        assert!(!x.note_descriptor_sent(DescriptorToken(3)));
        assert!(x.descriptor_was_sent(DescriptorToken(3)));
        // Directions are independent.
        assert!(x.note_descriptor_received(DescriptorToken(3)));
        assert!(!x.note_descriptor_received(DescriptorToken(3)));

        assert!(x.note_identity_sent(IdentityToken(9)));
        assert!(!x.note_identity_sent(IdentityToken(9)));
        assert!(!x.note_identity_sent(IdentityToken::NULL));
        assert!(!x.note_identity_received(IdentityToken::NULL));
        assert_eq!(x.counts(), (1, 1, 1, 0));
    }
}
