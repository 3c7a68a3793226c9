//! Identity resolution seam.
//!
//! The overlay's identity records live elsewhere; candidates only need one
//! capability from them: which identities have announced a given endpoint.
//! The trait keeps that dependency injectable, and the in-memory
//! implementation backs tests and single-process deployments.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use auto_impl::auto_impl;
use confab_net_endpoint::Endpoint;

/// Resolves the identities observed announcing an endpoint.
///
/// Announcements are taken at face value: an identity message can claim any
/// endpoint, and nothing at this layer proves the binding. Implementations
/// that can distinguish handshake-verified claims should still return the
/// full set here and expose verification separately.
#[auto_impl(&, Box, Arc)]
pub trait IdentityResolver: Send + Sync {
    /// Identity type handed back by the resolver.
    type Identity: Clone + Eq + Hash;

    /// The distinct identities that have announced `endpoint`.
    fn identities_at(&self, endpoint: &Endpoint) -> HashSet<Self::Identity>;
}

/// In-memory resolver over announced endpoint claims.
///
/// Plain value with no interior locking, like the candidates that query it.
#[derive(Debug, Clone)]
pub struct MemoryIdentityResolver<I> {
    claims: HashMap<Endpoint, HashSet<I>>,
}

impl<I> MemoryIdentityResolver<I> {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self {
            claims: HashMap::new(),
        }
    }

    /// Number of endpoints with at least one recorded claim.
    pub fn endpoint_count(&self) -> usize {
        self.claims.len()
    }
}

impl<I> Default for MemoryIdentityResolver<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Clone + Eq + Hash> MemoryIdentityResolver<I> {
    /// Records that `identity` announced `endpoint`. Duplicate claims
    /// collapse into one.
    pub fn announce(&mut self, endpoint: Endpoint, identity: I) {
        self.claims.entry(endpoint).or_default().insert(identity);
    }
}

impl<I: Clone + Eq + Hash + Send + Sync> IdentityResolver for MemoryIdentityResolver<I> {
    type Identity = I;

    fn identities_at(&self, endpoint: &Endpoint) -> HashSet<I> {
        self.claims.get(endpoint).cloned().unwrap_or_default()
    }
}
