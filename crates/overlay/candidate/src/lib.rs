//! Per-peer candidate bookkeeping for the overlay walker.
//!
//! Every remote peer the overlay hears about is tracked as a [`Candidate`]:
//! up to three endpoints (wire, LAN, WAN) reconciled as messages arrive,
//! three one-way discovery flags recording *how* the peer was reached, and
//! a per-community record of the last discovery step taken toward it. The
//! walker drives mutations from protocol events and uses the expiry API to
//! decide when a candidate has aged out of its communities entirely.
//!
//! A candidate is a plain value with no interior locking. The component
//! that owns the candidate table serializes access; these types never
//! spawn, block, or talk to the network themselves.

pub mod candidate;
pub mod resolver;

pub use candidate::{
    Candidate, CandidateError, CandidateOrigin, CommunityId, INITIAL_STEP_BACKOFF_SECS,
};
pub use resolver::{IdentityResolver, MemoryIdentityResolver};
