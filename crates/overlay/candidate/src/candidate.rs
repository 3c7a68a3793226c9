//! The candidate entity: one remote peer and how we came to know it.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{SystemTime, UNIX_EPOCH};

use confab_net_endpoint::Endpoint;
use thiserror::Error;
use tracing::{debug, trace};

use crate::resolver::IdentityResolver;

/// Marker trait for community identifiers.
///
/// Candidates key their per-community state by an opaque identifier; any
/// clonable, hashable type qualifies. Blanket-implemented, never implemented
/// by hand.
pub trait CommunityId: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> CommunityId for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Grace window, in seconds, subtracted when seeding a community's
/// last-step entry.
///
/// A freshly tracked candidate is stamped as if its last discovery step
/// happened this long ago, so the walker treats it as overdue and walks
/// toward it immediately instead of waiting out an interval it never had.
pub const INITIAL_STEP_BACKOFF_SECS: u64 = 30;

/// How a candidate entered the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    /// Observed through protocol traffic.
    Discovered,
    /// Configured well-known seed peer.
    Bootstrap,
}

/// Errors raised by candidate construction and address updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    /// The wire address must be one endpoint of the reported LAN/WAN pair.
    ///
    /// The caller derives the pair from the same datagram the wire address
    /// came from, so a triple failing this check was assembled from
    /// mismatched messages. The candidate is left untouched.
    #[error("wire address {address} is neither the lan address {lan} nor the wan address {wan}")]
    AddressOutsidePair {
        address: Endpoint,
        lan: Endpoint,
        wan: Endpoint,
    },
}

/// One remote peer as currently known to the overlay.
///
/// Three endpoints describe where the peer is. `address` is what the most
/// recent exchange actually used on the wire. `lan_address` and
/// `wan_address` are the peer's self-reported local and external endpoints;
/// behind a NAT they differ, and which one we can reach depends on which
/// side of the NAT we sit. The wire address always equals one of the pair,
/// an invariant enforced at construction and on every address update.
///
/// Three flags record how the peer was reached. They are latches: once an
/// outbound walk succeeds (`is_walk`), an unsolicited inbound request
/// arrives (`is_stumble`), or a third party introduces the peer
/// (`is_introduction`), the corresponding flag stays set for the lifetime
/// of the candidate.
///
/// Per community, the candidate remembers when the walker last took a
/// discovery step toward it. Entries are seeded back-dated by
/// [`INITIAL_STEP_BACKOFF_SECS`] so new candidates are immediately eligible,
/// and dropped one community at a time as walks toward the peer time out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<C: CommunityId> {
    address: Endpoint,
    lan_address: Endpoint,
    wan_address: Endpoint,
    origin: CandidateOrigin,
    is_walk: bool,
    is_stumble: bool,
    is_introduction: bool,
    timestamp_incoming: u64,
    last_step: HashMap<C, u64>,
}

impl<C: CommunityId> Candidate<C> {
    /// Creates a candidate from the wire address and the LAN/WAN pair
    /// reported in the same message.
    ///
    /// Fails if `address` matches neither endpoint of the pair.
    pub fn new(
        address: Endpoint,
        lan_address: Endpoint,
        wan_address: Endpoint,
    ) -> Result<Self, CandidateError> {
        check_pair_membership(&address, &lan_address, &wan_address)?;
        Ok(Self::from_parts(
            address,
            lan_address,
            wan_address,
            CandidateOrigin::Discovered,
        ))
    }

    /// Creates a seed-peer candidate.
    ///
    /// Seed peers are configured by a single well-known endpoint, so it
    /// serves as wire, LAN, and WAN address at once. No community is
    /// associated until traffic arrives.
    pub fn bootstrap(wan_address: Endpoint) -> Self {
        Self::from_parts(
            wan_address.clone(),
            wan_address.clone(),
            wan_address,
            CandidateOrigin::Bootstrap,
        )
    }

    fn from_parts(
        address: Endpoint,
        lan_address: Endpoint,
        wan_address: Endpoint,
        origin: CandidateOrigin,
    ) -> Self {
        debug!(wan = %wan_address, lan = %lan_address, ?origin, "discovered candidate");
        Self {
            address,
            lan_address,
            wan_address,
            origin,
            is_walk: false,
            is_stumble: false,
            is_introduction: false,
            timestamp_incoming: unix_now(),
            last_step: HashMap::new(),
        }
    }

    /// Associates the candidate with `community`, seeding its last-step
    /// entry back-dated by [`INITIAL_STEP_BACKOFF_SECS`].
    pub fn with_community(mut self, community: C) -> Self {
        let seed = self
            .timestamp_incoming
            .saturating_sub(INITIAL_STEP_BACKOFF_SECS);
        self.last_step.insert(community, seed);
        self
    }

    /// Marks the candidate as already reached by an outbound walk.
    pub fn with_walk(mut self) -> Self {
        self.is_walk = true;
        self
    }

    /// Marks the candidate as already having contacted us unsolicited.
    pub fn with_stumble(mut self) -> Self {
        self.is_stumble = true;
        self
    }

    /// Marks the candidate as already introduced by a third party.
    pub fn with_introduction(mut self) -> Self {
        self.is_introduction = true;
        self
    }

    /// Endpoint the most recent exchange actually used on the wire.
    pub fn address(&self) -> &Endpoint {
        &self.address
    }

    /// The peer's self-reported locally reachable endpoint.
    pub fn lan_address(&self) -> &Endpoint {
        &self.lan_address
    }

    /// The peer's self-reported externally visible endpoint.
    pub fn wan_address(&self) -> &Endpoint {
        &self.wan_address
    }

    pub fn origin(&self) -> CandidateOrigin {
        self.origin
    }

    /// Whether this is a configured seed peer.
    pub fn is_bootstrap(&self) -> bool {
        self.origin == CandidateOrigin::Bootstrap
    }

    /// True once one of our outbound walks was answered.
    pub fn is_walk(&self) -> bool {
        self.is_walk
    }

    /// True once the peer contacted us without being asked.
    pub fn is_stumble(&self) -> bool {
        self.is_stumble
    }

    /// True once a third party introduced the peer to us.
    pub fn is_introduction(&self) -> bool {
        self.is_introduction
    }

    /// Unix seconds of the most recent activity from this peer, across all
    /// communities.
    pub fn timestamp_incoming(&self) -> u64 {
        self.timestamp_incoming
    }

    /// Unix seconds of the last discovery step toward this candidate in
    /// `community`, or `default` when it has no history there.
    pub fn last_step_in_community(&self, community: &C, default: u64) -> u64 {
        self.last_step.get(community).copied().unwrap_or(default)
    }

    /// Whether the candidate is currently tracked in `community`.
    pub fn is_in_community(&self, community: &C) -> bool {
        self.last_step.contains_key(community)
    }

    /// The communities the candidate is currently tracked in, in no
    /// particular order.
    pub fn communities(&self) -> Vec<C> {
        self.last_step.keys().cloned().collect()
    }

    /// The identities `resolver` has on record for the current wire address.
    ///
    /// Only [`address`](Self::address) is consulted, never the LAN/WAN
    /// pair: identities are bound to the endpoint traffic actually arrives
    /// from. The result is as unverified as the resolver's records are; see
    /// [`IdentityResolver`].
    pub fn members<R: IdentityResolver>(&self, resolver: &R) -> HashSet<R::Identity> {
        resolver.identities_at(&self.address)
    }

    /// Records that a discovery step toward this candidate was just taken
    /// in `community`, stamping its last-step entry with the current time.
    pub fn record_introduction_request_sent(&mut self, community: C) {
        self.last_step.insert(community, unix_now());
    }

    /// Records an unsolicited introduction request received from this peer,
    /// carrying a fresh LAN/WAN pair. Latches the stumble flag.
    ///
    /// Fails, leaving the candidate untouched, if the current wire address
    /// matches neither endpoint of the new pair.
    pub fn record_introduction_request_received(
        &mut self,
        lan_address: Endpoint,
        wan_address: Endpoint,
    ) -> Result<(), CandidateError> {
        check_pair_membership(&self.address, &lan_address, &wan_address)?;
        trace!(wan = %wan_address, lan = %lan_address, "candidate addresses updated");
        self.lan_address = lan_address;
        self.wan_address = wan_address;
        self.is_stumble = true;
        Ok(())
    }

    /// Records the answer to one of our own walks, carrying a fresh LAN/WAN
    /// pair. Latches the walk flag.
    ///
    /// Fails, leaving the candidate untouched, if the current wire address
    /// matches neither endpoint of the new pair.
    pub fn record_introduction_response_received(
        &mut self,
        lan_address: Endpoint,
        wan_address: Endpoint,
    ) -> Result<(), CandidateError> {
        check_pair_membership(&self.address, &lan_address, &wan_address)?;
        trace!(wan = %wan_address, lan = %lan_address, "candidate addresses updated");
        self.lan_address = lan_address;
        self.wan_address = wan_address;
        self.is_walk = true;
        Ok(())
    }

    /// Records that a third party introduced this candidate to us. Latches
    /// the introduction flag; addresses are untouched.
    pub fn record_introduced(&mut self) {
        trace!("candidate introduced by a third party");
        self.is_introduction = true;
    }

    /// Records a NAT puncture message that re-established the full address
    /// triple, wire address included.
    ///
    /// Fails, leaving the candidate untouched, if the new wire address
    /// matches neither endpoint of the new pair.
    pub fn record_puncture(
        &mut self,
        address: Endpoint,
        lan_address: Endpoint,
        wan_address: Endpoint,
    ) -> Result<(), CandidateError> {
        check_pair_membership(&address, &lan_address, &wan_address)?;
        trace!(wan = %wan_address, lan = %lan_address, "candidate addresses updated");
        self.address = address;
        self.lan_address = lan_address;
        self.wan_address = wan_address;
        Ok(())
    }

    /// Records arbitrary traffic from this peer within `community`.
    ///
    /// Refreshes [`timestamp_incoming`](Self::timestamp_incoming) and, when
    /// the community is not yet tracked, seeds its last-step entry
    /// back-dated by [`INITIAL_STEP_BACKOFF_SECS`]. An existing entry is
    /// left alone: ordinary traffic is not a discovery step.
    pub fn record_any_activity(&mut self, community: C) {
        trace!(wan = %self.wan_address, lan = %self.lan_address, "candidate activity");
        let now = unix_now();
        self.last_step
            .entry(community)
            .or_insert_with(|| now.saturating_sub(INITIAL_STEP_BACKOFF_SECS));
        self.timestamp_incoming = now;
    }

    /// Drops the candidate's last-step entry for `community` after a walk
    /// toward it timed out there. Unknown communities are a no-op.
    ///
    /// Returns whether any communities still track the candidate; `false`
    /// tells the owning table the entry is eligible for eviction.
    pub fn expire_in_community(&mut self, community: &C) -> bool {
        if self.last_step.remove(community).is_some() {
            trace!(
                ?community,
                remaining = self.last_step.len(),
                "candidate expired in community"
            );
        }
        !self.last_step.is_empty()
    }
}

fn check_pair_membership(
    address: &Endpoint,
    lan: &Endpoint,
    wan: &Endpoint,
) -> Result<(), CandidateError> {
    if address == lan || address == wan {
        Ok(())
    } else {
        Err(CandidateError::AddressOutsidePair {
            address: address.clone(),
            lan: lan.clone(),
            wan: wan.clone(),
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
