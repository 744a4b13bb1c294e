//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Policy engine: pure decisions about where multicast traffic should
//! flow, with no side effects on the kernel or the cache.

use std::net::Ipv6Addr;

use crate::error::Error;
use crate::ip6::{Ipv6MulticastExt, MulticastScope};
use crate::listener::ListenerSet;
use crate::mfc::{Mfc, MulticastRoute};
use crate::mif::MifIndex;

/// Output of the policy table (§4.F) for a given `(iif, group)` pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MifDecision {
    /// Output MIF to forward to, or [`MifIndex::None`].
    pub oif: MifIndex,
    /// `true` when `oif == MifIndex::None` — kept as a separate field so
    /// call sites read `if decision.block { .. }` rather than repeating
    /// the `MifIndex::None` comparison, while still treating `None` as a
    /// first-class sentinel rather than folding it into an `Option`.
    pub block: bool,
}

/// Computes the output MIF for an upcall arriving on `iif` for `group`,
/// given the current listener set. Implements the policy table of §4.F
/// exactly.
pub fn decide_oif(
    iif: MifIndex,
    group: Ipv6Addr,
    listeners: &ListenerSet,
) -> Result<MifDecision, Error> {
    let oif = match iif {
        MifIndex::Backbone => {
            if listeners.contains(group) {
                MifIndex::Thread
            } else {
                MifIndex::None
            }
        }
        MifIndex::Thread => {
            let scope = group.multicast_scope().unwrap_or(MulticastScope::Reserved);
            if scope > MulticastScope::RealmLocal {
                MifIndex::Backbone
            } else {
                MifIndex::None
            }
        }
        MifIndex::None => return Err(Error::InvalidArgs),
    };

    Ok(MifDecision {
        oif,
        block: oif == MifIndex::None,
    })
}

/// Routes blocked for `group` on the Backbone-to-Thread direction that a
/// fresh listener registration should unblock (§4.F, second paragraph):
/// `iif = Backbone, oif != Thread, route.group == group`.
pub fn unblock_candidates<'a>(
    mfc: &'a Mfc,
    group: Ipv6Addr,
) -> impl Iterator<Item = MulticastRoute> + 'a {
    mfc.iter()
        .filter(move |(route, info)| {
            route.group == group
                && info.iif == MifIndex::Backbone
                && info.oif != MifIndex::Thread
        })
        .map(|(route, _)| *route)
}

/// Routes to delete for `group` on listener removal (§4.F, third
/// paragraph): `iif = Backbone, route.group == group`.
pub fn remove_candidates<'a>(
    mfc: &'a Mfc,
    group: Ipv6Addr,
) -> impl Iterator<Item = MulticastRoute> + 'a {
    mfc.iter()
        .filter(move |(route, info)| {
            route.group == group && info.iif == MifIndex::Backbone
        })
        .map(|(route, _)| *route)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    #[test]
    fn backbone_forward_with_listener() {
        let mut listeners = ListenerSet::new();
        let group = addr("ff05::abcd");
        listeners.add(group);
        let decision = decide_oif(MifIndex::Backbone, group, &listeners).unwrap();
        assert_eq!(decision.oif, MifIndex::Thread);
        assert!(!decision.block);
    }

    #[test]
    fn backbone_block_without_listener() {
        let listeners = ListenerSet::new();
        let group = addr("ff05::beef");
        let decision = decide_oif(MifIndex::Backbone, group, &listeners).unwrap();
        assert_eq!(decision.oif, MifIndex::None);
        assert!(decision.block);
    }

    #[test]
    fn thread_forward_global_scope() {
        let listeners = ListenerSet::new();
        let group = addr("ff0e::1");
        let decision = decide_oif(MifIndex::Thread, group, &listeners).unwrap();
        assert_eq!(decision.oif, MifIndex::Backbone);
        assert!(!decision.block);
    }

    #[test]
    fn thread_block_realm_local() {
        let listeners = ListenerSet::new();
        let group = addr("ff03::fc");
        let decision = decide_oif(MifIndex::Thread, group, &listeners).unwrap();
        assert_eq!(decision.oif, MifIndex::None);
        assert!(decision.block);
    }

    #[test]
    fn invalid_iif_rejected() {
        let listeners = ListenerSet::new();
        let group = addr("ff0e::1");
        let result = decide_oif(MifIndex::None, group, &listeners);
        assert!(matches!(result, Err(Error::InvalidArgs)));
    }
}
