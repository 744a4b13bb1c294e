//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The in-memory mirror of the kernel's Multicast Forwarding Cache.

use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::time::Instant;

use crate::mif::MifIndex;

/// A multicast route key: the `(source, group)` pair the kernel's MFC is
/// keyed on.
///
/// `Ord` is implemented by hand rather than derived: the specification
/// (§3, tested explicitly in §8 property 5) orders routes by `group`
/// first and `src` second, which is the reverse of the fields' natural
/// declaration order — a derived `Ord` would compare `src` first and be
/// wrong.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MulticastRoute {
    pub src: Ipv6Addr,
    pub group: Ipv6Addr,
}

impl MulticastRoute {
    pub fn new(src: Ipv6Addr, group: Ipv6Addr) -> MulticastRoute {
        MulticastRoute { src, group }
    }
}

impl PartialOrd for MulticastRoute {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MulticastRoute {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.group, self.src).cmp(&(other.group, other.src))
    }
}

impl std::fmt::Display for MulticastRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.src, self.group)
    }
}

/// Per-route state mirroring what the kernel MFC entry represents.
#[derive(Clone, Copy, Debug)]
pub struct MulticastRouteInfo {
    /// Input MIF the route was installed for.
    pub iif: MifIndex,
    /// Output MIF, or [`MifIndex::None`] if this is a block (negative
    /// cache) entry.
    pub oif: MifIndex,
    /// Last time this entry was observed to still be carrying traffic
    /// (or was just installed).
    pub last_use: Instant,
    /// Last packet count observed for this route (§4.G; note this is
    /// the raw kernel `pktcnt`, not `pktcnt - wrong_if` — see
    /// `expiry::run`).
    pub valid_pkt_cnt: u64,
}

impl MulticastRouteInfo {
    pub fn new(iif: MifIndex, oif: MifIndex, now: Instant) -> MulticastRouteInfo {
        MulticastRouteInfo {
            iif,
            oif,
            last_use: now,
            valid_pkt_cnt: 0,
        }
    }

    /// Returns `true` if this entry was installed as a block (negative
    /// cache) entry.
    pub fn is_block(&self) -> bool {
        self.oif == MifIndex::None
    }
}

/// The in-memory Multicast Forwarding Cache.
///
/// Backed by a `BTreeMap` so iteration is in deterministic key order
/// (§9) and entries can be erased mid-iteration by first collecting the
/// keys to remove, then erasing them — the idiom this crate uses in
/// place of a C++-style iterator-stable `erase`.
#[derive(Debug, Default)]
pub struct Mfc(BTreeMap<MulticastRoute, MulticastRouteInfo>);

impl Mfc {
    pub fn new() -> Mfc {
        Mfc(BTreeMap::new())
    }

    /// Installs or overwrites the entry for `route`.
    pub fn insert(&mut self, route: MulticastRoute, info: MulticastRouteInfo) {
        self.0.insert(route, info);
    }

    /// Removes the entry for `route`, if any.
    pub fn erase(&mut self, route: &MulticastRoute) -> Option<MulticastRouteInfo> {
        self.0.remove(route)
    }

    /// Looks up the entry for `route`.
    pub fn get(&self, route: &MulticastRoute) -> Option<&MulticastRouteInfo> {
        self.0.get(route)
    }

    /// Mutable lookup of the entry for `route`.
    pub fn get_mut(
        &mut self,
        route: &MulticastRoute,
    ) -> Option<&mut MulticastRouteInfo> {
        self.0.get_mut(route)
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&MulticastRoute, &MulticastRouteInfo)> {
        self.0.iter()
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes every entry. Used on `disable()` (§4.H): the kernel's own
    /// MFC is implicitly dropped when the routing socket closes, so this
    /// only needs to clear the in-memory mirror.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    #[test]
    fn ordering_is_group_then_src() {
        let a = MulticastRoute::new(addr("fd00::2"), addr("ff05::1"));
        let b = MulticastRoute::new(addr("fd00::1"), addr("ff05::2"));
        // a.group < b.group, so a < b regardless of src ordering.
        assert!(a < b);

        let c = MulticastRoute::new(addr("fd00::1"), addr("ff05::1"));
        let d = MulticastRoute::new(addr("fd00::2"), addr("ff05::1"));
        // Same group, so src breaks the tie.
        assert!(c < d);
    }

    #[test]
    fn insert_overwrites() {
        let mut mfc = Mfc::new();
        let route = MulticastRoute::new(addr("fd00::1"), addr("ff05::1"));
        let now = Instant::now();
        mfc.insert(route, MulticastRouteInfo::new(MifIndex::Thread, MifIndex::Backbone, now));
        assert_eq!(mfc.len(), 1);
        mfc.insert(route, MulticastRouteInfo::new(MifIndex::Thread, MifIndex::None, now));
        assert_eq!(mfc.len(), 1);
        assert_eq!(mfc.get(&route).unwrap().oif, MifIndex::None);
    }

    #[test]
    fn iteration_is_key_ordered() {
        let mut mfc = Mfc::new();
        let now = Instant::now();
        let r1 = MulticastRoute::new(addr("fd00::1"), addr("ff05::2"));
        let r2 = MulticastRoute::new(addr("fd00::1"), addr("ff05::1"));
        mfc.insert(r1, MulticastRouteInfo::new(MifIndex::Thread, MifIndex::Backbone, now));
        mfc.insert(r2, MulticastRouteInfo::new(MifIndex::Thread, MifIndex::Backbone, now));
        let keys: Vec<_> = mfc.iter().map(|(r, _)| *r).collect();
        assert_eq!(keys, vec![r2, r1]);
    }

    #[test]
    fn erase_in_iteration_by_key_collection() {
        let mut mfc = Mfc::new();
        let now = Instant::now();
        let group = addr("ff05::1");
        let r1 = MulticastRoute::new(addr("fd00::1"), group);
        let r2 = MulticastRoute::new(addr("fd00::2"), addr("ff05::2"));
        mfc.insert(r1, MulticastRouteInfo::new(MifIndex::Backbone, MifIndex::Thread, now));
        mfc.insert(r2, MulticastRouteInfo::new(MifIndex::Thread, MifIndex::Backbone, now));

        let to_remove: Vec<_> = mfc
            .iter()
            .filter(|(r, _)| r.group == group)
            .map(|(r, _)| *r)
            .collect();
        for route in to_remove {
            mfc.erase(&route);
        }
        assert_eq!(mfc.len(), 1);
        assert!(mfc.get(&r2).is_some());
    }
}
