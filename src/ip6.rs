//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//
//! IPv6 multicast scope classification.
//!
//! `std::net::Ipv6Addr` already gives us a canonical textual form, a
//! bytewise total order, and `is_multicast()`; the only thing this module
//! adds is decoding the scope nibble (RFC 4291 §2.7, RFC 7346).

use std::net::Ipv6Addr;

/// Multicast scope, the low nibble of byte 1 of a multicast address.
///
/// Ordered by numeric scope value so callers can write
/// `scope > MulticastScope::RealmLocal` the way the policy table in the
/// specification is phrased.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum MulticastScope {
    Reserved,
    InterfaceLocal,
    LinkLocal,
    RealmLocal,
    AdminLocal,
    SiteLocal,
    OrgLocal,
    Global,
    /// A scope nibble RFC 7346 leaves unassigned (e.g. 0x6, 0x7, 0x9-0xD,
    /// 0xF). Kept around rather than discarded so that `as_u8` round-trips
    /// and so comparisons against unknown values remain total.
    Unassigned(u8),
}

impl MulticastScope {
    fn from_nibble(nibble: u8) -> MulticastScope {
        match nibble {
            0x0 => MulticastScope::Reserved,
            0x1 => MulticastScope::InterfaceLocal,
            0x2 => MulticastScope::LinkLocal,
            0x3 => MulticastScope::RealmLocal,
            0x4 => MulticastScope::AdminLocal,
            0x5 => MulticastScope::SiteLocal,
            0x8 => MulticastScope::OrgLocal,
            0xE => MulticastScope::Global,
            other => MulticastScope::Unassigned(other),
        }
    }

    /// The raw scope nibble (0x0-0xF), for logging/wire purposes.
    pub fn as_u8(&self) -> u8 {
        match self {
            MulticastScope::Reserved => 0x0,
            MulticastScope::InterfaceLocal => 0x1,
            MulticastScope::LinkLocal => 0x2,
            MulticastScope::RealmLocal => 0x3,
            MulticastScope::AdminLocal => 0x4,
            MulticastScope::SiteLocal => 0x5,
            MulticastScope::OrgLocal => 0x8,
            MulticastScope::Global => 0xE,
            MulticastScope::Unassigned(nibble) => *nibble,
        }
    }
}

impl std::fmt::Display for MulticastScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MulticastScope::Reserved => write!(f, "reserved"),
            MulticastScope::InterfaceLocal => write!(f, "interface-local"),
            MulticastScope::LinkLocal => write!(f, "link-local"),
            MulticastScope::RealmLocal => write!(f, "realm-local"),
            MulticastScope::AdminLocal => write!(f, "admin-local"),
            MulticastScope::SiteLocal => write!(f, "site-local"),
            MulticastScope::OrgLocal => write!(f, "org-local"),
            MulticastScope::Global => write!(f, "global"),
            MulticastScope::Unassigned(nibble) => {
                write!(f, "unassigned(0x{nibble:x})")
            }
        }
    }
}

/// Extension methods for classifying IPv6 multicast addresses.
pub trait Ipv6MulticastExt {
    /// Returns this address's multicast scope, or `None` if the address
    /// is not multicast.
    fn multicast_scope(&self) -> Option<MulticastScope>;
}

impl Ipv6MulticastExt for Ipv6Addr {
    fn multicast_scope(&self) -> Option<MulticastScope> {
        if !self.is_multicast() {
            return None;
        }
        let scope_byte = self.octets()[1];
        Some(MulticastScope::from_nibble(scope_byte & 0x0F))
    }
}
