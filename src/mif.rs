//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The MIF (Multicast Interface) table: the two logical interfaces the
//! kernel multicast routing plane knows about, and the kernel ifindexes
//! they resolve to.

#[cfg(not(feature = "testing"))]
use nix::net::if_::if_nametoindex;

use crate::error::Error;

/// A logical multicast interface index, as seen by the kernel MRT6 API.
///
/// `None` is kept as an explicit sentinel variant rather than modeled as
/// `Option<MifIndex>`: the policy engine (`policy.rs`) branches on it
/// directly when deciding whether to install a forwarding or a block
/// entry, and folding that branch into an `Option` match at every call
/// site would only obscure it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MifIndex {
    /// MIF 0: the Thread-mesh-facing interface.
    Thread = 0,
    /// MIF 1: the backbone-LAN-facing interface.
    Backbone = 1,
    /// Sentinel value used by the policy engine for "no output
    /// interface" (i.e. install a block/negative-cache entry).
    None = 0xFF,
}

impl MifIndex {
    /// The raw MIF number the kernel structs carry.
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl std::fmt::Display for MifIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MifIndex::Thread => write!(f, "thread"),
            MifIndex::Backbone => write!(f, "backbone"),
            MifIndex::None => write!(f, "none"),
        }
    }
}

/// Resolves and remembers the kernel ifindexes backing the two MIFs.
#[derive(Clone, Debug)]
pub struct MifTable {
    pub thread_ifname: String,
    pub backbone_ifname: String,
    pub thread_ifindex: u32,
    pub backbone_ifindex: u32,
}

impl MifTable {
    /// Resolves `thread_ifname`/`backbone_ifname` to kernel ifindexes.
    ///
    /// Per §4.B, failure to resolve either name is fatal to `enable()`.
    #[cfg(not(feature = "testing"))]
    pub fn resolve(
        thread_ifname: &str,
        backbone_ifname: &str,
    ) -> Result<MifTable, Error> {
        let thread_ifindex = if_nametoindex(thread_ifname)?;
        let backbone_ifindex = if_nametoindex(backbone_ifname)?;

        Ok(MifTable {
            thread_ifname: thread_ifname.to_owned(),
            backbone_ifname: backbone_ifname.to_owned(),
            thread_ifindex,
            backbone_ifindex,
        })
    }

    /// Test-only stand-in for [`MifTable::resolve`]: the `testing`
    /// feature replaces the kernel router socket with an in-memory mock
    /// (see `socket.rs`), so resolving real kernel ifindexes would only
    /// require a test environment to have interfaces named after
    /// whatever the test passes in. Assigns arbitrary, distinct
    /// placeholder ifindexes instead.
    #[cfg(feature = "testing")]
    pub fn resolve(
        thread_ifname: &str,
        backbone_ifname: &str,
    ) -> Result<MifTable, Error> {
        Ok(MifTable {
            thread_ifname: thread_ifname.to_owned(),
            backbone_ifname: backbone_ifname.to_owned(),
            thread_ifindex: 1,
            backbone_ifindex: 2,
        })
    }

    /// Returns the kernel ifindex for `mif`.
    ///
    /// # Panics
    ///
    /// Panics if `mif` is [`MifIndex::None`] — callers never register a
    /// MIF for the sentinel value.
    pub fn ifindex(&self, mif: MifIndex) -> u32 {
        match mif {
            MifIndex::Thread => self.thread_ifindex,
            MifIndex::Backbone => self.backbone_ifindex,
            MifIndex::None => unreachable!("no ifindex for MifIndex::None"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_u16() {
        assert_eq!(MifIndex::Thread.as_u16(), 0);
        assert_eq!(MifIndex::Backbone.as_u16(), 1);
        assert_eq!(MifIndex::None.as_u16(), 0xFF);
    }
}
