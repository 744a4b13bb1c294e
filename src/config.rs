//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Construction-time configuration for the MRM.
//!
//! The specification is explicit that the MRM has no configuration-file
//! or CLI surface of its own (§6): the two interface names it needs come
//! from the surrounding agent's own configuration and are handed to
//! [`crate::Mrm::new`] once, at construction.

/// The two interfaces the MRM bridges multicast between.
#[derive(Clone, Debug)]
pub struct MrmConfig {
    /// Name of the Thread-mesh-facing interface (becomes MIF 0).
    pub thread_ifname: String,
    /// Name of the backbone-LAN-facing interface (becomes MIF 1).
    pub backbone_ifname: String,
}

impl MrmConfig {
    /// Creates a new configuration from the two interface names.
    pub fn new(
        thread_ifname: impl Into<String>,
        backbone_ifname: impl Into<String>,
    ) -> MrmConfig {
        MrmConfig {
            thread_ifname: thread_ifname.into(),
            backbone_ifname: backbone_ifname.into(),
        }
    }
}
