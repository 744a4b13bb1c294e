//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//
//! Multicast Routing Manager (MRM) for a Thread Border Router.
//!
//! Bridges Multicast Listener Registrations (MLR) learned from a Thread
//! mesh with the kernel's IPv6 multicast forwarding plane (MRT6), so that
//! multicast datagrams flow correctly between the Thread and Backbone
//! interfaces per Thread Backbone-Router (TBBR) rules. See [`instance`]
//! for the entry point.

#[cfg(not(feature = "testing"))]
mod capabilities;
pub mod config;
pub mod debug;
pub mod error;
pub mod expiry;
pub mod instance;
pub mod ip6;
pub mod listener;
pub mod mfc;
pub mod mif;
pub mod policy;
pub mod socket;

pub use config::MrmConfig;
pub use error::Error;
pub use instance::Mrm;
pub use mif::MifIndex;

use std::net::Ipv6Addr;
use std::os::fd::RawFd;

use nix::sys::select::FdSet;

/// Capability set shared by every multicast routing backend.
///
/// The kernel-direct [`Mrm`] implementation is the only backend built by
/// this crate, but keeping the surface as a trait is what lets a
/// shell-out backend (e.g. one built around an external `smcroutectl`
/// daemon) live behind the same call sites without the rest of the
/// Thread Border Router caring which one is in use.
pub trait MulticastRouting {
    /// Programs the kernel multicast forwarding plane and starts
    /// forwarding. No-op if already enabled.
    fn enable(&mut self) -> Result<(), Error>;

    /// Tears down kernel state and stops forwarding. No-op if already
    /// disabled; safe to call repeatedly.
    fn disable(&mut self);

    /// Registers a Thread-side multicast listener for `group`.
    ///
    /// Precondition: `group` is not already registered.
    fn add(&mut self, group: Ipv6Addr);

    /// Unregisters a Thread-side multicast listener for `group`.
    ///
    /// Precondition: `group` is currently registered.
    fn remove(&mut self, group: Ipv6Addr);

    /// Adds this backend's readable fd (if any) to `read_fds` and raises
    /// `max_fd` accordingly. Called by the external I/O loop before
    /// blocking in `select`/`pselect`.
    fn prepare(&self, read_fds: &mut FdSet, max_fd: &mut RawFd);

    /// Services at most one pending event if this backend's fd is
    /// readable. Called by the external I/O loop after `select` returns.
    fn process(&mut self, read_fds: &FdSet);
}
