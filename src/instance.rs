//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The MRM instance: the state machine tying together the listener set,
//! the MFC, and the kernel router socket (§4.H, §5).

use std::net::Ipv6Addr;
use std::os::fd::RawFd;
use std::time::Instant;

use nix::sys::select::FdSet;
use tracing::info;

use crate::config::MrmConfig;
use crate::debug::Debug;
use crate::error::Error;
use crate::expiry;
use crate::listener::ListenerSet;
use crate::mfc::{Mfc, MulticastRoute, MulticastRouteInfo};
use crate::mif::{MifIndex, MifTable};
use crate::policy::{self, MifDecision};
use crate::socket::RouterSocket;
use crate::MulticastRouting;

/// The Multicast Routing Manager.
///
/// Owns the kernel router socket (when enabled), the Thread-side
/// listener mirror, and the in-memory MFC mirror. See `spec.md` §3 for
/// the invariants this type upholds across its public API.
pub struct Mrm {
    config: MrmConfig,
    router_sock: Option<RouterSocket>,
    listeners: ListenerSet,
    mfc: Mfc,
}

impl Mrm {
    /// Creates a new, disabled MRM for the given interface configuration.
    ///
    /// No kernel state is touched until [`Mrm::enable`] is called.
    pub fn new(config: MrmConfig) -> Mrm {
        Mrm {
            config,
            router_sock: None,
            listeners: ListenerSet::new(),
            mfc: Mfc::new(),
        }
    }

    /// Returns `true` if the MRM currently owns a kernel router socket.
    ///
    /// Upholds invariant 1 of `spec.md` §8: `enabled ⇔ router_sock
    /// valid`.
    pub fn is_enabled(&self) -> bool {
        self.router_sock.is_some()
    }

    /// Opens the kernel router socket and starts forwarding. No-op if
    /// already enabled.
    ///
    /// Resolves the two configured interface names to kernel MIFs and
    /// performs the full §4.E setup sequence; any failure rolls back and
    /// leaves the MRM `Disabled`.
    pub fn enable(&mut self) -> Result<(), Error> {
        if self.is_enabled() {
            return Ok(());
        }

        let mif_table = MifTable::resolve(
            &self.config.thread_ifname,
            &self.config.backbone_ifname,
        )?;
        let router_sock = RouterSocket::open(&mif_table)?;

        self.router_sock = Some(router_sock);
        Debug::SocketOpen.log();
        info!(
            thread = %self.config.thread_ifname,
            backbone = %self.config.backbone_ifname,
            "multicast routing manager enabled"
        );
        Ok(())
    }

    /// Closes the kernel router socket and clears the in-memory MFC.
    /// No-op if already disabled; safe to call repeatedly.
    pub fn disable(&mut self) {
        if self.router_sock.take().is_none() {
            return;
        }

        // The kernel's own MFC is implicitly dropped when the routing
        // socket closes; only the in-memory mirror needs clearing.
        self.mfc.clear();
        Debug::SocketClose.log();
        info!("multicast routing manager disabled");
    }

    /// TBBR role transition: this border router became Primary.
    /// Thin alias for [`Mrm::enable`] (§4.H).
    pub fn becomes_primary(&mut self) -> Result<(), Error> {
        self.enable()
    }

    /// TBBR role transition: this border router resigned Primary.
    /// Thin alias for [`Mrm::disable`] (§4.H).
    pub fn resigns_primary(&mut self) {
        self.disable()
    }

    /// Registers a Thread-side multicast listener for `group`.
    ///
    /// Precondition: `group` is not already registered (§4.C).
    ///
    /// When enabled, unblocks any MFC entries that were negatively
    /// cached for `group` on the Backbone-to-Thread direction (§4.F).
    pub fn add(&mut self, group: Ipv6Addr) {
        self.listeners.add(group);

        let Some(router_sock) = &self.router_sock else {
            return;
        };

        let candidates: Vec<_> =
            policy::unblock_candidates(&self.mfc, group).collect();
        for route in candidates {
            if let Err(error) = router_sock.install_mfc(
                &route,
                MifIndex::Backbone,
                MifIndex::Thread,
            ) {
                error.log();
                continue;
            }
            if let Some(info) = self.mfc.get_mut(&route) {
                info.oif = MifIndex::Thread;
            }
            Debug::Unblock(&route).log();
        }
        crate::debug::log_mfc_dump(&self.mfc, &self.listeners);
    }

    /// Unregisters a Thread-side multicast listener for `group`.
    ///
    /// Precondition: `group` is currently registered (§4.C).
    ///
    /// When enabled, deletes the MFC entries this removal invalidates.
    ///
    /// Deviation from the upstream source (`spec.md` §9, first open
    /// question): only entries for the removed `group` are deleted here.
    /// The upstream `RemoveInboundMulticastForwardingCache` clears the
    /// *entire* MFC after its targeted loop, which would violate the
    /// invariant that unrelated entries survive an unrelated listener's
    /// removal; that behavior is treated as a bug and not reproduced.
    pub fn remove(&mut self, group: Ipv6Addr) {
        self.listeners.remove(group);

        let Some(router_sock) = &self.router_sock else {
            return;
        };

        let candidates: Vec<_> =
            policy::remove_candidates(&self.mfc, group).collect();
        for route in candidates {
            if let Some(info) = self.mfc.get(&route) {
                if let Err(error) = router_sock.delete_mfc(&route, info.iif) {
                    error.log();
                }
            }
            self.mfc.erase(&route);
            Debug::MfcDelete(&route).log();
        }
        crate::debug::log_mfc_dump(&self.mfc, &self.listeners);
    }

    /// Adds the router socket's fd to `read_fds` and raises `max_fd`, if
    /// enabled. Does not request a timer: expiry is amortized into
    /// upcall processing (§5).
    pub fn prepare(&self, read_fds: &mut FdSet, max_fd: &mut RawFd) {
        let Some(router_sock) = &self.router_sock else {
            return;
        };
        let fd = router_sock.as_raw_fd();
        read_fds.insert(fd);
        if fd > *max_fd {
            *max_fd = fd;
        }
    }

    /// Services at most one pending upcall, if the router socket's fd is
    /// readable. No-op if disabled or the fd isn't set.
    pub fn process(&mut self, read_fds: &FdSet) {
        let Some(router_sock) = &self.router_sock else {
            return;
        };
        if !read_fds.contains(router_sock.as_raw_fd()) {
            return;
        }

        let upcall = match router_sock.recv_upcall() {
            Ok(Some(upcall)) => upcall,
            Ok(None) => return,
            Err(error) => {
                error.log();
                return;
            }
        };

        self.handle_upcall(upcall.src, upcall.dst, upcall.iif);
    }

    /// Drives the policy engine for a single upcall and installs the
    /// resulting MFC entry, running expiry first (§5's ordering
    /// guarantee, §4.G).
    fn handle_upcall(&mut self, src: Ipv6Addr, group: Ipv6Addr, iif: MifIndex) {
        let Some(router_sock) = &self.router_sock else {
            return;
        };

        expiry::run(&mut self.mfc, router_sock, Instant::now());

        let decision = match policy::decide_oif(iif, group, &self.listeners) {
            Ok(decision) => decision,
            Err(error) => {
                error.log();
                return;
            }
        };
        let MifDecision { oif, .. } = decision;

        let route = MulticastRoute::new(src, group);
        if let Err(error) = router_sock.install_mfc(&route, iif, oif) {
            error.log();
            return;
        }

        self.mfc.insert(route, MulticastRouteInfo::new(iif, oif, Instant::now()));
        Debug::MfcInstall(&route, iif, oif).log();
        crate::debug::log_mfc_dump(&self.mfc, &self.listeners);
    }
}

impl Drop for Mrm {
    fn drop(&mut self) {
        self.disable();
    }
}

impl MulticastRouting for Mrm {
    fn enable(&mut self) -> Result<(), Error> {
        Mrm::enable(self)
    }

    fn disable(&mut self) {
        Mrm::disable(self)
    }

    fn add(&mut self, group: Ipv6Addr) {
        Mrm::add(self, group)
    }

    fn remove(&mut self, group: Ipv6Addr) {
        Mrm::remove(self, group)
    }

    fn prepare(&self, read_fds: &mut FdSet, max_fd: &mut RawFd) {
        Mrm::prepare(self, read_fds, max_fd)
    }

    fn process(&mut self, read_fds: &FdSet) {
        Mrm::process(self, read_fds)
    }
}

/// Test-only introspection, built on top of the mock router socket
/// (`cfg(feature = "testing")`). The §8 scenario tests (`tests/scenarios.rs`)
/// assert against exactly this surface: recorded `install_mfc`/`delete_mfc`
/// calls, the same observable effects a real kernel would expose through
/// `MRT6_ADD_MFC`/`MRT6_DEL_MFC`.
#[cfg(feature = "testing")]
impl Mrm {
    /// The mock router socket's recorded `install_mfc`/`delete_mfc` calls.
    pub fn router_sock_calls(&self) -> Vec<crate::socket::MfcCall> {
        self.router_sock
            .as_ref()
            .map(|s| s.calls.borrow().clone())
            .unwrap_or_default()
    }

    /// A reference to the mock router socket, for pushing synthetic
    /// upcalls/counters directly (`RouterSocket::push_upcall`,
    /// `RouterSocket::set_counters`).
    pub fn router_sock_ref(&self) -> Option<&RouterSocket> {
        self.router_sock.as_ref()
    }

    /// Whether the in-memory MFC currently holds `route`.
    pub fn mfc_contains(&self, route: &MulticastRoute) -> bool {
        self.mfc.get(route).is_some()
    }

    /// Rewinds `route`'s `last_use` timestamp, to simulate elapsed time
    /// for expiry tests without sleeping.
    pub fn rewind_last_use(&mut self, route: &MulticastRoute, when: Instant) {
        if let Some(info) = self.mfc.get_mut(route) {
            info.last_use = when;
        }
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::*;

    fn addr(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    fn enabled_mrm() -> Mrm {
        let mut mrm = Mrm::new(MrmConfig::new("wpan0", "eth0"));
        mrm.enable().unwrap();
        mrm
    }

    #[test]
    fn enable_disable_enable_leaves_mfc_empty() {
        let mut mrm = enabled_mrm();
        assert!(mrm.is_enabled());
        mrm.disable();
        assert!(!mrm.is_enabled());
        assert!(mrm.mfc.is_empty());
        mrm.enable().unwrap();
        assert!(mrm.is_enabled());
        assert!(mrm.mfc.is_empty());
    }

    #[test]
    fn disable_twice_is_a_no_op() {
        let mut mrm = enabled_mrm();
        mrm.disable();
        mrm.disable();
        assert!(!mrm.is_enabled());
    }

    #[test]
    fn reinstall_overwrites_not_duplicates() {
        let mut mrm = enabled_mrm();
        let src = addr("fd00::1");
        let group = addr("ff0e::1");
        mrm.handle_upcall(src, group, MifIndex::Thread);
        mrm.handle_upcall(src, group, MifIndex::Thread);
        assert_eq!(mrm.mfc.len(), 1);
    }

    #[test]
    fn process_with_no_readiness_is_a_no_op() {
        let mut mrm = enabled_mrm();
        let read_fds = FdSet::new();
        mrm.process(&read_fds);
        assert!(mrm.mfc.is_empty());
    }

    #[test]
    fn prepare_adds_fd_when_enabled() {
        let mrm = enabled_mrm();
        let mut read_fds = FdSet::new();
        let mut max_fd: RawFd = -1;
        mrm.prepare(&mut read_fds, &mut max_fd);
        // The mock router socket reports a constant placeholder fd.
        assert!(read_fds.contains(mrm.router_sock.as_ref().unwrap().as_raw_fd()));
    }

    #[test]
    fn prepare_is_a_no_op_when_disabled() {
        let mrm = Mrm::new(MrmConfig::new("wpan0", "eth0"));
        let mut read_fds = FdSet::new();
        let mut max_fd: RawFd = -1;
        mrm.prepare(&mut read_fds, &mut max_fd);
        assert_eq!(max_fd, -1);
    }

    #[test]
    fn disabled_add_remove_only_mutate_listener_set() {
        let mut mrm = Mrm::new(MrmConfig::new("wpan0", "eth0"));
        let group = addr("ff05::1");
        mrm.add(group);
        assert!(mrm.listeners.contains(group));
        mrm.remove(group);
        assert!(!mrm.listeners.contains(group));
    }
}
