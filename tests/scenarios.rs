//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The six literal end-to-end scenarios from the multicast routing
//! manager specification (S1-S6): concrete upcalls and listener
//! transitions, checked against the kernel calls the mock router socket
//! recorded (`install_mfc`/`delete_mfc`), the same observable surface a
//! real kernel would expose through `MRT6_ADD_MFC`/`MRT6_DEL_MFC`.

#![cfg(feature = "testing")]

use std::net::Ipv6Addr;
use std::os::fd::RawFd;

use nix::sys::select::FdSet;
use otbr_mrm::socket::MfcCall;
use otbr_mrm::{MifIndex, Mrm, MrmConfig};

fn addr(s: &str) -> Ipv6Addr {
    s.parse().unwrap()
}

fn enabled_mrm() -> Mrm {
    let mut mrm = Mrm::new(MrmConfig::new("wpan0", "eth0"));
    mrm.enable().unwrap();
    mrm
}

// Drives one upcall through `prepare`/`process` by pushing it onto the
// mock router socket's pending queue, matching the way the real I/O loop
// would be driven.
fn deliver_upcall(mrm: &mut Mrm, src: Ipv6Addr, dst: Ipv6Addr, iif: MifIndex) {
    mrm.router_sock_ref()
        .expect("mrm must be enabled")
        .push_upcall(otbr_mrm::socket::Upcall { src, dst, iif });

    let mut read_fds = FdSet::new();
    let mut max_fd: RawFd = -1;
    mrm.prepare(&mut read_fds, &mut max_fd);
    mrm.process(&read_fds);
}

#[test]
fn s1_thread_to_backbone_forward_global_scope() {
    let mut mrm = enabled_mrm();
    let src = addr("fd00::1");
    let dst = addr("ff0e::1");
    deliver_upcall(&mut mrm, src, dst, MifIndex::Thread);

    let calls = mrm.router_sock_calls();
    assert_eq!(
        calls,
        vec![MfcCall::Install {
            route: otbr_mrm::mfc::MulticastRoute::new(src, dst),
            iif: MifIndex::Thread,
            oif: MifIndex::Backbone,
        }]
    );
}

#[test]
fn s2_thread_to_backbone_blocked_realm_local() {
    let mut mrm = enabled_mrm();
    let src = addr("fd00::2");
    let dst = addr("ff03::fc");
    deliver_upcall(&mut mrm, src, dst, MifIndex::Thread);

    let calls = mrm.router_sock_calls();
    assert_eq!(
        calls,
        vec![MfcCall::Install {
            route: otbr_mrm::mfc::MulticastRoute::new(src, dst),
            iif: MifIndex::Thread,
            oif: MifIndex::None,
        }]
    );
}

#[test]
fn s3_backbone_to_thread_forward_with_listener() {
    let mut mrm = enabled_mrm();
    let group = addr("ff05::abcd");
    mrm.add(group);

    let src = addr("2001:db8::1");
    deliver_upcall(&mut mrm, src, group, MifIndex::Backbone);

    let calls = mrm.router_sock_calls();
    assert_eq!(
        calls,
        vec![MfcCall::Install {
            route: otbr_mrm::mfc::MulticastRoute::new(src, group),
            iif: MifIndex::Backbone,
            oif: MifIndex::Thread,
        }]
    );
}

#[test]
fn s4_backbone_to_thread_block_then_unblock() {
    let mut mrm = enabled_mrm();
    let group = addr("ff05::beef");
    let src = addr("2001:db8::1");
    deliver_upcall(&mut mrm, src, group, MifIndex::Backbone);

    mrm.add(group);

    let route = otbr_mrm::mfc::MulticastRoute::new(src, group);
    let calls = mrm.router_sock_calls();
    assert_eq!(
        calls,
        vec![
            MfcCall::Install { route, iif: MifIndex::Backbone, oif: MifIndex::None },
            MfcCall::Install { route, iif: MifIndex::Backbone, oif: MifIndex::Thread },
        ]
    );
}

#[test]
fn s5_listener_removal() {
    let mut mrm = enabled_mrm();
    let group = addr("ff05::abcd");
    mrm.add(group);

    let src = addr("2001:db8::1");
    deliver_upcall(&mut mrm, src, group, MifIndex::Backbone);

    mrm.remove(group);

    let route = otbr_mrm::mfc::MulticastRoute::new(src, group);
    let calls = mrm.router_sock_calls();
    assert_eq!(
        calls,
        vec![
            MfcCall::Install { route, iif: MifIndex::Backbone, oif: MifIndex::Thread },
            MfcCall::Delete { route, iif: MifIndex::Backbone },
        ]
    );
}

#[test]
fn s6_expiry_with_traffic_then_eviction() {
    use std::time::{Duration, Instant};

    let mut mrm = enabled_mrm();
    let src = addr("fd00::1");
    let group = addr("ff0e::1");

    // First upcall installs the entry.
    deliver_upcall(&mut mrm, src, group, MifIndex::Thread);
    let route = otbr_mrm::mfc::MulticastRoute::new(src, group);

    let router_sock = mrm.router_sock_ref().unwrap();
    router_sock.set_counters(
        &route,
        otbr_mrm::socket::Counters { pktcnt: 150, bytecnt: 0, wrong_if: 0 },
    );

    // Rewind last_use so the next upcall's expiry pass sees this entry
    // as due for a liveness check, simulating 301s of elapsed time
    // without sleeping in the test.
    mrm.rewind_last_use(&route, Instant::now() - Duration::from_secs(301));

    // A second, unrelated upcall triggers the expiry pass (§5: expiry
    // runs at the start of every add_mfc).
    let unrelated_group = addr("ff0e::2");
    deliver_upcall(&mut mrm, src, unrelated_group, MifIndex::Thread);

    assert!(mrm.mfc_contains(&route), "entry with new traffic should survive");

    // Counters unchanged on the next pass: 300s later, no new packets.
    mrm.rewind_last_use(&route, Instant::now() - Duration::from_secs(301));
    let another_group = addr("ff0e::3");
    deliver_upcall(&mut mrm, src, another_group, MifIndex::Thread);

    assert!(!mrm.mfc_contains(&route), "stale entry should be evicted");
}
