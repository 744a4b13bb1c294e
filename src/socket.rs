//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The kernel router socket: the raw ICMPv6 socket multiplexed with the
//! kernel's MRT6 (IPv6 multicast routing) machinery.
//!
//! `<linux/mroute6.h>` isn't reliably exposed by the `libc` crate across
//! targets, the same reason `holo-utils::socket` hand-rolls `vifctl` and
//! `MRT_INIT`/`MRT_ADD_VIF` for the IPv4 case rather than depending on
//! `libc` for them. This module does the equivalent for the IPv6 family.

use std::mem::size_of;
use std::net::Ipv6Addr;
use std::os::fd::{AsRawFd, RawFd};

use crate::error::Error;
use crate::mfc::MulticastRoute;
use crate::mif::{MifIndex, MifTable};

// ===== Kernel constants (<linux/mroute6.h>) =====

const MRT6_BASE: libc::c_int = 200;
const MRT6_INIT: libc::c_int = MRT6_BASE;
const MRT6_ADD_MIF: libc::c_int = MRT6_BASE + 2;
const MRT6_ADD_MFC: libc::c_int = MRT6_BASE + 4;
const MRT6_DEL_MFC: libc::c_int = MRT6_BASE + 5;

// ioctl request number for SIOCGETSGCNT_IN6 (SIOCPROTOPRIVATE + 1).
const SIOCPROTOPRIVATE: libc::c_ulong = 0x89E0;
const SIOCGETSGCNT_IN6: libc::c_ulong = SIOCPROTOPRIVATE + 1;

const MRT6MSG_NOCACHE: u8 = 1;

// ICMPv6 raw-socket input filter (<netinet/icmp6.h>).
const ICMP6_FILTER_OPT: libc::c_int = 1;

// ===== Kernel wire structs (#[repr(C)], mirroring <linux/mroute6.h>) =====

#[repr(C)]
#[derive(Clone, Copy)]
struct mif6ctl {
    mif6c_mifi: u16,
    mif6c_flags: u8,
    vifc_threshold: u8,
    mif6c_pifi: u16,
    vifc_rate_limit: u32,
}

// Bitset over MIFs, sized to match the kernel's `struct if_set` exactly:
// `IF_SETSIZE` is 256 bits / 8 `__u32` words (`<linux/mroute6.h>`).
// `mf6cctl` embeds this struct inline rather than behind a pointer, so
// getting its size wrong desyncs `size_of::<mf6cctl>()` from the
// kernel's and the `MRT6_ADD_MFC`/`MRT6_DEL_MFC` setsockopt call is
// rejected outright with `EINVAL`. Only the low-order bits for MIFs 0/1
// are ever set.
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct if_set {
    ifs_bits: [u32; 8],
}

impl if_set {
    fn set(&mut self, mif: MifIndex) {
        let bit = mif.as_u16() as usize;
        self.ifs_bits[bit / 32] |= 1 << (bit % 32);
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
struct mf6cctl {
    mf6cc_origin: libc::sockaddr_in6,
    mf6cc_mcastgrp: libc::sockaddr_in6,
    mf6cc_parent: u16,
    mf6cc_ifset: if_set,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct sioc_sg_req6 {
    src: libc::sockaddr_in6,
    grp: libc::sockaddr_in6,
    pktcnt: u64,
    bytecnt: u64,
    wrong_if: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct mrt6msg {
    im6_mbz: u8,
    im6_msgtype: u8,
    im6_mif: u16,
    im6_pad: u32,
    im6_src: libc::in6_addr,
    im6_dst: libc::in6_addr,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct icmp6_filter {
    data: [u32; 8],
}

impl icmp6_filter {
    fn block_all() -> icmp6_filter {
        icmp6_filter { data: [0xFFFF_FFFF; 8] }
    }
}

fn sockaddr_in6(addr: Ipv6Addr) -> libc::sockaddr_in6 {
    let mut sa: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
    sa.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    sa.sin6_addr = libc::in6_addr {
        s6_addr: addr.octets(),
    };
    sa
}

fn addr_from_in6(addr: &libc::in6_addr) -> Ipv6Addr {
    Ipv6Addr::from(addr.s6_addr)
}

fn setsockopt<T>(
    fd: RawFd,
    level: libc::c_int,
    name: libc::c_int,
    value: &T,
) -> Result<(), Error> {
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            value as *const T as *const libc::c_void,
            size_of::<T>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(errno_from_last_os_error());
    }
    Ok(())
}

fn errno_from_last_os_error() -> Error {
    let raw = std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(libc::EIO);
    nix::errno::Errno::from_raw(raw).into()
}

/// Per-route kernel counters (§4.E `query_counters`).
#[derive(Clone, Copy, Debug, Default)]
pub struct Counters {
    pub pktcnt: u64,
    pub bytecnt: u64,
    pub wrong_if: u64,
}

/// A single `NOCACHE` upcall (§4.E `recv_upcall`).
#[derive(Clone, Copy, Debug)]
pub struct Upcall {
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
    pub iif: MifIndex,
}

// ===== RouterSocket (production) =====

#[cfg(not(feature = "testing"))]
pub struct RouterSocket {
    socket: socket2::Socket,
}

#[cfg(not(feature = "testing"))]
impl RouterSocket {
    /// Opens the raw ICMPv6 socket and performs the five-step MRT6 setup
    /// sequence of §4.E, in order. Any failing step rolls the whole
    /// sequence back (closes the socket) and propagates the error.
    ///
    /// The whole sequence needs `CAP_NET_RAW` (raw socket creation) and
    /// `CAP_NET_ADMIN` (`MRT6_INIT`/`MRT6_ADD_MIF`); a Border Router
    /// process runs with those permitted but not effective, so the
    /// sequence raises them for its duration, the same way
    /// `crate::capabilities::raise` wraps the analogous raw-socket setup
    /// on the IPv4 side.
    pub fn open(mif_table: &MifTable) -> Result<RouterSocket, Error> {
        crate::capabilities::raise(|| Self::open_privileged(mif_table))
    }

    fn open_privileged(mif_table: &MifTable) -> Result<RouterSocket, Error> {
        use socket2::{Domain, Protocol, Type};

        let socket =
            socket2::Socket::new(Domain::IPV6, Type::RAW, Some(Protocol::ICMPV6))
                .map_err(|_| errno_from_last_os_error())?;
        let router_sock = RouterSocket { socket };

        if let Err(error) = router_sock.init_sequence(mif_table) {
            // Rollback: drop closes the underlying fd.
            drop(router_sock);
            return Err(error);
        }

        Ok(router_sock)
    }

    fn init_sequence(&self, mif_table: &MifTable) -> Result<(), Error> {
        let fd = self.socket.as_raw_fd();

        // 1 (socket already created). 2: enable multicast routing.
        let one: libc::c_int = 1;
        setsockopt(fd, libc::IPPROTO_IPV6, MRT6_INIT, &one)?;

        // 3: block all ordinary ICMPv6 input; we only want MRT6 upcalls.
        let filter = icmp6_filter::block_all();
        setsockopt(fd, libc::IPPROTO_ICMPV6, ICMP6_FILTER_OPT, &filter)?;

        // 4, 5: register MIF 0 (Thread) and MIF 1 (Backbone).
        self.add_mif(MifIndex::Thread, mif_table.ifindex(MifIndex::Thread))?;
        self.add_mif(MifIndex::Backbone, mif_table.ifindex(MifIndex::Backbone))?;

        Ok(())
    }

    fn add_mif(&self, mif: MifIndex, ifindex: u32) -> Result<(), Error> {
        let ctl = mif6ctl {
            mif6c_mifi: mif.as_u16(),
            mif6c_flags: 0,
            vifc_threshold: 1,
            mif6c_pifi: ifindex as u16,
            vifc_rate_limit: 0,
        };
        setsockopt(
            self.socket.as_raw_fd(),
            libc::IPPROTO_IPV6,
            MRT6_ADD_MIF,
            &ctl,
        )
    }

    /// Writes or overwrites the kernel MFC entry for `route`.
    pub fn install_mfc(
        &self,
        route: &MulticastRoute,
        iif: MifIndex,
        oif: MifIndex,
    ) -> Result<(), Error> {
        let mut ifset = if_set::default();
        if oif != MifIndex::None {
            ifset.set(oif);
        }
        let ctl = mf6cctl {
            mf6cc_origin: sockaddr_in6(route.src),
            mf6cc_mcastgrp: sockaddr_in6(route.group),
            mf6cc_parent: iif.as_u16(),
            mf6cc_ifset: ifset,
        };
        setsockopt(
            self.socket.as_raw_fd(),
            libc::IPPROTO_IPV6,
            MRT6_ADD_MFC,
            &ctl,
        )
    }

    /// Removes the kernel MFC entry for `route`. `ENOENT` is success.
    pub fn delete_mfc(
        &self,
        route: &MulticastRoute,
        iif: MifIndex,
    ) -> Result<(), Error> {
        let ctl = mf6cctl {
            mf6cc_origin: sockaddr_in6(route.src),
            mf6cc_mcastgrp: sockaddr_in6(route.group),
            mf6cc_parent: iif.as_u16(),
            mf6cc_ifset: if_set::default(),
        };
        match setsockopt(
            self.socket.as_raw_fd(),
            libc::IPPROTO_IPV6,
            MRT6_DEL_MFC,
            &ctl,
        ) {
            Ok(()) => Ok(()),
            Err(Error::NotFound) => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// Reads the kernel's per-entry packet/byte/wrong-if counters.
    pub fn query_counters(&self, route: &MulticastRoute) -> Result<Counters, Error> {
        let mut req = sioc_sg_req6 {
            src: sockaddr_in6(route.src),
            grp: sockaddr_in6(route.group),
            pktcnt: 0,
            bytecnt: 0,
            wrong_if: 0,
        };
        let ret = unsafe {
            libc::ioctl(
                self.socket.as_raw_fd(),
                SIOCGETSGCNT_IN6 as _,
                &mut req as *mut sioc_sg_req6,
            )
        };
        if ret < 0 {
            return Err(errno_from_last_os_error());
        }
        Ok(Counters {
            pktcnt: req.pktcnt,
            bytecnt: req.bytecnt,
            wrong_if: req.wrong_if,
        })
    }

    /// Reads one pending kernel message, returning `Some(Upcall)` for a
    /// `NOCACHE` upcall or `None` for any other message kind.
    pub fn recv_upcall(&self) -> Result<Option<Upcall>, Error> {
        let mut buf = [0u8; size_of::<mrt6msg>()];
        let n = unsafe {
            libc::read(
                self.socket.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            return Err(errno_from_last_os_error());
        }
        if (n as usize) < size_of::<mrt6msg>() {
            return Ok(None);
        }
        let msg: mrt6msg = unsafe { std::ptr::read(buf.as_ptr() as *const mrt6msg) };
        if msg.im6_mbz != 0 || msg.im6_msgtype != MRT6MSG_NOCACHE {
            return Ok(None);
        }
        let iif = match msg.im6_mif {
            0 => MifIndex::Thread,
            1 => MifIndex::Backbone,
            _ => return Ok(None),
        };
        Ok(Some(Upcall {
            src: addr_from_in6(&msg.im6_src),
            dst: addr_from_in6(&msg.im6_dst),
            iif,
        }))
    }

    /// The socket's raw fd, for `prepare()`.
    pub fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

// ===== RouterSocket (mock, for root-less/no-kernel testing) =====

#[cfg(feature = "testing")]
pub mod mock {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::collections::HashMap;

    use super::*;

    /// A recorded `install_mfc`/`delete_mfc` call, kept for assertions.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub enum MfcCall {
        Install { route: MulticastRoute, iif: MifIndex, oif: MifIndex },
        Delete { route: MulticastRoute, iif: MifIndex },
    }

    /// In-memory stand-in for the real kernel router socket, matching
    /// the `#[cfg(feature = "testing")] Socket {}` convention used by
    /// `holo-igmp`/`holo-vrrp`.
    #[derive(Default)]
    pub struct RouterSocket {
        pub calls: RefCell<Vec<MfcCall>>,
        pub pending_upcalls: RefCell<VecDeque<Upcall>>,
        pub counters: RefCell<HashMap<(Ipv6Addr, Ipv6Addr), Counters>>,
        pub fail_counters: RefCell<bool>,
    }

    impl RouterSocket {
        pub fn open(_mif_table: &MifTable) -> Result<RouterSocket, Error> {
            Ok(RouterSocket::default())
        }

        pub fn install_mfc(
            &self,
            route: &MulticastRoute,
            iif: MifIndex,
            oif: MifIndex,
        ) -> Result<(), Error> {
            self.calls.borrow_mut().push(MfcCall::Install {
                route: *route,
                iif,
                oif,
            });
            Ok(())
        }

        pub fn delete_mfc(
            &self,
            route: &MulticastRoute,
            iif: MifIndex,
        ) -> Result<(), Error> {
            self.calls.borrow_mut().push(MfcCall::Delete { route: *route, iif });
            Ok(())
        }

        pub fn query_counters(&self, route: &MulticastRoute) -> Result<Counters, Error> {
            if *self.fail_counters.borrow() {
                return Err(Error::Errno(nix::errno::Errno::EIO));
            }
            Ok(self
                .counters
                .borrow()
                .get(&(route.src, route.group))
                .copied()
                .unwrap_or_default())
        }

        pub fn recv_upcall(&self) -> Result<Option<Upcall>, Error> {
            Ok(self.pending_upcalls.borrow_mut().pop_front())
        }

        pub fn as_raw_fd(&self) -> RawFd {
            // A placeholder fd is enough for `prepare`/`process` tests,
            // which never issue a real `select` against it; picked to be
            // a valid bit position for `nix::sys::select::FdSet`.
            0
        }

        /// Test helper: queues a synthetic upcall for `recv_upcall` to
        /// return.
        pub fn push_upcall(&self, upcall: Upcall) {
            self.pending_upcalls.borrow_mut().push_back(upcall);
        }

        /// Test helper: sets the counters `query_counters` reports for
        /// `route`.
        pub fn set_counters(&self, route: &MulticastRoute, counters: Counters) {
            self.counters
                .borrow_mut()
                .insert((route.src, route.group), counters);
        }
    }
}

#[cfg(feature = "testing")]
pub use mock::{MfcCall, RouterSocket};
