//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! MRM debug messages, following `holo-igmp::debug`'s `Debug` enum
//! convention: one variant per internal transition worth a DEBUG-level
//! log line, kept separate from the INFO/WARN/ERROR calls made directly
//! at state-transition and syscall-failure call sites (§7).

use tracing::debug;

use crate::listener::ListenerSet;
use crate::mfc::{Mfc, MulticastRoute};
use crate::mif::MifIndex;

#[derive(Debug)]
pub enum Debug<'a> {
    SocketOpen,
    SocketClose,
    MfcInstall(&'a MulticastRoute, MifIndex, MifIndex),
    MfcDelete(&'a MulticastRoute),
    MfcExpire(&'a MulticastRoute),
    MfcRefresh(&'a MulticastRoute, u64),
    Unblock(&'a MulticastRoute),
}

impl Debug<'_> {
    pub(crate) fn log(&self) {
        match self {
            Debug::SocketOpen | Debug::SocketClose => {
                debug!("{}", self);
            }
            Debug::MfcInstall(route, iif, oif) => {
                debug!(%route, %iif, %oif, "{}", self);
            }
            Debug::MfcDelete(route) | Debug::MfcExpire(route) | Debug::Unblock(route) => {
                debug!(%route, "{}", self);
            }
            Debug::MfcRefresh(route, pktcnt) => {
                debug!(%route, pktcnt, "{}", self);
            }
        }
    }
}

/// Logs the current MFC/listener state at DEBUG, per §7's "DEBUG for MFC
/// dumps" level assignment. With the `dump` feature, emits a structured
/// JSON dump (matching `holo-igmp::debug`'s `serde_json`-backed
/// `IbusRx` dump); without it, logs just the entry/listener counts.
#[cfg(feature = "dump")]
pub(crate) fn log_mfc_dump(mfc: &Mfc, listeners: &ListenerSet) {
    use serde_json::json;

    let entries: Vec<_> = mfc
        .iter()
        .map(|(route, info)| {
            json!({
                "src": route.src.to_string(),
                "group": route.group.to_string(),
                "iif": info.iif.to_string(),
                "oif": info.oif.to_string(),
                "valid_pkt_cnt": info.valid_pkt_cnt,
            })
        })
        .collect();
    let listeners: Vec<_> = listeners.iter().map(|g| g.to_string()).collect();
    let data = json!({ "mfc": entries, "listeners": listeners }).to_string();
    debug!(%data, "MFC state dump");
}

#[cfg(not(feature = "dump"))]
pub(crate) fn log_mfc_dump(mfc: &Mfc, listeners: &ListenerSet) {
    debug!(
        mfc_entries = mfc.len(),
        listener_count = listeners.len(),
        "MFC state dump"
    );
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::SocketOpen => write!(f, "router socket opened"),
            Debug::SocketClose => write!(f, "router socket closed"),
            Debug::MfcInstall(..) => write!(f, "MFC entry installed"),
            Debug::MfcDelete(..) => write!(f, "MFC entry deleted"),
            Debug::MfcExpire(..) => write!(f, "MFC entry expired"),
            Debug::MfcRefresh(..) => write!(f, "MFC entry refreshed"),
            Debug::Unblock(..) => write!(f, "MFC entry unblocked"),
        }
    }
}
