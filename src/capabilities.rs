//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Temporary privilege elevation for the handful of syscalls that need
//! `CAP_NET_RAW`/`CAP_NET_ADMIN`: opening the raw ICMPv6 socket and
//! programming `MRT6_INIT`/`MRT6_ADD_MIF`. Mirrors `holo_utils::capabilities`:
//! a Border Router process is expected to run with those capabilities
//! permitted but not effective, raising them only around the syscalls
//! that need them and dropping them immediately after.

use capctl::caps::CapState;
use tracing::error;

/// Runs `cb` with this process's permitted capabilities raised to
/// effective, then drops them back down again once `cb` returns.
pub(crate) fn raise<F, R>(cb: F) -> R
where
    F: FnOnce() -> R,
{
    let mut caps = CapState::get_current().unwrap();
    caps.effective = caps.permitted;
    if let Err(error) = caps.set_current() {
        error!("failed to update current capabilities: {}", error);
    }

    let ret = cb();

    caps.effective.clear();
    if let Err(error) = caps.set_current() {
        error!("failed to update current capabilities: {}", error);
    }

    ret
}
