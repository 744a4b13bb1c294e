//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn};

/// MRM error kinds (specification §7).
///
/// `None`/success is represented as `Ok(())` rather than as a variant
/// here — unlike a source language without a `Result` type, adding a
/// fourth "no error" variant would only require callers to match it out.
#[derive(Debug)]
pub enum Error {
    /// A syscall returned failure; carries the raw errno.
    Errno(nix::errno::Errno),
    /// A policy-layer argument check failed (e.g. `iif` is neither
    /// `Thread` nor `Backbone`).
    InvalidArgs,
    /// Deletion of an entry the MRM believed present, but the kernel
    /// reported it gone already. Callers map this back to success;
    /// kept as a distinct variant purely so it logs at DEBUG instead of
    /// WARN/ERROR.
    NotFound,
}

impl Error {
    /// Logs this error at the level specification §7 assigns to it, then
    /// discards it. Used at call sites where propagating further would
    /// either be impossible (enable-path already failed) or undesirable
    /// (per-upcall and per-entry failures are swallowed by design).
    pub fn log(&self) {
        match self {
            Error::Errno(errno) => {
                warn!(%errno, "{}", self);
            }
            Error::InvalidArgs => {
                error!("{}", self);
            }
            Error::NotFound => {
                tracing::debug!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Errno(errno) => {
                write!(f, "kernel multicast routing syscall failed: {errno}")
            }
            Error::InvalidArgs => {
                write!(f, "invalid multicast interface argument")
            }
            Error::NotFound => {
                write!(f, "multicast forwarding cache entry already absent")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Errno(errno) => Some(errno),
            Error::InvalidArgs | Error::NotFound => None,
        }
    }
}

impl From<nix::errno::Errno> for Error {
    fn from(errno: nix::errno::Errno) -> Error {
        if errno == nix::errno::Errno::ENOENT {
            Error::NotFound
        } else {
            Error::Errno(errno)
        }
    }
}
