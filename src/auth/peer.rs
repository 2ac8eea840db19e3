//! Peer identity resolution from kernel socket credentials
//!
//! The kernel reports the uid and primary gid of the process at the other end
//! of an accepted UNIX-domain connection. Those are resolved against the
//! system user and group databases into a user name plus the union of the
//! primary group and every group listing the user as a member. Resolution
//! failure fails the whole connection; the session never runs without a
//! complete identity.

use crate::error::{Error, Result};
use nix::unistd::{getgrouplist, Gid, Group, Uid, User};
use std::collections::HashSet;
use std::ffi::CString;
use tokio::net::UnixStream;
use tracing::warn;

/// A connecting peer's resolved POSIX identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    /// User name of the peer process owner
    pub user: String,
    /// Primary plus supplementary group names
    pub groups: HashSet<String>,
}

impl PeerIdentity {
    /// Resolve the identity of the process at the remote end of `stream`
    pub fn from_stream(stream: &UnixStream) -> Result<Self> {
        let cred = stream.peer_cred().map_err(|e| {
            Error::PeerCredentials(format!("kernel provided no peer credentials: {}", e))
        })?;
        Self::from_ids(cred.uid(), cred.gid())
    }

    /// Resolve a uid and primary gid into a user name and group set
    pub fn from_ids(uid: u32, gid: u32) -> Result<Self> {
        let user = User::from_uid(Uid::from_raw(uid))
            .map_err(|e| Error::PeerCredentials(format!("lookup of uid {} failed: {}", uid, e)))?
            .ok_or_else(|| Error::PeerCredentials(format!("unknown uid {}", uid)))?;

        let user_cstr = CString::new(user.name.as_str())
            .map_err(|_| Error::PeerCredentials(format!("invalid user name for uid {}", uid)))?;

        let gids = getgrouplist(&user_cstr, Gid::from_raw(gid)).map_err(|e| {
            Error::PeerCredentials(format!("group enumeration for {} failed: {}", user.name, e))
        })?;

        let mut groups = HashSet::new();
        for g in gids {
            match Group::from_gid(g) {
                Ok(Some(group)) => {
                    groups.insert(group.name);
                }
                Ok(None) => warn!(gid = g.as_raw(), user = %user.name, "skipping unknown gid"),
                Err(e) => {
                    warn!(gid = g.as_raw(), user = %user.name, error = %e, "gid lookup failed")
                }
            }
        }

        Ok(Self {
            user: user.name,
            groups,
        })
    }
}
