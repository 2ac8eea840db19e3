//! Authorization model
//!
//! Binds public-key fingerprints to the POSIX groups permitted to sign with
//! them, and resolves connecting peers to their user name and group set:
//! - `fingerprint`: canonical MD5 and SHA-256 fingerprint forms
//! - `policy`: the immutable fingerprint-to-groups index loaded at startup
//! - `peer`: kernel peer-credential resolution for accepted connections

pub mod fingerprint;
pub mod peer;
pub mod policy;

pub use peer::PeerIdentity;
pub use policy::Policy;
