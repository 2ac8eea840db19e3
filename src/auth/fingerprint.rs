//! Canonical public-key fingerprint forms
//!
//! Two textual forms identify a key: the colonless lowercase hex MD5 digest
//! of the raw public-key blob, and the `SHA256` prefix followed by the
//! unpadded base64 SHA-256 digest of the same blob. Policy entries may be
//! stored under either form; sign requests are matched against both.

use base64::Engine;
use md5::{Digest, Md5};
use sha2::Sha256;

/// Compute the MD5 fingerprint of an SSH public-key blob
///
/// Returns 32 lowercase hex characters with no colon separators.
pub fn md5_fingerprint(blob: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(blob);
    let sum = hasher.finalize();
    sum.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Compute the SHA-256 fingerprint of an SSH public-key blob
///
/// Returns the literal prefix `SHA256` followed by the unpadded base64
/// encoding of the digest.
pub fn sha256_fingerprint(blob: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(blob);
    let sum = hasher.finalize();
    format!(
        "SHA256{}",
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(sum)
    )
}
