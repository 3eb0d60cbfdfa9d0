//! Raw token generation and lookup digests.
//!
//! Raw tokens are handed to the client and never stored. The store keys rows
//! by [`digest`] of the raw token, so a leaked database does not hand out
//! usable session cookies.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest as _, Sha256};

/// Number of random bytes in a raw token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Generates a new raw token from the OS CSPRNG, URL-safe base64 encoded.
pub fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Computes the storage key for a raw token: lowercase hex SHA-256.
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
