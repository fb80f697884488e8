//! Shared CSPRNG provider for handshake nonces and frame masks.
//!
//! Randomness comes from the operating system ([`rand::rngs::OsRng`]).
//! A failure of the OS source is *sticky*: after the first refusal the
//! provider stops asking and every later request degrades deterministically
//! -- nonces come back zero-filled and masks become unavailable, so frames
//! go out with the MASK bit clear. The degradation is logged once.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::TryRngCore;
use rand::rngs::OsRng;
use tracing::warn;

static CSPRNG_UNAVAILABLE: AtomicBool = AtomicBool::new(false);

/// Fill `buf` from the OS CSPRNG. Returns `false` (and trips the sticky
/// failure flag) if the source is unavailable.
fn try_fill(buf: &mut [u8]) -> bool {
    if CSPRNG_UNAVAILABLE.load(Ordering::Relaxed) {
        return false;
    }
    match OsRng.try_fill_bytes(buf) {
        Ok(()) => true,
        Err(e) => {
            CSPRNG_UNAVAILABLE.store(true, Ordering::Relaxed);
            warn!("system csprng unavailable ({e}); outgoing frames will not be masked");
            false
        }
    }
}

/// 16-byte nonce for `Sec-WebSocket-Key`.
///
/// Zero-filled when the CSPRNG is unavailable; the handshake still runs.
pub(crate) fn handshake_nonce() -> [u8; 16] {
    let mut nonce = [0u8; 16];
    if !try_fill(&mut nonce) {
        // Contents after a failed fill are unspecified.
        nonce = [0u8; 16];
    }
    nonce
}

/// Fresh 4-byte masking key, or `None` when the CSPRNG is unavailable.
pub(crate) fn frame_mask() -> Option<[u8; 4]> {
    let mut key = [0u8; 4];
    try_fill(&mut key).then_some(key)
}
