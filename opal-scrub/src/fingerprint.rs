//! The per-run fingerprint key.

use blake2::digest::consts::U32;
use blake2::digest::Mac;
use blake2::Blake2bMac;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

type Mac256 = Blake2bMac<U32>;

/// A 32-byte key generated at scrubber construction. Fingerprints are
/// keyed BLAKE2b-256 digests: stable within a run, uncorrelated across
/// runs, and safe to log because the key never leaves the scrubber.
pub(crate) struct RunKey {
    key: Zeroizing<[u8; 32]>,
}

impl RunKey {
    pub(crate) fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut *key);
        Self { key }
    }

    pub(crate) fn fingerprint(&self, data: &[u8]) -> [u8; 32] {
        let mut mac = Mac256::new_from_slice(&*self.key)
            .expect("32-byte key is within blake2b limits");
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}
