//! Established SAS session.
//!
//! Holds the X25519 shared secret and derives from it, via HKDF-SHA256,
//! the bytes used to render the short authentication string and the keys
//! used to MAC exchanged metadata. Each derivation takes a caller-chosen
//! info label so that display bytes and MAC keys never share material.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, SharedSecret};
use zeroize::Zeroizing;

use crate::display::{self, EMOJI_BYTES, ShortAuthString};
use crate::error::SasError;

type HmacSha256 = Hmac<Sha256>;

/// Length of a MAC tag produced by [`EstablishedSas::calculate_mac`].
pub const MAC_LENGTH: usize = 32;

/// Largest output HKDF-SHA256 can expand to (255 hash blocks).
pub const MAX_OUTPUT_LENGTH: usize = 255 * 32;

/// HMAC key length used by [`EstablishedSas::calculate_mac_long_kdf`].
const LONG_MAC_KEY_LENGTH: usize = 256;

/// Fill `out` with HKDF-SHA256 output keyed by `ikm`, without a salt.
///
/// The PRK held inside `Hkdf` is not zeroized on drop; the `hkdf` and `hmac`
/// crates expose no wiping hook for their internal state.
fn hkdf_expand(ikm: &[u8], info: &[u8], out: &mut [u8]) -> Result<(), SasError> {
    if out.len() > MAX_OUTPUT_LENGTH {
        return Err(SasError::OutputTooLong {
            max: MAX_OUTPUT_LENGTH,
            requested: out.len(),
        });
    }
    let hk = Hkdf::<Sha256>::new(None, ikm);
    hk.expand(info, out).map_err(|_| SasError::KeyDerivationFailed)
}

fn hmac_sha256(key: &[u8], input: &[u8]) -> Result<[u8; MAC_LENGTH], SasError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SasError::KeyDerivationFailed)?;
    mac.update(input);
    let mut output = [0u8; MAC_LENGTH];
    output.copy_from_slice(&mac.finalize().into_bytes());
    Ok(output)
}

fn check_output(out: &[u8]) -> Result<(), SasError> {
    if out.len() < MAC_LENGTH {
        return Err(SasError::OutputBufferTooSmall {
            expected: MAC_LENGTH,
            actual: out.len(),
        });
    }
    Ok(())
}

/// Both sides' view of a completed key agreement.
///
/// The shared secret is wiped when this value is dropped.
pub struct EstablishedSas {
    shared_secret: SharedSecret,
    our_public: PublicKey,
    their_public: PublicKey,
}

impl std::fmt::Debug for EstablishedSas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstablishedSas")
            .field("our_public", &hex::encode(self.our_public.as_bytes()))
            .field("their_public", &hex::encode(self.their_public.as_bytes()))
            .field("shared_secret", &"[REDACTED]")
            .finish()
    }
}

impl EstablishedSas {
    pub(crate) const fn new(
        shared_secret: SharedSecret,
        our_public: PublicKey,
        their_public: PublicKey,
    ) -> Self {
        Self {
            shared_secret,
            our_public,
            their_public,
        }
    }

    /// Our public key.
    pub const fn our_public_key(&self) -> &PublicKey {
        &self.our_public
    }

    /// The peer's public key.
    pub const fn their_public_key(&self) -> &PublicKey {
        &self.their_public
    }

    /// Fill `out` with bytes derived from the shared secret and `info`.
    ///
    /// Identical inputs always give identical bytes, and both sides of the
    /// exchange get the same bytes for the same `info`. Any length up to
    /// [`MAX_OUTPUT_LENGTH`] is accepted.
    pub fn generate_bytes(&self, info: &[u8], out: &mut [u8]) -> Result<(), SasError> {
        hkdf_expand(self.shared_secret.as_bytes(), info, out)
    }

    /// Derive `N` bytes; convenience over [`Self::generate_bytes`].
    pub fn bytes<const N: usize>(&self, info: &[u8]) -> Result<[u8; N], SasError> {
        let mut out = [0u8; N];
        self.generate_bytes(info, &mut out)?;
        Ok(out)
    }

    /// Derive the bytes needed for both decimal and emoji rendering.
    pub fn short_auth_string(&self, info: &[u8]) -> Result<ShortAuthString, SasError> {
        let bytes = self.bytes::<EMOJI_BYTES>(info)?;
        Ok(display::short_auth_string(&bytes))
    }

    /// Compute a MAC tag over `input` into `out[..MAC_LENGTH]`.
    ///
    /// The HMAC-SHA256 key is the first 32 bytes of HKDF output for `info`,
    /// so tags computed under different labels are independent.
    pub fn calculate_mac(
        &self,
        input: &[u8],
        info: &[u8],
        out: &mut [u8],
    ) -> Result<usize, SasError> {
        check_output(out)?;
        let tag = self.mac(input, info)?;
        out[..MAC_LENGTH].copy_from_slice(&tag);
        Ok(MAC_LENGTH)
    }

    /// Compute a MAC tag over `input`.
    pub fn mac(&self, input: &[u8], info: &[u8]) -> Result<[u8; MAC_LENGTH], SasError> {
        let mut key = Zeroizing::new([0u8; MAC_LENGTH]);
        hkdf_expand(self.shared_secret.as_bytes(), info, key.as_mut_slice())?;
        hmac_sha256(key.as_slice(), input)
    }

    /// Compute a MAC tag using a 256-byte HMAC key.
    ///
    /// Older peers derived the HMAC key with an overlong HKDF expansion. Only
    /// use this to interoperate with them.
    pub fn calculate_mac_long_kdf(
        &self,
        input: &[u8],
        info: &[u8],
        out: &mut [u8],
    ) -> Result<usize, SasError> {
        check_output(out)?;
        let mut key = Zeroizing::new([0u8; LONG_MAC_KEY_LENGTH]);
        hkdf_expand(self.shared_secret.as_bytes(), info, key.as_mut_slice())?;
        let tag = hmac_sha256(key.as_slice(), input)?;
        out[..MAC_LENGTH].copy_from_slice(&tag);
        Ok(MAC_LENGTH)
    }

    /// Check a MAC tag received from the peer in constant time.
    pub fn verify_mac(&self, input: &[u8], info: &[u8], tag: &[u8]) -> Result<(), SasError> {
        let expected = self.mac(input, info)?;
        if bool::from(expected.as_slice().ct_eq(tag)) {
            Ok(())
        } else {
            tracing::warn!("SAS MAC verification failed");
            Err(SasError::InvalidMac)
        }
    }

    /// Raw shared secret (for testing).
    #[cfg(any(test, feature = "test-utils"))]
    pub fn shared_secret_bytes(&self) -> [u8; 32] {
        *self.shared_secret.as_bytes()
    }
}
