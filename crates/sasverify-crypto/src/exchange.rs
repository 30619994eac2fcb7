//! Key agreement for SAS verification.
//!
//! Each side builds an ephemeral X25519 keypair from caller-supplied
//! randomness, publishes its public key, and performs ECDH with the peer's
//! public key to obtain an [`EstablishedSas`].

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::SasError;
use crate::session::EstablishedSas;

/// Number of random bytes needed to create a keypair.
pub const RANDOM_LENGTH: usize = 32;

/// Length of an encoded X25519 public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// An ephemeral keypair waiting for the peer's public key.
pub struct Sas {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for Sas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sas")
            .field("public", &hex::encode(self.public.as_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// A rejected peer key, carrying the untouched keypair so the caller can retry.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct DiffieHellmanError {
    sas: Sas,
    error: SasError,
}

impl DiffieHellmanError {
    /// The reason the key was rejected.
    pub const fn error(&self) -> SasError {
        self.error
    }

    /// Recover the keypair.
    pub fn into_sas(self) -> Sas {
        self.sas
    }
}

impl Sas {
    /// Create a keypair from the first [`RANDOM_LENGTH`] bytes of `random`.
    ///
    /// Bytes beyond that are ignored. The same randomness always yields the
    /// same public key.
    pub fn from_random(random: &[u8]) -> Result<Self, SasError> {
        let Some(seed) = random.get(..RANDOM_LENGTH) else {
            return Err(SasError::NotEnoughRandom {
                expected: RANDOM_LENGTH,
                actual: random.len(),
            });
        };
        let mut arr = [0u8; RANDOM_LENGTH];
        arr.copy_from_slice(seed);
        let secret = StaticSecret::from(arr);
        arr.zeroize();
        let public = PublicKey::from(&secret);
        tracing::debug!(public = %hex::encode(public.as_bytes()), "created SAS keypair");
        Ok(Self { secret, public })
    }

    /// Our public key.
    pub const fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Our public key as raw bytes, to be sent to the peer.
    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        *self.public.as_bytes()
    }

    /// Complete the key agreement with the peer's public key.
    ///
    /// On failure the keypair is handed back inside the error.
    pub fn diffie_hellman(self, their_key: &[u8]) -> Result<EstablishedSas, DiffieHellmanError> {
        match self.agree(their_key) {
            Ok(established) => Ok(established),
            Err(error) => Err(DiffieHellmanError { sas: self, error }),
        }
    }

    /// Perform X25519 with `their_key` without consuming the keypair.
    ///
    /// Rejects keys of the wrong length and low-order points whose shared
    /// secret would be all zeros.
    pub(crate) fn agree(&self, their_key: &[u8]) -> Result<EstablishedSas, SasError> {
        let their_public = parse_public_key(their_key)?;
        let shared = self.secret.diffie_hellman(&their_public);
        if !shared.was_contributory() {
            tracing::warn!(
                their_key = %hex::encode(their_public.as_bytes()),
                "rejected low-order SAS public key"
            );
            return Err(SasError::NonContributoryKey);
        }
        tracing::debug!(
            their_key = %hex::encode(their_public.as_bytes()),
            "established SAS shared secret"
        );
        Ok(EstablishedSas::new(shared, self.public, their_public))
    }
}

/// Decode a peer's public key from its fixed-width encoding.
///
/// Only the length is checked here. As in RFC 7748 the most significant
/// bit of the last byte is ignored, so an encoding with that bit set names
/// the same point as the one with it cleared. Low-order points are caught
/// later by [`Sas::diffie_hellman`].
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, SasError> {
    let arr: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| SasError::InvalidPublicKey {
        expected: PUBLIC_KEY_LENGTH,
        actual: bytes.len(),
    })?;
    Ok(PublicKey::from(arr))
}

/// Perform a complete key agreement between two freshly generated keypairs.
///
/// Mainly useful for testing. In production each side creates a [`Sas`],
/// sends its public bytes, and calls [`Sas::diffie_hellman`] with the peer's.
#[cfg(any(test, feature = "test-utils"))]
pub fn test_sas_pair() -> Result<(EstablishedSas, EstablishedSas), SasError> {
    use rand::RngCore;
    use rand::rngs::OsRng;

    let mut random = [0u8; RANDOM_LENGTH];
    OsRng.fill_bytes(&mut random);
    let alice = Sas::from_random(&random)?;
    OsRng.fill_bytes(&mut random);
    let bob = Sas::from_random(&random)?;
    random.zeroize();

    let alice_pub = alice.public_bytes();
    let bob_pub = bob.public_bytes();

    let alice = alice.diffie_hellman(&bob_pub).map_err(|e| e.error())?;
    let bob = bob.diffie_hellman(&alice_pub).map_err(|e| e.error())?;
    Ok((alice, bob))
}
