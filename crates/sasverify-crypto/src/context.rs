//! Uniform, runtime-checked SAS context.
//!
//! [`SasContext`] wraps the phase-typed [`Sas`] and [`EstablishedSas`] behind
//! one type with explicit lifecycle checks, for callers that need a single
//! object with a fixed calling convention:
//!
//! ```text
//! Empty --create--> Keyed --set_their_key--> Established
//!   ^                                             |
//!   +------------------- clear -------------------+
//! ```
//!
//! Every failing call records its error (see [`SasContext::last_error`]) and
//! leaves the context exactly as it was. Nothing here allocates.

use std::mem::MaybeUninit;

use crate::error::SasError;
use crate::exchange::{PUBLIC_KEY_LENGTH, RANDOM_LENGTH, Sas};
use crate::session::{EstablishedSas, MAC_LENGTH};

enum Phase {
    Empty,
    Keyed(Sas),
    Established(EstablishedSas),
}

impl Phase {
    const fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Keyed(_) => "keyed",
            Self::Established(_) => "established",
        }
    }
}

/// A SAS verification in progress.
///
/// Secret material is wiped on [`clear`](Self::clear) and on drop.
pub struct SasContext {
    phase: Phase,
    last_error: Option<SasError>,
}

impl Default for SasContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SasContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SasContext")
            .field("phase", &self.phase.name())
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl SasContext {
    /// An empty context.
    pub const fn new() -> Self {
        Self {
            phase: Phase::Empty,
            last_error: None,
        }
    }

    /// Bytes of storage one context occupies.
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Initialise an empty context in caller-provided storage.
    pub fn init_in(slot: &mut MaybeUninit<Self>) -> &mut Self {
        slot.write(Self::new())
    }

    /// Number of random bytes [`create`](Self::create) needs.
    pub const fn random_length() -> usize {
        RANDOM_LENGTH
    }

    /// Code of the most recent failure, or `"SUCCESS"` if none.
    ///
    /// Stays valid until the next failure or [`clear`](Self::clear).
    pub fn last_error(&self) -> &'static str {
        self.last_error.as_ref().map_or("SUCCESS", SasError::code)
    }

    /// The most recent failure.
    pub const fn last_error_kind(&self) -> Option<SasError> {
        self.last_error
    }

    /// Name of the current lifecycle phase.
    pub const fn phase(&self) -> &'static str {
        self.phase.name()
    }

    /// Whether the shared secret has been established.
    pub const fn is_established(&self) -> bool {
        matches!(self.phase, Phase::Established(_))
    }

    fn fail<T>(&mut self, error: SasError) -> Result<T, SasError> {
        tracing::debug!(code = error.code(), %error, "SAS operation failed");
        self.last_error = Some(error);
        Err(error)
    }

    fn record<T>(&mut self, result: Result<T, SasError>) -> Result<T, SasError> {
        match result {
            Ok(value) => Ok(value),
            Err(error) => self.fail(error),
        }
    }

    const fn invalid_state(&self, operation: &'static str) -> SasError {
        SasError::InvalidState {
            operation,
            phase: self.phase.name(),
        }
    }

    fn established(&self, operation: &'static str) -> Result<&EstablishedSas, SasError> {
        match &self.phase {
            Phase::Established(established) => Ok(established),
            _ => Err(self.invalid_state(operation)),
        }
    }

    /// Generate our keypair from `random`.
    ///
    /// Needs at least [`random_length`](Self::random_length) bytes and only
    /// uses that many.
    pub fn create(&mut self, random: &[u8]) -> Result<(), SasError> {
        let result = match self.phase {
            Phase::Empty => Sas::from_random(random),
            _ => Err(self.invalid_state("create keypair")),
        };
        let sas = self.record(result)?;
        self.phase = Phase::Keyed(sas);
        Ok(())
    }

    /// Wipe all secret material and return to the empty phase.
    pub fn clear(&mut self) {
        // Dropping the old phase zeroizes the private scalar and shared secret.
        self.phase = Phase::Empty;
        self.last_error = None;
        tracing::debug!("cleared SAS context");
    }

    /// Length of our encoded public key.
    pub fn pubkey_length(&mut self) -> Result<usize, SasError> {
        let result = match self.phase {
            Phase::Empty => Err(self.invalid_state("query public key length")),
            _ => Ok(PUBLIC_KEY_LENGTH),
        };
        self.record(result)
    }

    /// Write our public key into `out[..PUBLIC_KEY_LENGTH]`.
    pub fn get_pubkey(&mut self, out: &mut [u8]) -> Result<usize, SasError> {
        let public = match &self.phase {
            Phase::Empty => Err(self.invalid_state("get public key")),
            Phase::Keyed(sas) => Ok(sas.public_bytes()),
            Phase::Established(established) => Ok(*established.our_public_key().as_bytes()),
        };
        let result = public.and_then(|public| {
            let actual = out.len();
            let dest = out
                .get_mut(..PUBLIC_KEY_LENGTH)
                .ok_or(SasError::OutputBufferTooSmall {
                    expected: PUBLIC_KEY_LENGTH,
                    actual,
                })?;
            dest.copy_from_slice(&public);
            Ok(PUBLIC_KEY_LENGTH)
        });
        self.record(result)
    }

    /// Set the peer's public key and compute the shared secret.
    ///
    /// Allowed exactly once. A rejected key leaves our keypair in place so a
    /// corrected key can be supplied.
    pub fn set_their_key(&mut self, their_key: &[u8]) -> Result<(), SasError> {
        let result = match &self.phase {
            Phase::Keyed(sas) => sas.agree(their_key),
            _ => Err(self.invalid_state("set their key")),
        };
        let established = self.record(result)?;
        // Replacing the keyed phase wipes our private scalar.
        self.phase = Phase::Established(established);
        Ok(())
    }

    /// Fill `out` with bytes derived from the shared secret and `info`.
    pub fn generate_bytes(&mut self, info: &[u8], out: &mut [u8]) -> Result<(), SasError> {
        let result = self
            .established("generate bytes")
            .and_then(|established| established.generate_bytes(info, out));
        self.record(result)
    }

    /// Length of the MAC written by [`calculate_mac`](Self::calculate_mac).
    pub fn mac_length(&mut self) -> Result<usize, SasError> {
        let result = self.established("query MAC length").map(|_| MAC_LENGTH);
        self.record(result)
    }

    /// Compute a MAC over `input`, keyed by the shared secret and `info`.
    pub fn calculate_mac(
        &mut self,
        input: &[u8],
        info: &[u8],
        out: &mut [u8],
    ) -> Result<usize, SasError> {
        let result = self
            .established("calculate MAC")
            .and_then(|established| established.calculate_mac(input, info, out));
        self.record(result)
    }

    /// Compute a MAC with the legacy 256-byte HMAC key.
    pub fn calculate_mac_long_kdf(
        &mut self,
        input: &[u8],
        info: &[u8],
        out: &mut [u8],
    ) -> Result<usize, SasError> {
        let result = self
            .established("calculate MAC")
            .and_then(|established| established.calculate_mac_long_kdf(input, info, out));
        self.record(result)
    }

    /// Check a MAC received from the peer.
    pub fn verify_mac(&mut self, input: &[u8], info: &[u8], tag: &[u8]) -> Result<(), SasError> {
        let result = self
            .established("verify MAC")
            .and_then(|established| established.verify_mac(input, info, tag));
        self.record(result)
    }

    /// Borrow the established session, if any.
    pub const fn established_sas(&self) -> Option<&EstablishedSas> {
        match &self.phase {
            Phase::Established(established) => Some(established),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn keyed(seed: u8) -> SasContext {
        let mut ctx = SasContext::new();
        ctx.create(&[seed; RANDOM_LENGTH]).unwrap();
        ctx
    }

    fn pubkey(ctx: &mut SasContext) -> [u8; PUBLIC_KEY_LENGTH] {
        let mut out = [0u8; PUBLIC_KEY_LENGTH];
        ctx.get_pubkey(&mut out).unwrap();
        out
    }

    fn established_pair() -> (SasContext, SasContext) {
        let mut alice = keyed(1);
        let mut bob = keyed(2);
        let alice_pub = pubkey(&mut alice);
        let bob_pub = pubkey(&mut bob);
        alice.set_their_key(&bob_pub).unwrap();
        bob.set_their_key(&alice_pub).unwrap();
        (alice, bob)
    }

    #[test]
    fn new_context_is_empty_without_error() {
        let ctx = SasContext::new();
        assert_eq!(ctx.phase(), "empty");
        assert_eq!(ctx.last_error(), "SUCCESS");
        assert!(ctx.last_error_kind().is_none());
    }

    #[test]
    fn size_matches_type() {
        assert_eq!(SasContext::size(), std::mem::size_of::<SasContext>());
        assert_eq!(SasContext::random_length(), 32);
    }

    #[test]
    fn init_in_caller_storage() {
        let mut slot = MaybeUninit::<SasContext>::uninit();
        let ctx = SasContext::init_in(&mut slot);
        ctx.create(&[4u8; RANDOM_LENGTH]).unwrap();
        assert_eq!(ctx.phase(), "keyed");
        // The context lives in `slot`; dropping it wipes the keypair.
        drop(std::mem::take(ctx));
    }

    #[test]
    fn create_is_deterministic() {
        let mut a = keyed(9);
        let mut b = keyed(9);
        assert_eq!(pubkey(&mut a), pubkey(&mut b));
    }

    #[test]
    fn create_rejects_short_randomness_and_stays_empty() {
        let mut ctx = SasContext::new();
        let err = ctx.create(&[0u8; 31]).unwrap_err();
        assert_eq!(
            err,
            SasError::NotEnoughRandom {
                expected: 32,
                actual: 31
            }
        );
        assert_eq!(ctx.phase(), "empty");
        assert_eq!(ctx.last_error(), "NOT_ENOUGH_RANDOM");
        ctx.create(&[0u8; 32]).unwrap();
        assert_eq!(ctx.phase(), "keyed");
    }

    #[test]
    fn create_twice_is_a_state_violation() {
        let mut ctx = keyed(1);
        let before = pubkey(&mut ctx);
        let err = ctx.create(&[2u8; RANDOM_LENGTH]).unwrap_err();
        assert!(matches!(err, SasError::InvalidState { phase: "keyed", .. }));
        assert_eq!(pubkey(&mut ctx), before);
    }

    #[test]
    fn get_pubkey_requires_keypair() {
        let mut ctx = SasContext::new();
        let mut out = [0u8; PUBLIC_KEY_LENGTH];
        assert!(matches!(
            ctx.get_pubkey(&mut out),
            Err(SasError::InvalidState { phase: "empty", .. })
        ));
        assert!(ctx.pubkey_length().is_err());
        assert_eq!(ctx.last_error(), "INVALID_STATE");
    }

    #[test]
    fn get_pubkey_rejects_buffer_one_byte_short() {
        let mut ctx = keyed(1);
        assert_eq!(ctx.pubkey_length().unwrap(), PUBLIC_KEY_LENGTH);
        let mut out = [0u8; PUBLIC_KEY_LENGTH - 1];
        assert_eq!(
            ctx.get_pubkey(&mut out),
            Err(SasError::OutputBufferTooSmall {
                expected: PUBLIC_KEY_LENGTH,
                actual: PUBLIC_KEY_LENGTH - 1
            })
        );
        assert_eq!(ctx.last_error(), "OUTPUT_BUFFER_TOO_SMALL");
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn secret_operations_fail_before_their_key() {
        let mut ctx = keyed(1);
        let mut out = [0u8; MAC_LENGTH];
        assert!(matches!(
            ctx.generate_bytes(b"info", &mut out),
            Err(SasError::InvalidState { phase: "keyed", .. })
        ));
        assert!(matches!(
            ctx.calculate_mac(b"input", b"info", &mut out),
            Err(SasError::InvalidState { phase: "keyed", .. })
        ));
        assert!(ctx.mac_length().is_err());
        assert!(ctx.verify_mac(b"input", b"info", &out).is_err());
        assert_eq!(ctx.phase(), "keyed");
    }

    #[test]
    fn set_their_key_requires_keypair() {
        let mut ctx = SasContext::new();
        let peer_pub = pubkey(&mut keyed(2));
        assert!(matches!(
            ctx.set_their_key(&peer_pub),
            Err(SasError::InvalidState { phase: "empty", .. })
        ));
    }

    #[test]
    fn set_their_key_twice_keeps_original_secret() {
        let (mut alice, _) = established_pair();
        let mut before = [0u8; 16];
        alice.generate_bytes(b"info", &mut before).unwrap();

        let other_pub = pubkey(&mut keyed(3));
        let err = alice.set_their_key(&other_pub).unwrap_err();
        assert!(matches!(
            err,
            SasError::InvalidState {
                phase: "established",
                ..
            }
        ));

        let mut after = [0u8; 16];
        alice.generate_bytes(b"info", &mut after).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn low_order_key_is_rejected_and_retry_succeeds() {
        let mut ctx = keyed(1);
        let own_pub = pubkey(&mut ctx);
        assert_eq!(
            ctx.set_their_key(&[0u8; PUBLIC_KEY_LENGTH]),
            Err(SasError::NonContributoryKey)
        );
        assert_eq!(ctx.phase(), "keyed");
        assert_eq!(ctx.last_error(), "NON_CONTRIBUTORY_KEY");
        assert_eq!(pubkey(&mut ctx), own_pub);

        let peer_pub = pubkey(&mut keyed(2));
        ctx.set_their_key(&peer_pub).unwrap();
        assert!(ctx.is_established());
    }

    #[test]
    fn malformed_key_length_is_rejected() {
        let mut ctx = keyed(1);
        assert_eq!(
            ctx.set_their_key(&[1u8; PUBLIC_KEY_LENGTH + 1]),
            Err(SasError::InvalidPublicKey {
                expected: PUBLIC_KEY_LENGTH,
                actual: PUBLIC_KEY_LENGTH + 1
            })
        );
        assert_eq!(ctx.last_error(), "INVALID_PUBLIC_KEY");
    }

    #[test]
    fn both_sides_generate_same_bytes_and_macs() {
        let (mut alice, mut bob) = established_pair();
        let mut a = [0u8; 5];
        let mut b = [0u8; 5];
        alice.generate_bytes(b"SAS", &mut a).unwrap();
        bob.generate_bytes(b"SAS", &mut b).unwrap();
        assert_eq!(a, b);

        assert_eq!(alice.mac_length().unwrap(), MAC_LENGTH);
        let mut mac_a = [0u8; MAC_LENGTH];
        let mut mac_b = [0u8; MAC_LENGTH];
        alice.calculate_mac(b"deviceid:ABCDEF", b"MAC", &mut mac_a).unwrap();
        bob.calculate_mac(b"deviceid:ABCDEF", b"MAC", &mut mac_b).unwrap();
        assert_eq!(mac_a, mac_b);
        bob.verify_mac(b"deviceid:ABCDEF", b"MAC", &mac_a).unwrap();
    }

    #[test]
    fn calculate_mac_rejects_buffer_one_byte_short() {
        let (mut alice, _) = established_pair();
        let mut out = [0u8; MAC_LENGTH - 1];
        assert_eq!(
            alice.calculate_mac(b"input", b"info", &mut out),
            Err(SasError::OutputBufferTooSmall {
                expected: MAC_LENGTH,
                actual: MAC_LENGTH - 1
            })
        );
        assert_eq!(alice.last_error(), "OUTPUT_BUFFER_TOO_SMALL");
        assert!(alice.is_established());
    }

    #[test]
    fn verify_mac_failure_is_recorded() {
        let (mut alice, _) = established_pair();
        assert_eq!(
            alice.verify_mac(b"input", b"info", &[0u8; MAC_LENGTH]),
            Err(SasError::InvalidMac)
        );
        assert_eq!(alice.last_error(), "BAD_MESSAGE_MAC");
    }

    #[test]
    fn last_error_survives_success() {
        let mut ctx = SasContext::new();
        let _ = ctx.create(&[]);
        ctx.create(&[1u8; RANDOM_LENGTH]).unwrap();
        assert_eq!(ctx.last_error(), "NOT_ENOUGH_RANDOM");
    }

    #[test]
    fn clear_wipes_secret_and_blocks_reads() {
        let (mut alice, _) = established_pair();
        alice.clear();
        assert_eq!(alice.phase(), "empty");
        assert!(alice.established_sas().is_none());

        let mut out = [0u8; MAC_LENGTH];
        assert!(matches!(
            alice.generate_bytes(b"SAS", &mut out),
            Err(SasError::InvalidState { phase: "empty", .. })
        ));
        assert!(matches!(
            alice.calculate_mac(b"input", b"info", &mut out),
            Err(SasError::InvalidState { phase: "empty", .. })
        ));
        assert!(alice.get_pubkey(&mut out).is_err());
    }

    #[test]
    fn cleared_context_can_be_reused() {
        let mut ctx = keyed(1);
        ctx.clear();
        assert_eq!(ctx.last_error(), "SUCCESS");
        ctx.create(&[2u8; RANDOM_LENGTH]).unwrap();
        assert_eq!(ctx.phase(), "keyed");
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let (alice, _) = established_pair();
        let debug_output = format!("{alice:?}");
        assert!(debug_output.contains("established"));
        let secret = alice.established_sas().unwrap().shared_secret_bytes();
        assert!(!debug_output.contains(&hex::encode(secret)));
    }
}
