//! `sasverify` SAS Library
//!
//! Short Authentication String key verification between two parties that
//! each hold their own secure channel. Both sides compare a short
//! human-legible value out of band and exchange MACs over their device
//! metadata to detect a machine-in-the-middle.
//!
//! ## Crypto primitives
//!
//! - **Key agreement**: ephemeral X25519 keypair from caller-supplied randomness
//! - **Byte expander**: HKDF-SHA256 over the shared secret with a caller info label
//! - **MAC**: HMAC-SHA256 keyed by HKDF-SHA256(shared secret, info)
//!
//! Two surfaces are provided: the phase-typed [`Sas`] → [`EstablishedSas`]
//! pair, where misuse does not compile, and [`SasContext`], a single object
//! with runtime lifecycle checks and a last-error code.

pub mod context;
pub mod display;
pub mod error;
pub mod exchange;
pub mod session;

pub use context::SasContext;
pub use display::{SasMethod, ShortAuthString, compare_sas};
pub use error::SasError;
#[cfg(any(test, feature = "test-utils"))]
pub use exchange::test_sas_pair;
pub use exchange::{DiffieHellmanError, PUBLIC_KEY_LENGTH, RANDOM_LENGTH, Sas, parse_public_key};
pub use session::{EstablishedSas, MAC_LENGTH, MAX_OUTPUT_LENGTH};
