//! SAS error types.

/// Errors from SAS operations.
///
/// Every variant is `Copy` and carries no heap data, so recording one as the
/// context's last error never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SasError {
    #[error("Not enough random bytes: expected {expected}, got {actual}")]
    NotEnoughRandom { expected: usize, actual: usize },

    #[error("Cannot {operation} while the SAS context is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },

    #[error("Invalid public key length: expected {expected}, got {actual}")]
    InvalidPublicKey { expected: usize, actual: usize },

    #[error("Public key is low-order, the shared secret would be non-contributory")]
    NonContributoryKey,

    #[error("Output buffer too small: expected at least {expected}, got {actual}")]
    OutputBufferTooSmall { expected: usize, actual: usize },

    #[error("Requested output too long: maximum {max}, requested {requested}")]
    OutputTooLong { max: usize, requested: usize },

    /// An HKDF or HMAC primitive rejected its input. Length checks run
    /// first, so well-formed calls never see this.
    #[error("Key derivation failed")]
    KeyDerivationFailed,

    #[error("MAC verification failed")]
    InvalidMac,
}

impl SasError {
    /// Stable, machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotEnoughRandom { .. } => "NOT_ENOUGH_RANDOM",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::InvalidPublicKey { .. } => "INVALID_PUBLIC_KEY",
            Self::NonContributoryKey => "NON_CONTRIBUTORY_KEY",
            Self::OutputBufferTooSmall { .. } => "OUTPUT_BUFFER_TOO_SMALL",
            Self::OutputTooLong { .. } => "OUTPUT_TOO_LONG",
            Self::KeyDerivationFailed => "KEY_DERIVATION_FAILED",
            Self::InvalidMac => "BAD_MESSAGE_MAC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let all = [
            SasError::NotEnoughRandom {
                expected: 32,
                actual: 0,
            },
            SasError::InvalidState {
                operation: "create keypair",
                phase: "keyed",
            },
            SasError::InvalidPublicKey {
                expected: 32,
                actual: 0,
            },
            SasError::NonContributoryKey,
            SasError::OutputBufferTooSmall {
                expected: 32,
                actual: 0,
            },
            SasError::OutputTooLong {
                max: 8160,
                requested: 8161,
            },
            SasError::KeyDerivationFailed,
            SasError::InvalidMac,
        ];
        let mut codes: Vec<&str> = all.iter().map(SasError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        assert_eq!(SasError::KeyDerivationFailed.code(), "KEY_DERIVATION_FAILED");
    }

    #[test]
    fn display_includes_lengths() {
        let err = SasError::OutputBufferTooSmall {
            expected: 32,
            actual: 31,
        };
        assert_eq!(
            err.to_string(),
            "Output buffer too small: expected at least 32, got 31"
        );
        assert_eq!(err.code(), "OUTPUT_BUFFER_TOO_SMALL");
    }

    #[test]
    fn invalid_state_names_operation_and_phase() {
        let err = SasError::InvalidState {
            operation: "generate bytes",
            phase: "keyed",
        };
        assert_eq!(
            err.to_string(),
            "Cannot generate bytes while the SAS context is keyed"
        );
    }
}
