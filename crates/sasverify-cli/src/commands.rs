//! Command implementations.
//!
//! Each party is reconstructed from its creation randomness, so the same
//! `--random` value must be used for every command of one verification.
//! Commands return the text to print; `main` does the printing.

use std::fmt::Write;

use anyhow::{Context, Result, bail};
use clap::Args;
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use sasverify_core::{Config, DisplayMethod};
use sasverify_crypto::{
    EstablishedSas, MAC_LENGTH, PUBLIC_KEY_LENGTH, RANDOM_LENGTH, Sas, SasMethod, compare_sas,
};

/// Our creation randomness and the peer's public key.
#[derive(Debug, Args)]
pub struct PartyArgs {
    /// 32 bytes of creation randomness, hex-encoded
    #[arg(long, env = "SASVERIFY_RANDOM", hide_env_values = true)]
    pub random: String,

    /// Peer's public key, hex-encoded
    #[arg(long)]
    pub their_key: String,
}

/// Map the configured display method to the renderer's.
pub const fn sas_method(method: DisplayMethod) -> SasMethod {
    match method {
        DisplayMethod::Emoji => SasMethod::Emoji,
        DisplayMethod::Decimal => SasMethod::Decimal,
    }
}

/// Build the default info label for `purpose`.
///
/// Public keys are ordered so both parties build the same label.
pub fn default_info(
    prefix: &str,
    purpose: &str,
    our_key: &[u8; PUBLIC_KEY_LENGTH],
    their_key: &[u8; PUBLIC_KEY_LENGTH],
) -> String {
    let (first, second) = if our_key <= their_key {
        (our_key, their_key)
    } else {
        (their_key, our_key)
    };
    format!(
        "{prefix}_{purpose}|{}|{}",
        hex::encode(first),
        hex::encode(second)
    )
}

fn keypair(random_hex: &str) -> Result<Sas> {
    let random =
        Zeroizing::new(hex::decode(random_hex.trim()).context("--random is not valid hex")?);
    if random.len() != RANDOM_LENGTH {
        bail!(
            "--random must be exactly {RANDOM_LENGTH} bytes, got {}",
            random.len()
        );
    }
    Ok(Sas::from_random(&random)?)
}

fn establish(party: &PartyArgs) -> Result<EstablishedSas> {
    let sas = keypair(&party.random)?;
    let their_key = hex::decode(party.their_key.trim()).context("--their-key is not valid hex")?;
    sas.diffie_hellman(&their_key)
        .map_err(|e| anyhow::Error::new(e.error()))
        .context("peer public key rejected")
}

fn info_or_default(
    established: &EstablishedSas,
    config: &Config,
    purpose: &str,
    info: Option<&str>,
) -> String {
    info.map_or_else(
        || {
            default_info(
                &config.protocol.info_prefix,
                purpose,
                established.our_public_key().as_bytes(),
                established.their_public_key().as_bytes(),
            )
        },
        ToString::to_string,
    )
}

/// Print our public key for the given randomness.
pub fn pubkey(random_hex: &str) -> Result<String> {
    Ok(hex::encode(keypair(random_hex)?.public_bytes()))
}

/// Compute the short authentication string to compare with the peer.
pub fn sas(party: &PartyArgs, info: Option<&str>, config: &Config) -> Result<String> {
    let established = establish(party)?;
    let info = info_or_default(&established, config, "SAS", info);
    tracing::debug!(%info, "generating SAS bytes");
    let short = established.short_auth_string(info.as_bytes())?;
    Ok(short.render(sas_method(config.display.method), config.display.emoji_names))
}

/// Compute a MAC over `input`.
pub fn mac(party: &PartyArgs, info: Option<&str>, input: &str, config: &Config) -> Result<String> {
    let established = establish(party)?;
    let info = info_or_default(&established, config, "MAC", info);
    let tag = established.mac(input.as_bytes(), info.as_bytes())?;
    Ok(hex::encode(tag))
}

/// Check a MAC received from the peer.
pub fn verify_mac(
    party: &PartyArgs,
    info: Option<&str>,
    input: &str,
    tag_hex: &str,
    config: &Config,
) -> Result<()> {
    let established = establish(party)?;
    let info = info_or_default(&established, config, "MAC", info);
    let tag = hex::decode(tag_hex.trim()).context("--tag is not valid hex")?;
    if tag.len() != MAC_LENGTH {
        bail!("--tag must be {MAC_LENGTH} bytes, got {}", tag.len());
    }
    established.verify_mac(input.as_bytes(), info.as_bytes(), &tag)?;
    Ok(())
}

/// Run both parties in-process with fresh OS randomness.
pub fn demo(config: &Config) -> Result<String> {
    let mut random = Zeroizing::new([0u8; RANDOM_LENGTH]);
    OsRng.fill_bytes(random.as_mut_slice());
    let alice = Sas::from_random(random.as_slice())?;
    OsRng.fill_bytes(random.as_mut_slice());
    let bob = Sas::from_random(random.as_slice())?;

    let alice_pub = alice.public_bytes();
    let bob_pub = bob.public_bytes();
    tracing::info!(
        alice = %hex::encode(alice_pub),
        bob = %hex::encode(bob_pub),
        "exchanged public keys"
    );

    let alice = alice
        .diffie_hellman(&bob_pub)
        .map_err(|e| anyhow::Error::new(e.error()))?;
    let bob = bob
        .diffie_hellman(&alice_pub)
        .map_err(|e| anyhow::Error::new(e.error()))?;

    let prefix = &config.protocol.info_prefix;
    let sas_info = default_info(prefix, "SAS", &alice_pub, &bob_pub);
    let mac_info = default_info(prefix, "MAC", &alice_pub, &bob_pub);

    let alice_sas = alice.short_auth_string(sas_info.as_bytes())?;
    let bob_sas = bob.short_auth_string(sas_info.as_bytes())?;
    let (mut output, _) = compare_sas(
        &alice_sas,
        "Alice",
        &bob_sas,
        "Bob",
        sas_method(config.display.method),
    );

    let device = format!("deviceid:{}", &hex::encode(alice_pub)[..12]);
    let tag = alice.mac(device.as_bytes(), mac_info.as_bytes())?;
    let verified = bob
        .verify_mac(device.as_bytes(), mac_info.as_bytes(), &tag)
        .is_ok();
    let _ = write!(
        output,
        "\nMAC over {device}: {} ({})",
        hex::encode(tag),
        if verified { "verified" } else { "FAILED" }
    );
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const R1: &str = "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a";
    const R2: &str = "5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb";
    const PUB1: &str = "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a";
    const PUB2: &str = "de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f";

    fn party(random: &str, their_key: &str) -> PartyArgs {
        PartyArgs {
            random: random.to_string(),
            their_key: their_key.to_string(),
        }
    }

    fn decimal_config() -> Config {
        let mut config = Config::default();
        config.display.method = DisplayMethod::Decimal;
        config
    }

    #[test]
    fn pubkey_prints_hex() {
        assert_eq!(pubkey(R1).unwrap(), PUB1);
    }

    #[test]
    fn pubkey_rejects_wrong_length() {
        let err = pubkey("abcd").unwrap_err();
        assert!(err.to_string().contains("exactly 32 bytes"));
    }

    #[test]
    fn pubkey_rejects_bad_hex() {
        assert!(pubkey("zz").is_err());
    }

    #[test]
    fn default_info_is_order_independent() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(
            default_info("P", "SAS", &a, &b),
            default_info("P", "SAS", &b, &a)
        );
        assert!(default_info("P", "SAS", &a, &b).starts_with("P_SAS|0101"));
    }

    #[test]
    fn both_parties_print_same_sas() {
        let config = decimal_config();
        let alice = sas(&party(R1, PUB2), None, &config).unwrap();
        let bob = sas(&party(R2, PUB1), None, &config).unwrap();
        assert_eq!(alice, bob);
        assert_eq!(alice.split(' ').count(), 3);
    }

    #[test]
    fn explicit_info_changes_sas() {
        let config = decimal_config();
        let default = sas(&party(R1, PUB2), None, &config).unwrap();
        let custom = sas(&party(R1, PUB2), Some("custom"), &config).unwrap();
        assert_ne!(default, custom);
    }

    #[test]
    fn mac_verifies_on_other_side() {
        let config = Config::default();
        let tag = mac(&party(R1, PUB2), None, "deviceid:ABCDEF", &config).unwrap();
        verify_mac(&party(R2, PUB1), None, "deviceid:ABCDEF", &tag, &config).unwrap();
        assert!(verify_mac(&party(R2, PUB1), None, "deviceid:XYZ", &tag, &config).is_err());
    }

    #[test]
    fn low_order_peer_key_is_rejected() {
        let config = Config::default();
        let err = sas(&party(R1, &"00".repeat(32)), None, &config).unwrap_err();
        assert!(format!("{err:#}").contains("low-order"));
    }

    #[test]
    fn demo_reports_match() {
        let output = demo(&Config::default()).unwrap();
        assert!(output.contains("SAS MATCH"));
        assert!(output.contains("verified"));
    }
}
