//! Operator key material.
//!
//! Secret keys arrive in one of three textual shapes. The shape is classified once at the
//! boundary into [`KeyEncoding`] and decoded into a [`Keypair`]; callers never sniff prefixes
//! themselves.
//!
//! | Shape | Example prefix | Payload |
//! |---|---|---|
//! | Bech32 | `suiprivkey1…` | scheme flag + 32-byte secret |
//! | Hex | `0x…` | 32-byte secret, or 64-byte secret‖public |
//! | Base64 | anything else | 32 bytes, 33 bytes (flag + secret), or 64 bytes |

use crate::types::Address;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bech32::{Bech32, Hrp};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Human-readable part of the self-describing private key encoding.
pub const SUI_PRIVATE_KEY_PREFIX: &str = "suiprivkey";

/// Size of an Ed25519 secret seed.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Intent prefix for signing transaction data: scope, version, app id.
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

type Blake2b256 = Blake2b<U32>;

pub(crate) fn blake2b256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Signature schemes a key payload may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    Ed25519,
    Secp256k1,
    Secp256r1,
}

impl SignatureScheme {
    pub fn flag(self) -> u8 {
        match self {
            Self::Ed25519 => 0x00,
            Self::Secp256k1 => 0x01,
            Self::Secp256r1 => 0x02,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0x00 => Some(Self::Ed25519),
            0x01 => Some(Self::Secp256k1),
            0x02 => Some(Self::Secp256r1),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::Secp256k1 => "secp256k1",
            Self::Secp256r1 => "secp256r1",
        }
    }
}

/// Key decoding failures. All of them are fatal and reported before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyDecodeError {
    #[error("private key is empty")]
    Empty,

    #[error("malformed {encoding} key: {reason}")]
    DecodeError {
        encoding: &'static str,
        reason: String,
    },

    #[error("invalid {encoding} key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        encoding: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("unsupported signature scheme '{0}', only ed25519 keys are accepted")]
    UnsupportedScheme(String),
}

impl KeyDecodeError {
    fn decode(encoding: &'static str, reason: impl fmt::Display) -> Self {
        Self::DecodeError {
            encoding,
            reason: reason.to_string(),
        }
    }
}

/// Classified textual key input.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyEncoding {
    Bech32(String),
    HexPrefixed(String),
    Base64Raw(String),
}

impl fmt::Debug for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyEncoding::{}(<redacted>)", self.name())
    }
}

impl KeyEncoding {
    /// Classify trimmed input by precedence: bech32 tag, then `0x` hex, then base64.
    pub fn classify(input: &str) -> Result<Self, KeyDecodeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(KeyDecodeError::Empty);
        }
        let owned = trimmed.to_string();
        if trimmed.starts_with(SUI_PRIVATE_KEY_PREFIX) {
            Ok(Self::Bech32(owned))
        } else if trimmed.starts_with("0x") {
            Ok(Self::HexPrefixed(owned))
        } else {
            Ok(Self::Base64Raw(owned))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bech32(_) => "bech32",
            Self::HexPrefixed(_) => "hex",
            Self::Base64Raw(_) => "base64",
        }
    }

    /// Decode into a signing keypair.
    pub fn decode(&self) -> Result<Keypair, KeyDecodeError> {
        let secret = match self {
            Self::Bech32(raw) => decode_bech32(raw)?,
            Self::HexPrefixed(raw) => decode_hex(raw)?,
            Self::Base64Raw(raw) => decode_base64(raw)?,
        };
        Ok(Keypair::from_secret_bytes(&secret))
    }
}

fn require_ed25519(flag: u8) -> Result<(), KeyDecodeError> {
    match SignatureScheme::from_flag(flag) {
        Some(SignatureScheme::Ed25519) => Ok(()),
        Some(other) => Err(KeyDecodeError::UnsupportedScheme(other.name().to_string())),
        None => Err(KeyDecodeError::UnsupportedScheme(format!("flag 0x{flag:02x}"))),
    }
}

fn to_seed(bytes: &[u8]) -> Zeroizing<[u8; SECRET_KEY_LENGTH]> {
    let mut seed = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
    seed.copy_from_slice(&bytes[..SECRET_KEY_LENGTH]);
    seed
}

fn decode_bech32(raw: &str) -> Result<Zeroizing<[u8; SECRET_KEY_LENGTH]>, KeyDecodeError> {
    const ENCODING: &str = "bech32";
    let (hrp, data) = bech32::decode(raw).map_err(|e| KeyDecodeError::decode(ENCODING, e))?;
    let data = Zeroizing::new(data);
    if hrp.as_str() != SUI_PRIVATE_KEY_PREFIX {
        return Err(KeyDecodeError::decode(
            ENCODING,
            format!("unexpected prefix '{}'", hrp.as_str()),
        ));
    }
    if data.len() != SECRET_KEY_LENGTH + 1 {
        return Err(KeyDecodeError::InvalidKeyLength {
            encoding: ENCODING,
            expected: "33",
            actual: data.len(),
        });
    }
    require_ed25519(data[0])?;
    Ok(to_seed(&data[1..]))
}

fn decode_hex(raw: &str) -> Result<Zeroizing<[u8; SECRET_KEY_LENGTH]>, KeyDecodeError> {
    const ENCODING: &str = "hex";
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = Zeroizing::new(hex::decode(digits).map_err(|e| KeyDecodeError::decode(ENCODING, e))?);
    match bytes.len() {
        SECRET_KEY_LENGTH | 64 => Ok(to_seed(&bytes)),
        actual => Err(KeyDecodeError::InvalidKeyLength {
            encoding: ENCODING,
            expected: "32 or 64",
            actual,
        }),
    }
}

fn decode_base64(raw: &str) -> Result<Zeroizing<[u8; SECRET_KEY_LENGTH]>, KeyDecodeError> {
    const ENCODING: &str = "base64";
    let bytes = Zeroizing::new(
        BASE64
            .decode(raw)
            .map_err(|e| KeyDecodeError::decode(ENCODING, e))?,
    );
    match bytes.len() {
        SECRET_KEY_LENGTH => Ok(to_seed(&bytes)),
        // Leading byte is the scheme flag.
        33 => {
            require_ed25519(bytes[0])?;
            Ok(to_seed(&bytes[1..]))
        }
        64 => Ok(to_seed(&bytes)),
        actual => Err(KeyDecodeError::InvalidKeyLength {
            encoding: ENCODING,
            expected: "32, 33 or 64",
            actual,
        }),
    }
}

/// Ed25519 signing identity of the operator.
pub struct Keypair {
    signing: SigningKey,
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl Keypair {
    /// Classify and decode textual key input.
    pub fn decode(input: &str) -> Result<Self, KeyDecodeError> {
        KeyEncoding::classify(input)?.decode()
    }

    pub fn from_secret_bytes(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing: SigningKey::from_bytes(secret),
        }
    }

    pub fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ed25519
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_LENGTH]> {
        Zeroizing::new(self.signing.to_bytes())
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Ledger address: BLAKE2b-256 over the scheme flag and public key.
    pub fn address(&self) -> Address {
        let flag = [self.scheme().flag()];
        Address::new(blake2b256(&[&flag, &self.public_key_bytes()]))
    }

    /// Sign BCS transaction bytes under the transaction intent.
    ///
    /// Returns the serialized `flag || signature || public key` form, base64 encoded.
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        let digest = intent_digest(tx_bytes);
        let signature = self.signing.sign(&digest);
        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(self.scheme().flag());
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(&self.public_key_bytes());
        BASE64.encode(serialized)
    }

    pub fn to_bech32(&self) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(SECRET_KEY_LENGTH + 1));
        payload.push(self.scheme().flag());
        payload.extend_from_slice(self.secret_bytes().as_ref());
        let hrp = Hrp::parse_unchecked(SUI_PRIVATE_KEY_PREFIX);
        // 33-byte payloads always fit within the bech32 length limit.
        bech32::encode::<Bech32>(hrp, &payload).unwrap_or_default()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.secret_bytes().as_ref()))
    }

    /// Base64 form; `with_flag` prepends the scheme flag (33-byte payload).
    pub fn to_base64(&self, with_flag: bool) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(SECRET_KEY_LENGTH + 1));
        if with_flag {
            payload.push(self.scheme().flag());
        }
        payload.extend_from_slice(self.secret_bytes().as_ref());
        BASE64.encode(payload.as_slice())
    }
}

/// BLAKE2b-256 digest of intent-prefixed transaction bytes.
pub fn intent_digest(tx_bytes: &[u8]) -> [u8; 32] {
    blake2b256(&[&TRANSACTION_INTENT, tx_bytes])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};
    use proptest::prelude::*;

    const SEED: [u8; 32] = [7u8; 32];

    #[test]
    fn classification_follows_precedence() {
        assert_eq!(
            KeyEncoding::classify("  suiprivkey1abc ").unwrap().name(),
            "bech32"
        );
        assert_eq!(KeyEncoding::classify("0xdead").unwrap().name(), "hex");
        assert_eq!(KeyEncoding::classify("AAAA").unwrap().name(), "base64");
        assert_eq!(KeyEncoding::classify("   "), Err(KeyDecodeError::Empty));
    }

    #[test]
    fn thirty_three_byte_base64_drops_flag() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&SEED);
        let key = Keypair::decode(&BASE64.encode(&payload)).unwrap();
        assert_eq!(*key.secret_bytes(), SEED);
    }

    #[test]
    fn thirty_three_byte_base64_with_foreign_flag_is_rejected() {
        let mut payload = vec![0x01];
        payload.extend_from_slice(&SEED);
        let err = Keypair::decode(&BASE64.encode(&payload)).unwrap_err();
        assert_eq!(err, KeyDecodeError::UnsupportedScheme("secp256k1".into()));
    }

    #[test]
    fn sixty_four_byte_keypair_forms_use_the_secret_half() {
        let mut legacy = SEED.to_vec();
        legacy.extend_from_slice(&[9u8; 32]);
        assert_eq!(*Keypair::decode(&BASE64.encode(&legacy)).unwrap().secret_bytes(), SEED);
        let hex_form = format!("0x{}", hex::encode(&legacy));
        assert_eq!(*Keypair::decode(&hex_form).unwrap().secret_bytes(), SEED);
    }

    #[test]
    fn bech32_rejects_non_ed25519_scheme() {
        let mut payload = vec![0x02];
        payload.extend_from_slice(&SEED);
        let encoded =
            bech32::encode::<Bech32>(Hrp::parse_unchecked(SUI_PRIVATE_KEY_PREFIX), &payload)
                .unwrap();
        assert_eq!(
            Keypair::decode(&encoded).unwrap_err(),
            KeyDecodeError::UnsupportedScheme("secp256r1".into())
        );
    }

    #[test]
    fn bech32_rejects_truncated_payload() {
        let encoded = bech32::encode::<Bech32>(
            Hrp::parse_unchecked(SUI_PRIVATE_KEY_PREFIX),
            &[0u8; 20],
        )
        .unwrap();
        assert!(matches!(
            Keypair::decode(&encoded).unwrap_err(),
            KeyDecodeError::InvalidKeyLength { actual: 20, .. }
        ));
    }

    #[test]
    fn bech32_rejects_corrupted_checksum() {
        let mut encoded = Keypair::from_secret_bytes(&SEED).to_bech32();
        let last = encoded.pop().unwrap();
        encoded.push(if last == 'q' { 'p' } else { 'q' });
        assert!(matches!(
            Keypair::decode(&encoded).unwrap_err(),
            KeyDecodeError::DecodeError { encoding: "bech32", .. }
        ));
    }

    #[test]
    fn malformed_inputs_report_decode_errors() {
        assert!(matches!(
            Keypair::decode("0xnothex").unwrap_err(),
            KeyDecodeError::DecodeError { encoding: "hex", .. }
        ));
        assert!(matches!(
            Keypair::decode("not base64 !!").unwrap_err(),
            KeyDecodeError::DecodeError { encoding: "base64", .. }
        ));
        assert!(matches!(
            Keypair::decode("0x0102").unwrap_err(),
            KeyDecodeError::InvalidKeyLength { actual: 2, .. }
        ));
    }

    #[test]
    fn transaction_signature_verifies_against_intent_digest() {
        let key = Keypair::from_secret_bytes(&SEED);
        let tx_bytes = b"transaction-bytes";
        let serialized = BASE64.decode(key.sign_transaction(tx_bytes)).unwrap();
        assert_eq!(serialized.len(), 97);
        assert_eq!(serialized[0], 0x00);
        assert_eq!(&serialized[65..], &key.public_key_bytes());

        let signature = Signature::from_slice(&serialized[1..65]).unwrap();
        key.signing
            .verifying_key()
            .verify(&intent_digest(tx_bytes), &signature)
            .unwrap();
    }

    #[test]
    fn address_is_stable_for_a_key() {
        let a = Keypair::from_secret_bytes(&SEED).address();
        let b = Keypair::from_secret_bytes(&SEED).address();
        let other = Keypair::from_secret_bytes(&[8u8; 32]).address();
        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[test]
    fn debug_output_never_contains_secret() {
        let key = Keypair::from_secret_bytes(&SEED);
        let rendered = format!("{:?} {:?}", key, KeyEncoding::HexPrefixed(key.to_hex()));
        assert!(!rendered.contains(&hex::encode(SEED)));
    }

    proptest! {
        #[test]
        fn every_shape_recovers_the_secret(seed in any::<[u8; 32]>()) {
            let key = Keypair::from_secret_bytes(&seed);
            for encoded in [
                key.to_bech32(),
                key.to_hex(),
                key.to_base64(false),
                key.to_base64(true),
            ] {
                let decoded = Keypair::decode(&encoded).unwrap();
                prop_assert_eq!(*decoded.secret_bytes(), seed);
                prop_assert_eq!(decoded.address(), key.address());
            }
        }
    }
}
