//! # Encryption Envelope
//!
//! The end-to-end encryption format of the v1 bridge protocol. Each payload
//! travels as three lowercase-hex fields:
//!
//! ```text
//! { "data": <AES-256-CBC ciphertext>,
//!   "hmac": <HMAC-SHA256(ciphertext || iv)>,
//!   "iv":   <16 random bytes> }
//! ```
//!
//! Sealing draws a fresh IV from the OS CSPRNG for every message and pads
//! with PKCS#7. The MAC is keyed with the full 32-byte session key and
//! covers `ciphertext || iv`, so a flipped bit anywhere in either field
//! fails verification before any decryption is attempted. Verification is
//! constant-time via `Mac::verify_slice`.
//!
//! The full session key doubles as the AES-256 key — the key schedule used
//! by canonical v1 peers. Ecosystem forks that split the key in half do not
//! interoperate; this module is the single place where that choice lives.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::{ENVELOPE_IV_LENGTH, SESSION_KEY_LENGTH};
use crate::error::{BridgeError, BridgeResult};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// AES block size; ciphertext length is always a multiple of this.
const AES_BLOCK: usize = 16;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The sealed `{data, hmac, iv}` triple, hex-encoded for the wire.
///
/// Produced per outbound message, consumed and discarded per inbound one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Hex ciphertext.
    pub data: String,
    /// Hex HMAC-SHA256 over `ciphertext || iv`.
    pub hmac: String,
    /// Hex 16-byte initialization vector.
    pub iv: String,
}

// ---------------------------------------------------------------------------
// Seal / Open
// ---------------------------------------------------------------------------

/// Encrypt and authenticate a plaintext under the session key.
pub fn encrypt(plaintext: &[u8], key: &[u8; SESSION_KEY_LENGTH]) -> Envelope {
    let mut iv = [0u8; ENVELOPE_IV_LENGTH];
    OsRng.fill_bytes(&mut iv);

    let ciphertext =
        Aes256CbcEnc::new(key.into(), (&iv).into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let tag = authenticate(key, &ciphertext, &iv);

    Envelope {
        data: hex::encode(ciphertext),
        hmac: hex::encode(tag),
        iv: hex::encode(iv),
    }
}

/// Verify and decrypt an inbound envelope.
///
/// # Errors
///
/// [`BridgeError::HmacMismatch`] when the tag does not verify — tampering or
/// a foreign key. [`BridgeError::DecryptionFailed`] when the hex fields are
/// malformed or CBC/PKCS#7 decryption fails after a valid tag.
pub fn decrypt(envelope: &Envelope, key: &[u8; SESSION_KEY_LENGTH]) -> BridgeResult<Vec<u8>> {
    let ciphertext =
        hex::decode(&envelope.data).map_err(|_| BridgeError::DecryptionFailed)?;
    let iv_bytes = hex::decode(&envelope.iv).map_err(|_| BridgeError::DecryptionFailed)?;
    let iv: [u8; ENVELOPE_IV_LENGTH] = iv_bytes
        .try_into()
        .map_err(|_| BridgeError::DecryptionFailed)?;
    let expected_tag =
        hex::decode(&envelope.hmac).map_err(|_| BridgeError::DecryptionFailed)?;

    // MAC first. Nothing is decrypted unless the tag verifies.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&ciphertext);
    mac.update(&iv);
    mac.verify_slice(&expected_tag)
        .map_err(|_| BridgeError::HmacMismatch)?;

    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK != 0 {
        return Err(BridgeError::DecryptionFailed);
    }

    Aes256CbcDec::new(key.into(), (&iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| BridgeError::DecryptionFailed)
}

fn authenticate(
    key: &[u8; SESSION_KEY_LENGTH],
    ciphertext: &[u8],
    iv: &[u8; ENVELOPE_IV_LENGTH],
) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(ciphertext);
    mac.update(iv);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    /// Flips one bit of one encoded byte while keeping the field valid hex.
    fn flip_hex_byte(field: &mut String, byte_index: usize) {
        let mut bytes = hex::decode(&*field).unwrap();
        bytes[byte_index] ^= 0x01;
        *field = hex::encode(bytes);
    }

    #[test]
    fn roundtrip() {
        let key = test_key();
        let plaintext = br#"{"id":1,"jsonrpc":"2.0","method":"wc_sessionRequest"}"#;

        let envelope = encrypt(plaintext, &key);
        let recovered = decrypt(&envelope, &key).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let key = test_key();
        let envelope = encrypt(b"", &key);
        // PKCS#7 pads the empty message up to one full block.
        assert_eq!(envelope.data.len(), AES_BLOCK * 2);
        assert!(decrypt(&envelope, &key).unwrap().is_empty());
    }

    #[test]
    fn ivs_are_unique_per_message() {
        let key = test_key();
        let a = encrypt(b"same message", &key);
        let b = encrypt(b"same message", &key);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn tampered_data_fails_with_hmac_mismatch() {
        let key = test_key();
        let plaintext = b"attack at dawn";

        let baseline = encrypt(plaintext, &key);
        let ciphertext_len = baseline.data.len() / 2;

        for byte_index in 0..ciphertext_len {
            let mut tampered = encrypt(plaintext, &key);
            flip_hex_byte(&mut tampered.data, byte_index);
            assert!(
                matches!(decrypt(&tampered, &key), Err(BridgeError::HmacMismatch)),
                "flip at ciphertext byte {byte_index} must fail verification"
            );
        }
    }

    #[test]
    fn tampered_iv_fails_with_hmac_mismatch() {
        let key = test_key();

        for byte_index in 0..ENVELOPE_IV_LENGTH {
            let mut tampered = encrypt(b"attack at dawn", &key);
            flip_hex_byte(&mut tampered.iv, byte_index);
            assert!(
                matches!(decrypt(&tampered, &key), Err(BridgeError::HmacMismatch)),
                "flip at iv byte {byte_index} must fail verification"
            );
        }
    }

    #[test]
    fn tampered_tag_fails_with_hmac_mismatch() {
        let key = test_key();
        let mut tampered = encrypt(b"payload", &key);
        flip_hex_byte(&mut tampered.hmac, 31);
        assert!(matches!(
            decrypt(&tampered, &key),
            Err(BridgeError::HmacMismatch)
        ));
    }

    #[test]
    fn foreign_key_fails_verification() {
        let key = test_key();
        let mut other = test_key();
        other[0] ^= 0xff;

        let envelope = encrypt(b"secret", &key);
        assert!(matches!(
            decrypt(&envelope, &other),
            Err(BridgeError::HmacMismatch)
        ));
    }

    #[test]
    fn malformed_hex_is_a_decryption_failure() {
        let key = test_key();
        let mut envelope = encrypt(b"payload", &key);
        envelope.data = "not hex at all".into();
        assert!(matches!(
            decrypt(&envelope, &key),
            Err(BridgeError::DecryptionFailed)
        ));
    }

    #[test]
    fn wire_field_names_are_stable() {
        let key = test_key();
        let json = serde_json::to_value(encrypt(b"x", &key)).unwrap();
        assert!(json.get("data").is_some());
        assert!(json.get("hmac").is_some());
        assert!(json.get("iv").is_some());
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn decode_accepts_uppercase_hex() {
        let key = test_key();
        let mut envelope = encrypt(b"case-insensitive", &key);
        envelope.data = envelope.data.to_uppercase();
        envelope.iv = envelope.iv.to_uppercase();
        envelope.hmac = envelope.hmac.to_uppercase();
        assert_eq!(decrypt(&envelope, &key).unwrap(), b"case-insensitive");
    }
}
