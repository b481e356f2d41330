//! AES-256-GCM codec for SMTP passwords at rest.
//!
//! Output is `base64(nonce || ciphertext)` so a stored value carries
//! everything needed to decrypt it. Changing the key makes every stored
//! password undecryptable; there is no rotation.

use crate::error::{MailError, MailResult};
use aes_gcm::{
    AeadCore, Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

const NONCE_LENGTH: usize = 12;
const KEY_LENGTH: usize = 32;
const HEX_KEY_LENGTH: usize = KEY_LENGTH * 2;

#[derive(Clone)]
pub struct SecretCodec {
    cipher: Aes256Gcm,
}

impl SecretCodec {
    /// Accepts a raw 32-byte key or a 64 character hex key, both AES-256.
    ///
    /// 16- and 24-byte keys (AES-128 and AES-192) are rejected. Passwords
    /// stored under such a key must be re-entered after switching to a
    /// 32-byte one.
    pub fn new(key: &str) -> MailResult<Self> {
        let key_bytes = match key.len() {
            KEY_LENGTH => key.as_bytes().to_vec(),
            HEX_KEY_LENGTH => hex::decode(key)
                .map_err(|e| MailError::Encryption(format!("invalid hex key: {e}")))?,
            len => {
                return Err(MailError::Encryption(format!(
                    "key must be {KEY_LENGTH} raw bytes or {HEX_KEY_LENGTH} hex characters \
                     for AES-256, got {len} bytes"
                )));
            }
        };

        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> MailResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut aes_gcm::aead::OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| MailError::Encryption(e.to_string()))?;

        let mut combined = nonce.to_vec();
        combined.extend(ciphertext);
        Ok(BASE64.encode(combined))
    }

    pub fn decrypt(&self, encoded: &str) -> MailResult<String> {
        let data = BASE64
            .decode(encoded)
            .map_err(|e| MailError::Decryption(format!("invalid base64: {e}")))?;

        if data.len() < NONCE_LENGTH {
            return Err(MailError::Decryption("ciphertext too short".to_string()));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| MailError::Decryption("authentication failed".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| MailError::Decryption(e.to_string()))
    }
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCodec(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_KEY: &str = "0123456789abcdef0123456789abcdef";
    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_encrypt_decrypt() {
        for key in [RAW_KEY, HEX_KEY] {
            let codec = SecretCodec::new(key).unwrap();
            let encrypted = codec.encrypt("smtp-password").unwrap();
            assert_ne!(encrypted, "smtp-password");
            assert_eq!(codec.decrypt(&encrypted).unwrap(), "smtp-password");
        }
    }

    #[test]
    fn test_short_keys_are_rejected() {
        for key in ["0123456789abcdef", "0123456789abcdef01234567", ""] {
            let err = SecretCodec::new(key).err().unwrap();
            assert!(matches!(err, MailError::Encryption(_)));
            let message = err.to_string();
            assert!(message.contains("32 raw bytes or 64 hex characters"), "{message}");
            assert!(message.contains(&format!("got {} bytes", key.len())), "{message}");
        }

        let bad_hex = "zz".repeat(32);
        assert!(matches!(
            SecretCodec::new(&bad_hex),
            Err(MailError::Encryption(msg)) if msg.starts_with("invalid hex key")
        ));
    }

    #[test]
    fn test_nonce_is_random() {
        let codec = SecretCodec::new(RAW_KEY).unwrap();
        assert_ne!(codec.encrypt("same").unwrap(), codec.encrypt("same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = SecretCodec::new(RAW_KEY).unwrap().encrypt("secret").unwrap();
        let other = SecretCodec::new(HEX_KEY).unwrap();
        assert!(matches!(other.decrypt(&encrypted), Err(MailError::Decryption(_))));
    }

    #[test]
    fn test_malformed_ciphertext() {
        let codec = SecretCodec::new(RAW_KEY).unwrap();
        assert!(matches!(codec.decrypt("not base64!"), Err(MailError::Decryption(_))));
        assert!(matches!(codec.decrypt("AAAA"), Err(MailError::Decryption(_))));

        let mut tampered = BASE64.decode(codec.encrypt("secret").unwrap()).unwrap();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;
        assert!(matches!(
            codec.decrypt(&BASE64.encode(tampered)),
            Err(MailError::Decryption(_))
        ));
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(SecretCodec::new("short").is_err());
        assert!(SecretCodec::new(&"z".repeat(64)).is_err());
    }
}
