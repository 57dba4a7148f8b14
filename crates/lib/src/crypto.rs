//! Symmetric encryption for stored OAuth tokens.
//!
//! Tokens are persisted as `{ivHex}:{cipherHex}` using AES-256-CBC with a
//! fresh random IV per encryption. The key is supplied once through process
//! configuration and injected into constructors; it is never read from
//! ambient state after startup.

use crate::errors::SyncError;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// CBC initialization vector size in bytes.
pub const IV_SIZE: usize = 16;

/// Encrypts and decrypts token strings with a process-wide key.
#[derive(Clone, Debug)]
pub struct TokenCipher {
    key: [u8; KEY_SIZE],
}

impl TokenCipher {
    /// Builds a cipher from a hex-encoded 32-byte key.
    ///
    /// An absent or malformed key is a configuration error, surfaced before
    /// any adapter is constructed.
    pub fn from_hex(key_hex: &str) -> Result<Self, SyncError> {
        let bytes = hex::decode(key_hex)
            .map_err(|e| SyncError::Config(format!("Encryption key is not valid hex: {e}")))?;
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            SyncError::Config("Encryption key must be 32 bytes (64 hex characters)".into())
        })?;
        Ok(Self { key })
    }

    /// Encrypts a plaintext token into the `{ivHex}:{cipherHex}` stored
    /// form.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        format!("{}:{}", hex::encode(iv), hex::encode(ciphertext))
    }

    /// Decrypts a stored `{ivHex}:{cipherHex}` value.
    ///
    /// Any malformed input maps to `SyncError::Decryption`, which is a
    /// distinct failure from a missing credential row.
    pub fn decrypt(&self, stored: &str) -> Result<String, SyncError> {
        let (iv_hex, cipher_hex) = stored.split_once(':').ok_or_else(|| {
            SyncError::Decryption("Stored value is not in iv:ciphertext form".into())
        })?;
        let iv_bytes = hex::decode(iv_hex)
            .map_err(|e| SyncError::Decryption(format!("Invalid IV hex: {e}")))?;
        let iv: [u8; IV_SIZE] = iv_bytes
            .try_into()
            .map_err(|_| SyncError::Decryption("IV must be 16 bytes".into()))?;
        let ciphertext = hex::decode(cipher_hex)
            .map_err(|e| SyncError::Decryption(format!("Invalid ciphertext hex: {e}")))?;
        let plaintext = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| {
                SyncError::Decryption("Ciphertext did not decrypt with the configured key".into())
            })?;
        String::from_utf8(plaintext)
            .map_err(|_| SyncError::Decryption("Decrypted token is not valid UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const OTHER_KEY_HEX: &str = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";

    #[test]
    fn encrypt_decrypt_round_trip() {
        let cipher = TokenCipher::from_hex(KEY_HEX).unwrap();
        for token in ["ya29.a0AfB_short", "", "token with spaces and ünïcode"] {
            let stored = cipher.encrypt(token);
            assert!(stored.contains(':'), "stored form must be iv:ciphertext");
            assert_eq!(cipher.decrypt(&stored).unwrap(), token);
        }
    }

    #[test]
    fn each_encryption_uses_a_fresh_iv() {
        let cipher = TokenCipher::from_hex(KEY_HEX).unwrap();
        let a = cipher.encrypt("same-token");
        let b = cipher.encrypt("same-token");
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_never_recovers_the_plaintext() {
        let cipher = TokenCipher::from_hex(KEY_HEX).unwrap();
        let other = TokenCipher::from_hex(OTHER_KEY_HEX).unwrap();
        let stored = cipher.encrypt("super-secret-token");
        // CBC with PKCS#7 either fails to unpad or yields garbage; it must
        // never yield the original token.
        match other.decrypt(&stored) {
            Ok(recovered) => assert_ne!(recovered, "super-secret-token"),
            Err(SyncError::Decryption(_)) => {}
            Err(e) => panic!("unexpected error variant: {e}"),
        }
    }

    #[test]
    fn malformed_stored_values_are_decryption_errors() {
        let cipher = TokenCipher::from_hex(KEY_HEX).unwrap();
        for bad in ["no-separator", "zz:zz", "abcd:1234", ":", "0011:"] {
            match cipher.decrypt(bad) {
                Err(SyncError::Decryption(_)) => {}
                other => panic!("expected Decryption error for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn invalid_keys_are_config_errors() {
        for bad in ["", "abcd", "not-hex-at-all", &KEY_HEX[..62]] {
            match TokenCipher::from_hex(bad) {
                Err(SyncError::Config(_)) => {}
                other => panic!("expected Config error for {bad:?}, got {other:?}"),
            }
        }
    }
}
