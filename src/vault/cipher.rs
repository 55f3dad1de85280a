use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

const KEY_SALT: &[u8] = b"linkedin-token-salt";
const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;
const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("cannot encrypt an empty token")]
    EmptyPlaintext,

    #[error("failed to derive encryption key")]
    Key,

    #[error("random nonce generation failed")]
    Random,

    #[error("sealing failed")]
    Seal,
}

#[derive(Debug, thiserror::Error)]
pub enum DecryptionError {
    #[error("ciphertext is not valid base64")]
    Encoding(#[from] base64::DecodeError),

    #[error("ciphertext is too short")]
    Truncated,

    #[error("authentication tag does not match")]
    Tampered,

    #[error("decrypted token is not valid UTF-8")]
    Utf8,
}

/// AES-256-GCM encryption of tokens at rest.
///
/// The key is derived once with PBKDF2-HMAC-SHA256 from the master secret.
/// Output is `base64(nonce || tag || ciphertext)`.
pub struct TokenCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl TokenCipher {
    pub fn new(master_secret: &str) -> Result<Self, EncryptionError> {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            PBKDF2_ITERATIONS,
            KEY_SALT,
            master_secret.as_bytes(),
            &mut key,
        );
        let unbound = UnboundKey::new(&AES_256_GCM, &key).map_err(|_| EncryptionError::Key)?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        if plaintext.is_empty() {
            return Err(EncryptionError::EmptyPlaintext);
        }

        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| EncryptionError::Random)?;

        let mut body = plaintext.as_bytes().to_vec();
        let tag = self
            .key
            .seal_in_place_separate_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut body)
            .map_err(|_| EncryptionError::Seal)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + TAG_LEN + body.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(tag.as_ref());
        blob.extend_from_slice(&body);
        Ok(BASE64.encode(blob))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptionError> {
        let blob = BASE64.decode(ciphertext.trim())?;
        if blob.len() <= NONCE_LEN + TAG_LEN {
            return Err(DecryptionError::Truncated);
        }

        let (nonce, rest) = blob.split_at(NONCE_LEN);
        let (tag, body) = rest.split_at(TAG_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| DecryptionError::Truncated)?;

        // ring expects the tag appended to the ciphertext.
        let mut in_out = Vec::with_capacity(body.len() + TAG_LEN);
        in_out.extend_from_slice(body);
        in_out.extend_from_slice(tag);

        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| DecryptionError::Tampered)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| DecryptionError::Utf8)
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypts_what_it_encrypts() {
        let cipher = TokenCipher::new("master-secret").unwrap();
        let blob = cipher.encrypt("AQV-access-token").unwrap();

        assert_ne!(blob, "AQV-access-token");
        assert_eq!(cipher.decrypt(&blob).unwrap(), "AQV-access-token");
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let cipher = TokenCipher::new("master-secret").unwrap();
        assert_ne!(cipher.encrypt("token").unwrap(), cipher.encrypt("token").unwrap());
    }

    #[test]
    fn rejects_empty_plaintext() {
        let cipher = TokenCipher::new("master-secret").unwrap();
        assert!(matches!(cipher.encrypt(""), Err(EncryptionError::EmptyPlaintext)));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let cipher = TokenCipher::new("master-secret").unwrap();
        let mut blob = BASE64.decode(cipher.encrypt("refresh-token").unwrap()).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;

        let result = cipher.decrypt(&BASE64.encode(&blob));
        assert!(matches!(result, Err(DecryptionError::Tampered)));
    }

    #[test]
    fn tampered_tag_fails_authentication() {
        let cipher = TokenCipher::new("master-secret").unwrap();
        let mut blob = BASE64.decode(cipher.encrypt("refresh-token").unwrap()).unwrap();
        blob[NONCE_LEN] ^= 0x80;

        let result = cipher.decrypt(&BASE64.encode(&blob));
        assert!(matches!(result, Err(DecryptionError::Tampered)));
    }

    #[test]
    fn other_master_secret_cannot_decrypt() {
        let blob = TokenCipher::new("one").unwrap().encrypt("token").unwrap();
        let result = TokenCipher::new("two").unwrap().decrypt(&blob);
        assert!(matches!(result, Err(DecryptionError::Tampered)));
    }

    #[test]
    fn malformed_input_is_rejected() {
        let cipher = TokenCipher::new("master-secret").unwrap();
        assert!(matches!(cipher.decrypt("not base64!"), Err(DecryptionError::Encoding(_))));
        assert!(matches!(
            cipher.decrypt(&BASE64.encode([0u8; 20])),
            Err(DecryptionError::Truncated)
        ));
    }
}
