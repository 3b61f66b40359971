//! Secret decryption
//!
//! Encrypted values travel as `hex(ciphertext)--hex(iv)--hex(tag)` and are
//! decrypted with AES-256-GCM using a 64-hex-digit key held in another
//! config.

use crate::error::{EvalError, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

const SEPARATOR: &str = "--";
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Decrypts secret payloads. Swap in a different implementation to route
/// decryption through a host-side key service.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, payload: &str, hex_key: &str) -> Result<String>;
}

/// Default AES-256-GCM decryptor
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmDecryptor;

impl Decryptor for AesGcmDecryptor {
    fn decrypt(&self, payload: &str, hex_key: &str) -> Result<String> {
        decrypt(payload, hex_key)
    }
}

fn cipher(hex_key: &str) -> Result<Aes256Gcm> {
    let key = hex::decode(hex_key).map_err(|e| EvalError::Decryption(format!("invalid key: {}", e)))?;
    if key.len() != KEY_LEN {
        return Err(EvalError::Decryption(format!(
            "key must be {} bytes, got {}",
            KEY_LEN,
            key.len()
        )));
    }

    Aes256Gcm::new_from_slice(&key).map_err(|e| EvalError::Decryption(e.to_string()))
}

fn decode_part(part: &str, name: &str) -> Result<Vec<u8>> {
    hex::decode(part).map_err(|e| EvalError::Decryption(format!("invalid {}: {}", name, e)))
}

/// Decrypt a `ciphertext--iv--tag` payload.
pub fn decrypt(payload: &str, hex_key: &str) -> Result<String> {
    let parts: Vec<&str> = payload.split(SEPARATOR).collect();
    let &[data, iv, tag] = parts.as_slice() else {
        return Err(EvalError::Decryption(format!(
            "expected ciphertext{sep}iv{sep}tag",
            sep = SEPARATOR
        )));
    };

    if data.is_empty() {
        return Ok(String::new());
    }

    let cipher = cipher(hex_key)?;
    let iv = decode_part(iv, "iv")?;
    if iv.len() != IV_LEN {
        return Err(EvalError::Decryption(format!(
            "iv must be {} bytes, got {}",
            IV_LEN,
            iv.len()
        )));
    }

    let mut sealed = decode_part(data, "ciphertext")?;
    sealed.extend(decode_part(tag, "tag")?);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
        .map_err(|_| EvalError::Decryption("authentication failed".to_string()))?;

    String::from_utf8(plaintext).map_err(|e| EvalError::Decryption(e.to_string()))
}

/// Encrypt `plaintext` under a fresh random iv, producing the payload
/// format [`decrypt`] reads.
pub fn encrypt(plaintext: &str, hex_key: &str) -> Result<String> {
    let cipher = cipher(hex_key)?;

    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|e| EvalError::Decryption(e.to_string()))?;
    let (data, tag) = sealed.split_at(sealed.len() - TAG_LEN);

    Ok([hex::encode(data), hex::encode(iv), hex::encode(tag)].join(SEPARATOR))
}

/// A random 256-bit key, hex encoded
pub fn generate_new_hex_key() -> String {
    let mut key = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    hex::encode(key)
}
