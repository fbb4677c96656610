//! Password encryption for the stored Steam credentials.
//!
//! Payloads are AES-256-CBC encrypted with a random IV and authenticated with an
//! HMAC-SHA256 over the base64 IV and ciphertext. The key lives in its own file in the
//! user's config directory, never in `magma.json`. Anyone able to read both files can
//! still recover the password.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use directories::ProjectDirs;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::CryptoError;
use crate::mods::Credentials;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const KEY_FILE_ENV: &str = "MAGMA_KEY_FILE";

#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD.decode(text.trim()).map_err(|_| CryptoError::InvalidKey)?;
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    iv: String,
    value: String,
    mac: String,
}

pub struct Encrypter {
    key: SecretKey,
}

impl Encrypter {
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let encrypted = Aes256CbcEnc::new_from_slices(&self.key.0, &iv)
            .map_err(|_| CryptoError::InvalidKey)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let iv = STANDARD.encode(iv);
        let value = STANDARD.encode(encrypted);
        let mac = hex::encode(self.mac(&iv, &value)?.finalize().into_bytes());

        let json = serde_json::to_vec(&Envelope { iv, value, mac }).map_err(|_| CryptoError::InvalidPayload)?;
        Ok(STANDARD.encode(json))
    }

    pub fn decrypt(&self, payload: &str) -> Result<String, CryptoError> {
        let json = STANDARD.decode(payload.trim()).map_err(|_| CryptoError::InvalidPayload)?;
        let envelope: Envelope = serde_json::from_slice(&json).map_err(|_| CryptoError::InvalidPayload)?;

        let iv = STANDARD.decode(&envelope.iv).map_err(|_| CryptoError::InvalidPayload)?;
        if iv.len() != IV_LEN {
            return Err(CryptoError::InvalidPayload);
        }
        let expected = hex::decode(&envelope.mac).map_err(|_| CryptoError::InvalidMac)?;
        self.mac(&envelope.iv, &envelope.value)?
            .verify_slice(&expected)
            .map_err(|_| CryptoError::InvalidMac)?;

        let encrypted = STANDARD.decode(&envelope.value).map_err(|_| CryptoError::InvalidPayload)?;
        let plain = Aes256CbcDec::new_from_slices(&self.key.0, &iv)
            .map_err(|_| CryptoError::InvalidKey)?
            .decrypt_padded_vec_mut::<Pkcs7>(&encrypted)
            .map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(plain).map_err(|_| CryptoError::Decrypt)
    }

    fn mac(&self, iv: &str, value: &str) -> Result<HmacSha256, CryptoError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key.0).map_err(|_| CryptoError::InvalidKey)?;
        mac.update(iv.as_bytes());
        mac.update(value.as_bytes());
        Ok(mac)
    }
}

#[derive(Deserialize)]
struct LegacyBuffer {
    data: Vec<u8>,
}

#[derive(Deserialize)]
struct LegacyEnvelope {
    iv: LegacyBuffer,
    encrypted: LegacyBuffer,
}

/// Reads a password written by version 3 configs, where the key sat next to the payload
/// and the buffers were serialized as byte arrays. The old MAC is not checked.
pub fn decrypt_legacy(key_base64: &str, payload: &str) -> Result<String, CryptoError> {
    let key = SecretKey::from_base64(key_base64)?;
    let json = STANDARD.decode(payload.trim()).map_err(|_| CryptoError::InvalidPayload)?;
    let envelope: LegacyEnvelope = serde_json::from_slice(&json).map_err(|_| CryptoError::InvalidPayload)?;
    if envelope.iv.data.len() != IV_LEN {
        return Err(CryptoError::InvalidPayload);
    }

    let plain = Aes256CbcDec::new_from_slices(&key.0, &envelope.iv.data)
        .map_err(|_| CryptoError::InvalidKey)?
        .decrypt_padded_vec_mut::<Pkcs7>(&envelope.encrypted.data)
        .map_err(|_| CryptoError::Decrypt)?;
    // values were JSON encoded before encryption
    match serde_json::from_slice::<String>(&plain) {
        Ok(text) => Ok(text),
        Err(_) => String::from_utf8(plain).map_err(|_| CryptoError::Decrypt),
    }
}

/// File holding the base64 encryption key.
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    /// `$MAGMA_KEY_FILE`, or `magma.key` in the user's config directory.
    pub fn default_location() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var(KEY_FILE_ENV) {
            if !path.is_empty() {
                return Ok(Self::at(PathBuf::from(path)));
            }
        }
        let dirs = ProjectDirs::from("com", "magma", "magma")
            .ok_or_else(|| anyhow::anyhow!("project dirs"))?;
        Ok(Self::at(dirs.config_dir().join("magma.key")))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<SecretKey, CryptoError> {
        if !self.path.exists() {
            return Err(CryptoError::MissingKey(self.path.clone()));
        }
        let text = fs::read_to_string(&self.path).map_err(|source| CryptoError::Io { path: self.path.clone(), source })?;
        SecretKey::from_base64(&text)
    }

    pub fn store(&self, key: &SecretKey) -> Result<(), CryptoError> {
        let io = |source| CryptoError::Io { path: self.path.clone(), source };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        fs::write(&self.path, key.to_base64()).map_err(io)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(io)?;
        }
        debug!("stored encryption key at {}", self.path.display());
        Ok(())
    }

    /// Encrypts the password under a freshly generated key and stores that key.
    pub fn seal(&self, username: &str, password: &str) -> Result<Credentials, CryptoError> {
        let key = SecretKey::generate();
        let password = Encrypter::new(key.clone()).encrypt(password)?;
        self.store(&key)?;
        Ok(Credentials { username: username.to_string(), password })
    }

    /// Returns the plain-text password for the stored credentials.
    pub fn open(&self, credentials: &Credentials) -> Result<String, CryptoError> {
        Encrypter::new(self.load()?).decrypt(&credentials.password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn decrypts_what_it_encrypts() {
        let enc = Encrypter::new(SecretKey::generate());
        let payload = enc.encrypt("hunter2").unwrap();
        assert_ne!(payload, "hunter2");
        assert_eq!(enc.decrypt(&payload).unwrap(), "hunter2");
    }

    #[test]
    fn same_plaintext_gets_distinct_payloads() {
        let enc = Encrypter::new(SecretKey::generate());
        assert_ne!(enc.encrypt("pw").unwrap(), enc.encrypt("pw").unwrap());
    }

    #[test]
    fn tampered_payload_fails_mac_check() {
        let enc = Encrypter::new(SecretKey::generate());
        let payload = enc.encrypt("secret").unwrap();
        let json = STANDARD.decode(&payload).unwrap();
        let mut envelope: Envelope = serde_json::from_slice(&json).unwrap();
        envelope.value = STANDARD.encode(b"0123456789abcdef");
        let forged = STANDARD.encode(serde_json::to_vec(&envelope).unwrap());
        assert!(matches!(enc.decrypt(&forged), Err(CryptoError::InvalidMac)));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let payload = Encrypter::new(SecretKey::generate()).encrypt("secret").unwrap();
        let other = Encrypter::new(SecretKey::generate());
        assert!(matches!(other.decrypt(&payload), Err(CryptoError::InvalidMac)));
    }

    #[test]
    fn garbage_is_an_invalid_payload() {
        let enc = Encrypter::new(SecretKey::generate());
        assert!(matches!(enc.decrypt("not base64!"), Err(CryptoError::InvalidPayload)));
    }

    #[test]
    fn short_keys_are_invalid() {
        assert!(matches!(SecretKey::from_base64("AAAA"), Err(CryptoError::InvalidKey)));
    }

    #[test]
    fn reads_version_three_payloads() {
        let key = SecretKey::generate();
        let iv = [7u8; IV_LEN];
        let encrypted = Aes256CbcEnc::new_from_slices(&key.0, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(br#""old-pass""#);
        let json = serde_json::json!({
            "iv": { "type": "Buffer", "data": iv.to_vec() },
            "encrypted": { "type": "Buffer", "data": encrypted },
            "mac": "ignored",
        });
        let payload = STANDARD.encode(json.to_string());
        assert_eq!(decrypt_legacy(&key.to_base64(), &payload).unwrap(), "old-pass");
        assert!(decrypt_legacy("short", &payload).is_err());
    }

    #[test]
    fn key_store_seals_and_opens_credentials() {
        let dir = TempDir::new().unwrap();
        let store = KeyStore::at(dir.path().join("nested").join("magma.key"));
        assert!(matches!(store.load(), Err(CryptoError::MissingKey(_))));

        let creds = store.seal("arma", "pa55").unwrap();
        assert_eq!(creds.username, "arma");
        assert_ne!(creds.password, "pa55");
        assert_eq!(store.open(&creds).unwrap(), "pa55");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
