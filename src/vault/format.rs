//! On-disk vault file format and its validation rules.
//!
//! A vault is a single pretty-printed JSON document:
//!
//! ```text
//! {
//!   "magic": "ENCRYPTOOR",
//!   "schemaVersion": 1,
//!   "appVersion": "0.1.0",
//!   "header": {
//!     "createdAt": <epoch ms>, "updatedAt": <epoch ms>,
//!     "kdf": { "name": "scrypt", "params": {N, r, p, maxmem}, "salt": <b64> },
//!     "crypto": { "cipher": "aes-256-gcm" }
//!   },
//!   "protected": { "wrappedKey": <b64>, "wrapIv": <b64>, "wrapTag": <b64> },
//!   "data": { "ciphertext": <b64>, "iv": <b64>, "tag": <b64> }
//! }
//! ```
//!
//! - **protected**: the random vault key, encrypted under a KEK derived
//!   from the master password. Rewritten only on password change.
//! - **data**: the JSON entry list, encrypted under the vault key.
//!   Rewritten on every mutation.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::encryption::{NONCE_LEN, TAG_LEN};
use crate::crypto::{decrypt, derive_key, encrypt, generate_salt, ScryptParams, Sealed, SecretKey};
use crate::errors::{Result, VaultError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Tag identifying a file as an Encryptoor vault.
pub const MAGIC: &str = "ENCRYPTOOR";

/// Newest schema this engine understands.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// KDF name recorded in the header.
pub const KDF_NAME: &str = "scrypt";

/// Cipher name recorded in the header.
pub const CIPHER_NAME: &str = "aes-256-gcm";

/// Version of the running engine, stamped into every file it writes.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultFile {
    pub magic: String,
    pub schema_version: u32,
    pub app_version: String,
    pub header: VaultHeader,
    pub protected: ProtectedBlock,
    pub data: DataBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultHeader {
    pub created_at: i64,
    pub updated_at: i64,
    pub kdf: KdfHeader,
    pub crypto: CryptoHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfHeader {
    pub name: String,
    pub params: ScryptParams,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoHeader {
    pub cipher: String,
}

/// The vault key wrapped under the password-derived KEK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedBlock {
    #[serde(
        alias = "encryptedVaultKey",
        serialize_with = "base64_encode",
        deserialize_with = "base64_decode"
    )]
    pub wrapped_key: Vec<u8>,
    #[serde(
        alias = "vaultKeyIv",
        serialize_with = "base64_encode",
        deserialize_with = "base64_decode"
    )]
    pub wrap_iv: Vec<u8>,
    #[serde(
        alias = "vaultKeyTag",
        serialize_with = "base64_encode",
        deserialize_with = "base64_decode"
    )]
    pub wrap_tag: Vec<u8>,
}

/// The entry list encrypted under the vault key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBlock {
    #[serde(
        alias = "encrypted",
        serialize_with = "base64_encode",
        deserialize_with = "base64_decode"
    )]
    pub ciphertext: Vec<u8>,
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub iv: Vec<u8>,
    #[serde(
        alias = "authTag",
        serialize_with = "base64_encode",
        deserialize_with = "base64_decode"
    )]
    pub tag: Vec<u8>,
}

impl From<Sealed> for ProtectedBlock {
    fn from(s: Sealed) -> Self {
        Self {
            wrapped_key: s.ciphertext,
            wrap_iv: s.iv,
            wrap_tag: s.tag,
        }
    }
}

impl From<Sealed> for DataBlock {
    fn from(s: Sealed) -> Self {
        Self {
            ciphertext: s.ciphertext,
            iv: s.iv,
            tag: s.tag,
        }
    }
}

// ---------------------------------------------------------------------------
// Construction and key handling
// ---------------------------------------------------------------------------

impl VaultFile {
    /// Build a brand-new vault file around `vault_key`.
    ///
    /// Generates a fresh salt, derives a KEK from `password`, wraps the
    /// vault key under it, and encrypts `payload` under the vault key.
    pub fn seal(
        password: &[u8],
        vault_key: &SecretKey,
        payload: &[u8],
        params: &ScryptParams,
        now_ms: i64,
    ) -> Result<Self> {
        let salt = generate_salt();
        let kek = derive_key(password, &salt, params)?;
        let wrapped = encrypt(kek.as_bytes(), vault_key.as_bytes())?;
        let data = encrypt(vault_key.as_bytes(), payload)?;

        Ok(Self {
            magic: MAGIC.to_string(),
            schema_version: CURRENT_SCHEMA_VERSION,
            app_version: ENGINE_VERSION.to_string(),
            header: VaultHeader {
                created_at: now_ms,
                updated_at: now_ms,
                kdf: KdfHeader {
                    name: KDF_NAME.to_string(),
                    params: *params,
                    salt: salt.to_vec(),
                },
                crypto: CryptoHeader {
                    cipher: CIPHER_NAME.to_string(),
                },
            },
            protected: wrapped.into(),
            data: data.into(),
        })
    }

    /// Derive the KEK from `password` and unwrap the vault key.
    ///
    /// Returns `DecryptionFailed` when the password is wrong (or the
    /// protected block was tampered with).
    pub fn unwrap_vault_key(&self, password: &[u8]) -> Result<SecretKey> {
        let kek = derive_key(password, &self.header.kdf.salt, &self.header.kdf.params)?;
        let sealed = Sealed {
            ciphertext: self.protected.wrapped_key.clone(),
            iv: self.protected.wrap_iv.clone(),
            tag: self.protected.wrap_tag.clone(),
        };
        let mut raw = decrypt(kek.as_bytes(), &sealed)?;
        SecretKey::from_slice(&mut raw)
    }

    /// Wrap the existing vault key under a new password.
    ///
    /// Only the salt, KDF parameters and protected block change; the
    /// encrypted payload is untouched.
    pub fn rewrap(
        &mut self,
        vault_key: &SecretKey,
        new_password: &[u8],
        params: &ScryptParams,
    ) -> Result<()> {
        let salt = generate_salt();
        let kek = derive_key(new_password, &salt, params)?;
        let wrapped = encrypt(kek.as_bytes(), vault_key.as_bytes())?;

        self.header.kdf = KdfHeader {
            name: KDF_NAME.to_string(),
            params: *params,
            salt: salt.to_vec(),
        };
        self.protected = wrapped.into();
        Ok(())
    }

    /// Decrypt the data block with the vault key.
    pub fn open_payload(&self, vault_key: &SecretKey) -> Result<Zeroizing<Vec<u8>>> {
        let sealed = Sealed {
            ciphertext: self.data.ciphertext.clone(),
            iv: self.data.iv.clone(),
            tag: self.data.tag.clone(),
        };
        decrypt(vault_key.as_bytes(), &sealed)
            .map(Zeroizing::new)
            .map_err(|_| VaultError::InvalidVault("payload failed authentication".into()))
    }

    /// Re-encrypt the whole payload and bump `updatedAt`.
    pub fn replace_payload(
        &mut self,
        vault_key: &SecretKey,
        payload: &[u8],
        now_ms: i64,
    ) -> Result<()> {
        self.data = encrypt(vault_key.as_bytes(), payload)?.into();
        self.header.updated_at = now_ms;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    /// Parse and validate a vault file.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let vault: VaultFile = serde_json::from_slice(bytes)
            .map_err(|e| VaultError::InvalidVault(format!("vault JSON: {e}")))?;
        vault.validate()?;
        Ok(vault)
    }

    /// Serialize to the pretty-printed on-disk form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| VaultError::Serialization(format!("vault: {e}")))
    }

    /// Structural and compatibility checks.
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(VaultError::InvalidVault("missing ENCRYPTOOR magic".into()));
        }
        if self.schema_version == 0 || self.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(VaultError::InvalidVault(format!(
                "schema version {} is not supported, please update the app",
                self.schema_version
            )));
        }
        check_app_version(&self.app_version)?;

        let kdf = &self.header.kdf;
        if kdf.name != KDF_NAME {
            return Err(VaultError::InvalidVault(format!(
                "unsupported KDF '{}'",
                kdf.name
            )));
        }
        if kdf.salt.is_empty() {
            return Err(VaultError::InvalidVault("empty KDF salt".into()));
        }
        kdf.params
            .validate()
            .map_err(|e| VaultError::InvalidVault(e.to_string()))?;
        if self.header.crypto.cipher != CIPHER_NAME {
            return Err(VaultError::InvalidVault(format!(
                "unsupported cipher '{}'",
                self.header.crypto.cipher
            )));
        }

        let p = &self.protected;
        if p.wrapped_key.is_empty() || p.wrap_iv.len() != NONCE_LEN || p.wrap_tag.len() != TAG_LEN
        {
            return Err(VaultError::InvalidVault("malformed protected block".into()));
        }
        let d = &self.data;
        if d.ciphertext.is_empty() || d.iv.len() != NONCE_LEN || d.tag.len() != TAG_LEN {
            return Err(VaultError::InvalidVault("malformed data block".into()));
        }

        Ok(())
    }
}

/// A vault written by a newer major release cannot be read safely.
fn check_app_version(app_version: &str) -> Result<()> {
    let theirs = semver::Version::parse(app_version)
        .map_err(|e| VaultError::InvalidVault(format!("bad appVersion '{app_version}': {e}")))?;
    let ours = semver::Version::parse(ENGINE_VERSION)
        .map_err(|e| VaultError::Unexpected(format!("engine version: {e}")))?;

    if theirs.major > ours.major {
        return Err(VaultError::InvalidVault(format!(
            "written by version {theirs}, please update the app"
        )));
    }
    Ok(())
}

/// Serialize `value` into a buffer that is wiped on drop.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Zeroizing<Vec<u8>>> {
    serde_json::to_vec(value)
        .map(Zeroizing::new)
        .map_err(|e| VaultError::Serialization(format!("payload: {e}")))
}

/// Parse a decrypted payload.
///
/// The error only carries a position; serde's message can quote input.
pub fn decode_payload<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        VaultError::InvalidVault(format!(
            "payload JSON at line {} column {}",
            e.line(),
            e.column()
        ))
    })
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
