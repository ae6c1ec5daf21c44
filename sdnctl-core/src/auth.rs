//! Shared-secret authentication for sdnctl
//!
//! A controller holds exactly one credential: a salt and the PBKDF2 hash of
//! the password. The record is read once at startup, never mutated, and
//! shared read-only by every session, so verification needs no locking.
//!
//! On disk the record is a small `key=value` file:
//!
//! ```text
//! salt=<salt text>
//! password_hash=<base64 of the 32-byte derived key>
//! ```
//!
//! Blank lines and `#` comments are ignored, as are unknown keys.

use crate::crypto::{constant_time_eq, derive_password_hash, HASH_LEN};
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

const SALT_KEY: &str = "salt";
const HASH_KEY: &str = "password_hash";

/// Salt and derived password hash
#[derive(Clone)]
pub struct CredentialRecord {
    salt: Vec<u8>,
    password_hash: Zeroizing<Vec<u8>>,
}

impl CredentialRecord {
    /// Build a record from raw parts, rejecting empty or mis-sized fields
    pub fn new(salt: Vec<u8>, password_hash: Vec<u8>) -> Result<Self> {
        let password_hash = Zeroizing::new(password_hash);
        if salt.is_empty() {
            return Err(Error::Config(format!("{} must not be empty", SALT_KEY)));
        }
        if password_hash.len() != HASH_LEN {
            return Err(Error::Config(format!(
                "{} must decode to {} bytes, got {}",
                HASH_KEY,
                HASH_LEN,
                password_hash.len()
            )));
        }
        Ok(Self {
            salt,
            password_hash,
        })
    }

    /// Derive a fresh record for `password` under `salt`
    pub fn derive(salt: &str, password: &str) -> Result<Self> {
        let hash = derive_password_hash(password, salt.as_bytes());
        Self::new(salt.as_bytes().to_vec(), hash.to_vec())
    }

    /// Parse the `key=value` credential file format
    pub fn parse(text: &str) -> Result<Self> {
        let mut salt = None;
        let mut password_hash = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::Config(format!("line {}: expected key=value", index + 1))
            })?;
            // Only the whole line is trimmed; key and value are taken verbatim
            match key {
                SALT_KEY => salt = Some(value.as_bytes().to_vec()),
                HASH_KEY => {
                    let decoded = STANDARD.decode(value.trim()).map_err(|e| {
                        Error::Config(format!("line {}: invalid {}: {}", index + 1, HASH_KEY, e))
                    })?;
                    password_hash = Some(decoded);
                }
                _ => {}
            }
        }

        match (salt, password_hash) {
            (Some(salt), Some(password_hash)) => Self::new(salt, password_hash),
            _ => Err(Error::Config(format!(
                "credential file must contain {} and {}",
                SALT_KEY, HASH_KEY
            ))),
        }
    }

    /// Read and parse a credential file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Render in the credential file format.
    ///
    /// Fails for salts that would not read back unchanged: non UTF-8, line
    /// breaks, or trailing whitespace (lines are trimmed on load).
    pub fn to_conf_string(&self) -> Result<String> {
        let salt = std::str::from_utf8(&self.salt)
            .map_err(|_| Error::Config(format!("{} is not valid UTF-8", SALT_KEY)))?;
        if salt.contains(['\n', '\r']) || salt.ends_with(char::is_whitespace) {
            return Err(Error::Config(format!(
                "{} {:?} cannot be stored: line breaks and trailing whitespace are not preserved",
                SALT_KEY, salt
            )));
        }
        Ok(format!(
            "{}={}\n{}={}\n",
            SALT_KEY,
            salt,
            HASH_KEY,
            STANDARD.encode(self.password_hash.as_slice())
        ))
    }

    /// Write the record to `path`, replacing any existing file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_conf_string()?;
        fs::write(path, contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn password_hash(&self) -> &[u8] {
        &self.password_hash
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("salt", &String::from_utf8_lossy(&self.salt))
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Read-only credential verifier shared by all sessions
#[derive(Debug, Clone)]
pub struct CredentialStore {
    record: CredentialRecord,
}

impl CredentialStore {
    pub fn new(record: CredentialRecord) -> Self {
        Self { record }
    }

    /// Load the store from a credential file
    pub fn load(path: &Path) -> Result<Self> {
        CredentialRecord::load(path).map(Self::new)
    }

    /// Check `candidate` against the stored hash.
    ///
    /// The candidate is always run through the full KDF and the comparison
    /// covers every byte, so timing does not reveal where a mismatch is.
    pub fn verify(&self, candidate: &str) -> bool {
        let derived = derive_password_hash(candidate, &self.record.salt);
        constant_time_eq(derived.as_slice(), &self.record.password_hash)
    }

    pub fn record(&self) -> &CredentialRecord {
        &self.record
    }
}
