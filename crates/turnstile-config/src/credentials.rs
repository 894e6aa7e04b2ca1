//! Allow-listed credentials backed by argon2 password hashes.
//!
//! # Design
//! - Usernames map to PHC strings; plaintext passwords never outlive startup.
//! - Unknown usernames are verified against a dummy hash derived with the same
//!   parameters, so a lookup miss costs as much as a mismatch.

use std::collections::HashMap;
use std::fmt;

use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;
use rand::distr::Alphanumeric;
use rand_core::OsRng;

use crate::error::{ConfigError, ConfigResult};

/// Demo credentials used when no allow-list is configured.
pub const DEMO_CREDENTIALS: [(&str, &str); 3] =
    [("admin", "admin"), ("johnd", "foo"), ("janed", "ddd")];

const DUMMY_SECRET_LEN: usize = 32;

/// Where the allow-list comes from at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Built-in demo set, hashed on startup.
    Demo,
    /// Operator-supplied `username -> PHC hash` entries.
    Hashed(Vec<CredentialEntry>),
}

/// Single operator-supplied allow-list entry.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    /// Username permitted to log in.
    pub username: String,
    /// Argon2 PHC string for the user's password.
    pub password_hash: String,
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Parse `user:$argon2id$...;user2:$argon2id$...` into credential entries.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidCredentialEntry`] when an entry lacks a
/// separator or has an empty username or hash.
pub fn parse_credential_list(raw: &str) -> ConfigResult<Vec<CredentialEntry>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(index, entry)| {
            let (username, hash) =
                entry
                    .split_once(':')
                    .ok_or(ConfigError::InvalidCredentialEntry {
                        index,
                        reason: "missing_separator",
                    })?;
            let username = username.trim();
            let hash = hash.trim();
            if username.is_empty() {
                return Err(ConfigError::InvalidCredentialEntry {
                    index,
                    reason: "empty_username",
                });
            }
            if hash.is_empty() {
                return Err(ConfigError::InvalidCredentialEntry {
                    index,
                    reason: "empty_hash",
                });
            }
            Ok(CredentialEntry {
                username: username.to_string(),
                password_hash: hash.to_string(),
            })
        })
        .collect()
}

/// Fixed set of users allowed to log in.
#[derive(Clone)]
pub struct AllowList {
    entries: HashMap<String, String>,
    dummy_hash: String,
}

impl fmt::Debug for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut usernames: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        usernames.sort_unstable();
        f.debug_struct("AllowList")
            .field("usernames", &usernames)
            .finish_non_exhaustive()
    }
}

impl AllowList {
    /// Build the allow-list for a configured source.
    ///
    /// # Errors
    ///
    /// Propagates hashing or hash-parsing failures.
    pub fn from_source(source: &CredentialSource) -> ConfigResult<Self> {
        match source {
            CredentialSource::Demo => Self::from_plaintext(DEMO_CREDENTIALS, Params::default()),
            CredentialSource::Hashed(entries) => Self::from_hashes(
                entries
                    .iter()
                    .map(|entry| (entry.username.clone(), entry.password_hash.clone())),
            ),
        }
    }

    /// Build from pre-hashed PHC strings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::StoredHashInvalid`] when any hash fails to parse.
    pub fn from_hashes<I, U, H>(entries: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (U, H)>,
        U: Into<String>,
        H: Into<String>,
    {
        let mut parsed = HashMap::new();
        let mut params = None;
        for (username, hash) in entries {
            let username = username.into();
            let hash = hash.into();
            let phc = PasswordHash::new(&hash).map_err(|detail| {
                ConfigError::StoredHashInvalid {
                    username: username.clone(),
                    detail,
                }
            })?;
            if params.is_none() {
                params = Params::try_from(&phc).ok();
            }
            parsed.insert(username, hash);
        }
        let dummy_hash = hash_secret(&random_secret(), params.unwrap_or_default())?;
        Ok(Self {
            entries: parsed,
            dummy_hash,
        })
    }

    /// Hash plaintext credentials with the supplied argon2 parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SecretHashFailed`] if hashing fails.
    pub fn from_plaintext<I, U, P>(entries: I, params: Params) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: AsRef<str>,
    {
        let mut hashed = HashMap::new();
        for (username, password) in entries {
            hashed.insert(
                username.into(),
                hash_secret(password.as_ref(), params.clone())?,
            );
        }
        let dummy_hash = hash_secret(&random_secret(), params)?;
        Ok(Self {
            entries: hashed,
            dummy_hash,
        })
    }

    /// Number of allow-listed users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the allow-list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check a username/password pair against the allow-list.
    ///
    /// # Errors
    ///
    /// Returns an error only when a stored hash is malformed or verification
    /// fails for a reason other than a mismatch.
    pub fn verify(&self, username: &str, password: &str) -> ConfigResult<bool> {
        match self.entries.get(username) {
            Some(hash) => verify_secret(username, hash, password),
            None => {
                verify_secret(username, &self.dummy_hash, password)?;
                Ok(false)
            }
        }
    }
}

/// Hash a secret into an argon2id PHC string.
///
/// # Errors
///
/// Returns [`ConfigError::SecretHashFailed`] if hashing fails.
pub fn hash_secret(input: &str, params: Params) -> ConfigResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let hash = argon
        .hash_password(input.as_bytes(), &salt)
        .map_err(|detail| ConfigError::SecretHashFailed { detail })?;
    Ok(hash.to_string())
}

fn verify_secret(username: &str, expected_hash: &str, candidate: &str) -> ConfigResult<bool> {
    let parsed =
        PasswordHash::new(expected_hash).map_err(|detail| ConfigError::StoredHashInvalid {
            username: username.to_string(),
            detail,
        })?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(detail) => Err(ConfigError::SecretVerifyFailed { detail }),
    }
}

fn random_secret() -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
        .take(DUMMY_SECRET_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_params() -> anyhow::Result<Params> {
        Params::new(256, 1, 1, None).map_err(|err| anyhow::anyhow!("params: {err}"))
    }

    #[test]
    fn plaintext_allow_list_accepts_known_pairs_only() -> anyhow::Result<()> {
        let list = AllowList::from_plaintext(DEMO_CREDENTIALS, cheap_params()?)?;
        assert_eq!(list.len(), 3);
        assert!(list.verify("admin", "admin")?);
        assert!(list.verify("johnd", "foo")?);
        assert!(!list.verify("johnd", "admin")?);
        assert!(!list.verify("mallory", "admin")?);
        Ok(())
    }

    #[test]
    fn hashing_salts_each_secret_from_the_os_rng() -> anyhow::Result<()> {
        let first = hash_secret("admin", cheap_params()?)?;
        let second = hash_secret("admin", cheap_params()?)?;
        assert!(first.starts_with("$argon2id$v=19$"));
        assert_ne!(first, second);
        assert!(verify_secret("admin", &first, "admin")?);
        assert!(verify_secret("admin", &second, "admin")?);
        Ok(())
    }

    #[test]
    fn hashed_allow_list_reuses_stored_hashes() -> anyhow::Result<()> {
        let hash = hash_secret("s3cret", cheap_params()?)?;
        let list = AllowList::from_hashes([("ops", hash)])?;
        assert!(list.verify("ops", "s3cret")?);
        assert!(!list.verify("ops", "wrong")?);
        assert!(!list.verify("nobody", "s3cret")?);
        Ok(())
    }

    #[test]
    fn malformed_hash_is_rejected_at_construction() {
        let err = AllowList::from_hashes([("ops", "not-a-phc-string")])
            .err()
            .map(|err| err.to_string());
        assert_eq!(err.as_deref(), Some("invalid stored hash"));
    }

    #[test]
    fn credential_list_parses_entries() -> anyhow::Result<()> {
        let entries = parse_credential_list(
            " admin:$argon2id$v=19$m=256,t=1,p=1$c2FsdA$aGFzaA ; ;ops:$argon2id$x ",
        )?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].username, "admin");
        assert!(entries[0].password_hash.starts_with("$argon2id$"));
        assert_eq!(entries[1].username, "ops");
        Ok(())
    }

    #[test]
    fn credential_list_rejects_malformed_entries() {
        for (raw, reason) in [
            ("admin", "missing_separator"),
            (":hash", "empty_username"),
            ("admin:", "empty_hash"),
        ] {
            match parse_credential_list(raw) {
                Err(ConfigError::InvalidCredentialEntry { reason: got, .. }) => {
                    assert_eq!(got, reason);
                }
                other => panic!("unexpected result for {raw}: {other:?}"),
            }
        }
    }

    #[test]
    fn debug_output_redacts_hashes() {
        let entry = CredentialEntry {
            username: "ops".to_string(),
            password_hash: "$argon2id$secret".to_string(),
        };
        let rendered = format!("{entry:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret"));
    }
}
