//! Credential keychain.
//!
//! A keychain holds one consumer key/secret pair and any number of user
//! token/secret pairs authorized for that consumer, keyed by label. On disk it
//! is a JSON object:
//!
//! ```json
//! {
//!   "__consumer__": { "key": "...", "secret": "..." },
//!   "someuser": ["token", "token secret"]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{OAuth1Signer, OAuthError, OAuthResult};

/// Default keychain file name, relative to the home directory.
pub const DEFAULT_KEYCHAIN_FILE: &str = ".twsd.auth";

/// Reserved key holding the consumer credentials.
pub const CONSUMER_KEY: &str = "__consumer__";

/// Default keychain location (`~/.twsd.auth`), if a home directory is known.
#[must_use]
pub fn default_keychain_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_KEYCHAIN_FILE))
}

/// Consumer (application) credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerCredentials {
    /// Consumer key.
    pub key: String,
    /// Consumer secret.
    pub secret: String,
}

/// User credentials, stored as a `[token, secret]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct UserCredentials {
    /// Access token.
    pub token: String,
    /// Access token secret.
    pub secret: String,
}

impl From<(String, String)> for UserCredentials {
    fn from((token, secret): (String, String)) -> Self {
        Self { token, secret }
    }
}

impl From<UserCredentials> for (String, String) {
    fn from(user: UserCredentials) -> Self {
        (user.token, user.secret)
    }
}

/// A consumer key/secret and the user credentials authorized for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keychain {
    #[serde(rename = "__consumer__", default, skip_serializing_if = "Option::is_none")]
    consumer: Option<ConsumerCredentials>,
    #[serde(flatten)]
    users: BTreeMap<String, UserCredentials>,
}

impl Keychain {
    /// Create an empty keychain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the consumer credentials.
    pub fn set_consumer(&mut self, key: impl Into<String>, secret: impl Into<String>) {
        self.consumer = Some(ConsumerCredentials {
            key: key.into(),
            secret: secret.into(),
        });
    }

    /// Get the consumer credentials.
    pub fn consumer(&self) -> OAuthResult<&ConsumerCredentials> {
        self.consumer.as_ref().ok_or(OAuthError::MissingConsumer)
    }

    /// Store user credentials under `label`, or under the token itself when no label is given.
    ///
    /// Fails if no consumer has been set yet.
    pub fn set_user(
        &mut self,
        token: impl Into<String>,
        secret: impl Into<String>,
        label: Option<&str>,
    ) -> OAuthResult<()> {
        self.consumer()?;

        let token = token.into();
        let label = label.map_or_else(|| token.clone(), str::to_string);
        if label == CONSUMER_KEY {
            return Err(OAuthError::InvalidConfig(format!(
                "{CONSUMER_KEY} is reserved and cannot label a user"
            )));
        }

        self.users.insert(
            label,
            UserCredentials {
                token,
                secret: secret.into(),
            },
        );
        Ok(())
    }

    /// Get user credentials by label, or the first stored user when no label is given.
    pub fn user(&self, label: Option<&str>) -> OAuthResult<&UserCredentials> {
        self.consumer()?;

        match label {
            Some(label) => self
                .users
                .get(label)
                .ok_or_else(|| OAuthError::UnknownLabel(label.to_string())),
            None => self
                .users
                .values()
                .next()
                .ok_or(OAuthError::NoUserCredentials),
        }
    }

    /// Labels of the stored users, in sorted order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Move user credentials to a new label.
    pub fn rename(&mut self, old_label: &str, new_label: &str) -> OAuthResult<()> {
        if new_label == CONSUMER_KEY {
            return Err(OAuthError::InvalidConfig(format!(
                "{CONSUMER_KEY} is reserved and cannot label a user"
            )));
        }
        let user = self
            .users
            .remove(old_label)
            .ok_or_else(|| OAuthError::UnknownLabel(old_label.to_string()))?;
        self.users.insert(new_label.to_string(), user);
        Ok(())
    }

    /// Build a request signer for the given user (see [`Keychain::user`]).
    pub fn signer(&self, label: Option<&str>) -> OAuthResult<OAuth1Signer> {
        let consumer = self.consumer()?;
        let user = self.user(label)?;
        Ok(OAuth1Signer::new(
            &consumer.key,
            &consumer.secret,
            &user.token,
            &user.secret,
        ))
    }

    /// Load a keychain from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> OAuthResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| OAuthError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let keychain = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded keychain");
        Ok(keychain)
    }

    /// Write the keychain to a JSON file, readable by the owner only on Unix.
    pub fn save(&self, path: impl AsRef<Path>) -> OAuthResult<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string_pretty(self)?;
        let io_error = |source| OAuthError::IoError {
            path: path.to_path_buf(),
            source,
        };

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path).map_err(io_error)?;
        file.write_all(contents.as_bytes()).map_err(io_error)?;
        file.write_all(b"\n").map_err(io_error)?;
        debug!(path = %path.display(), "Saved keychain");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestSigner;

    fn sample() -> Keychain {
        let mut keychain = Keychain::new();
        keychain.set_consumer("ck", "cs");
        keychain.set_user("uk1", "us1", Some("user1")).unwrap();
        keychain.set_user("uk2", "us2", Some("user2")).unwrap();
        keychain.set_user("uk3", "us3", None).unwrap();
        keychain
    }

    #[test]
    fn test_default_path_is_in_home() {
        let path = default_keychain_path().unwrap();
        assert_eq!(path.file_name().unwrap(), DEFAULT_KEYCHAIN_FILE);
        assert_eq!(path.parent(), dirs::home_dir().as_deref());
    }

    #[test]
    fn test_user_requires_consumer() {
        let mut keychain = Keychain::new();
        assert!(matches!(
            keychain.set_user("uk", "us", None),
            Err(OAuthError::MissingConsumer)
        ));
        assert!(matches!(
            keychain.user(None),
            Err(OAuthError::MissingConsumer)
        ));
    }

    #[test]
    fn test_lookup_by_label() {
        let keychain = sample();

        assert_eq!(keychain.consumer().unwrap().key, "ck");
        assert_eq!(keychain.user(Some("user1")).unwrap().token, "uk1");
        // Without a label the token doubles as the label.
        assert_eq!(keychain.user(Some("uk3")).unwrap().secret, "us3");
        assert!(matches!(
            keychain.user(Some("nobody")),
            Err(OAuthError::UnknownLabel(label)) if label == "nobody"
        ));
    }

    #[test]
    fn test_default_user_is_first_label() {
        let keychain = sample();
        assert_eq!(
            keychain.labels().collect::<Vec<_>>(),
            vec!["uk3", "user1", "user2"]
        );
        assert_eq!(keychain.user(None).unwrap().token, "uk3");
    }

    #[test]
    fn test_no_users() {
        let mut keychain = Keychain::new();
        keychain.set_consumer("ck", "cs");
        assert!(matches!(
            keychain.user(None),
            Err(OAuthError::NoUserCredentials)
        ));
    }

    #[test]
    fn test_reserved_label_rejected() {
        let mut keychain = sample();
        assert!(keychain.set_user("t", "s", Some(CONSUMER_KEY)).is_err());
        assert!(keychain.rename("user1", CONSUMER_KEY).is_err());
    }

    #[test]
    fn test_rename() {
        let mut keychain = sample();
        keychain.rename("uk3", "user3").unwrap();

        assert_eq!(keychain.user(Some("user3")).unwrap().token, "uk3");
        assert!(keychain.user(Some("uk3")).is_err());
        assert!(keychain.rename("uk3", "again").is_err());
    }

    #[test]
    fn test_on_disk_layout() {
        let mut keychain = Keychain::new();
        keychain.set_consumer("ck", "cs");
        keychain.set_user("tok", "sec", Some("me")).unwrap();

        let value = serde_json::to_value(&keychain).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "__consumer__": {"key": "ck", "secret": "cs"},
                "me": ["tok", "sec"]
            })
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_KEYCHAIN_FILE);

        let keychain = sample();
        keychain.save(&path).unwrap();
        let loaded = Keychain::load(&path).unwrap();

        assert_eq!(keychain, loaded);
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        sample().save(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Keychain::load(dir.path().join("missing")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = Keychain::load(&path).unwrap_err();
        assert!(matches!(err, OAuthError::JsonError(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_signer_from_keychain() {
        let keychain = sample();
        let signer = keychain.signer(Some("user2")).unwrap();

        assert_eq!(signer.consumer_key(), "ck");
        assert_eq!(signer.token(), "uk2");
        let header = signer
            .authorization("POST", "https://stream.twitter.com/1.1/statuses/sample.json", &[])
            .unwrap();
        assert!(header.contains("oauth_token=\"uk2\""));
    }
}
