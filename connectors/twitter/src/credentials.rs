//! Interactive credential setup.
//!
//! Credentials come from the keychain file when it holds a consumer and at
//! least one user. Whatever is missing is asked for on the terminal, and user
//! tokens can be obtained through the PIN flow instead of being typed in.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use twsd_oauth::{ConsumerCredentials, Keychain, OAuth1Client, OAuth1Config};

use crate::prompt::{query_yes_no, read_value};

const NEW_APP_HINT: &str =
    "Create a new application on https://developer.twitter.com/apps and try again.";

/// Where credentials come from and where missing ones are asked for.
pub struct Setup<'a, R, W, F> {
    /// Keychain file.
    pub path: &'a Path,
    /// Label to read or store user credentials under.
    pub label: Option<&'a str>,
    /// Acquire new user credentials even if some are stored.
    pub force_new_user: bool,
    /// OAuth endpoints for the PIN flow.
    pub oauth_config: F,
    /// Terminal input.
    pub input: R,
    /// Terminal output.
    pub output: W,
}

impl<R, W, F> Setup<'_, R, W, F>
where
    R: BufRead,
    W: Write,
    F: Fn(&ConsumerCredentials) -> OAuth1Config,
{
    /// Load the keychain and fill in what is missing.
    ///
    /// Returns `None` when the user has no consumer credentials to offer. The
    /// keychain is saved whenever something was added.
    pub async fn run(mut self) -> Result<Option<Keychain>> {
        let mut keychain = match Keychain::load(self.path) {
            Ok(keychain) => keychain,
            Err(e) if e.is_not_found() => Keychain::new(),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read credentials from {}", self.path.display())
                });
            }
        };
        let mut changed = false;

        if keychain.consumer().is_err() {
            if !query_yes_no(
                &mut self.input,
                &mut self.output,
                "Do you have a CONSUMER KEY, CONSUMER SECRET pair?",
            )? {
                writeln!(self.output, "{NEW_APP_HINT}")?;
                return Ok(None);
            }
            let key = read_value(&mut self.input, &mut self.output, "Input your CONSUMER KEY: ")?;
            let secret = read_value(
                &mut self.input,
                &mut self.output,
                "Input your CONSUMER SECRET: ",
            )?;
            keychain.set_consumer(key, secret);
            changed = true;
        }

        if self.force_new_user || keychain.user(self.label).is_err() {
            let (token, secret) = self.user_credentials(&keychain).await?;
            keychain.set_user(token, secret, self.label)?;
            changed = true;
        }

        if changed {
            keychain
                .save(self.path)
                .with_context(|| format!("Failed to save credentials to {}", self.path.display()))?;
            info!(path = %self.path.display(), "Saved credentials");
        }

        Ok(Some(keychain))
    }

    async fn user_credentials(&mut self, keychain: &Keychain) -> Result<(String, String)> {
        if query_yes_no(
            &mut self.input,
            &mut self.output,
            "Do you have an ACCESS TOKEN, ACCESS TOKEN SECRET pair?",
        )? {
            let token = read_value(&mut self.input, &mut self.output, "Input your ACCESS TOKEN: ")?;
            let secret = read_value(
                &mut self.input,
                &mut self.output,
                "Input your ACCESS TOKEN SECRET: ",
            )?;
            return Ok((token, secret));
        }

        let client = OAuth1Client::new((self.oauth_config)(keychain.consumer()?));
        let request_token = client
            .get_request_token()
            .await
            .context("Failed to obtain a request token")?;

        writeln!(
            self.output,
            "Visit this URL to authorize twsd, then enter the PIN shown:\n{}",
            client.authorization_url(&request_token)
        )?;
        let pin = read_value(&mut self.input, &mut self.output, "PIN: ")?;

        let tokens = client
            .get_access_token(&request_token, &pin)
            .await
            .context("Failed to exchange the PIN for an access token")?;
        if let Some(screen_name) = &tokens.screen_name {
            info!(screen_name = %screen_name, "Authorized");
        }

        Ok((tokens.token, tokens.token_secret))
    }
}
