//! Where a password comes from.
//!
//! Password-based acquisition asks a [`SecretSource`] for the secret each
//! time it needs one, so a prompt only happens when the identity provider is
//! actually contacted.

use async_trait::async_trait;
use console::Term;

use crate::error::{AuthError, AuthResult};

/// Capability to supply a secret (usually a password).
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Produce the secret.
    async fn secret(&self) -> AuthResult<String>;
}

/// A secret known up front.
pub struct FixedSecret(String);

impl FixedSecret {
    /// Wrap a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }
}

impl std::fmt::Debug for FixedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FixedSecret([REDACTED])")
    }
}

#[async_trait]
impl SecretSource for FixedSecret {
    async fn secret(&self) -> AuthResult<String> {
        Ok(self.0.clone())
    }
}

/// A secret read from an environment variable at acquisition time.
#[derive(Debug, Clone)]
pub struct EnvSecret {
    var: String,
}

impl EnvSecret {
    /// Read the secret from `var`.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl SecretSource for EnvSecret {
    async fn secret(&self) -> AuthResult<String> {
        match std::env::var(&self.var) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(AuthError::Configuration(format!(
                "environment variable {} is not set",
                self.var
            ))),
        }
    }
}

/// A secret typed by the user on the terminal.
#[derive(Debug, Clone)]
pub struct PromptSecret {
    prompt: String,
}

impl PromptSecret {
    /// Prompt with a custom message.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl Default for PromptSecret {
    fn default() -> Self {
        Self::new("Enter your password: ")
    }
}

#[async_trait]
impl SecretSource for PromptSecret {
    async fn secret(&self) -> AuthResult<String> {
        let term = Term::stderr();
        if !term.is_term() {
            return Err(AuthError::configuration(
                "no password supplied and no terminal available to prompt for one",
            ));
        }

        let prompt = self.prompt.clone();
        let line = tokio::task::spawn_blocking(move || {
            term.write_str(&prompt)?;
            term.read_secure_line()
        })
        .await
        .map_err(|e| AuthError::authentication(format!("password prompt aborted: {e}")))?
        .map_err(|e| AuthError::authentication(format!("password prompt declined: {e}")))?;

        if line.is_empty() {
            return Err(AuthError::configuration(
                "the prompted password must not be empty",
            ));
        }
        Ok(line)
    }
}
