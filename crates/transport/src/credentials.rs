//! Bearer token sources.

/// Supplies the bearer token attached to every request.
///
/// Token acquisition and refresh live outside this crate; a provider only
/// hands out whatever token is current.
pub trait CredentialsProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token, typically read from configuration.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl CredentialsProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// No credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialsProvider for Anonymous {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}
