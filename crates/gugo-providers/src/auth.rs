use std::fmt;
use std::sync::Arc;

type LookupFn = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Where API tokens come from. Defaults to the process environment.
#[derive(Clone)]
pub struct TokenLookup {
    lookup: Arc<LookupFn>,
}

impl TokenLookup {
    pub fn env() -> Self {
        Self::from_fn(|name| std::env::var(name).ok())
    }

    pub fn from_fn<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    /// Fixed token regardless of variable name.
    pub fn fixed(token: impl Into<String>) -> Self {
        let token = token.into();
        Self::from_fn(move |_| Some(token.clone()))
    }

    /// Reads `variable`; blank values count as unset.
    pub fn require(&self, variable: &str) -> anyhow::Result<String> {
        match (self.lookup)(variable) {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => anyhow::bail!("environment variable {variable} is required"),
        }
    }
}

impl Default for TokenLookup {
    fn default() -> Self {
        Self::env()
    }
}

impl fmt::Debug for TokenLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenLookup")
    }
}
