//! Extension configuration.

use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Routes and access policy of the extension. Immutable once the
/// extension is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Only identities whose email is in this domain are let through
    pub required_domain: Option<String>,
    /// Prefix for the login and logout routes, e.g. `/auth`
    pub url_prefix: String,
    pub login_path: String,
    pub logout_path: String,
    /// Public origin of the application, e.g. `https://app.mokote.com`. It
    /// must not carry a path. When unset it is derived from the `Host` and
    /// `X-Forwarded-Proto` headers.
    pub external_url: Option<String>,
    /// Where to send the user when no `next` is given
    pub default_redirect: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required_domain: None,
            url_prefix: String::new(),
            login_path: "/login/".to_string(),
            logout_path: "/logout/".to_string(),
            external_url: None,
            default_redirect: "/".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_required_domain(mut self, domain: impl Into<String>) -> Self {
        self.required_domain = Some(domain.into());
        self
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    pub fn with_default_redirect(mut self, path: impl Into<String>) -> Self {
        self.default_redirect = path.into();
        self
    }

    pub fn login_route(&self) -> String {
        format!("{}{}", self.url_prefix, self.login_path)
    }

    pub fn logout_route(&self) -> String {
        format!("{}{}", self.url_prefix, self.logout_path)
    }

    pub(crate) fn external_base(&self) -> AuthResult<Option<Url>> {
        let Some(raw) = self.external_url.as_deref() else {
            return Ok(None);
        };
        let url = Url::parse(raw).map_err(|e| AuthError::Config(format!("external_url: {}", e)))?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(AuthError::Config(format!(
                "external_url '{}' must be an http or https origin",
                raw
            )));
        }
        // Redirects and routes are host-relative, so a mount path would be lost
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(AuthError::Config(format!(
                "external_url '{}' must not carry a path, query or fragment",
                raw
            )));
        }
        Ok(Some(url))
    }

    pub fn validate(&self) -> AuthResult<()> {
        if !self.url_prefix.is_empty()
            && (!self.url_prefix.starts_with('/') || self.url_prefix.ends_with('/'))
        {
            return Err(AuthError::Config(format!(
                "url_prefix '{}' must start with '/' and must not end with '/'",
                self.url_prefix
            )));
        }

        for (name, path) in [
            ("login_path", &self.login_path),
            ("logout_path", &self.logout_path),
            ("default_redirect", &self.default_redirect),
        ] {
            if !path.starts_with('/') {
                return Err(AuthError::Config(format!("{} must start with '/'", name)));
            }
        }

        if self.login_route() == self.logout_route() {
            return Err(AuthError::Config(
                "login and logout routes must differ".to_string(),
            ));
        }

        if let Some(domain) = &self.required_domain {
            if domain.trim().is_empty() || domain.contains('@') || domain.contains('/') {
                return Err(AuthError::Config(format!(
                    "'{}' is not a valid domain",
                    domain
                )));
            }
        }

        self.external_base()?;
        Ok(())
    }
}
