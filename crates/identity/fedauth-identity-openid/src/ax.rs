//! OpenID Attribute Exchange (AX) fetch requests and responses.

use crate::error::OpenIdError;
use crate::types::SignedFields;
use fedauth_identity_core::CallbackParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const AX_NS: &str = "http://openid.net/srv/ax/1.0";

pub const TYPE_FIRST_NAME: &str = "http://axschema.org/namePerson/first";
pub const TYPE_FULL_NAME: &str = "http://axschema.org/namePerson";
pub const TYPE_LAST_NAME: &str = "http://axschema.org/namePerson/last";
pub const TYPE_EMAIL: &str = "http://axschema.org/contact/email";
pub const TYPE_LANGUAGE: &str = "http://axschema.org/pref/language";
pub const TYPE_USERNAME: &str = "http://axschema.org/namePerson/friendly";

/// An attribute that can be requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxAttribute {
    /// Expands to first name, full name and last name
    Name,
    Email,
    Language,
    Username,
}

impl AxAttribute {
    pub fn default_set() -> Vec<Self> {
        vec![Self::Name, Self::Email, Self::Language, Self::Username]
    }

    /// `(alias, type URI)` pairs this attribute puts on the wire.
    fn fields(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Name => &[
                ("firstname", TYPE_FIRST_NAME),
                ("fullname", TYPE_FULL_NAME),
                ("lastname", TYPE_LAST_NAME),
            ],
            Self::Email => &[("email", TYPE_EMAIL)],
            Self::Language => &[("language", TYPE_LANGUAGE)],
            Self::Username => &[("username", TYPE_USERNAME)],
        }
    }
}

impl fmt::Display for AxAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Email => write!(f, "email"),
            Self::Language => write!(f, "language"),
            Self::Username => write!(f, "username"),
        }
    }
}

impl FromStr for AxAttribute {
    type Err = OpenIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "firstname" | "fullname" | "lastname" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            "language" => Ok(Self::Language),
            "username" => Ok(Self::Username),
            other => Err(OpenIdError::ConfigError(format!(
                "Unknown attribute '{}'",
                other
            ))),
        }
    }
}

/// Builds the `openid.ns.ax` / `openid.ax.*` parameters of a fetch request.
///
/// Returns nothing when no attributes are requested. Duplicate attributes are
/// requested once, in first-seen order.
pub(crate) fn fetch_request_params(attributes: &[AxAttribute]) -> Vec<(String, String)> {
    if attributes.is_empty() {
        return Vec::new();
    }

    let mut params = vec![
        ("openid.ns.ax".to_string(), AX_NS.to_string()),
        ("openid.ax.mode".to_string(), "fetch_request".to_string()),
    ];
    let mut required: Vec<&str> = Vec::new();

    for attribute in attributes {
        for (alias, type_uri) in attribute.fields() {
            if required.contains(alias) {
                continue;
            }
            params.push((format!("openid.ax.type.{}", alias), type_uri.to_string()));
            required.push(alias);
        }
    }

    params.push(("openid.ax.required".to_string(), required.join(",")));
    params
}

/// Attribute values returned in a positive assertion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxClaims {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language: Option<String>,
}

impl AxClaims {
    /// Reads AX values from the callback parameters.
    ///
    /// The AX alias is whatever the provider declared with
    /// `openid.ns.<alias>`. The namespace declaration, the type key and the
    /// value key must all be listed in `openid.signed`, anything else is
    /// ignored.
    pub fn extract(params: &CallbackParams, signed: &SignedFields) -> Self {
        let Some(alias) = ax_alias(params, signed) else {
            return Self::default();
        };

        let lookup = |type_uri: &str| -> Option<String> {
            let type_prefix = format!("openid.{}.type.", alias);
            let mut parts: Vec<&str> = params
                .iter()
                .filter(|(key, value)| key.starts_with(&type_prefix) && *value == type_uri)
                .map(|(key, _)| &key[type_prefix.len()..])
                .filter(|part| signed.contains(&format!("{}.type.{}", alias, part)))
                .collect();
            parts.sort_unstable();

            let part = parts.first()?;
            let value_field = format!("{}.value.{}", alias, part);
            if !signed.contains(&value_field) {
                return None;
            }
            params
                .get(&format!("openid.{}", value_field))
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            email: lookup(TYPE_EMAIL),
            full_name: lookup(TYPE_FULL_NAME),
            first_name: lookup(TYPE_FIRST_NAME),
            last_name: lookup(TYPE_LAST_NAME),
            username: lookup(TYPE_USERNAME),
            language: lookup(TYPE_LANGUAGE).map(|l| l.to_lowercase()),
        }
    }
}

fn ax_alias(params: &CallbackParams, signed: &SignedFields) -> Option<String> {
    let mut aliases: Vec<&str> = params
        .iter()
        .filter(|(_, value)| *value == AX_NS)
        .filter_map(|(key, _)| key.strip_prefix("openid.ns."))
        .filter(|alias| !alias.is_empty())
        .filter(|alias| signed.contains(&format!("ns.{}", alias)))
        .collect();
    aliases.sort_unstable();
    aliases.first().map(|alias| alias.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_name_expands_and_required_is_ordered() {
        let params: HashMap<_, _> = fetch_request_params(&AxAttribute::default_set())
            .into_iter()
            .collect();

        assert_eq!(params["openid.ns.ax"], AX_NS);
        assert_eq!(params["openid.ax.mode"], "fetch_request");
        assert_eq!(params["openid.ax.type.firstname"], TYPE_FIRST_NAME);
        assert_eq!(params["openid.ax.type.fullname"], TYPE_FULL_NAME);
        assert_eq!(params["openid.ax.type.lastname"], TYPE_LAST_NAME);
        assert_eq!(params["openid.ax.type.email"], TYPE_EMAIL);
        assert_eq!(params["openid.ax.type.language"], TYPE_LANGUAGE);
        assert_eq!(params["openid.ax.type.username"], TYPE_USERNAME);
        assert_eq!(
            params["openid.ax.required"],
            "firstname,fullname,lastname,email,language,username"
        );
    }

    #[test]
    fn test_no_attributes_means_no_ax_params() {
        assert!(fetch_request_params(&[]).is_empty());
    }

    #[test]
    fn test_duplicates_requested_once() {
        let params = fetch_request_params(&[AxAttribute::Email, AxAttribute::Email]);
        let required = params
            .iter()
            .find(|(k, _)| k == "openid.ax.required")
            .map(|(_, v)| v.as_str());
        assert_eq!(required, Some("email"));
    }

    #[test]
    fn test_parse_attribute_names() {
        assert_eq!("Email".parse::<AxAttribute>().unwrap(), AxAttribute::Email);
        assert_eq!("fullname".parse::<AxAttribute>().unwrap(), AxAttribute::Name);
        assert!("shoe_size".parse::<AxAttribute>().is_err());
    }

    #[test]
    fn test_extract_uses_declared_alias_and_signature() {
        let params: CallbackParams = vec![
            ("openid.ns.ext1", AX_NS),
            ("openid.ext1.type.mail", TYPE_EMAIL),
            ("openid.ext1.value.mail", "ann@mokote.com"),
            ("openid.ext1.type.lang", TYPE_LANGUAGE),
            ("openid.ext1.value.lang", "EN-gb"),
            ("openid.ext1.type.fn", TYPE_FIRST_NAME),
            ("openid.ext1.value.fn", "Ann"),
        ]
        .into_iter()
        .collect();

        // first name is present but unsigned
        let signed = SignedFields::parse(
            "ns.ext1,ext1.type.mail,ext1.value.mail,ext1.type.lang,ext1.value.lang,ext1.type.fn",
        );
        let claims = AxClaims::extract(&params, &signed);

        assert_eq!(claims.email.as_deref(), Some("ann@mokote.com"));
        assert_eq!(claims.language.as_deref(), Some("en-gb"));
        assert_eq!(claims.first_name, None);
        assert_eq!(claims.username, None);

        // without a signed namespace declaration nothing is read
        let signed = SignedFields::parse("ext1.type.mail,ext1.value.mail");
        assert_eq!(AxClaims::extract(&params, &signed), AxClaims::default());
    }

    #[test]
    fn test_extract_ignores_unsigned_type_keys() {
        // an unsigned type key must not relabel a signed value as the email
        let params: CallbackParams = vec![
            ("openid.ns.ext1", AX_NS),
            ("openid.ext1.type.a", TYPE_EMAIL),
            ("openid.ext1.value.a", "ann@mokote.com"),
            ("openid.ext1.type.fn", TYPE_FIRST_NAME),
            ("openid.ext1.value.fn", "Ann"),
        ]
        .into_iter()
        .collect();

        let signed = SignedFields::parse("ns.ext1,ext1.value.a,ext1.type.fn,ext1.value.fn");
        let claims = AxClaims::extract(&params, &signed);
        assert_eq!(claims.email, None);
        assert_eq!(claims.first_name.as_deref(), Some("Ann"));

        let signed = SignedFields::parse("ns.ext1,ext1.type.a,ext1.value.a");
        let claims = AxClaims::extract(&params, &signed);
        assert_eq!(claims.email.as_deref(), Some("ann@mokote.com"));
    }

    #[test]
    fn test_extract_without_ax_namespace() {
        let params: CallbackParams = vec![("openid.ax.value.email", "ann@mokote.com")]
            .into_iter()
            .collect();
        let signed = SignedFields::parse("ax.value.email");
        assert_eq!(AxClaims::extract(&params, &signed), AxClaims::default());
    }
}
