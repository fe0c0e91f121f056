//! OpenID 2.0 protocol types.

use crate::ax::AxClaims;
use crate::error::{OpenIdError, OpenIdResult};
use fedauth_identity_core::CallbackParams;
use std::collections::{HashMap, HashSet};

pub const OPENID_NS: &str = "http://specs.openid.net/auth/2.0";
pub const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";

/// Fields a positive assertion must sign whenever they are present.
const MUST_SIGN: &[&str] = &[
    "op_endpoint",
    "return_to",
    "response_nonce",
    "assoc_handle",
    "claimed_id",
    "identity",
];

/// The field list of `openid.signed`, without the `openid.` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedFields {
    fields: HashSet<String>,
}

impl SignedFields {
    pub fn parse(list: &str) -> Self {
        Self {
            fields: list
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    pub fn from_params(params: &CallbackParams) -> OpenIdResult<Self> {
        let list = params
            .get("openid.signed")
            .ok_or_else(|| OpenIdError::InvalidResponse("missing openid.signed".to_string()))?;
        Ok(Self::parse(list))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Checks that every mandatory field present in `params` is signed.
    pub fn require_mandatory(&self, params: &CallbackParams) -> OpenIdResult<()> {
        for field in MUST_SIGN {
            let present = params.contains(&format!("openid.{}", field));
            let optional = matches!(*field, "claimed_id" | "identity");
            if !present && optional {
                continue;
            }
            if !self.contains(field) {
                return Err(OpenIdError::UnsignedField(field.to_string()));
            }
        }
        Ok(())
    }
}

/// Parses a body in OpenID key-value form (`key:value` per line).
pub fn parse_key_value_form(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Response to a `check_authentication` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckAuthenticationResponse {
    pub is_valid: bool,
    pub invalidate_handle: Option<String>,
}

impl CheckAuthenticationResponse {
    pub fn parse(body: &str) -> Self {
        let fields = parse_key_value_form(body);
        Self {
            is_valid: fields.get("is_valid").is_some_and(|v| v == "true"),
            invalidate_handle: fields.get("invalidate_handle").cloned(),
        }
    }
}

/// Claims carried by a verified positive assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionClaims {
    pub claimed_id: Option<String>,
    pub ax: AxClaims,
}
