//! Integration and security tests for the OpenID implementation.

#[cfg(test)]
mod integration_tests {
    use crate::ax::{AX_NS, TYPE_EMAIL, TYPE_FIRST_NAME, TYPE_LAST_NAME};
    use crate::{InMemoryNonceStore, OpenIdConfig, OpenIdError, OpenIdProvider};
    use chrono::Utc;
    use fedauth_identity_core::{CallbackParams, IdentityError, IdentityProvider};
    use std::sync::Arc;
    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RETURN_TO: &str = "http://localhost:3000/login/?next=%2Fsecret";

    async fn setup_mock_provider() -> (MockServer, OpenIdProvider) {
        let mock_server = MockServer::start().await;
        let config = OpenIdConfig::google_apps("mokote.com")
            .with_endpoint(format!("{}/a/mokote.com/o8/ud?be=o8", mock_server.uri()));
        let provider = OpenIdProvider::new(config, Arc::new(InMemoryNonceStore::new())).unwrap();
        (mock_server, provider)
    }

    fn fresh_nonce(unique: &str) -> String {
        format!("{}{}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"), unique)
    }

    fn positive_assertion(endpoint: &str, nonce: &str, email: &str) -> CallbackParams {
        vec![
            ("next", "/secret"),
            ("openid.ns", "http://specs.openid.net/auth/2.0"),
            ("openid.mode", "id_res"),
            ("openid.op_endpoint", endpoint),
            ("openid.claimed_id", "https://www.google.com/a/mokote.com/o8/ud?id=42"),
            ("openid.identity", "https://www.google.com/a/mokote.com/o8/ud?id=42"),
            ("openid.return_to", RETURN_TO),
            ("openid.response_nonce", nonce),
            ("openid.assoc_handle", "AOQobUd"),
            (
                "openid.signed",
                "op_endpoint,claimed_id,identity,return_to,response_nonce,assoc_handle,ns.ext1,ext1.mode,ext1.type.email,ext1.value.email,ext1.type.firstname,ext1.value.firstname,ext1.type.lastname,ext1.value.lastname",
            ),
            ("openid.sig", "c2lnbmF0dXJl"),
            ("openid.ns.ext1", AX_NS),
            ("openid.ext1.mode", "fetch_response"),
            ("openid.ext1.type.email", TYPE_EMAIL),
            ("openid.ext1.value.email", email),
            ("openid.ext1.type.firstname", TYPE_FIRST_NAME),
            ("openid.ext1.value.firstname", "Ann"),
            ("openid.ext1.type.lastname", TYPE_LAST_NAME),
            ("openid.ext1.value.lastname", "Lee"),
        ]
        .into_iter()
        .collect()
    }

    fn current_url(params: &CallbackParams) -> Url {
        let mut url = Url::parse("http://localhost:3000/login/").unwrap();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params.iter() {
                query.append_pair(key, value);
            }
        }
        url
    }

    async fn mount_verdict(mock_server: &MockServer, body: &str) {
        Mock::given(method("POST"))
            .and(path("/a/mokote.com/o8/ud"))
            .and(body_string_contains("openid.mode=check_authentication"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_full_openid_flow() {
        let (mock_server, provider) = setup_mock_provider().await;
        mount_verdict(
            &mock_server,
            "ns:http://specs.openid.net/auth/2.0\nis_valid:true\n",
        )
        .await;

        let return_to = Url::parse(RETURN_TO).unwrap();
        let redirect = provider.begin(&return_to).await.unwrap();
        assert!(redirect.as_str().starts_with(&provider.client().endpoint().to_string()));

        let endpoint = provider.client().endpoint().to_string();
        let params = positive_assertion(&endpoint, &fresh_nonce("a1"), "ann@mokote.com");
        let identity = provider
            .verify(&current_url(&params), &params)
            .await
            .unwrap();

        assert_eq!(identity.email, "ann@mokote.com");
        assert_eq!(identity.domain, "mokote.com");
        assert_eq!(identity.name.as_deref(), Some("Ann Lee"));
        assert_eq!(
            identity.subject,
            "https://www.google.com/a/mokote.com/o8/ud?id=42"
        );
    }

    #[tokio::test]
    async fn test_nonce_replay_is_rejected() {
        let (mock_server, provider) = setup_mock_provider().await;
        mount_verdict(&mock_server, "is_valid:true\n").await;

        let endpoint = provider.client().endpoint().to_string();
        let params = positive_assertion(&endpoint, &fresh_nonce("replay"), "ann@mokote.com");
        let url = current_url(&params);

        assert!(provider.verify(&url, &params).await.is_ok());

        let replay = provider.client().verify(&url, &params).await;
        assert!(matches!(replay, Err(OpenIdError::NonceReplay)));
    }

    #[tokio::test]
    async fn test_provider_refusal_is_rejected() {
        let (mock_server, provider) = setup_mock_provider().await;
        mount_verdict(&mock_server, "is_valid:false\n").await;

        let endpoint = provider.client().endpoint().to_string();
        let params = positive_assertion(&endpoint, &fresh_nonce("b2"), "ann@mokote.com");

        let result = provider.verify(&current_url(&params), &params).await;
        assert!(matches!(result, Err(IdentityError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_provider_http_error_is_rejected() {
        let (mock_server, provider) = setup_mock_provider().await;
        Mock::given(method("POST"))
            .and(path("/a/mokote.com/o8/ud"))
            .respond_with(ResponseTemplate::new(500).set_body_string("is_valid:true\n"))
            .mount(&mock_server)
            .await;

        let endpoint = provider.client().endpoint().to_string();
        let params = positive_assertion(&endpoint, &fresh_nonce("c3"), "ann@mokote.com");

        let result = provider.client().verify(&current_url(&params), &params).await;
        assert!(matches!(result, Err(OpenIdError::VerificationFailed(_))));
    }

    #[tokio::test]
    async fn test_foreign_endpoint_is_never_contacted() {
        let (mock_server, provider) = setup_mock_provider().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("is_valid:true\n"))
            .expect(0)
            .mount(&mock_server)
            .await;

        let params = positive_assertion(
            "https://evil.example/o8/ud",
            &fresh_nonce("d4"),
            "ann@mokote.com",
        );

        let result = provider.client().verify(&current_url(&params), &params).await;
        assert!(matches!(result, Err(OpenIdError::EndpointMismatch { .. })));
    }

    #[tokio::test]
    async fn test_missing_email_is_incomplete() {
        let (mock_server, provider) = setup_mock_provider().await;
        mount_verdict(&mock_server, "is_valid:true\n").await;

        let endpoint = provider.client().endpoint().to_string();
        let params = positive_assertion(&endpoint, &fresh_nonce("e5"), "");

        let result = provider.verify(&current_url(&params), &params).await;
        assert!(matches!(result, Err(IdentityError::IncompleteClaims(_))));
    }

    #[tokio::test]
    async fn test_unsigned_return_to_is_rejected() {
        let (_mock_server, provider) = setup_mock_provider().await;

        let endpoint = provider.client().endpoint().to_string();
        let mut params = positive_assertion(&endpoint, &fresh_nonce("f6"), "ann@mokote.com");
        let signed = "op_endpoint,claimed_id,identity,response_nonce,assoc_handle";
        params = params
            .iter()
            .map(|(k, v)| {
                if k == "openid.signed" {
                    (k.to_string(), signed.to_string())
                } else {
                    (k.to_string(), v.to_string())
                }
            })
            .collect();

        let result = provider.client().verify(&current_url(&params), &params).await;
        assert!(matches!(result, Err(OpenIdError::UnsignedField(field)) if field == "return_to"));
    }
}
