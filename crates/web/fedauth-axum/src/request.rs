//! Helpers for reading the incoming request: its public URL, callback
//! parameters and redirect targets.

use crate::error::{AuthError, AuthResult};
use axum::http::header::{CONTENT_TYPE, HOST, REFERER};
use axum::http::{HeaderMap, Method, Uri};
use fedauth_identity_core::CallbackParams;
use url::Url;
use url::form_urlencoded;

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Absolute URL the browser used for this request.
pub(crate) fn request_url(
    external_base: Option<&Url>,
    headers: &HeaderMap,
    uri: &Uri,
) -> AuthResult<Url> {
    let mut url = match external_base {
        Some(base) => base.clone(),
        None => {
            let host = headers
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .or_else(|| uri.authority().map(|a| a.as_str()))
                .ok_or_else(|| AuthError::RequestUrl("missing Host header".to_string()))?;
            let scheme = headers
                .get(FORWARDED_PROTO)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|s| *s == "http" || *s == "https")
                .unwrap_or("http");
            Url::parse(&format!("{}://{}", scheme, host))
                .map_err(|e| AuthError::RequestUrl(format!("bad Host header: {}", e)))?
        }
    };

    // Only the origin of the base is used, the path comes from the request
    url.set_path(uri.path());
    url.set_query(uri.query());
    Ok(url)
}

/// Query parameters, plus the form body when the provider posted its response.
pub(crate) fn callback_params(
    method: &Method,
    headers: &HeaderMap,
    uri: &Uri,
    body: &[u8],
) -> CallbackParams {
    let mut params: CallbackParams = uri
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let is_form = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(FORM_CONTENT_TYPE));

    if *method == Method::POST && is_form {
        for (key, value) in form_urlencoded::parse(body).into_owned() {
            params.insert(key, value);
        }
    }

    params
}

/// Accepts only local absolute paths, so `next` cannot send the user off-site.
pub(crate) fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    let local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && !next.chars().any(|c| c.is_control());
    local.then(|| next.to_string())
}

/// Path and query of the `Referer` when it points at this application.
pub(crate) fn same_origin_referer(headers: &HeaderMap, current: &Url) -> Option<String> {
    let referer = headers.get(REFERER)?.to_str().ok()?;
    let referer = Url::parse(referer).ok()?;
    if referer.origin() != current.origin() {
        return None;
    }

    let mut target = referer.path().to_string();
    if let Some(query) = referer.query() {
        target.push('?');
        target.push_str(query);
    }
    Some(target)
}

/// `login_route?next=<target>`
pub(crate) fn login_redirect(login_route: &str, target: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", target)
        .finish();
    format!("{}?{}", login_route, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_request_url_from_headers() {
        let uri: Uri = "/login/?next=%2Fdocs".parse().unwrap();
        let url = request_url(None, &headers(&[("host", "app.mokote.com")]), &uri).unwrap();
        assert_eq!(url.as_str(), "http://app.mokote.com/login/?next=%2Fdocs");

        let proxied = headers(&[("host", "app.mokote.com"), ("x-forwarded-proto", "https")]);
        let url = request_url(None, &proxied, &uri).unwrap();
        assert_eq!(url.scheme(), "https");

        assert!(request_url(None, &HeaderMap::new(), &uri).is_err());
    }

    #[test]
    fn test_request_url_from_external_base() {
        let base = Url::parse("https://mokote.com").unwrap();
        let uri: Uri = "/login/?next=%2Fa".parse().unwrap();
        let url = request_url(Some(&base), &headers(&[("host", "internal:8080")]), &uri).unwrap();
        assert_eq!(url.as_str(), "https://mokote.com/login/?next=%2Fa");

        // A stray path on the base never leaks into the request URL
        let base = Url::parse("https://mokote.com/app/").unwrap();
        let url = request_url(Some(&base), &HeaderMap::new(), &uri).unwrap();
        assert_eq!(url.as_str(), "https://mokote.com/login/?next=%2Fa");
    }

    #[test]
    fn test_callback_params_merge_form_body() {
        let uri: Uri = "/login/?next=%2Fa&openid.mode=id_res".parse().unwrap();
        let form = headers(&[("content-type", "application/x-www-form-urlencoded")]);
        let params = callback_params(
            &Method::POST,
            &form,
            &uri,
            b"openid.mode=cancel&openid.sig=abc",
        );

        assert_eq!(params.get("next"), Some("/a"));
        assert_eq!(params.get("openid.mode"), Some("id_res"));
        assert_eq!(params.get("openid.sig"), Some("abc"));

        let params = callback_params(&Method::GET, &form, &uri, b"openid.sig=abc");
        assert!(!params.contains("openid.sig"));
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/docs?page=2")).as_deref(), Some("/docs?page=2"));
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("/a\r\nSet-Cookie: x")), None);
        assert_eq!(safe_next(Some("docs")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_same_origin_referer() {
        let current = Url::parse("http://app.mokote.com/logout/").unwrap();

        let local = headers(&[("referer", "http://app.mokote.com/reports?id=4")]);
        assert_eq!(
            same_origin_referer(&local, &current).as_deref(),
            Some("/reports?id=4")
        );

        let foreign = headers(&[("referer", "http://evil.example/reports")]);
        assert_eq!(same_origin_referer(&foreign, &current), None);
    }

    #[test]
    fn test_login_redirect_encodes_target() {
        assert_eq!(
            login_redirect("/login/", "/docs?a=1&b=2"),
            "/login/?next=%2Fdocs%3Fa%3D1%26b%3D2"
        );
    }
}
