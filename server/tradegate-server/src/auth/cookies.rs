//! Credential transport over headers and cookies
//!
//! Browsers carry credentials in cookies; programmatic clients may send a
//! bearer header instead. When both are present the header wins, so a
//! stale cookie never shadows an explicitly supplied token.

use crate::auth::tokens::TokenPair;
use crate::config::GatewayConfig;
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

/// Credentials found on an incoming request.
#[derive(Debug, Default, Clone)]
pub struct ExtractedCredentials {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub session_id: Option<Uuid>,
    /// Persistence marker set at login; rotation re-issues cookies with the
    /// same lifetime class.
    pub remember: bool,
}

impl ExtractedCredentials {
    /// Pull credentials out of request headers.
    pub fn extract(headers: &HeaderMap, config: &GatewayConfig) -> Self {
        let jar = CookieJar::from_headers(headers);

        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let access = bearer.or_else(|| {
            jar.get(&config.access_cookie)
                .map(|c| c.value().to_string())
        });

        let refresh = jar
            .get(&config.refresh_cookie)
            .map(|c| c.value().to_string());

        let session_id = jar
            .get(&config.session_cookie)
            .and_then(|c| Uuid::parse_str(c.value()).ok());

        let remember = jar.get(&config.remember_cookie).is_some();

        Self {
            access,
            refresh,
            session_id,
            remember,
        }
    }
}

fn base_cookie(name: &str, value: String, config: &GatewayConfig) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.to_string(), value);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(config.cookie_secure);
    cookie
}

/// Cookies carrying a freshly issued credential pair.
///
/// The refresh cookie is HttpOnly; page scripts never see it. The access
/// cookie stays readable so client code can attach it as a bearer header.
/// With `remember` the cookies persist for the refresh lifetime, otherwise
/// they are session cookies the browser drops on close.
pub fn credential_cookies(
    pair: &TokenPair,
    config: &GatewayConfig,
    remember: bool,
) -> Vec<Cookie<'static>> {
    let mut access = base_cookie(&config.access_cookie, pair.access.clone(), config);
    let mut refresh = base_cookie(&config.refresh_cookie, pair.refresh.clone(), config);
    refresh.set_http_only(true);
    let mut session = base_cookie(&config.session_cookie, pair.session_id.to_string(), config);
    session.set_http_only(true);

    if remember {
        let refresh_age = time::Duration::seconds(config.refresh_token_ttl_secs);
        access.set_max_age(refresh_age);
        refresh.set_max_age(refresh_age);
        session.set_max_age(refresh_age);
    }

    let mut cookies = vec![access, refresh, session];
    if remember {
        let mut marker = base_cookie(&config.remember_cookie, "1".to_string(), config);
        marker.set_max_age(time::Duration::seconds(config.refresh_token_ttl_secs));
        cookies.push(marker);
    }
    cookies
}

/// Expired replacements for every credential cookie.
pub fn clearing_cookies(config: &GatewayConfig) -> Vec<Cookie<'static>> {
    [
        &config.access_cookie,
        &config.refresh_cookie,
        &config.session_cookie,
        &config.remember_cookie,
    ]
    .into_iter()
    .map(|name| {
        let mut cookie = base_cookie(name, String::new(), config);
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    })
    .collect()
}

/// Append `Set-Cookie` headers to an outgoing response.
pub fn append_cookies(response: &mut Response, cookies: &[Cookie<'static>]) {
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(
                header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let config = GatewayConfig::default();
        let headers = headers_with(&[
            ("authorization", "Bearer header-token"),
            ("cookie", "tg_access=cookie-token"),
        ]);

        let creds = ExtractedCredentials::extract(&headers, &config);
        assert_eq!(creds.access.as_deref(), Some("header-token"));
    }

    #[test]
    fn cookies_supply_all_three_credentials() {
        let config = GatewayConfig::default();
        let sid = Uuid::new_v4();
        let cookie_line = format!("tg_access=a; tg_refresh=r; tg_session={sid}");
        let headers = headers_with(&[("cookie", &cookie_line)]);

        let creds = ExtractedCredentials::extract(&headers, &config);
        assert_eq!(creds.access.as_deref(), Some("a"));
        assert_eq!(creds.refresh.as_deref(), Some("r"));
        assert_eq!(creds.session_id, Some(sid));
    }

    #[test]
    fn malformed_session_cookie_is_ignored() {
        let config = GatewayConfig::default();
        let headers = headers_with(&[("cookie", "tg_session=not-a-uuid")]);

        let creds = ExtractedCredentials::extract(&headers, &config);
        assert!(creds.session_id.is_none());
    }

    #[test]
    fn refresh_cookie_is_http_only() {
        let config = GatewayConfig::default();
        let pair = TokenPair {
            access: "a".into(),
            refresh: "r".into(),
            session_id: Uuid::new_v4(),
            access_expires_at: 0,
            refresh_expires_at: 0,
        };

        let cookies = credential_cookies(&pair, &config, false);
        let refresh = cookies
            .iter()
            .find(|c| c.name() == config.refresh_cookie)
            .unwrap();
        assert_eq!(refresh.http_only(), Some(true));
        // Session cookies: no Max-Age unless remembered.
        assert!(refresh.max_age().is_none());
    }

    #[test]
    fn remember_sets_persistence_and_marker() {
        let config = GatewayConfig::default();
        let pair = TokenPair {
            access: "a".into(),
            refresh: "r".into(),
            session_id: Uuid::new_v4(),
            access_expires_at: 0,
            refresh_expires_at: 0,
        };

        let cookies = credential_cookies(&pair, &config, true);
        assert!(cookies.iter().any(|c| c.name() == config.remember_cookie));
        assert!(cookies.iter().all(|c| c.max_age().is_some()));
    }

    #[test]
    fn clearing_cookies_expire_everything() {
        let config = GatewayConfig::default();
        let cookies = clearing_cookies(&config);
        assert_eq!(cookies.len(), 4);
        assert!(cookies
            .iter()
            .all(|c| c.max_age() == Some(time::Duration::ZERO)));
    }
}
