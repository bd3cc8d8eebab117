//! Cookie transport for the token pair
//!
//! Both tokens are sent as http-only cookies so browser scripts never see
//! them. Non-browser clients read the same values from the response body.

use super::issuer::TokenPair;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Attach both tokens to the jar
pub fn with_session_cookies(jar: CookieJar, pair: &TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        pair.access_token.clone(),
        secure,
    ))
    .add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        pair.refresh_token.clone(),
        secure,
    ))
}

/// Expire both token cookies on the client
pub fn without_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"))
}

/// Access token from the request's cookie jar, if present and non-empty
pub fn access_token_from(jar: &CookieJar) -> Option<String> {
    non_empty(jar, ACCESS_TOKEN_COOKIE)
}

pub fn refresh_token_from(jar: &CookieJar) -> Option<String> {
    non_empty(jar, REFRESH_TOKEN_COOKIE)
}

fn non_empty(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn pair() -> TokenPair {
        TokenPair {
            access_token: "access-value".to_string(),
            refresh_token: "refresh-value".to_string(),
        }
    }

    #[test]
    fn test_cookies_are_http_only() {
        let jar = with_session_cookies(CookieJar::new(), &pair(), true);

        let access = jar.get(ACCESS_TOKEN_COOKIE).unwrap();
        assert_eq!(access.value(), "access-value");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.path(), Some("/"));

        assert_eq!(refresh_token_from(&jar).as_deref(), Some("refresh-value"));
        assert_eq!(access_token_from(&jar).as_deref(), Some("access-value"));
    }

    #[test]
    fn test_set_cookie_headers() {
        let jar = with_session_cookies(CookieJar::new(), &pair(), false);
        let response = jar.into_response();

        let headers: Vec<String> = response
            .headers()
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();

        assert_eq!(headers.len(), 2);
        assert!(headers.iter().all(|h| h.contains("HttpOnly")));
        assert!(headers.iter().any(|h| h.starts_with("accessToken=access-value")));
        assert!(headers.iter().any(|h| h.starts_with("refreshToken=refresh-value")));
    }

    #[test]
    fn test_removal_clears_values() {
        let jar = with_session_cookies(CookieJar::new(), &pair(), true);
        let jar = without_session_cookies(jar);

        assert_eq!(access_token_from(&jar), None);
        assert_eq!(refresh_token_from(&jar), None);
    }
}
