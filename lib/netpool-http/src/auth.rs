/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use base64::prelude::*;
use http::HeaderValue;

use netpool_types::auth::Credentials;

pub fn basic_authorization(credentials: &Credentials) -> HeaderValue {
    let token = BASE64_STANDARD.encode(format!(
        "{}:{}",
        credentials.username.as_original(),
        credentials.password.as_original()
    ));
    let mut value = HeaderValue::from_str(&format!("Basic {token}"))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
    value.set_sensitive(true);
    value
}

/// Get the `realm` parameter of a `WWW-Authenticate` or `Proxy-Authenticate` value.
pub fn parse_realm(challenge: &str) -> Option<String> {
    let (_scheme, params) = challenge.trim().split_once(' ')?;
    let mut left = params;
    loop {
        let (name, rest) = left.split_once('=')?;
        let name = name.trim().trim_start_matches(',').trim();
        let rest = rest.trim_start();
        let (value, rest) = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"')?;
            (&quoted[..end], &quoted[end + 1..])
        } else {
            match rest.find(',') {
                Some(p) => (rest[..p].trim(), &rest[p..]),
                None => (rest.trim(), ""),
            }
        };
        if name.eq_ignore_ascii_case("realm") {
            return Some(value.to_string());
        }
        left = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpool_types::auth::{Password, Username};

    #[test]
    fn basic() {
        let credentials = Credentials::new(
            Username::from_original("user").unwrap(),
            Password::from_original("pass").unwrap(),
        );
        let value = basic_authorization(&credentials);
        assert_eq!(value, "Basic dXNlcjpwYXNz");
        assert!(value.is_sensitive());

        let credentials = Credentials::new(
            Username::from_original("user@domain").unwrap(),
            Password::from_original("p@ss:w0rd").unwrap(),
        );
        assert_eq!(
            basic_authorization(&credentials),
            "Basic dXNlckBkb21haW46cEBzczp3MHJk"
        );
    }

    #[test]
    fn realm() {
        assert_eq!(
            parse_realm(r#"Basic realm="private area""#).as_deref(),
            Some("private area")
        );
        assert_eq!(
            parse_realm(r#"Digest qop="auth, auth-int", realm=files, nonce="x""#).as_deref(),
            Some("files")
        );
        assert_eq!(parse_realm("Basic"), None);
        assert_eq!(parse_realm(r#"Bearer error="invalid_token""#), None);
    }
}
