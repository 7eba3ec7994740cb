use axum::http::HeaderMap;

/// What a bearer token is allowed to do. Staff tokens drive the booking write
/// path (reserve/release); only admins may open or edit capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Staff,
}

/// Static bearer-token table. Token issuance itself lives with the external
/// auth provider; this service only maps opaque tokens to roles.
pub struct TokenMap {
    admin_token: Option<String>,
    staff_token: Option<String>,
}

impl TokenMap {
    pub fn new(admin_token: Option<String>, staff_token: Option<String>) -> Self {
        Self {
            admin_token,
            staff_token,
        }
    }

    pub fn role_for(&self, token: &str) -> Option<Role> {
        if self.admin_token.as_deref() == Some(token) {
            return Some(Role::Admin);
        }
        if self.staff_token.as_deref() == Some(token) {
            return Some(Role::Staff);
        }
        None
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn tokens() -> TokenMap {
        TokenMap::new(Some("admin-secret".into()), Some("staff-secret".into()))
    }

    #[test]
    fn role_lookup() {
        let t = tokens();
        assert_eq!(t.role_for("admin-secret"), Some(Role::Admin));
        assert_eq!(t.role_for("staff-secret"), Some(Role::Staff));
        assert_eq!(t.role_for("nope"), None);
        assert_eq!(t.role_for(""), None);
    }

    #[test]
    fn no_tokens_configured_rejects_everything() {
        let t = TokenMap::new(None, None);
        assert_eq!(t.role_for("admin-secret"), None);
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer admin-secret"),
        );
        assert_eq!(bearer_token(&headers), Some("admin-secret"));

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwdw=="),
        );
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer "),
        );
        assert_eq!(bearer_token(&headers), None);
    }
}
