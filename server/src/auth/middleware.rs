//! Authentication extractor.
//!
//! The bearer token names the user. In development mode (no `AUTH_SECRET`)
//! the token is the user ID itself; with a secret configured it must be
//! `{userId}:{secret}`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};

use crate::error::AppError;
use crate::AppState;

/// Authenticated user extracted from request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

impl AuthUser {
    /// Resolve the user named by a bearer token.
    pub fn from_token(token: &str, secret: Option<&str>) -> Option<Self> {
        let user_id = match secret {
            Some(secret) => {
                let (user_id, given) = token.rsplit_once(':')?;
                if given != secret {
                    return None;
                }
                user_id
            }
            None => token,
        };

        if user_id.is_empty() {
            return None;
        }
        Some(AuthUser {
            user_id: user_id.to_string(),
        })
    }

    /// A user may only touch documents under its own path.
    pub fn authorize(&self, path_user_id: &str) -> Result<(), AppError> {
        if self.user_id == path_user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} may not access documents of {}",
                self.user_id, path_user_id
            )))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                let token = header.trim_start_matches("Bearer ").trim();
                AuthUser::from_token(token, state.config.auth_secret.as_deref())
                    .ok_or((StatusCode::UNAUTHORIZED, "Invalid bearer token"))
            }
            Some(_) => Err((
                StatusCode::UNAUTHORIZED,
                "Invalid authorization header format",
            )),
            None => Err((StatusCode::UNAUTHORIZED, "Missing authorization header")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_tokens_name_the_user() {
        let user = AuthUser::from_token("user-1", None).unwrap();
        assert_eq!(user.user_id, "user-1");
        assert!(AuthUser::from_token("", None).is_none());
    }

    #[test]
    fn secret_tokens_must_match() {
        let user = AuthUser::from_token("user-1:s3cret", Some("s3cret")).unwrap();
        assert_eq!(user.user_id, "user-1");

        assert!(AuthUser::from_token("user-1:wrong", Some("s3cret")).is_none());
        assert!(AuthUser::from_token("user-1", Some("s3cret")).is_none());
        assert!(AuthUser::from_token(":s3cret", Some("s3cret")).is_none());
    }

    #[test]
    fn users_only_reach_their_own_path() {
        let user = AuthUser::from_token("user-1", None).unwrap();
        assert!(user.authorize("user-1").is_ok());
        assert!(matches!(user.authorize("user-2"), Err(AppError::Forbidden(_))));
    }
}
