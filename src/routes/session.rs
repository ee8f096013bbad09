use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, state::room::PlayerIdentity};

/// Header carrying the authenticated user id, set by the session proxy.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_AVATAR_HEADER: &str = "x-user-avatar";

/// Caller identity resolved from the proxy headers.
#[derive(Debug, Clone)]
pub struct SessionUser(pub PlayerIdentity);

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        let id = header(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing `{USER_ID_HEADER}` header")))?;
        let name = header(USER_NAME_HEADER).unwrap_or_else(|| id.clone());
        let avatar = header(USER_AVATAR_HEADER);

        Ok(Self(PlayerIdentity { id, name, avatar }))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode};

    use super::*;

    async fn extract(request: Request<()>) -> Result<SessionUser, AppError> {
        let (mut parts, ()) = request.into_parts();
        SessionUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn missing_id_is_unauthorized() {
        let err = extract(Request::new(())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let blank = Request::builder()
            .header(USER_ID_HEADER, "  ")
            .body(())
            .unwrap();
        assert!(extract(blank).await.is_err());
    }

    #[tokio::test]
    async fn name_defaults_to_id() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "u-7")
            .header(USER_AVATAR_HEADER, "https://cdn.example/u7.png")
            .body(())
            .unwrap();
        let SessionUser(user) = extract(request).await.unwrap();
        assert_eq!(user.id, "u-7");
        assert_eq!(user.name, "u-7");
        assert_eq!(user.avatar.as_deref(), Some("https://cdn.example/u7.png"));
    }
}
