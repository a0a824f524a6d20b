//! Session extraction from the identity headers set by the auth proxy.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{ROLE_HEADER, Role, Session, USER_ID_HEADER, UserId};

use crate::error::ApiError;

/// The caller's session. Requests without `x-user-id` are anonymous.
#[derive(Debug, Clone, Copy)]
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw_user) = header(parts, USER_ID_HEADER)? else {
            return Ok(CurrentSession(Session::Anonymous));
        };
        let user_id = UserId::parse(raw_user.trim())
            .map_err(|e| ApiError::BadRequest(format!("Invalid {USER_ID_HEADER} header: {e}")))?;
        let role = match header(parts, ROLE_HEADER)? {
            Some(raw) => raw.trim().parse::<Role>().map_err(ApiError::BadRequest)?,
            None => Role::Customer,
        };

        Ok(CurrentSession(Session::Authenticated { user_id, role }))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::BadRequest(format!("Invalid {name} header")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Session, ApiError> {
        let (mut parts, _) = request.into_parts();
        CurrentSession::from_request_parts(&mut parts, &())
            .await
            .map(|s| s.0)
    }

    #[tokio::test]
    async fn test_missing_headers_mean_anonymous() {
        let session = extract(Request::builder().body(()).unwrap()).await.unwrap();
        assert_eq!(session, Session::Anonymous);
    }

    #[tokio::test]
    async fn test_role_defaults_to_customer() {
        let user = UserId::new();
        let request = Request::builder()
            .header(USER_ID_HEADER, user.to_string())
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap(), Session::customer(user));
    }

    #[tokio::test]
    async fn test_admin_role_is_read() {
        let user = UserId::new();
        let request = Request::builder()
            .header(USER_ID_HEADER, user.to_string())
            .header(ROLE_HEADER, "admin")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap(), Session::admin(user));
    }

    #[tokio::test]
    async fn test_malformed_headers_are_rejected() {
        let bad_user = Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(
            extract(bad_user).await,
            Err(ApiError::BadRequest(_))
        ));

        let bad_role = Request::builder()
            .header(USER_ID_HEADER, UserId::new().to_string())
            .header(ROLE_HEADER, "root")
            .body(())
            .unwrap();
        assert!(matches!(
            extract(bad_role).await,
            Err(ApiError::BadRequest(_))
        ));
    }
}
