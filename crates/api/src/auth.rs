//! Caller identity resolved from request headers.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user in `X-User-Id` and marks administrators with `X-User-Role: admin`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::CustomerId;
use domain::Actor;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: CustomerId,
    pub is_admin: bool,
}

impl Caller {
    /// Who to record on events this caller causes.
    pub fn actor(&self) -> Actor {
        if self.is_admin {
            Actor::Admin(self.id.to_string())
        } else {
            Actor::Customer(self.id)
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<CustomerId>().ok())
            .ok_or(ApiError::Unauthorized)?;

        let is_admin = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case("admin"));

        Ok(Caller { id, is_admin })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn resolve(headers: &[(&str, &str)]) -> Result<Caller, ApiError> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn customer_from_user_id() {
        let id = CustomerId::new();
        let caller = resolve(&[(USER_ID_HEADER, &id.to_string())]).await.unwrap();
        assert_eq!(caller.id, id);
        assert!(!caller.is_admin);
        assert_eq!(caller.actor(), Actor::Customer(id));
        assert!(matches!(caller.require_admin(), Err(ApiError::Forbidden)));
    }

    #[tokio::test]
    async fn admin_role_is_recognised() {
        let id = CustomerId::new();
        let caller = resolve(&[(USER_ID_HEADER, &id.to_string()), (USER_ROLE_HEADER, "Admin")])
            .await
            .unwrap();
        assert!(caller.is_admin);
        assert!(caller.require_admin().is_ok());
        assert_eq!(caller.actor(), Actor::Admin(id.to_string()));
    }

    #[tokio::test]
    async fn missing_or_garbled_identity_is_unauthorized() {
        assert!(matches!(resolve(&[]).await, Err(ApiError::Unauthorized)));
        assert!(matches!(
            resolve(&[(USER_ID_HEADER, "bob")]).await,
            Err(ApiError::Unauthorized)
        ));
    }
}
