//! Calling principal, as asserted by the upstream authenticator.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::domain::types::UserRole;

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: UserRole,
}

/// A principal whose role is `admin`.
#[derive(Debug, Clone, Copy)]
pub struct AdminPrincipal(pub Principal);

#[derive(Debug, Error)]
pub enum PrincipalRejection {
    #[error("missing `{0}` header")]
    Missing(&'static str),
    #[error("malformed `{header}` header: {reason}")]
    Malformed { header: &'static str, reason: String },
    #[error("role `{0}` may not access this resource")]
    Forbidden(&'static str),
}

impl IntoResponse for PrincipalRejection {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            Self::Missing(_) | Self::Malformed { .. } => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        };
        let report = ErrorReport::from_error("infra::http::principal", status, &self);
        let body = json!({ "error": { "code": code, "message": self.to_string() } });
        let mut response = (status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

fn header<'a>(parts: &'a Parts, name: &'static str) -> Result<&'a str, PrincipalRejection> {
    parts
        .headers
        .get(name)
        .ok_or(PrincipalRejection::Missing(name))?
        .to_str()
        .map(str::trim)
        .map_err(|err| PrincipalRejection::Malformed {
            header: name,
            reason: err.to_string(),
        })
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = PrincipalRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, PRINCIPAL_ID_HEADER)?;
        let id = Uuid::parse_str(id).map_err(|err| PrincipalRejection::Malformed {
            header: PRINCIPAL_ID_HEADER,
            reason: err.to_string(),
        })?;

        let role = header(parts, PRINCIPAL_ROLE_HEADER)?;
        let role = UserRole::parse(role).ok_or_else(|| PrincipalRejection::Malformed {
            header: PRINCIPAL_ROLE_HEADER,
            reason: format!("unknown role `{role}`"),
        })?;

        Ok(Self { id, role })
    }
}

impl<S> FromRequestParts<S> for AdminPrincipal
where
    S: Send + Sync,
{
    type Rejection = PrincipalRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        match principal.role {
            UserRole::Admin => Ok(Self(principal)),
            other => Err(PrincipalRejection::Forbidden(other.as_str())),
        }
    }
}
