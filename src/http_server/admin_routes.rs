//! Admin Routes
//!
//! Code issuance and credential import, behind the admin bearer token.
//! Unlike the webhook, this surface uses real HTTP status codes.

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use uuid::Uuid;

use super::admin_auth;
use super::server::GateState;
use crate::access::{Role, Tier};
use crate::core::error::GateError;
use crate::credential::{BulkRowError, CreateCredential, Credential, CredentialRepository};
use crate::onboarding::PrincipalProfile;
use crate::verification::{BulkIssueRequest, CodeStatus, IssueRequest, IssuedCode, VerificationCode};

/// Admin routes
pub fn admin_routes(state: Arc<GateState>) -> Router {
    Router::new()
        .route("/codes", post(issue_code_handler).get(list_codes_handler))
        .route("/codes/bulk", post(issue_bulk_handler))
        .route("/codes/disable", post(disable_code_handler))
        .route("/credentials/bulk", post(import_credentials_handler))
        .route("/profiles/access", post(set_access_handler))
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl From<GateError> for ErrorResponse {
    fn from(err: GateError) -> Self {
        Self {
            code: err.status_code(),
            error: err.to_string(),
        }
    }
}

type AdminError = (StatusCode, Json<ErrorResponse>);

fn reject(err: GateError) -> AdminError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(err)))
}

/// Bound credential summary returned with issued codes
#[derive(Debug, Serialize)]
pub struct CredentialSummary {
    pub id: String,
    pub external_id: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub status: String,
}

impl From<&Credential> for CredentialSummary {
    fn from(cred: &Credential) -> Self {
        Self {
            id: cred.id.to_string(),
            external_id: cred.external_id.clone(),
            full_name: cred.full_name.clone(),
            email: cred.email.clone(),
            department: cred.department.clone(),
            status: cred.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub code: String,
    pub status: String,
    pub role: String,
    pub tier: String,
    pub max_uses: u32,
    pub current_uses: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialSummary>,
}

impl CodeResponse {
    fn from_issued(issued: &IssuedCode) -> Self {
        let mut response = Self::from_code(&issued.code);
        response.credential = issued.credential.as_ref().map(CredentialSummary::from);
        response
    }

    fn from_code(code: &VerificationCode) -> Self {
        Self {
            code: code.code.clone(),
            status: code.status.as_str().to_string(),
            role: code.role.as_str().to_string(),
            tier: code.tier.as_str().to_string(),
            max_uses: code.max_uses,
            current_uses: code.current_uses,
            expires_at: code.expires_at.map(|t| t.to_rfc3339()),
            namespace: code.namespace.clone(),
            credential: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkCodesResponse {
    pub codes: Vec<CodeResponse>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListCodesParams {
    #[serde(default)]
    pub status: Option<CodeStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DisableCodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAccessRequest {
    pub profile_id: Uuid,
    pub role: Role,
    pub tier: Tier,
}

#[derive(Debug, Deserialize)]
pub struct ImportCredentialsRequest {
    pub credentials: Vec<CreateCredential>,
}

#[derive(Debug, Serialize)]
pub struct ImportCredentialsResponse {
    pub created: Vec<CredentialSummary>,
    pub errors: Vec<BulkRowError>,
}

// ==================
// Handlers
// ==================

/// Issue one code
async fn issue_code_handler(
    State(state): State<Arc<GateState>>,
    headers: HeaderMap,
    Json(request): Json<IssueRequest>,
) -> Result<(StatusCode, Json<CodeResponse>), AdminError> {
    admin_auth::authorize(&headers, state.config.admin_token_hash.as_deref()).map_err(reject)?;

    let issued = state.verification.issue(request).map_err(reject)?;
    Ok((StatusCode::CREATED, Json(CodeResponse::from_issued(&issued))))
}

/// Issue a batch of codes, up to the configured ceiling
async fn issue_bulk_handler(
    State(state): State<Arc<GateState>>,
    headers: HeaderMap,
    Json(request): Json<BulkIssueRequest>,
) -> Result<(StatusCode, Json<BulkCodesResponse>), AdminError> {
    admin_auth::authorize(&headers, state.config.admin_token_hash.as_deref()).map_err(reject)?;

    let issued = state.verification.issue_bulk(request).map_err(reject)?;
    let codes: Vec<CodeResponse> = issued.iter().map(CodeResponse::from_issued).collect();
    let count = codes.len();

    Ok((
        StatusCode::CREATED,
        Json(BulkCodesResponse { codes, count }),
    ))
}

/// List codes, optionally filtered by status
async fn list_codes_handler(
    State(state): State<Arc<GateState>>,
    headers: HeaderMap,
    Query(params): Query<ListCodesParams>,
) -> Result<Json<BulkCodesResponse>, AdminError> {
    admin_auth::authorize(&headers, state.config.admin_token_hash.as_deref()).map_err(reject)?;

    let codes = state.verification.list(params.status).map_err(reject)?;
    let codes: Vec<CodeResponse> = codes.iter().map(CodeResponse::from_code).collect();
    let count = codes.len();

    Ok(Json(BulkCodesResponse { codes, count }))
}

/// Administratively disable an active code
async fn disable_code_handler(
    State(state): State<Arc<GateState>>,
    headers: HeaderMap,
    Json(request): Json<DisableCodeRequest>,
) -> Result<StatusCode, AdminError> {
    admin_auth::authorize(&headers, state.config.admin_token_hash.as_deref()).map_err(reject)?;

    state.verification.disable(&request.code).map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Administrative role/tier change for an existing principal
async fn set_access_handler(
    State(state): State<Arc<GateState>>,
    headers: HeaderMap,
    Json(request): Json<SetAccessRequest>,
) -> Result<Json<PrincipalProfile>, AdminError> {
    admin_auth::authorize(&headers, state.config.admin_token_hash.as_deref()).map_err(reject)?;

    let profile = state
        .protocol
        .set_role_tier(request.profile_id, request.role, request.tier)
        .map_err(reject)?;
    Ok(Json(profile))
}

/// Bulk credential import; a bad row yields an error entry, never a total
/// failure
async fn import_credentials_handler(
    State(state): State<Arc<GateState>>,
    headers: HeaderMap,
    Json(request): Json<ImportCredentialsRequest>,
) -> Result<Json<ImportCredentialsResponse>, AdminError> {
    admin_auth::authorize(&headers, state.config.admin_token_hash.as_deref()).map_err(reject)?;

    let outcome = state
        .credentials
        .create_bulk(request.credentials)
        .map_err(reject)?;

    Ok(Json(ImportCredentialsResponse {
        created: outcome.created.iter().map(CredentialSummary::from).collect(),
        errors: outcome.errors,
    }))
}
