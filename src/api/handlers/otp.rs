use crate::otp::{error::OtpError, OtpService};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RequestOtpPayload {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RequestOtpResponse {
    pub success: bool,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpPayload {
    pub email: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path= "/v1/auth/otp/request",
    request_body = RequestOtpPayload,
    responses (
        (status = 200, description = "OTP stored and emailed", body = [RequestOtpResponse], content_type = "application/json"),
        (status = 400, description = "Missing or empty email"),
        (status = 500, description = "Storage or email delivery failed"),
    ),
    tag= "auth"
)]
// axum handler for OTP issuance
pub async fn request_otp(
    service: Extension<Arc<OtpService>>,
    payload: Option<Json<RequestOtpPayload>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match service.request_otp(&payload.email).await {
        Ok(()) => Json(RequestOtpResponse {
            success: true,
            message: "OTP sent successfully.".to_string(),
        })
        .into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

#[utoipa::path(
    post,
    path= "/v1/auth/otp/verify",
    request_body = VerifyOtpPayload,
    responses (
        (status = 200, description = "OTP consumed, bearer token minted", body = [VerifyOtpResponse], content_type = "application/json"),
        (status = 400, description = "Missing input or wrong code"),
        (status = 404, description = "No pending OTP for this email"),
        (status = 412, description = "OTP past its validity window"),
        (status = 500, description = "Storage or identity provisioning failed"),
    ),
    tag= "auth"
)]
// axum handler for OTP verification
pub async fn verify_otp(
    service: Extension<Arc<OtpService>>,
    payload: Option<Json<VerifyOtpPayload>>,
) -> Response {
    let Some(Json(payload)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match service.verify_otp(&payload.email, &payload.code).await {
        Ok(token) => Json(VerifyOtpResponse { token }).into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

// Bodies carry only the short client-facing message, never dependency
// error text.
fn error_response(err: &OtpError) -> (StatusCode, String) {
    let status = match err {
        OtpError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        OtpError::NotFound(_) => StatusCode::NOT_FOUND,
        OtpError::FailedPrecondition(_) => StatusCode::PRECONDITION_FAILED,
        OtpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, err.to_string())
}
