use crate::api::handlers::{health, otp};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(health::health, otp::request_otp, otp::verify_otp),
    components(schemas(
        health::Health,
        otp::RequestOtpPayload,
        otp::RequestOtpResponse,
        otp::VerifyOtpPayload,
        otp::VerifyOtpResponse,
    )),
    tags(
        (name = "auth", description = "Email one-time passcode authentication"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Swagger UI backed by the generated `OpenAPI` document.
#[must_use]
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn openapi_lists_all_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/v1/auth/otp/request"));
        assert!(paths.contains_key("/v1/auth/otp/verify"));
        assert!(paths.contains_key("/health"));
    }
}
