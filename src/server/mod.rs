use crate::core::forge::ForgeEngine;
use crate::domain::model::{ForgeReply, GenerateRequest, Hole, KnownModel, ModelId, ParameterBag};
use crate::utils::error::{ErrorKind, ForgeError, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{HeaderMap, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const IDENTITY_HEADER: &str = "x-user-email";

pub fn app(engine: ForgeEngine, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/forge/models", get(models))
        .route("/api/forge/generate", post(generate))
        .with_state(engine)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Any origin when `origins` is empty or absent.
pub fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let parsed: Vec<HeaderValue> = origins
        .unwrap_or_default()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        base.allow_origin(Any)
    } else {
        base.allow_origin(AllowOrigin::list(parsed))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateBody {
    model: Option<String>,
    params: Option<ParameterBag>,
    holes: Option<Vec<Hole>>,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: Vec<&'static str>,
}

impl IntoResponse for ForgeError {
    fn into_response(self) -> Response {
        match self.kind() {
            ErrorKind::Internal | ErrorKind::Signing => {
                tracing::error!("❌ {} ({})", self, self.recovery_suggestion())
            }
            ErrorKind::Upstream => tracing::warn!("⚠️ {}", self),
            _ => tracing::info!("Request rejected: {}", self),
        }

        (self.status_code(), Json(ForgeReply::from(&self))).into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: KnownModel::all().iter().map(|m| m.as_str()).collect(),
    })
}

async fn generate(
    State(engine): State<ForgeEngine>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Json<ForgeReply>, ForgeError> {
    let request = parse_generate_request(&headers, &body)?;
    tracing::info!("🛠️ Generation requested for {}", request.model);

    let output = engine.generate(request).await?;
    Ok(Json(ForgeReply::Ok(output)))
}

fn parse_generate_request(headers: &HeaderMap, body: &Bytes) -> Result<GenerateRequest> {
    if body.is_empty() {
        return Err(ForgeError::invalid_request("request body is required"));
    }

    let body: GenerateBody = serde_json::from_slice(body)
        .map_err(|e| ForgeError::invalid_request(format!("invalid JSON body: {}", e)))?;

    let model = ModelId::parse(body.model.as_deref().unwrap_or_default())?;

    let header_identity = match headers.get(IDENTITY_HEADER) {
        Some(value) => {
            let raw = value.to_str().map_err(|_| {
                ForgeError::invalid_request(format!("{} header must be plain ASCII", IDENTITY_HEADER))
            })?;
            normalize_identity(raw)
        }
        None => None,
    };
    let identity = header_identity.or_else(|| body.email.as_deref().and_then(normalize_identity));

    Ok(GenerateRequest {
        model,
        params: body.params.unwrap_or_default(),
        holes: body.holes.unwrap_or_default(),
        identity,
    })
}

fn normalize_identity(raw: &str) -> Option<String> {
    let identity = raw.trim().to_lowercase();
    (!identity.is_empty()).then_some(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_header_identity_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("  Header@Example.com "));
        let body = Bytes::from(r#"{"model": "cable_tray", "email": "body@example.com"}"#);

        let request = parse_generate_request(&headers, &body).unwrap();
        assert_eq!(request.identity.as_deref(), Some("header@example.com"));
    }

    #[test]
    fn test_blank_header_falls_back_to_body() {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("   "));
        let body = Bytes::from(r#"{"model": "cable_tray", "email": "Body@Example.com"}"#);

        let request = parse_generate_request(&headers, &body).unwrap();
        assert_eq!(request.identity.as_deref(), Some("body@example.com"));
    }

    #[test]
    fn test_non_ascii_identity_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            IDENTITY_HEADER,
            HeaderValue::from_bytes(b"caf\xe9@example.com").unwrap(),
        );
        let body = Bytes::from(r#"{"model": "cable_tray", "email": "body@example.com"}"#);

        let err = parse_generate_request(&headers, &body).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidRequest { .. }));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let body = Bytes::from(r#"{"model": "cable_tray", "params": null}"#);
        let request = parse_generate_request(&HeaderMap::new(), &body).unwrap();
        assert!(request.params.is_empty());
        assert!(request.holes.is_empty());
        assert!(request.identity.is_none());
    }

    #[test]
    fn test_missing_model_is_input_error() {
        let body = Bytes::from(r#"{"params": {"width": 10}}"#);
        let err = parse_generate_request(&HeaderMap::new(), &body).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
