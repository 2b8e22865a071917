use chrono::Utc;
use httpmock::prelude::*;
use serde_json::json;
use stl_forge::adapters::{HttpGenerationBackend, SupabaseEntitlements, SupabaseSigner};
use stl_forge::core::{EntitlementStore, GenerationBackend, ModelId, UrlSigner};
use stl_forge::domain::model::{GenerationJob, ParameterBag};
use stl_forge::{normalize, ForgeError};

#[tokio::test]
async fn test_model_purchase_query_filters() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/purchases")
                .header("apikey", "k")
                .header("authorization", "Bearer k")
                .query_param("select", "id")
                .query_param("limit", "1")
                .query_param("email", "eq.buyer@example.com")
                .query_param("status", "eq.active")
                .query_param("plan", "eq.oneoff")
                .query_param("model", "eq.vesa_adapter")
                .query_param_exists("or");
            then.status(200).json_body(json!([{"id": 1}]));
        })
        .await;

    let store = SupabaseEntitlements::new(&server.base_url(), "k", "purchases", 5).unwrap();
    let model = ModelId::parse("vesa_adapter").unwrap();

    let purchased = store
        .has_model_purchase("buyer@example.com", &model, Utc::now())
        .await
        .unwrap();

    assert!(purchased);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_lookup_rejection_is_lookup_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/entitlements");
            then.status(401).json_body(json!({"message": "Invalid API key"}));
        })
        .await;

    let store = SupabaseEntitlements::new(&server.base_url(), "bad", "entitlements", 5).unwrap();
    let result = store
        .has_active_subscription("buyer@example.com", Utc::now())
        .await;

    assert!(matches!(result, Err(ForgeError::EntitlementLookup { .. })));
}

#[tokio::test]
async fn test_signer_accepts_camel_case_reply() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/storage/v1/object/sign/models/abc/out.stl")
                .json_body(json!({"expiresIn": 120}));
            then.status(200)
                .json_body(json!({"signedUrl": "https://cdn.example.com/abc/out.stl?sig=1"}));
        })
        .await;

    let signer = SupabaseSigner::new(&server.base_url(), "k", "models", 10).unwrap();
    let url = signer.sign("abc/out.stl", 120).await.unwrap();

    assert_eq!(url, "https://cdn.example.com/abc/out.stl?sig=1");
}

#[tokio::test]
async fn test_signer_prefers_upper_case_key_when_both_present() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/storage/v1/object/sign/stl/a.stl");
            then.status(200).json_body(json!({
                "signedURL": "/object/sign/stl/a.stl?token=t1",
                "signedUrl": "https://cdn.example.com/a.stl?token=t2"
            }));
        })
        .await;

    let signer = SupabaseSigner::new(&server.base_url(), "k", "stl", 10).unwrap();
    let url = signer.sign("a.stl", 600).await.unwrap();

    assert_eq!(
        url,
        format!("{}/storage/v1/object/sign/stl/a.stl?token=t1", server.base_url())
    );
}

#[tokio::test]
async fn test_backend_error_object_message_is_kept() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/generate");
            then.status(200)
                .json_body(json!({"ok": false, "error": {"message": "wall too thin"}}));
        })
        .await;

    let backend = HttpGenerationBackend::new(&server.url("/generate"), 5).unwrap();
    let model = ModelId::parse("cable_tray").unwrap();
    let job = GenerationJob {
        params: normalize(&model, &ParameterBag::new()),
        model,
        holes: Vec::new(),
    };

    let reply = backend.generate(&job).await.unwrap();
    assert_eq!(reply.object_key, None);
    assert_eq!(reply.error.as_deref(), Some("wall too thin"));
}

#[tokio::test]
async fn test_backend_non_json_success_is_malformed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/generate");
            then.status(200).body("<html>gateway</html>");
        })
        .await;

    let backend = HttpGenerationBackend::new(&server.url("/generate"), 5).unwrap();
    let model = ModelId::parse("wall_hook").unwrap();
    let job = GenerationJob {
        params: normalize(&model, &ParameterBag::new()),
        model,
        holes: Vec::new(),
    };

    let result = backend.generate(&job).await;
    assert!(matches!(result, Err(ForgeError::GeneratorMalformed { .. })));
}

#[tokio::test]
async fn test_backend_unreachable_is_unavailable() {
    // nothing listens on port 9 locally
    let backend = HttpGenerationBackend::new("http://127.0.0.1:9/generate", 2).unwrap();
    let model = ModelId::parse("cable_tray").unwrap();
    let job = GenerationJob {
        params: normalize(&model, &ParameterBag::new()),
        model,
        holes: Vec::new(),
    };

    let err = backend.generate(&job).await.unwrap_err();
    assert!(matches!(err, ForgeError::GeneratorUnavailable { .. }));
    assert!(err.is_retriable());
}
