//! Mock HTTP server tests for the two REST clients.
//!
//! Uses [`wiremock`] to stand up local servers emulating the mail
//! service's id-translation endpoint and the case-management documents
//! endpoint, exercising the full request/response path without real APIs.
//!
//! Coverage:
//! - Successful document creation with parsed record
//! - 401 authentication failure
//! - 429 rate limiting with Retry-After header and JSON body hint
//! - 500 server error vs 400 client error classification
//! - Translation order preservation and per-id nulls
//! - Whole-batch translation failure
//! - Empty translation input makes zero HTTP calls

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zaakpost_upload::documents::{CaseDocumentsClient, CreateDocumentRequest, DocumentSubmitter};
use zaakpost_upload::error::UploadError;
use zaakpost_upload::translate::{ExchangeIdTranslator, IdTranslator};
use zaakpost_upload::types::{DocumentMetadata, UploadItem};

fn test_request() -> CreateDocumentRequest {
    let mut item = UploadItem::attachment(
        "local-att-1",
        DocumentMetadata {
            title: "Offerte".into(),
            filename: "offerte.pdf".into(),
            mime_type: Some("application/pdf".into()),
            received_at: None,
        },
    );
    item.remote_id = Some("AAMk-att-1".into());
    CreateDocumentRequest::from_item(&item, b"%PDF-1.7 test").unwrap()
}

// ── Document submission ────────────────────────────────────────────────

#[tokio::test]
async fn submit_success_returns_created_record() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cases/zaak-42/documents"))
        .and(header("Authorization", "Bearer tok-1"))
        .and(body_partial_json(serde_json::json!({
            "title": "Offerte",
            "filename": "offerte.pdf",
            "sourceItemId": "AAMk-att-1",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "doc-001",
            "title": "Offerte",
            "sizeBytes": 13,
            "createdAt": "2026-08-30T10:00:00Z",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = CaseDocumentsClient::new(server.uri());
    let record = client
        .submit("tok-1", "zaak-42", &test_request())
        .await
        .unwrap();

    assert_eq!(record.id, "doc-001");
    assert_eq!(record.size_bytes, Some(13));
}

#[tokio::test]
async fn submit_401_maps_to_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cases/zaak-42/documents"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&server)
        .await;

    let client = CaseDocumentsClient::new(server.uri());
    let err = client
        .submit("tok-1", "zaak-42", &test_request())
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Auth(_)));
}

#[tokio::test]
async fn submit_429_uses_retry_after_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cases/zaak-42/documents"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "2")
                .set_body_string("throttled"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = CaseDocumentsClient::new(server.uri());
    let err = client
        .submit("tok-1", "zaak-42", &test_request())
        .await
        .unwrap_err();
    match err {
        UploadError::RateLimited { retry_after_ms } => {
            assert_eq!(retry_after_ms, Some(2000));
        }
        other => panic!("expected RateLimited, got {other}"),
    }
}

#[tokio::test]
async fn submit_429_falls_back_to_body_hint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cases/zaak-42/documents"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(serde_json::json!({ "retryAfterMs": 1500 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = CaseDocumentsClient::new(server.uri());
    let err = client
        .submit("tok-1", "zaak-42", &test_request())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        UploadError::RateLimited {
            retry_after_ms: Some(1500)
        }
    ));
}

#[tokio::test]
async fn submit_503_maps_to_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cases/zaak-42/documents"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let client = CaseDocumentsClient::new(server.uri());
    let err = client
        .submit("tok-1", "zaak-42", &test_request())
        .await
        .unwrap_err();
    match err {
        UploadError::Server { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected Server, got {other}"),
    }
}

#[tokio::test]
async fn submit_400_maps_to_request_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/cases/zaak-42/documents"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unsupported format"))
        .expect(1)
        .mount(&server)
        .await;

    let client = CaseDocumentsClient::new(server.uri());
    let err = client
        .submit("tok-1", "zaak-42", &test_request())
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Request { status: 400, .. }));
}

// ── Identifier translation ─────────────────────────────────────────────

#[tokio::test]
async fn translate_preserves_order_and_per_id_nulls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/me/translateExchangeIds"))
        .and(header("Authorization", "Bearer tok-1"))
        .and(body_partial_json(serde_json::json!({
            "inputIds": ["ews-mail", "ews-att-1", "ews-att-2"],
            "sourceIdType": "ews",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                { "sourceId": "ews-mail", "targetId": "rest-mail" },
                { "sourceId": "ews-att-1", "targetId": null },
                { "sourceId": "ews-att-2", "targetId": "rest-att-2" },
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let translator = ExchangeIdTranslator::new(server.uri());
    let ids = vec![
        "ews-mail".to_string(),
        "ews-att-1".to_string(),
        "ews-att-2".to_string(),
    ];
    let out = translator.translate("tok-1", &ids).await.unwrap();

    assert_eq!(
        out,
        vec![
            Some("rest-mail".to_string()),
            None,
            Some("rest-att-2".to_string()),
        ]
    );
}

#[tokio::test]
async fn translate_whole_batch_failure_rejects_together() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/me/translateExchangeIds"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let translator = ExchangeIdTranslator::new(server.uri());
    let err = translator
        .translate("tok-1", &["a".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Translation(_)));
}

#[tokio::test]
async fn translate_length_mismatch_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/me/translateExchangeIds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [ { "sourceId": "a", "targetId": "A" } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let translator = ExchangeIdTranslator::new(server.uri());
    let err = translator
        .translate("tok-1", &["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::InvalidResponse(_)));
}

#[tokio::test]
async fn translate_empty_input_makes_no_http_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/me/translateExchangeIds"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let translator = ExchangeIdTranslator::new(server.uri());
    let out = translator.translate("tok-1", &[]).await.unwrap();
    assert!(out.is_empty());
}
