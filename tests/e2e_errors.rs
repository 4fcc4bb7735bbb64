//! End-to-end tests for the error taxonomy.
//!
//! Scripted responses on `MemoryTransport` stand in for a misbehaving or
//! unreachable server; each test checks which `Error` kind the caller
//! receives and that the kinds stay distinguishable without string matching.

use haproxy_dataplane::{Backend, Client, Error, Server, Version};

// ============================================================================
// 1. get_version body parsing
// ============================================================================

#[tokio::test]
async fn test_version_body_with_newline() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(200, "42\n");
    assert_eq!(client.get_version().await.unwrap(), Version(42));
}

#[tokio::test]
async fn test_version_body_not_a_number() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(200, "abc");
    let err = client.get_version().await.unwrap_err();
    assert!(err.is_invalid_response(), "got {err:?}");
    assert_eq!(err.status_code(), None);
}

#[tokio::test]
async fn test_version_empty_body() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(200, "");
    assert!(client.get_version().await.unwrap_err().is_invalid_response());
}

#[tokio::test]
async fn test_version_error_page_under_load() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(503, "<html>Service Unavailable</html>");
    let err = client.get_version().await.unwrap_err();
    assert_eq!(
        err,
        Error::Unknown { status: 503, message: "<html>Service Unavailable</html>".into() }
    );
}

// ============================================================================
// 2. Status-derived kinds through the facade
// ============================================================================

#[tokio::test]
async fn test_unauthorized() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(401, r#"{"code":401,"message":"invalid credentials"}"#);
    let err = client.backends().list(&"tx-1".into()).await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(err.message().contains("invalid credentials"));
}

#[tokio::test]
async fn test_server_bad_request_keeps_body() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(400, "missing balance");
    let err = client.backends().add(&"tx-1".into(), &Backend::new("web")).await.unwrap_err();
    assert_eq!(err, Error::BadRequest("missing balance".into()));
}

#[tokio::test]
async fn test_other_statuses_are_unknown_with_code() {
    let client = Client::open_memory().unwrap();
    for status in [403u16, 405, 406, 500, 502] {
        client.transport().push_response(status, "nope");
        let err = client.backends().get("web", &"tx-1".into()).await.unwrap_err();
        assert!(err.is_unknown(), "{status} -> {err:?}");
        assert_eq!(err.status_code(), Some(status));
    }
}

#[tokio::test]
async fn test_kinds_are_distinct() {
    let kinds = [
        Error::from_status(404, b"").unwrap(),
        Error::from_status(400, b"").unwrap(),
        Error::from_status(401, b"").unwrap(),
        Error::from_status(409, b"").unwrap(),
        Error::from_status(500, b"").unwrap(),
        Error::InvalidResponse(String::new()),
        Error::Internal(String::new()),
    ];
    for (i, err) in kinds.iter().enumerate() {
        let hits = [
            err.is_not_found(),
            err.is_bad_request(),
            err.is_unauthorized(),
            err.is_conflict(),
            err.is_unknown(),
            err.is_invalid_response(),
            err.is_internal(),
        ];
        assert_eq!(hits.iter().filter(|h| **h).count(), 1, "{err:?}");
        assert!(hits[i], "{err:?}");
        assert!(!err.is_commit_failed());
    }
}

// ============================================================================
// 3. Empty and malformed bodies
// ============================================================================

#[tokio::test]
async fn test_get_with_empty_body_is_absent_not_error() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(200, "");
    let found = client.backends().get("web", &"tx-1".into()).await.unwrap();
    assert_eq!(found, None);
}

#[tokio::test]
async fn test_get_404_is_error_not_absent() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(404, "");
    let err = client.backends().get("web", &"tx-1".into()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_list_with_empty_body_is_empty_vec() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(200, "");
    let servers: Vec<Server> = client.servers("web").list(&"tx-1".into()).await.unwrap();
    assert!(servers.is_empty());
}

#[tokio::test]
async fn test_add_with_empty_body_is_absent() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(202, "");
    let added = client.backends().add(&"tx-1".into(), &Backend::new("web")).await.unwrap();
    assert_eq!(added, None);
}

#[tokio::test]
async fn test_malformed_json_is_invalid_response() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(200, "{\"name\": ");
    let err = client.backends().get("web", &"tx-1".into()).await.unwrap_err();
    assert!(err.is_invalid_response());

    client.transport().push_response(200, r#"{"name":"web"}"#);
    let err = client.backends().list(&"tx-1".into()).await.unwrap_err();
    assert!(err.is_invalid_response(), "object where array expected");
}

#[tokio::test]
async fn test_unknown_keyword_is_invalid_response() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(200, r#"{"name":"web","mode":"udp"}"#);
    let err = client.backends().get("web", &"tx-1".into()).await.unwrap_err();
    assert!(err.is_invalid_response());
}

#[tokio::test]
async fn test_unknown_transaction_status_is_invalid_response() {
    let client = Client::open_memory().unwrap();
    client.transport().push_response(200, r#"{"id":"tx-1","status":"pending"}"#);
    let err = client.get_transaction(&"tx-1".into()).await.unwrap_err();
    assert!(err.is_invalid_response());
}

// ============================================================================
// 4. Network failures
// ============================================================================

#[tokio::test]
async fn test_network_failure_is_internal() {
    let client = Client::open_memory().unwrap();
    client.transport().push_failure("connection refused");
    let err = client.get_version().await.unwrap_err();
    assert_eq!(err, Error::Internal("connection refused".into()));
    assert_eq!(err.status_code(), None);
}

#[tokio::test]
async fn test_network_failure_on_commit_is_not_commit_failed() {
    let client = Client::open_memory().unwrap();
    client.transport().push_failure("timed out");
    let err = client.commit_transaction(&"tx-1".into()).await.unwrap_err();
    assert!(err.is_internal());
    assert!(!err.requires_new_version());
}

#[tokio::test]
async fn test_failures_are_not_retried() {
    let client = Client::open_memory().unwrap();
    client.transport().push_failure("reset");
    client.get_version().await.unwrap_err();
    assert_eq!(client.transport().request_count(), 1);
}
