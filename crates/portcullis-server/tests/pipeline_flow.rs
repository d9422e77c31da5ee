//! End-to-end pipeline tests driven through the HTTP funnel.

use axum::body::Body;
use axum::http::{Request, StatusCode, header::AUTHORIZATION};
use tower::ServiceExt;

use portcullis_core::Permission;
use portcullis_server::config::{AclConfig, AppConfig};
use portcullis_server::pipeline::INSTANCE_HEADER;
use portcullis_server::{PortcullisServer, ServerBuilder};
use portcullis_auth::{AclRule, AuthConfig, StaticUserConfig, TokenConfig};

// "alice:s3cret"
const ALICE_BASIC: &str = "Basic YWxpY2U6czNjcmV0";

fn rule(id: &str, roles: &[&str], predicate: &str, permission: Permission) -> AclRule {
    AclRule {
        id: id.to_string(),
        roles: roles.iter().map(ToString::to_string).collect(),
        predicate: predicate.to_string(),
        permission,
        priority: 0,
    }
}

fn gateway() -> PortcullisServer {
    let config = AppConfig {
        auth: AuthConfig {
            token: Some(TokenConfig {
                key: "C0mpl3x@JWT!Key$With@UpperAndLowercase".to_string(),
                roles_claim: Some("roles".to_string()),
                ..TokenConfig::default()
            }),
            users: vec![StaticUserConfig {
                username: "alice".to_string(),
                password: "s3cret".to_string(),
                roles: vec!["user".to_string()],
                properties: serde_json::json!({"tenant": "acme"}),
            }],
        },
        acl: AclConfig {
            rules: vec![
                rule(
                    "public-ping",
                    &["$unauthenticated"],
                    "path-template('/ping')",
                    Permission::Read,
                ),
                rule(
                    "own-tenant-echo",
                    &["user"],
                    "path-template('/echo/{tenant}/{*}') and equals(@user.tenant, ${tenant})",
                    Permission::Read,
                ),
            ],
        },
        ..AppConfig::default()
    };

    ServerBuilder::new()
        .with_config(config)
        .with_default_units()
        .build()
        .expect("engine builds")
}

async fn send(server: &PortcullisServer, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = server
        .router()
        .oneshot(request)
        .await
        .expect("infallible handler");
    let status = response.status();
    assert!(
        response.headers().contains_key(INSTANCE_HEADER),
        "instance header must be stamped on every outcome"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn get_as_alice(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(AUTHORIZATION, ALICE_BASIC)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn anonymous_ping_is_public() {
    let server = gateway();
    let (status, body) = send(&server, get("/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "pong");
}

#[tokio::test]
async fn anonymous_echo_requires_authentication() {
    let server = gateway();
    let (status, body) = send(&server, get("/echo/acme/docs")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn own_tenant_allowed_foreign_tenant_denied() {
    let server = gateway();

    let (status, body) = send(&server, get_as_alice("/echo/acme/docs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"], "alice");
    assert_eq!(body["bindings"]["*"], "acme/docs");

    let (status, body) = send(&server, get_as_alice("/echo/other/docs")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], 403);
}

#[tokio::test]
async fn write_without_write_rule_is_denied() {
    let server = gateway();
    let request = Request::builder()
        .method("POST")
        .uri("/echo/acme/docs")
        .header(AUTHORIZATION, ALICE_BASIC)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&server, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unmatched_path_is_404() {
    let server = gateway();
    let (status, body) = send(&server, get_as_alice("/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn bad_credentials_fall_through_to_anonymous() {
    let server = gateway();
    // Wrong password: the realm rejects, the chain falls through, and the
    // request is treated as anonymous, which /ping permits.
    let request = Request::builder()
        .uri("/ping")
        .header(AUTHORIZATION, "Basic YWxpY2U6d3Jvbmc=")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&server, request).await;
    assert_eq!(status, StatusCode::OK);
}
