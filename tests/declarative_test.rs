#![allow(clippy::unwrap_used)]
// AS3, DO and LTM pool resources against a mock BIG-IP using basic auth.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bigip_provider::testing::{ProviderTester, TestError};
use bigip_provider::{BigIpProvider, ProviderError, ProviderService};

// ── Helpers ─────────────────────────────────────────────────────────

fn provider_config(server: &MockServer) -> Value {
    json!({
        "address": server.uri(),
        "username": "admin",
        "password": "secret",
        "token_auth": false,
        "poll_interval": 1,
        "poll_max_interval": 1,
    })
}

async fn setup() -> (MockServer, ProviderTester<BigIpProvider>) {
    let server = MockServer::start().await;
    let tester = ProviderTester::new(BigIpProvider::new());
    tester.configure(provider_config(&server)).await.unwrap();
    (server, tester)
}

fn as3_document() -> Value {
    json!({
        "class": "AS3",
        "action": "deploy",
        "persist": true,
        "declaration": {
            "class": "ADC",
            "schemaVersion": "3.50.0",
            "Sample_01": {
                "class": "Tenant",
                "A1": {
                    "class": "Application",
                    "service": {
                        "class": "Service_HTTP",
                        "virtualAddresses": ["10.0.1.10"],
                        "pool": "web_pool"
                    },
                    "web_pool": {
                        "class": "Pool",
                        "members": [{"servicePort": 80, "serverAddresses": ["192.0.1.10"]}]
                    }
                }
            }
        }
    })
}

/// What the device reports for `Sample_01`: the tenant plus metadata the
/// user never wrote.
fn as3_device_view() -> Value {
    let mut adc = as3_document()["declaration"].clone();
    adc["id"] = json!("autogen_5a5c1b4e");
    adc["updateMode"] = json!("selective");
    adc["controls"] = json!({"archiveTimestamp": "2026-10-01T10:00:00.000Z"});
    adc
}

// ── AS3 ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_as3_create_reconciles_device_view() {
    let (server, tester) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mgmt/shared/appsvcs/declare"))
        .and(query_param("async", "true"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "id": "as3-task-1",
            "results": [{"message": "Declaration successfully submitted", "code": 0}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mgmt/shared/appsvcs/task/as3-task-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "as3-task-1",
            "results": [{"message": "success", "code": 200, "tenant": "Sample_01"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mgmt/shared/appsvcs/declare/Sample_01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(as3_device_view()))
        .mount(&server)
        .await;

    let state = tester
        .apply_create(
            "bigip_as3",
            json!({"as3_json": serde_json::to_string(&as3_document()).unwrap()}),
        )
        .await
        .unwrap();

    assert_eq!(state["id"], "Sample_01");
    assert_eq!(state["tenant_list"], "Sample_01");
    assert_eq!(state["task_id"], "as3-task-1");
    assert_eq!(state["per_app_mode"], false);
    let as3_json: Value = serde_json::from_str(state["as3_json"].as_str().unwrap()).unwrap();
    assert_eq!(as3_json, as3_document());
}

#[tokio::test]
async fn test_as3_task_failure() {
    let (server, tester) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mgmt/shared/appsvcs/declare"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "as3-task-2"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mgmt/shared/appsvcs/task/as3-task-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "as3-task-2",
            "results": [{
                "message": "declaration is invalid",
                "code": 422,
                "tenant": "Sample_01",
                "errors": ["/Sample_01/A1/service: should have required property 'virtualAddresses'"]
            }]
        })))
        .mount(&server)
        .await;

    let err = tester
        .create(
            "bigip_as3",
            json!({"as3_json": serde_json::to_string(&as3_document()).unwrap()}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::TaskFailed { .. }), "{err:?}");
    assert!(err.message().starts_with("tenant Sample_01: declaration is invalid"));
}

#[tokio::test]
async fn test_as3_read_no_content_clears_state() {
    let (server, tester) = setup().await;

    Mock::given(method("GET"))
        .and(path("/mgmt/shared/appsvcs/declare/Sample_01"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let state = tester
        .read(
            "bigip_as3",
            json!({
                "id": "Sample_01",
                "tenant_list": "Sample_01",
                "as3_json": serde_json::to_string(&as3_document()).unwrap(),
            }),
        )
        .await
        .unwrap();
    assert!(state.is_null());
}

#[tokio::test]
async fn test_as3_read_empty_body_clears_state() {
    let (server, tester) = setup().await;

    Mock::given(method("GET"))
        .and(path("/mgmt/shared/appsvcs/declare/Sample_01"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let state = tester
        .read(
            "bigip_as3",
            json!({
                "id": "Sample_01",
                "tenant_list": "Sample_01",
                "as3_json": serde_json::to_string(&as3_document()).unwrap(),
            }),
        )
        .await
        .unwrap();
    assert!(state.is_null());
}

#[tokio::test]
async fn test_as3_import_by_tenant() {
    let (server, tester) = setup().await;

    Mock::given(method("GET"))
        .and(path("/mgmt/shared/appsvcs/declare/Sample_01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(as3_device_view()))
        .mount(&server)
        .await;

    let state = tester.import("bigip_as3", "Sample_01").await.unwrap();
    assert_eq!(state["tenant_list"], "Sample_01");
    let as3_json: Value = serde_json::from_str(state["as3_json"].as_str().unwrap()).unwrap();
    assert_eq!(as3_json["class"], "AS3");
    assert_eq!(as3_json["declaration"]["updateMode"], "selective");
    assert!(as3_json["declaration"].get("controls").is_none());
    assert_eq!(as3_json["declaration"]["Sample_01"]["class"], "Tenant");
}

#[tokio::test]
async fn test_as3_delete_tenants() {
    let (server, tester) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/mgmt/shared/appsvcs/declare/Sample_01,Sample_02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"message": "success", "code": 200, "tenant": "Sample_01"},
                {"message": "success", "code": 200, "tenant": "Sample_02"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    tester
        .delete(
            "bigip_as3",
            json!({"id": "Sample_01,Sample_02", "tenant_list": "Sample_01,Sample_02", "as3_json": "{}"}),
        )
        .await
        .unwrap();
}

// ── Declarative Onboarding ──────────────────────────────────────────

fn do_declaration() -> Value {
    json!({
        "schemaVersion": "1.0.0",
        "class": "Device",
        "Common": {
            "class": "Tenant",
            "hostname": "bigip1.example.com",
            "myDns": {"class": "DNS", "nameServers": ["8.8.8.8"]}
        }
    })
}

#[tokio::test]
async fn test_do_create_polls_until_done() {
    let (server, tester) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mgmt/shared/declarative-onboarding"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "id": "do-task-1",
            "result": {"class": "Result", "code": 202, "status": "RUNNING"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mgmt/shared/declarative-onboarding/task/do-task-1"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "id": "do-task-1",
            "result": {"class": "Result", "code": 202, "status": "RUNNING"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let mut applied = do_declaration();
    applied["id"] = json!("do-task-1");
    Mock::given(method("GET"))
        .and(path("/mgmt/shared/declarative-onboarding/task/do-task-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "do-task-1",
            "result": {"class": "Result", "code": 200, "status": "OK"},
            "declaration": applied
        })))
        .mount(&server)
        .await;

    let state = tester
        .apply_create(
            "bigip_do",
            json!({"do_json": serde_json::to_string(&do_declaration()).unwrap(), "timeout": 1}),
        )
        .await
        .unwrap();

    assert_eq!(state["id"], "do-task-1");
    assert_eq!(state["timeout"], 1);
    let do_json: Value = serde_json::from_str(state["do_json"].as_str().unwrap()).unwrap();
    assert_eq!(do_json, do_declaration());
}

#[tokio::test]
async fn test_do_out_of_range_timeout_is_rejected() {
    let (server, tester) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mgmt/shared/declarative-onboarding"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "never"})))
        .expect(0)
        .mount(&server)
        .await;

    let err = tester
        .apply_create(
            "bigip_do",
            json!({
                "do_json": serde_json::to_string(&do_declaration()).unwrap(),
                "timeout": i64::MAX,
            }),
        )
        .await
        .unwrap_err();
    match err {
        TestError::Diagnostics(diagnostics) => {
            assert_eq!(diagnostics[0].attribute.as_deref(), Some("timeout"));
        }
        other => panic!("expected diagnostics, got {other:?}"),
    }
}

#[tokio::test]
async fn test_do_plan_is_stable_with_default_timeout() {
    let (_server, tester) = setup().await;
    let do_json = serde_json::to_string(&do_declaration()).unwrap();

    let plan = tester
        .plan_create("bigip_do", json!({"do_json": do_json, "timeout": null}))
        .await
        .unwrap();
    assert_eq!(plan.planned_state["timeout"], 20);

    let prior = json!({"id": "do-task-1", "do_json": do_json, "timeout": 20});
    let plan = tester
        .plan_update("bigip_do", prior, json!({"do_json": do_json, "timeout": null}))
        .await
        .unwrap();
    assert!(!plan.has_changes(), "unexpected changes: {:?}", plan.changes);
}

#[tokio::test]
async fn test_stop_cancels_pending_poll() {
    let server = MockServer::start().await;
    let provider = Arc::new(BigIpProvider::new());
    provider.configure(provider_config(&server)).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/mgmt/shared/declarative-onboarding"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "do-task-2"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mgmt/shared/declarative-onboarding/task/do-task-2"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"id": "do-task-2"})))
        .mount(&server)
        .await;

    let running = {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move {
            provider
                .create(
                    "bigip_do",
                    json!({"do_json": serde_json::to_string(&do_declaration()).unwrap()}),
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    provider.stop().await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("create did not stop")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ProviderError::Cancelled(_)), "{err:?}");
}

// ── LTM pool ────────────────────────────────────────────────────────

fn pool_answer() -> Value {
    json!({
        "kind": "tm:ltm:pool:poolstate",
        "name": "web",
        "partition": "Common",
        "fullPath": "/Common/web",
        "description": "web servers",
        "loadBalancingMode": "round-robin",
        "monitor": "/Common/http and /Common/tcp ",
        "allowSnat": "yes",
        "allowNat": "no",
        "slowRampTime": 10,
        "reselectTries": 0,
        "serviceDownAction": "none"
    })
}

#[tokio::test]
async fn test_ltm_pool_create() {
    let (server, tester) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mgmt/tm/ltm/pool"))
        .and(wiremock::matchers::body_partial_json(json!({
            "name": "web",
            "partition": "Common",
            "monitor": "/Common/http and /Common/tcp"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool_answer()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mgmt/tm/ltm/pool/~Common~web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool_answer()))
        .mount(&server)
        .await;

    let state = tester
        .apply_create(
            "bigip_ltm_pool",
            json!({
                "name": "/Common/web",
                "description": "web servers",
                "monitors": ["/Common/http", "/Common/tcp"],
                "allow_snat": true,
            }),
        )
        .await
        .unwrap();

    assert_eq!(state["id"], "/Common/web");
    assert_eq!(state["monitors"], json!(["/Common/http", "/Common/tcp"]));
    assert_eq!(state["allow_snat"], true);
    assert_eq!(state["allow_nat"], false);
    assert_eq!(state["load_balancing_mode"], "round-robin");
}

#[tokio::test]
async fn test_ltm_pool_data_source() {
    let (server, tester) = setup().await;

    Mock::given(method("GET"))
        .and(path("/mgmt/tm/ltm/pool/~Common~web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool_answer()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mgmt/tm/ltm/pool/~Common~missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 404,
            "message": "01020036:3: The requested Pool (/Common/missing) was not found."
        })))
        .mount(&server)
        .await;

    let pool = tester
        .read_data_source("bigip_ltm_pool", json!({"name": "/Common/web"}))
        .await
        .unwrap();
    assert_eq!(pool["description"], "web servers");
    assert_eq!(pool["slow_ramp_time"], 10);

    let err = tester
        .read_data_source("bigip_ltm_pool", json!({"name": "/Common/missing"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}
