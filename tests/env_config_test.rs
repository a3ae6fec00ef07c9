#![allow(clippy::unwrap_used)]
// A provider configured from the environment alone. Kept in its own test
// binary: it mutates process environment variables.

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bigip_provider::testing::ProviderTester;
use bigip_provider::BigIpProvider;

#[tokio::test]
async fn test_environment_only_configuration_reaches_device() {
    let server = MockServer::start().await;

    std::env::set_var("BIGIP_HOST", server.uri());
    std::env::set_var("BIGIP_USER", "admin");
    std::env::set_var("BIGIP_PASSWORD", "secret");
    std::env::set_var("BIGIP_TOKEN_AUTH", "false");

    // admin:secret
    Mock::given(method("GET"))
        .and(path("/mgmt/tm/ltm/pool/~Common~web"))
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "web",
            "partition": "Common",
            "fullPath": "/Common/web",
            "loadBalancingMode": "round-robin"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(BigIpProvider::new());
    tester.validate_provider_config(json!({})).await.unwrap();
    tester.configure(json!({})).await.unwrap();

    let pool = tester
        .read_data_source("bigip_ltm_pool", json!({"name": "/Common/web"}))
        .await
        .unwrap();
    assert_eq!(pool["load_balancing_mode"], "round-robin");
}
