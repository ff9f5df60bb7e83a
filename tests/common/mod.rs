//! Common test utilities and helpers.

use mockito::ServerGuard;
use orchestrate_client::{ClientConfig, OrchestrateClient};
use serde::{Deserialize, Serialize};

/// Test product structure used across tests
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TestProduct {
    pub name: String,
    pub category: String,
    pub price: f64,
}

/// Build a client pointed at the given mock server
pub fn client_for(server: &ServerGuard) -> OrchestrateClient {
    let config = ClientConfig::new("test-api-key")
        .with_base_url(&server.url())
        .expect("mock server URL is well-formed");
    OrchestrateClient::with_config(config).expect("client builds")
}

/// Create sample test products
pub fn create_test_products() -> Vec<TestProduct> {
    vec![
        TestProduct {
            name: "Espresso Machine".to_string(),
            category: "kitchen".to_string(),
            price: 199.99,
        },
        TestProduct {
            name: "Chef Knife".to_string(),
            category: "kitchen".to_string(),
            price: 89.50,
        },
        TestProduct {
            name: "Reading Lamp".to_string(),
            category: "office".to_string(),
            price: 42.00,
        },
    ]
}

/// Render one KV item of a list-shaped page body
pub fn kv_item(collection: &str, key: &str, reference: &str, value: &TestProduct) -> String {
    format!(
        r#"{{"path":{{"collection":"{collection}","key":"{key}","ref":"{reference}"}},"value":{}}}"#,
        serde_json::to_string(value).expect("test product serializes"),
    )
}

/// Render a page body with the given items and optional next cursor
pub fn page_body(items: &[String], next: Option<&str>) -> String {
    let next = match next {
        Some(cursor) => format!("\"{cursor}\""),
        None => "null".to_string(),
    };
    format!(
        r#"{{"count":{},"results":[{}],"next":{next}}}"#,
        items.len(),
        items.join(",")
    )
}

/// Setup test logging (useful for debugging tests)
#[allow(dead_code)]
pub fn setup_test_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
