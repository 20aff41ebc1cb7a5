//! 药品说明书查询
//!
//! 查询失败永远不会中断流水线，只会退化为空记录。

use async_trait::async_trait;
use medinodus_core::is_unknown;
use medinodus_integration::{DrugRecord, OpenFdaClient};
use std::sync::Arc;
use tracing::{debug, warn};

/// 外部药品知识查询
#[async_trait]
pub trait DrugLookup: Send + Sync {
    async fn lookup(&self, drug_name: &str) -> DrugRecord;
}

/// openFDA查询实现
pub struct OpenFdaLookup {
    client: Arc<OpenFdaClient>,
}

impl OpenFdaLookup {
    pub fn new(client: Arc<OpenFdaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DrugLookup for OpenFdaLookup {
    async fn lookup(&self, drug_name: &str) -> DrugRecord {
        if is_unknown(drug_name) {
            debug!("Skipping drug lookup for unreadable name");
            return DrugRecord::default();
        }

        match self.client.find_label(drug_name.trim()).await {
            Ok(Some(record)) => record,
            Ok(None) => DrugRecord::default(),
            Err(e) => {
                warn!("Drug lookup for {} failed: {:#}", drug_name, e);
                DrugRecord::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup_for(server: &MockServer) -> OpenFdaLookup {
        let client = OpenFdaClient::new(&format!("{}/drug/label.json", server.uri()), Duration::from_secs(5)).unwrap();
        OpenFdaLookup::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_unknown_name_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let lookup = lookup_for(&server);
        assert!(lookup.lookup("Unknown").await.is_empty());
        assert!(lookup.lookup("  ").await.is_empty());
    }

    #[tokio::test]
    async fn test_service_failure_degrades_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        assert!(lookup_for(&server).lookup("Aspirin").await.is_empty());
    }

    #[tokio::test]
    async fn test_found_record_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"openfda": {"generic_name": ["ASPIRIN"]}, "warnings": ["Do not exceed dose"]}]
            })))
            .mount(&server)
            .await;

        let record = lookup_for(&server).lookup("Aspirin").await;
        assert_eq!(record.generic_name.as_deref(), Some("ASPIRIN"));
        assert_eq!(record.warnings, vec!["Do not exceed dose".to_string()]);
    }

    #[tokio::test]
    async fn test_unreachable_service_degrades_to_empty() {
        let client = OpenFdaClient::new("http://127.0.0.1:9/drug/label.json", Duration::from_secs(1)).unwrap();
        let lookup = OpenFdaLookup::new(Arc::new(client));
        assert!(lookup.lookup("Aspirin").await.is_empty());
    }
}
