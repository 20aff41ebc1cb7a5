//! openFDA药品说明书查询

use anyhow::{Context, Result};
use async_trait::async_trait;
use medinodus_core::utils::truncate_chars;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::connectors::Connector;

/// 每个说明书段落保留的最大字符数
const SECTION_LIMIT: usize = 1500;

/// 药品说明书摘要，查询不到时为空记录
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DrugRecord {
    pub brand_name: Option<String>,
    pub generic_name: Option<String>,
    pub product_type: Option<String>,
    pub indications: Vec<String>,
    pub warnings: Vec<String>,
    pub dosage: Vec<String>,
    pub contraindications: Vec<String>,
}

impl DrugRecord {
    pub fn is_empty(&self) -> bool {
        self == &DrugRecord::default()
    }
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    #[serde(default)]
    results: Vec<Label>,
}

#[derive(Debug, Default, Deserialize)]
struct Label {
    #[serde(default)]
    openfda: OpenFdaFields,
    #[serde(default)]
    indications_and_usage: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    dosage_and_administration: Vec<String>,
    #[serde(default)]
    contraindications: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenFdaFields {
    #[serde(default)]
    brand_name: Vec<String>,
    #[serde(default)]
    generic_name: Vec<String>,
    #[serde(default)]
    product_type: Vec<String>,
}

fn sections(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| truncate_chars(v.trim(), SECTION_LIMIT))
        .filter(|v| !v.is_empty())
        .collect()
}

impl From<Label> for DrugRecord {
    fn from(label: Label) -> Self {
        DrugRecord {
            brand_name: label.openfda.brand_name.into_iter().next(),
            generic_name: label.openfda.generic_name.into_iter().next(),
            product_type: label.openfda.product_type.into_iter().next(),
            indications: sections(label.indications_and_usage),
            warnings: sections(label.warnings),
            dosage: sections(label.dosage_and_administration),
            contraindications: sections(label.contraindications),
        }
    }
}

/// openFDA客户端
pub struct OpenFdaClient {
    endpoint: String,
    client: reqwest::Client,
}

impl OpenFdaClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    /// 按品牌名或通用名查询说明书，无匹配时返回 `None`
    pub async fn find_label(&self, drug_name: &str) -> Result<Option<DrugRecord>> {
        let name = drug_name.replace('"', "");
        let search = format!(
            "openfda.brand_name:\"{}\" openfda.generic_name:\"{}\"",
            name, name
        );

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("search", search.as_str()), ("limit", "1")])
            .send()
            .await
            .context("openFDA request failed")?;

        let status = response.status();
        // openFDA 对无匹配结果返回 404
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!("No openFDA label for {}", drug_name);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow::anyhow!("openFDA returned {}", status));
        }

        let parsed: LabelResponse = response
            .json()
            .await
            .context("Failed to decode openFDA response")?;

        let record = parsed.results.into_iter().next().map(DrugRecord::from);
        info!("openFDA lookup for {}: found={}", drug_name, record.is_some());
        Ok(record)
    }
}

#[async_trait]
impl Connector for OpenFdaClient {
    fn name(&self) -> &str {
        "openfda"
    }

    async fn check_connection(&self) -> Result<bool> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("limit", "1")])
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}
