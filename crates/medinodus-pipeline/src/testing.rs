//! 测试用的脚本化协作方

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use medinodus_core::DocumentType;
use medinodus_integration::DrugRecord;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::extraction::TextExtractor;
use crate::lookup::DrugLookup;
use crate::synthesis::{NarrativeSynthesizer, SynthesisRequest};

/// 按预设返回输出的提取器，`None` 表示调用失败
pub struct ScriptedExtractor {
    output: Option<String>,
    delay: Option<Duration>,
}

impl ScriptedExtractor {
    pub fn returning(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            output: None,
            delay: None,
        }
    }

    pub fn delayed(output: impl Into<String>, delay: Duration) -> Self {
        Self {
            output: Some(output.into()),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl TextExtractor for ScriptedExtractor {
    async fn extract(&self, _image: &[u8], _document_type: DocumentType) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.output.clone().ok_or_else(|| anyhow!("extraction service unavailable"))
    }
}

/// 记录调用参数的查询
#[derive(Default)]
pub struct RecordingLookup {
    record: DrugRecord,
    calls: Mutex<Vec<String>>,
}

impl RecordingLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: DrugRecord) -> Self {
        Self {
            record,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl DrugLookup for RecordingLookup {
    async fn lookup(&self, drug_name: &str) -> DrugRecord {
        self.calls.lock().await.push(drug_name.to_string());
        self.record.clone()
    }
}

/// 按预设返回输出并记录请求的生成器
pub struct ScriptedSynthesizer {
    output: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl ScriptedSynthesizer {
    pub fn returning(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            output: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(output: impl Into<String>, delay: Duration) -> Self {
        Self {
            output: Some(output.into()),
            delay: Some(delay),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl NarrativeSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String> {
        self.requests.lock().await.push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.output.clone().ok_or_else(|| anyhow!("synthesis service unavailable"))
    }
}
