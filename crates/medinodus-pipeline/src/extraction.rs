//! 图片文字提取

use anyhow::Result;
use async_trait::async_trait;
use medinodus_core::DocumentType;
use medinodus_integration::ChatClient;
use std::sync::Arc;
use tracing::info;

/// 文字提取器
///
/// 返回模型原始输出，格式不保证是合法JSON，下游必须容错解析。
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image: &[u8], document_type: DocumentType) -> Result<String>;
}

const EXTRACTION_SYSTEM_PROMPT: &str = "You transcribe medical documents from photographs. \
Only report what is legible in the image. Never guess. Reply with a single JSON object and nothing else.";

const MEDICINE_PROMPT: &str = r#"Read the medicine packaging in this image.
Return JSON with exactly these keys:
{"drug_name": "<name printed on the package>", "strength": "<dose per unit, e.g. 500 mg>"}
Use "Unknown" for any value you cannot read."#;

const REPORT_PROMPT: &str = r#"Read the laboratory report in this image.
Return JSON with exactly these keys:
{"patient_name": "<name>", "report_date": "<date as printed>",
 "test_results": ["<test>: <value> <unit> (<reference range>)", ...]}
Use "Unknown" for any value you cannot read and an empty list if no results are legible."#;

fn extraction_prompt(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Medicine => MEDICINE_PROMPT,
        DocumentType::Report => REPORT_PROMPT,
    }
}

/// 基于视觉模型的提取器
pub struct VisionExtractor {
    client: Arc<ChatClient>,
    model: String,
}

impl VisionExtractor {
    pub fn new(client: Arc<ChatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextExtractor for VisionExtractor {
    async fn extract(&self, image: &[u8], document_type: DocumentType) -> Result<String> {
        info!("Extracting {} fields from {} byte image", document_type, image.len());
        self.client
            .chat(
                &self.model,
                Some(EXTRACTION_SYSTEM_PROMPT),
                extraction_prompt(document_type),
                &[image],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_vision_extractor_sends_image_and_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "vision-model",
                "messages": [
                    {"role": "system", "content": EXTRACTION_SYSTEM_PROMPT},
                    {"role": "user", "content": REPORT_PROMPT, "images": ["cGl4ZWxz"]}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"content": "{\"patient_name\": \"Ana Betz\"}"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(ChatClient::new(&server.uri(), None, Duration::from_secs(5)).unwrap());
        let extractor = VisionExtractor::new(client, "vision-model");
        let raw = extractor.extract(b"pixels", DocumentType::Report).await.unwrap();
        assert_eq!(raw, "{\"patient_name\": \"Ana Betz\"}");
    }

    #[test]
    fn test_prompt_per_document_type() {
        assert!(extraction_prompt(DocumentType::Medicine).contains("drug_name"));
        assert!(extraction_prompt(DocumentType::Report).contains("test_results"));
    }
}
