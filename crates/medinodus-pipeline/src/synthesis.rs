//! 综合分析生成
//!
//! 把提取字段、说明书记录和患者背景组装成一次模型请求。
//! 输出仍是不可信文本，由调用方做容错解析。

use anyhow::Result;
use async_trait::async_trait;
use medinodus_core::{DocumentType, MedicalHistoryRecord, MedicineExtraction, ReportExtraction};
use medinodus_integration::{ChatClient, DrugRecord};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// 患者背景中带入的最近病史条数
pub const RECENT_HISTORY_ENTRIES: usize = 5;

/// 提取阶段得到的结构化字段
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ExtractedFields {
    Medicine(MedicineExtraction),
    Report(ReportExtraction),
}

impl ExtractedFields {
    pub fn document_type(&self) -> DocumentType {
        match self {
            ExtractedFields::Medicine(_) => DocumentType::Medicine,
            ExtractedFields::Report(_) => DocumentType::Report,
        }
    }
}

/// 患者背景
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PatientContext {
    pub allergy: Vec<String>,
    pub current_medication: Vec<String>,
    pub chronic_condition: Vec<String>,
    pub recent_history: Vec<String>,
}

impl PatientContext {
    pub fn from_record(record: &MedicalHistoryRecord) -> Self {
        Self {
            allergy: record.allergy.clone().unwrap_or_default(),
            current_medication: record.current_medication.clone().unwrap_or_default(),
            chronic_condition: record.chronic_condition.clone().unwrap_or_default(),
            recent_history: record
                .recent_entries(RECENT_HISTORY_ENTRIES)
                .iter()
                .map(|entry| entry.digest())
                .collect(),
        }
    }
}

/// 综合分析请求
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub fields: ExtractedFields,
    /// 只有药品才会查询，报告为空记录
    pub drug_record: DrugRecord,
    pub patient: PatientContext,
}

/// 综合分析生成器
#[async_trait]
pub trait NarrativeSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String>;
}

const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a careful medical assistant explaining documents to patients \
in plain language. Base every statement on the supplied data. Reply with a single JSON object and nothing else.";

const MEDICINE_SHAPE: &str = r#"{"drug_name": string, "strength": string,
 "indications": [string], "usage_instructions": [string], "warnings": [string],
 "prescription_drug": "Yes" | "No" | "Unknown"}"#;

const REPORT_SHAPE: &str = r#"{"patient_name": string, "report_date": string, "summary": string,
 "abnormalities": ["<test>: <value> vs <reference> (<high|low>)"], "medications": [string],
 "recommendations": [string]}"#;

/// 组装用户提示词
pub fn build_prompt(request: &SynthesisRequest) -> Result<String> {
    let mut prompt = String::new();

    match &request.fields {
        ExtractedFields::Medicine(_) => {
            prompt.push_str("Explain this medicine to the patient.\n\n");
            prompt.push_str("Fields read from the package:\n");
            prompt.push_str(&serde_json::to_string_pretty(&request.fields)?);
            prompt.push_str("\n\nOfficial label information (may be empty):\n");
            if request.drug_record.is_empty() {
                prompt.push_str("none found");
            } else {
                prompt.push_str(&serde_json::to_string_pretty(&request.drug_record)?);
            }
        }
        ExtractedFields::Report(_) => {
            prompt.push_str("Summarise this laboratory report for the patient and flag values outside their reference range.\n\n");
            prompt.push_str("Fields read from the report:\n");
            prompt.push_str(&serde_json::to_string_pretty(&request.fields)?);
        }
    }

    prompt.push_str("\n\nPatient background:\n");
    prompt.push_str(&serde_json::to_string_pretty(&request.patient)?);
    prompt.push_str("\nMention interactions with the patient's allergies, medications or conditions where relevant.");

    prompt.push_str("\n\nReturn JSON with exactly this shape, using \"Unknown\" where the data is insufficient:\n");
    prompt.push_str(match request.fields {
        ExtractedFields::Medicine(_) => MEDICINE_SHAPE,
        ExtractedFields::Report(_) => REPORT_SHAPE,
    });
    Ok(prompt)
}

/// 基于文本模型的生成器
pub struct LlmSynthesizer {
    client: Arc<ChatClient>,
    model: String,
}

impl LlmSynthesizer {
    pub fn new(client: Arc<ChatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl NarrativeSynthesizer for LlmSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String> {
        let prompt = build_prompt(request)?;
        info!(
            "Synthesizing {} analysis ({} history entries in context)",
            request.fields.document_type(),
            request.patient.recent_history.len()
        );
        self.client
            .chat(&self.model, Some(SYNTHESIS_SYSTEM_PROMPT), &prompt, &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medinodus_core::{AnalysisResult, HistoryEntry, ReportAnalysis};
    use uuid::Uuid;

    fn aspirin_request() -> SynthesisRequest {
        SynthesisRequest {
            fields: ExtractedFields::Medicine(MedicineExtraction {
                drug_name: "Aspirin".to_string(),
                strength: "500 mg".to_string(),
            }),
            drug_record: DrugRecord::default(),
            patient: PatientContext {
                allergy: vec!["penicillin".to_string()],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_patient_context_from_record() {
        let mut record = MedicalHistoryRecord::empty(Uuid::new_v4());
        record.allergy = Some(vec!["penicillin".to_string()]);
        for i in 0..7 {
            record.history.push(HistoryEntry::new(
                format!("img-{}", i),
                DocumentType::Report,
                AnalysisResult::Report(ReportAnalysis {
                    patient_name: "Ana".to_string(),
                    report_date: "2024-01-01".to_string(),
                    summary: "ok".to_string(),
                    abnormalities: vec![format!("marker {}", i)],
                    medications: vec![],
                    recommendations: vec![],
                }),
            ));
        }

        let context = PatientContext::from_record(&record);
        assert_eq!(context.allergy, vec!["penicillin".to_string()]);
        assert!(context.current_medication.is_empty());
        assert_eq!(context.recent_history.len(), RECENT_HISTORY_ENTRIES);
        assert!(context.recent_history[0].contains("marker 2"));
        assert!(context.recent_history[4].contains("marker 6"));
    }

    #[test]
    fn test_medicine_prompt_contents() {
        let prompt = build_prompt(&aspirin_request()).unwrap();
        assert!(prompt.contains("\"drug_name\": \"Aspirin\""));
        assert!(prompt.contains("none found"));
        assert!(prompt.contains("penicillin"));
        assert!(prompt.contains("prescription_drug"));
    }

    #[test]
    fn test_report_prompt_contents() {
        let request = SynthesisRequest {
            fields: ExtractedFields::Report(ReportExtraction {
                patient_name: "Ana Betz".to_string(),
                report_date: "2011-08-25".to_string(),
                test_results: vec!["Hemoglobin: 10 g/dL (11.0-16.0)".to_string()],
            }),
            drug_record: DrugRecord::default(),
            patient: PatientContext::default(),
        };
        let prompt = build_prompt(&request).unwrap();
        assert!(prompt.contains("Hemoglobin: 10 g/dL (11.0-16.0)"));
        assert!(prompt.contains("recommendations"));
        assert!(!prompt.contains("label information"));
    }
}
