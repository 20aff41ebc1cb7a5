//! 分析流水线引擎
//!
//! 单次请求内严格串行：存图 → 提取 → 清洗解析 → 查询 → 读病史 → 生成 → 追加条目。
//! 提取和生成的失败、超时都按解析失败处理；只有存储失败会作为错误返回。
//! 完整跑完之前不会向病史写入任何条目。

use medinodus_core::{
    is_unknown, AnalysisResult, DocumentType, HistoryEntry, MedicalHistoryRecord, MedicineAnalysis,
    MedicineExtraction, ReportAnalysis, ReportExtraction, Result, ResultShape, UNKNOWN,
};
use medinodus_database::HistoryStore;
use medinodus_integration::DrugRecord;
use medinodus_storage::ImageStore;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::extraction::TextExtractor;
use crate::lookup::DrugLookup;
use crate::normalizer::normalize;
use crate::parser::{parse, ParseOutcome};
use crate::synthesis::{ExtractedFields, NarrativeSynthesizer, PatientContext, SynthesisRequest};

/// 一次分析的结果
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// 条目已写入病史
    Completed {
        history_length: usize,
        entry: HistoryEntry,
    },
    /// 图片中没有读到有用信息
    Unreadable,
    /// 生成结果无法解析，返回哨兵结构
    AnalysisFailed {
        analysis: AnalysisResult,
        raw_output: String,
    },
}

/// 分析流水线
pub struct AnalysisPipeline {
    extractor: Arc<dyn TextExtractor>,
    lookup: Arc<dyn DrugLookup>,
    synthesizer: Arc<dyn NarrativeSynthesizer>,
    history: Arc<dyn HistoryStore>,
    images: Arc<ImageStore>,
    stage_timeout: Duration,
}

impl AnalysisPipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        lookup: Arc<dyn DrugLookup>,
        synthesizer: Arc<dyn NarrativeSynthesizer>,
        history: Arc<dyn HistoryStore>,
        images: Arc<ImageStore>,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            lookup,
            synthesizer,
            history,
            images,
            stage_timeout,
        }
    }

    /// 分析一张上传的图片
    pub async fn analyze(
        &self,
        user_id: Uuid,
        image: &[u8],
        filename: &str,
        document_type: DocumentType,
    ) -> Result<AnalysisOutcome> {
        let start = Instant::now();
        info!("Analyzing {} image for user {}", document_type, user_id);

        let image_ref = self.images.save_image(image, filename).await?;

        let raw = self
            .bounded("extraction", self.extractor.extract(image, document_type))
            .await;
        let fields = match read_fields(document_type, &raw) {
            Some(fields) => fields,
            None => {
                info!("Nothing readable in {} image for user {}", document_type, user_id);
                return Ok(AnalysisOutcome::Unreadable);
            }
        };

        let drug_record = match &fields {
            ExtractedFields::Medicine(medicine) => self.lookup_drug(&medicine.drug_name).await,
            ExtractedFields::Report(_) => DrugRecord::default(),
        };

        // 只读病史，首个条目写入时才建档
        let record = self
            .history
            .find_record(user_id)
            .await?
            .unwrap_or_else(|| MedicalHistoryRecord::empty(user_id));
        let request = SynthesisRequest {
            fields,
            drug_record,
            patient: PatientContext::from_record(&record),
        };

        let raw = self
            .bounded("synthesis", self.synthesizer.synthesize(&request))
            .await;
        let analysis = match parse_analysis(document_type, &raw) {
            ParseOutcome::Structured(analysis) => analysis,
            ParseOutcome::Fallback { value, raw_output } => {
                warn!("Analysis output for user {} could not be parsed", user_id);
                return Ok(AnalysisOutcome::AnalysisFailed {
                    analysis: value,
                    raw_output,
                });
            }
        };

        let entry = HistoryEntry::new(image_ref, document_type, analysis);
        let (_, history_length) = self.history.append_entry(user_id, entry.clone()).await?;

        info!(
            user_id = %user_id,
            document_type = %document_type,
            history_length,
            elapsed_ms = %start.elapsed().as_millis(),
            "Analysis completed"
        );
        Ok(AnalysisOutcome::Completed {
            history_length,
            entry,
        })
    }

    /// 带超时的外部调用，失败或超时返回空输出
    async fn bounded<F>(&self, stage: &str, call: F) -> String
    where
        F: Future<Output = anyhow::Result<String>>,
    {
        match tokio::time::timeout(self.stage_timeout, call).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("{} failed: {:#}", stage, e);
                String::new()
            }
            Err(_) => {
                warn!("{} timed out after {:?}", stage, self.stage_timeout);
                String::new()
            }
        }
    }

    async fn lookup_drug(&self, drug_name: &str) -> DrugRecord {
        match tokio::time::timeout(self.stage_timeout, self.lookup.lookup(drug_name)).await {
            Ok(record) => record,
            Err(_) => {
                warn!("Drug lookup for {} timed out", drug_name);
                DrugRecord::default()
            }
        }
    }
}

/// 清洗单值字段，空值归为哨兵
fn clean_value(value: &str) -> String {
    let cleaned = normalize(value);
    if is_unknown(&cleaned) {
        UNKNOWN.to_string()
    } else {
        cleaned
    }
}

/// 化验结果行只合并空白，保留括号里的参考范围
fn clean_result_line(line: &str) -> Option<String> {
    let cleaned = line
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!is_unknown(&cleaned)).then_some(cleaned)
}

/// 解析并清洗提取结果，读不到有用信息时返回 `None`
fn read_fields(document_type: DocumentType, raw: &str) -> Option<ExtractedFields> {
    if normalize(raw).is_empty() {
        return None;
    }

    let fields = match document_type {
        DocumentType::Medicine => {
            let (parsed, is_fallback) = parse::<MedicineExtraction>(raw).into_parts();
            if is_fallback {
                return None;
            }
            let cleaned = MedicineExtraction {
                drug_name: clean_value(&parsed.drug_name),
                strength: clean_value(&parsed.strength),
            };
            if cleaned.is_unreadable() {
                return None;
            }
            ExtractedFields::Medicine(cleaned)
        }
        DocumentType::Report => {
            let (parsed, is_fallback) = parse::<ReportExtraction>(raw).into_parts();
            if is_fallback {
                return None;
            }
            let cleaned = ReportExtraction {
                patient_name: clean_value(&parsed.patient_name),
                report_date: clean_value(&parsed.report_date),
                test_results: parsed
                    .test_results
                    .iter()
                    .filter_map(|line| clean_result_line(line))
                    .collect(),
            };
            if cleaned.is_unreadable() {
                return None;
            }
            ExtractedFields::Report(cleaned)
        }
    };
    Some(fields)
}

fn parse_analysis(document_type: DocumentType, raw: &str) -> ParseOutcome<AnalysisResult> {
    match document_type {
        DocumentType::Medicine => parse::<MedicineAnalysis>(raw).map(AnalysisResult::Medicine),
        DocumentType::Report => parse::<ReportAnalysis>(raw).map(AnalysisResult::Report),
    }
}
