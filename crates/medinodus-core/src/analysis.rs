//! 分析结果结构
//!
//! 模型输出是不可信的自由文本，解析后的每种结构都需要能够退化为
//! 全部字段为 "Unknown" 的哨兵值。

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 无法确定的字段的哨兵值
pub const UNKNOWN: &str = "Unknown";

/// 判断字段是否为空或哨兵值
pub fn is_unknown(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(UNKNOWN)
}

/// 可由模型输出解析出的结构
pub trait ResultShape: DeserializeOwned {
    /// 全部字段为哨兵值的退化结构
    fn unknown() -> Self;

    /// 是否没有提取到任何有用信息
    fn is_unreadable(&self) -> bool {
        false
    }
}

/// 处方药标记（三态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrescriptionStatus {
    Yes,
    No,
    #[default]
    Unknown,
}

impl Serialize for PrescriptionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            PrescriptionStatus::Yes => "Yes",
            PrescriptionStatus::No => "No",
            PrescriptionStatus::Unknown => UNKNOWN,
        })
    }
}

// 模型有时输出布尔值，有时输出字符串
impl<'de> Deserialize<'de> for PrescriptionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(PrescriptionStatus::Yes),
            Raw::Flag(false) => Ok(PrescriptionStatus::No),
            Raw::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "rx" | "prescription" => Ok(PrescriptionStatus::Yes),
                "no" | "false" | "otc" | "over-the-counter" => Ok(PrescriptionStatus::No),
                "unknown" | "" => Ok(PrescriptionStatus::Unknown),
                other => Err(D::Error::custom(format!(
                    "invalid prescription flag: {}",
                    other
                ))),
            },
        }
    }
}

// ========== 提取阶段 ==========

/// 药品图片提取字段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicineExtraction {
    pub drug_name: String,
    pub strength: String,
}

impl ResultShape for MedicineExtraction {
    fn unknown() -> Self {
        Self {
            drug_name: UNKNOWN.to_string(),
            strength: UNKNOWN.to_string(),
        }
    }

    fn is_unreadable(&self) -> bool {
        is_unknown(&self.drug_name) && is_unknown(&self.strength)
    }
}

/// 化验报告提取字段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportExtraction {
    pub patient_name: String,
    pub report_date: String,
    /// 形如 "Hemoglobin: 12 g/dL (11.0-16.0)"
    pub test_results: Vec<String>,
}

impl ResultShape for ReportExtraction {
    fn unknown() -> Self {
        Self {
            patient_name: UNKNOWN.to_string(),
            report_date: UNKNOWN.to_string(),
            test_results: Vec::new(),
        }
    }

    fn is_unreadable(&self) -> bool {
        self.test_results.iter().all(|r| is_unknown(r))
            && is_unknown(&self.patient_name)
            && is_unknown(&self.report_date)
    }
}

// ========== 综合分析阶段 ==========

/// 药品分析结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicineAnalysis {
    pub drug_name: String,
    pub strength: String,
    pub indications: Vec<String>,
    pub usage_instructions: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(alias = "is_prescription_drug")]
    pub prescription_drug: PrescriptionStatus,
}

impl ResultShape for MedicineAnalysis {
    fn unknown() -> Self {
        Self {
            drug_name: UNKNOWN.to_string(),
            strength: UNKNOWN.to_string(),
            indications: Vec::new(),
            usage_instructions: Vec::new(),
            warnings: Vec::new(),
            prescription_drug: PrescriptionStatus::Unknown,
        }
    }
}

/// 化验报告分析结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportAnalysis {
    pub patient_name: String,
    pub report_date: String,
    pub summary: String,
    pub abnormalities: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ResultShape for ReportAnalysis {
    fn unknown() -> Self {
        Self {
            patient_name: UNKNOWN.to_string(),
            report_date: UNKNOWN.to_string(),
            summary: UNKNOWN.to_string(),
            abnormalities: Vec::new(),
            medications: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// 按文档类型区分的分析结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AnalysisResult {
    Medicine(MedicineAnalysis),
    Report(ReportAnalysis),
}

impl AnalysisResult {
    pub fn headline(&self) -> String {
        match self {
            AnalysisResult::Medicine(m) => format!("{} {}", m.drug_name, m.strength),
            AnalysisResult::Report(r) => {
                if r.abnormalities.is_empty() {
                    "no abnormalities".to_string()
                } else {
                    format!("abnormal: {}", r.abnormalities.join("; "))
                }
            }
        }
    }
}
