//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::error::MedError;

/// 用户账户
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String, // 唯一标识，已规范化为小写
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            created_at: self.created_at,
        }
    }
}

/// 新用户插入模型
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
}

/// 用户信息（不包含密码哈希）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 文档类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DocumentType {
    /// 药品包装
    #[serde(rename = "med", alias = "medicine")]
    Medicine,
    /// 化验报告
    #[serde(rename = "report")]
    Report,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Medicine => "med",
            DocumentType::Report => "report",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = MedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "med" | "medicine" => Ok(DocumentType::Medicine),
            "report" => Ok(DocumentType::Report),
            _ => Err(MedError::Validation(
                "type must be 'med' or 'report'".to_string(),
            )),
        }
    }
}

/// 病史条目，创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub image_ref: String, // 图片存储路径
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub response: AnalysisResult,
}

impl HistoryEntry {
    pub fn new(image_ref: String, document_type: DocumentType, response: AnalysisResult) -> Self {
        Self {
            image_ref,
            date: Utc::now(),
            document_type,
            response,
        }
    }

    /// 用于提示词的单行摘要
    pub fn digest(&self) -> String {
        format!(
            "{} [{}] {}",
            self.date.format("%Y-%m-%d"),
            self.document_type,
            self.response.headline()
        )
    }
}

/// 用户病史档案，每个用户至多一份
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalHistoryRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub allergy: Option<Vec<String>>,
    pub current_medication: Option<Vec<String>>,
    pub chronic_condition: Option<Vec<String>>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicalHistoryRecord {
    pub fn empty(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            allergy: None,
            current_medication: None,
            chronic_condition: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 合并更新：只覆盖提供了的字段
    pub fn apply_patch(&mut self, patch: &MedicalInfoPatch) {
        if let Some(allergy) = &patch.allergy {
            self.allergy = Some(allergy.clone());
        }
        if let Some(current_medication) = &patch.current_medication {
            self.current_medication = Some(current_medication.clone());
        }
        if let Some(chronic_condition) = &patch.chronic_condition {
            self.chronic_condition = Some(chronic_condition.clone());
        }
        self.updated_at = Utc::now();
    }

    /// 最近的 `n` 条病史，按时间顺序
    pub fn recent_entries(&self, n: usize) -> &[HistoryEntry] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    pub fn info(&self) -> MedicalInfo {
        MedicalInfo {
            allergy: self.allergy.clone(),
            current_medication: self.current_medication.clone(),
            chronic_condition: self.chronic_condition.clone(),
        }
    }
}

/// 病史基本信息的部分更新
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicalInfoPatch {
    #[serde(default)]
    pub allergy: Option<Vec<String>>,
    #[serde(default)]
    pub current_medication: Option<Vec<String>>,
    #[serde(default)]
    pub chronic_condition: Option<Vec<String>>,
}

impl MedicalInfoPatch {
    pub fn is_empty(&self) -> bool {
        self.allergy.is_none() && self.current_medication.is_none() && self.chronic_condition.is_none()
    }
}

/// 病史基本信息视图
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalInfo {
    pub allergy: Option<Vec<String>>,
    pub current_medication: Option<Vec<String>>,
    pub chronic_condition: Option<Vec<String>>,
}
