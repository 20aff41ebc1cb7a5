//! 数据库模型

use chrono::{DateTime, Utc};
use medinodus_core::{HistoryEntry, MedicalHistoryRecord, User};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库用户表
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(db_user: DbUser) -> Self {
        User {
            id: db_user.id,
            email: db_user.email,
            hashed_password: db_user.hashed_password,
            full_name: db_user.full_name,
            created_at: db_user.created_at,
        }
    }
}

/// 数据库病史档案表，病史条目以JSONB数组内嵌
#[derive(Debug, FromRow)]
pub struct DbMedicalRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub allergy: Option<Vec<String>>,
    pub current_medication: Option<Vec<String>>,
    pub chronic_condition: Option<Vec<String>>,
    pub history: Json<Vec<HistoryEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbMedicalRecord> for MedicalHistoryRecord {
    fn from(db_record: DbMedicalRecord) -> Self {
        MedicalHistoryRecord {
            id: db_record.id,
            user_id: db_record.user_id,
            allergy: db_record.allergy,
            current_medication: db_record.current_medication,
            chronic_condition: db_record.chronic_condition,
            history: db_record.history.0,
            created_at: db_record.created_at,
            updated_at: db_record.updated_at,
        }
    }
}
