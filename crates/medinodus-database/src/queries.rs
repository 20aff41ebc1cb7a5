//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use medinodus_core::{HistoryEntry, MedError, MedicalHistoryRecord, MedicalInfoPatch, NewUser, Result, User};
use sqlx::types::Json;
use uuid::Uuid;

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 用户表，邮箱唯一
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email VARCHAR(320) UNIQUE NOT NULL,
                hashed_password TEXT NOT NULL,
                full_name VARCHAR(255),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        // 病史档案表，每个用户一条
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS medical_records (
                id UUID PRIMARY KEY,
                user_id UUID UNIQUE NOT NULL REFERENCES users(id),
                allergy TEXT[],
                current_medication TEXT[],
                chronic_condition TEXT[],
                history JSONB NOT NULL DEFAULT '[]'::jsonb,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    // ========== 用户相关操作 ==========

    /// 创建新用户，邮箱重复时返回验证错误
    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbUser>(r#"
            INSERT INTO users (id, email, hashed_password, full_name)
            VALUES ($1, $2, $3, $4)
            RETURNING *
        "#)
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(&user.full_name)
        .fetch_one(pool)
        .await;

        match result {
            Ok(db_user) => Ok(User::from(db_user)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(MedError::Validation("Email already registered".to_string()))
            }
            Err(e) => Err(MedError::Database(e.to_string())),
        }
    }

    /// 根据邮箱查找用户
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        Ok(result.map(User::from))
    }

    /// 根据ID查找用户
    pub async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbUser>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(result.map(User::from))
    }

    // ========== 病史档案相关操作 ==========

    /// 根据用户ID查找档案
    pub async fn get_record_by_user_id(&self, user_id: &Uuid) -> Result<Option<MedicalHistoryRecord>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbMedicalRecord>(
            "SELECT * FROM medical_records WHERE user_id = $1"
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(result.map(MedicalHistoryRecord::from))
    }

    /// 获取或创建档案，并发首次访问由user_id唯一约束收敛为一条
    pub async fn get_or_create_record(&self, user_id: &Uuid) -> Result<MedicalHistoryRecord> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            INSERT INTO medical_records (id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
        "#)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(pool)
        .await?;

        let record = sqlx::query_as::<_, DbMedicalRecord>(
            "SELECT * FROM medical_records WHERE user_id = $1"
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(MedicalHistoryRecord::from(record))
    }

    /// 合并更新基本信息，未提供的字段保持不变
    pub async fn patch_record(&self, user_id: &Uuid, patch: &MedicalInfoPatch) -> Result<MedicalHistoryRecord> {
        let pool = self.pool.pool();

        let record = sqlx::query_as::<_, DbMedicalRecord>(r#"
            INSERT INTO medical_records (id, user_id, allergy, current_medication, chronic_condition)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                allergy = COALESCE(EXCLUDED.allergy, medical_records.allergy),
                current_medication = COALESCE(EXCLUDED.current_medication, medical_records.current_medication),
                chronic_condition = COALESCE(EXCLUDED.chronic_condition, medical_records.chronic_condition),
                updated_at = NOW()
            RETURNING *
        "#)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&patch.allergy)
        .bind(&patch.current_medication)
        .bind(&patch.chronic_condition)
        .fetch_one(pool)
        .await?;

        Ok(MedicalHistoryRecord::from(record))
    }

    /// 追加病史条目，单条语句内完成，追加顺序由行锁保证
    pub async fn append_history_entry(&self, user_id: &Uuid, entry: &HistoryEntry) -> Result<MedicalHistoryRecord> {
        let pool = self.pool.pool();

        let record = sqlx::query_as::<_, DbMedicalRecord>(r#"
            INSERT INTO medical_records (id, user_id, history)
            VALUES ($1, $2, jsonb_build_array($3::jsonb))
            ON CONFLICT (user_id) DO UPDATE SET
                history = medical_records.history || EXCLUDED.history,
                updated_at = NOW()
            RETURNING *
        "#)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(Json(entry))
        .fetch_one(pool)
        .await?;

        Ok(MedicalHistoryRecord::from(record))
    }
}
