//! 存储接口
//!
//! 持久化存储是请求之间唯一共享的可变资源，上层只依赖这里的trait。

use async_trait::async_trait;
use medinodus_core::{HistoryEntry, MedicalHistoryRecord, MedicalInfoPatch, NewUser, Result, User};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::connection::DatabasePool;
use crate::queries::DatabaseQueries;

/// 用户账户存储
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 创建用户，邮箱已注册时返回 `MedError::Validation`
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;
}

/// 病史档案存储
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn find_record(&self, user_id: Uuid) -> Result<Option<MedicalHistoryRecord>>;

    /// 获取或创建空档案
    async fn get_or_create(&self, user_id: Uuid) -> Result<MedicalHistoryRecord>;

    /// 合并更新，档案不存在时创建
    async fn patch(&self, user_id: Uuid, patch: MedicalInfoPatch) -> Result<MedicalHistoryRecord>;

    /// 追加条目，返回更新后的档案和追加后的条目数
    async fn append_entry(&self, user_id: Uuid, entry: HistoryEntry) -> Result<(MedicalHistoryRecord, usize)>;
}

/// PostgreSQL存储实现
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<DatabasePool>,
}

impl PgStore {
    pub fn new(pool: Arc<DatabasePool>) -> Self {
        Self { pool }
    }

    fn queries(&self) -> DatabaseQueries<'_> {
        DatabaseQueries::new(&self.pool)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.queries().create_user(&user).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.queries().get_user_by_email(email).await
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.queries().get_user_by_id(&id).await
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn find_record(&self, user_id: Uuid) -> Result<Option<MedicalHistoryRecord>> {
        self.queries().get_record_by_user_id(&user_id).await
    }

    async fn get_or_create(&self, user_id: Uuid) -> Result<MedicalHistoryRecord> {
        self.queries().get_or_create_record(&user_id).await
    }

    async fn patch(&self, user_id: Uuid, patch: MedicalInfoPatch) -> Result<MedicalHistoryRecord> {
        self.queries().patch_record(&user_id, &patch).await
    }

    async fn append_entry(&self, user_id: Uuid, entry: HistoryEntry) -> Result<(MedicalHistoryRecord, usize)> {
        let record = self.queries().append_history_entry(&user_id, &entry).await?;
        let length = record.history.len();
        debug!("Appended history entry for user {} (length {})", user_id, length);
        Ok((record, length))
    }
}
