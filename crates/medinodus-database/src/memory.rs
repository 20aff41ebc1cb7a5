//! 内存存储实现，用于测试

use async_trait::async_trait;
use chrono::Utc;
use medinodus_core::{
    HistoryEntry, MedError, MedicalHistoryRecord, MedicalInfoPatch, NewUser, Result, User,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{HistoryStore, UserStore};

/// 内存存储，锁只在单次操作内持有
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    records: Arc<RwLock<HashMap<Uuid, MedicalHistoryRecord>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟存储不可写
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MedError::Database("write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.check_writable()?;
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(MedError::Validation("Email already registered".to_string()));
        }

        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            hashed_password: user.hashed_password,
            full_name: user.full_name,
            created_at: Utc::now(),
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn find_record(&self, user_id: Uuid) -> Result<Option<MedicalHistoryRecord>> {
        Ok(self.records.read().await.get(&user_id).cloned())
    }

    async fn get_or_create(&self, user_id: Uuid) -> Result<MedicalHistoryRecord> {
        if let Some(record) = self.records.read().await.get(&user_id) {
            return Ok(record.clone());
        }

        self.check_writable()?;
        let mut records = self.records.write().await;
        let record = records
            .entry(user_id)
            .or_insert_with(|| MedicalHistoryRecord::empty(user_id));
        Ok(record.clone())
    }

    async fn patch(&self, user_id: Uuid, patch: MedicalInfoPatch) -> Result<MedicalHistoryRecord> {
        self.check_writable()?;
        let mut records = self.records.write().await;
        let record = records
            .entry(user_id)
            .or_insert_with(|| MedicalHistoryRecord::empty(user_id));
        record.apply_patch(&patch);
        Ok(record.clone())
    }

    async fn append_entry(&self, user_id: Uuid, entry: HistoryEntry) -> Result<(MedicalHistoryRecord, usize)> {
        self.check_writable()?;
        let mut records = self.records.write().await;
        let record = records
            .entry(user_id)
            .or_insert_with(|| MedicalHistoryRecord::empty(user_id));
        record.history.push(entry);
        record.updated_at = Utc::now();
        let length = record.history.len();
        Ok((record.clone(), length))
    }
}
