//! 图片存储管理

use medinodus_core::utils::generate_image_name;
use medinodus_core::{MedError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 图片存储，不去重，不回收
pub struct ImageStore {
    base_path: PathBuf,
}

impl ImageStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// 确保存储目录存在
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| MedError::Storage(format!("cannot create {}: {}", self.base_path.display(), e)))
    }

    /// 以随机文件名保存图片，返回图片引用
    pub async fn save_image(&self, data: &[u8], filename: &str) -> Result<String> {
        let full_path = self.base_path.join(generate_image_name(filename));
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data)
            .await
            .map_err(|e| MedError::Storage(format!("cannot write image: {}", e)))?;

        debug!("Stored image {} ({} bytes)", full_path.display(), data.len());
        Ok(full_path.to_string_lossy().to_string())
    }
}
