//! 数据库连接管理

use medinodus_core::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// 数据库连接池
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// 连接数据库，连接失败直接返回错误
    pub async fn connect(database_url: &str, database_name: &str, max_connections: u32) -> Result<Self> {
        let options = PgConnectOptions::from_str(database_url)?.database(database_name);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;

        info!("Connected to database {}", database_name);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 连通性检查
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
