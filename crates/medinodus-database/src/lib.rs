//! # MediNodus数据库模块
//!
//! 负责用户账户和病史档案的持久化，提供PostgreSQL连接池、查询操作，
//! 以及供上层依赖注入的存储接口。

pub mod connection;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod models;
pub mod queries;
pub mod store;

// 重新导出主要类型
pub use connection::DatabasePool;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
pub use queries::DatabaseQueries;
pub use store::{HistoryStore, PgStore, UserStore};
