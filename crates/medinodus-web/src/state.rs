//! 应用共享状态

use medinodus_database::{HistoryStore, UserStore};
use medinodus_pipeline::AnalysisPipeline;
use std::sync::Arc;

use crate::auth::IdentityService;

/// 处理器共享状态，进程启动时构建一次
#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub identity: Arc<IdentityService>,
    pub users: Arc<dyn UserStore>,
    pub history: Arc<dyn HistoryStore>,
    pub pipeline: Arc<AnalysisPipeline>,
    pub max_upload_bytes: usize,
}
