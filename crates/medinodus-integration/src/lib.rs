//! # MediNodus集成模块
//!
//! 提供与外部服务的连接器：
//! - Ollama兼容的对话/视觉模型服务，用于图片文字提取和分析生成
//! - openFDA药品说明书查询

pub mod chat;
pub mod connectors;
pub mod openfda;

pub use chat::ChatClient;
pub use connectors::Connector;
pub use openfda::{DrugRecord, OpenFdaClient};
