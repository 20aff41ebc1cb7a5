//! # MediNodus Core
//!
//! 医疗文档助手的核心模块，提供数据模型、分析结果结构、错误定义、配置加载和通用工具。

pub mod analysis;
pub mod error;
pub mod models;
pub mod settings;
pub mod utils;

pub use analysis::*;
pub use error::{MedError, Result};
pub use models::*;
pub use settings::Settings;
