//! # MediNodus Web模块
//!
//! HTTP接口层：认证、病史信息维护和图片上传分析。

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use auth::{CurrentUser, IdentityService};
pub use error::{ApiError, ApiResult};
pub use server::{create_app, WebServer};
pub use state::AppState;
