//! Web服务器

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use medinodus_core::{MedError, Result};
use std::future::Future;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::auth::{auth_middleware, current_user_handler, login_handler, logout_handler, register_handler};
use crate::handlers::{
    api_root, get_history, get_medical_info, health, update_medical_info, upload_medical_image,
    upload_medical_report_image, upload_medicine_image,
};
use crate::state::AppState;

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            app: create_app(state),
        }
    }

    /// 运行服务器，`shutdown` 完成后停止接收新连接并等待处理中的请求结束
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| MedError::Internal(format!("web server failed: {}", e)))?;

        info!("Web server stopped");
        Ok(())
    }
}

/// 构建路由
pub fn create_app(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        // 根路径和健康检查
        .route("/", get(api_root))
        .route("/health", get(health))
        // 认证路由（无需token）
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        // 需要认证的路由
        .merge(protected_routes(state.clone()))
        .with_state(state)
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout_handler))
        .route("/auth/me", get(current_user_handler))
        .route("/med/upload-medicine-image", post(upload_medicine_image))
        .route("/med/upload-medical-report-image", post(upload_medical_report_image))
        .route("/med/upload-medical-image", post(upload_medical_image))
        .route("/med/infoupdate", post(update_medical_info))
        .route("/med/infoget", get(get_medical_info))
        .route("/med/history", get(get_history))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
