//! MediNodus服务器主程序

use anyhow::Context;
use clap::Parser;
use medinodus_core::Settings;
use medinodus_database::{DatabasePool, DatabaseQueries, PgStore};
use medinodus_integration::{ChatClient, Connector, OpenFdaClient};
use medinodus_pipeline::{AnalysisPipeline, LlmSynthesizer, OpenFdaLookup, VisionExtractor};
use medinodus_storage::ImageStore;
use medinodus_web::{AppState, IdentityService, WebServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// MediNodus服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "medinodus-server")]
#[command(about = "MediNodus 医疗文档助手后端服务")]
struct Args {
    /// 服务器端口，覆盖配置
    #[arg(short, long)]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .init();

    info!("Starting MediNodus server...");

    // 配置缺失直接退出
    let mut settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    if let Some(port) = args.port {
        settings.port = port;
    }
    info!("Settings: {:?}", settings);

    // 数据库不可达直接退出
    let pool = Arc::new(
        DatabasePool::connect(
            &settings.database_url,
            &settings.database_name,
            settings.db_max_connections,
        )
        .await
        .context("Failed to connect to database")?,
    );
    pool.ping().await.context("Database ping failed")?;
    DatabaseQueries::new(&pool)
        .create_tables()
        .await
        .context("Failed to create tables")?;

    let images = Arc::new(ImageStore::new(&settings.storage_dir));
    images.init().await.context("Failed to prepare image storage")?;

    // 外部服务客户端，进程内各一个实例
    let chat = Arc::new(ChatClient::new(
        &settings.model_base_url,
        settings.model_api_key.clone(),
        settings.request_timeout(),
    )?);
    let openfda = Arc::new(OpenFdaClient::new(&settings.openfda_url, settings.lookup_timeout())?);

    let connectors: [&dyn Connector; 2] = [chat.as_ref(), openfda.as_ref()];
    for connector in connectors {
        match connector.check_connection().await {
            Ok(true) => info!("Connector {} is reachable", connector.name()),
            Ok(false) => warn!("Connector {} responded with an error status", connector.name()),
            Err(e) => warn!("Connector {} is unreachable: {:#}", connector.name(), e),
        }
    }

    let store = Arc::new(PgStore::new(pool.clone()));
    let pipeline = AnalysisPipeline::new(
        Arc::new(VisionExtractor::new(chat.clone(), settings.vision_model.clone())),
        Arc::new(OpenFdaLookup::new(openfda)),
        Arc::new(LlmSynthesizer::new(chat, settings.text_model.clone())),
        store.clone(),
        images,
        settings.request_timeout(),
    );

    let state = AppState {
        service_name: settings.project_name.clone(),
        identity: Arc::new(IdentityService::new(&settings.secret_key, settings.token_ttl_hours)),
        users: store.clone(),
        history: store,
        pipeline: Arc::new(pipeline),
        max_upload_bytes: settings.max_upload_bytes,
    };

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .context("Invalid listen address")?;

    let result = WebServer::new(addr, state).run(shutdown_signal()).await;

    pool.close().await;
    if let Err(e) = &result {
        error!("Server failed: {}", e);
    }
    result.map_err(Into::into)
}

/// 等待Ctrl-C或SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
