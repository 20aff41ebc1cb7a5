//! HTTP处理器

use axum::{
    extract::{Multipart, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use medinodus_core::{AnalysisResult, DocumentType, HistoryEntry, MedError, MedicalInfo, MedicalInfoPatch};
use medinodus_pipeline::AnalysisOutcome;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// 上传图片可用的表单字段名
const IMAGE_FIELDS: [&str; 2] = ["image", "file"];

/// API根路径处理器
pub async fn api_root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "auth": "/auth",
            "medical": "/med"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 上传分析响应
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_entry: Option<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl UploadResponse {
    fn failure(message: &str) -> Self {
        Self {
            status: "failure",
            message: message.to_string(),
            history_length: None,
            latest_entry: None,
            analysis: None,
            raw_output: None,
        }
    }

    fn from_outcome(outcome: AnalysisOutcome, document_type: DocumentType) -> Self {
        match outcome {
            AnalysisOutcome::Completed {
                history_length,
                entry,
            } => Self {
                status: "success",
                message: match document_type {
                    DocumentType::Medicine => "Medicine image analysed".to_string(),
                    DocumentType::Report => "Report image analysed".to_string(),
                },
                history_length: Some(history_length),
                latest_entry: Some(entry),
                analysis: None,
                raw_output: None,
            },
            AnalysisOutcome::Unreadable => Self::failure("Could not read image"),
            AnalysisOutcome::AnalysisFailed {
                analysis,
                raw_output,
            } => Self {
                analysis: Some(analysis),
                raw_output: Some(raw_output),
                ..Self::failure("Could not analyse document")
            },
        }
    }
}

/// 从multipart表单读取图片
async fn read_image(multipart: &mut Multipart) -> ApiResult<(Vec<u8>, String)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MedError::Validation(e.body_text()))?
    {
        if !field.name().map(|name| IMAGE_FIELDS.contains(&name)).unwrap_or(false) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| MedError::Validation(e.body_text()))?;
        if data.is_empty() {
            return Err(MedError::Validation("Uploaded image is empty".to_string()).into());
        }
        return Ok((data.to_vec(), filename));
    }

    Err(MedError::Validation("Missing image file".to_string()).into())
}

async fn analyze_upload(
    state: &AppState,
    user: CurrentUser,
    mut multipart: Multipart,
    document_type: DocumentType,
) -> ApiResult<Json<UploadResponse>> {
    let (image, filename) = read_image(&mut multipart).await?;
    info!(
        "User {} uploaded {} image {} ({} bytes)",
        user.0,
        document_type,
        filename,
        image.len()
    );

    let outcome = state
        .pipeline
        .analyze(user.0, &image, &filename, document_type)
        .await?;
    Ok(Json(UploadResponse::from_outcome(outcome, document_type)))
}

/// 上传药品图片
pub async fn upload_medicine_image(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    analyze_upload(&state, user, multipart, DocumentType::Medicine).await
}

/// 上传化验报告图片
pub async fn upload_medical_report_image(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    analyze_upload(&state, user, multipart, DocumentType::Report).await
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(rename = "type")]
    pub document_type: Option<String>,
}

/// 按查询参数指定类型上传图片
pub async fn upload_medical_image(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let document_type: DocumentType = query.document_type.as_deref().unwrap_or_default().parse()?;
    analyze_upload(&state, user, multipart, document_type).await
}

/// 更新病史基本信息（合并更新）
pub async fn update_medical_info(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(patch): Json<MedicalInfoPatch>,
) -> ApiResult<Json<MedicalInfo>> {
    let record = state.history.patch(user.0, patch).await?;
    info!("Updated medical info for user {}", user.0);
    Ok(Json(record.info()))
}

/// 获取病史基本信息
pub async fn get_medical_info(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<MedicalInfo>> {
    let record = state
        .history
        .find_record(user.0)
        .await?
        .ok_or_else(|| MedError::NotFound("No medical record found".to_string()))?;
    Ok(Json(record.info()))
}

/// 获取病史条目
pub async fn get_history(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let history = state
        .history
        .find_record(user.0)
        .await?
        .map(|record| record.history)
        .unwrap_or_default();

    Ok(Json(json!({
        "count": history.len(),
        "history": history
    })))
}
