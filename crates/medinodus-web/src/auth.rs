//! 用户认证
//!
//! 密码使用argon2加盐哈希，令牌为HS256签名的JWT。登出是无状态的，
//! 服务端不维护吊销列表，令牌在过期前始终有效。

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use medinodus_core::utils::normalize_email;
use medinodus_core::{MedError, NewUser, Result, UserInfo};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

/// 密码最短长度
pub const MIN_PASSWORD_CHARS: usize = 8;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_TOKEN: &str = "Invalid or expired token";

/// JWT Claims
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // 用户ID
    exp: i64,    // 过期时间
    iat: i64,    // 签发时间
}

/// 当前请求的已认证用户
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

/// 未知账户登录时用来校验的固定哈希，首次使用时计算
fn dummy_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        SaltString::encode_b64(b"medinodus-unknown-account")
            .and_then(|salt| {
                Argon2::default()
                    .hash_password(b"medinodus-unknown-account", &salt)
                    .map(|hash| hash.to_string())
            })
            .unwrap_or_default()
    })
}

/// 身份服务
pub struct IdentityService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    verifications: AtomicUsize,
}

impl IdentityService {
    pub fn new(secret: &str, token_ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl: Duration::hours(token_ttl_hours),
            verifications: AtomicUsize::new(0),
        }
    }

    /// 已执行的密码校验次数
    pub fn verification_count(&self) -> usize {
        self.verifications.load(Ordering::Relaxed)
    }

    /// 哈希密码，在阻塞线程池中执行
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut rand::rngs::OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| MedError::Internal(format!("password hashing failed: {}", e)))
        })
        .await
        .map_err(|e| MedError::Internal(format!("hashing task failed: {}", e)))?
    }

    /// 校验密码，哈希格式错误时视为不匹配
    pub async fn verify_password(&self, password: &str, hashed: &str) -> bool {
        self.run_verification(password, Some(hashed.to_string())).await
    }

    /// 账户不存在时对固定哈希做一次同样代价的校验，结果丢弃
    pub async fn verify_unknown_account(&self, password: &str) {
        self.run_verification(password, None).await;
    }

    async fn run_verification(&self, password: &str, hashed: Option<String>) -> bool {
        self.verifications.fetch_add(1, Ordering::Relaxed);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            let hashed = hashed.as_deref().unwrap_or_else(|| dummy_hash());
            match PasswordHash::new(hashed) {
                Ok(parsed) => Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok(),
                Err(_) => false,
            }
        })
        .await
        .unwrap_or(false)
    }

    /// 签发令牌，返回令牌和过期时间
    pub fn issue_token(&self, user_id: Uuid) -> Result<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| MedError::Internal(format!("token signing failed: {}", e)))?;
        Ok((token, expires_at))
    }

    /// 校验令牌，签名错误和过期返回同样的错误
    pub fn validate_token(&self, token: &str) -> Result<Uuid> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .ok()
            .and_then(|data| Uuid::parse_str(&data.claims.sub).ok())
            .ok_or_else(|| MedError::Unauthorized(INVALID_TOKEN.to_string()))
    }
}

/// 注册请求
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default, alias = "name")]
    pub full_name: Option<String>,
}

/// 登录请求，表单提交时邮箱字段名为 `username`
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

/// 登录请求体，支持JSON和表单两种编码
pub struct LoginPayload(pub LoginRequest);

#[async_trait]
impl<S> FromRequest<S> for LoginPayload
where
    S: Send + Sync,
{
    type Rejection = crate::error::ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        let request = if is_form {
            let Form(request) = Form::<LoginRequest>::from_request(req, state)
                .await
                .map_err(|e| MedError::Validation(e.body_text()))?;
            request
        } else {
            let Json(request) = Json::<LoginRequest>::from_request(req, state)
                .await
                .map_err(|e| MedError::Validation(e.body_text()))?;
            request
        };
        Ok(LoginPayload(request))
    }
}

/// 登录响应
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// 认证中间件
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| MedError::Unauthorized("Missing bearer token".to_string()))?;

    let user_id = state.identity.validate_token(token)?;
    request.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(request).await)
}

/// 注册处理器
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&request.email);
    if email.len() < 3 || !email.contains('@') {
        return Err(MedError::Validation("A valid email is required".to_string()).into());
    }
    if request.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(MedError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_CHARS
        ))
        .into());
    }

    let hashed_password = state.identity.hash_password(&request.password).await?;
    let full_name = request
        .full_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    let user = state
        .users
        .create_user(NewUser {
            email,
            hashed_password,
            full_name,
        })
        .await?;

    info!("Registered user {}", user.id);
    Ok(Json(user.info()))
}

/// 登录处理器
pub async fn login_handler(
    State(state): State<AppState>,
    LoginPayload(request): LoginPayload,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&request.email);
    let user = state.users.find_user_by_email(&email).await?;

    let verified = match &user {
        Some(user) => {
            state
                .identity
                .verify_password(&request.password, &user.hashed_password)
                .await
        }
        None => {
            state.identity.verify_unknown_account(&request.password).await;
            false
        }
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            warn!("Failed login attempt");
            return Err(MedError::Unauthorized(INVALID_CREDENTIALS.to_string()).into());
        }
    };

    let (access_token, expires_at) = state.identity.issue_token(user.id)?;
    info!("User {} logged in", user.id);
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        expires_at,
    }))
}

/// 登出处理器，只做确认
pub async fn logout_handler(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    info!("User {} logged out", user.0);
    Json(json!({ "message": "Logged out" }))
}

/// 获取当前用户信息
pub async fn current_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<UserInfo>> {
    let user = state
        .users
        .find_user_by_id(user.0)
        .await?
        .ok_or_else(|| MedError::Unauthorized(INVALID_TOKEN.to_string()))?;
    Ok(Json(user.info()))
}
