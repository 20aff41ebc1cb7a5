//! 通用工具函数

use uuid::Uuid;

/// 按字符截断，不会切断多字节字符
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// 从上传文件名取扩展名，只保留字母数字
pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

/// 生成随机图片文件名
pub fn generate_image_name(filename: &str) -> String {
    format!("{}.{}", Uuid::new_v4(), file_extension(filename))
}

/// 规范化邮箱地址
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
