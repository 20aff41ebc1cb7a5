//! 外部服务连接器接口

use anyhow::Result;
use async_trait::async_trait;

/// 连接器接口
#[async_trait]
pub trait Connector: Send + Sync {
    /// 获取连接器名称
    fn name(&self) -> &str;

    /// 检查连接状态
    async fn check_connection(&self) -> Result<bool>;
}
