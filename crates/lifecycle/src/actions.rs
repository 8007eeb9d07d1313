use async_trait::async_trait;

use autoconf_core::AutoconfResult;

/// 达到时长限制后控制器执行的动作
#[async_trait]
pub trait LifecycleActions: Send + Sync {
    /// 完全关闭前先停止底层处理引擎
    async fn stop_processing_engine(&self) -> AutoconfResult<()> {
        Ok(())
    }

    /// 停止整个受管生命周期
    async fn shutdown(&self) -> AutoconfResult<()>;

    /// 只停止受管的工作单元，进程继续运行
    async fn stop_units(&self) -> AutoconfResult<()>;
}
