use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use autoconf_core::{AutoconfResult, ProvenanceLedger};
use autoconf_domain::LifecycleEvent;
use autoconf_engine::{
    ConfigurationEngine, ConfigurationReport, OverrideFileLoader, PropertiesReloadWatcher,
    RecommendedWatcher,
};
use autoconf_lifecycle::{
    DurationLifecycleController, EventBus, LifecycleActions, ShutdownManager,
};

/// 未因时长限制结束时的退出码
pub const EXIT_OK: i32 = 0;

/// 持有文件监听器及其转发任务
pub struct ReloadGuard {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for ReloadGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 将配置引擎与时长控制器组合在一起的应用
pub struct Application {
    engine: Arc<ConfigurationEngine>,
    shutdown: ShutdownManager,
    events: EventBus<LifecycleEvent>,
    controller: Mutex<Option<Arc<DurationLifecycleController>>>,
}

impl Application {
    pub fn new(engine: ConfigurationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            shutdown: ShutdownManager::new(),
            events: EventBus::default(),
            controller: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<ConfigurationEngine> {
        &self.engine
    }

    /// 处理端上报工作单元的事件总线
    pub fn events(&self) -> &EventBus<LifecycleEvent> {
        &self.events
    }

    pub fn shutdown_manager(&self) -> &ShutdownManager {
        &self.shutdown
    }

    pub fn configure(&self) -> Result<ConfigurationReport> {
        let report = self.engine.configure().context("自动配置失败")?;
        info!(
            "自动配置完成: 应用 {} 项，未配置 {} 项，通配符 {} 条",
            report.applied.len(),
            report.not_configured.len(),
            report.wildcards_stored
        );
        Ok(report)
    }

    /// 应用变更的配置，并通知时长控制器重新开始
    pub fn reload(&self, changed: &ProvenanceLedger) -> Result<ConfigurationReport> {
        let report = self
            .engine
            .reload(changed)
            .context("应用重新加载的配置失败")?;
        self.events.publish(LifecycleEvent::UnitReloaded);
        Ok(report)
    }

    /// 监听覆盖文件目录并重新加载变更的配置项
    pub fn watch_reload(self: &Arc<Self>) -> Result<Option<ReloadGuard>> {
        let patterns = self.engine.settings().file_configurations;
        if patterns.is_empty() {
            return Ok(None);
        }
        let dirs: Vec<PathBuf> = OverrideFileLoader::new(patterns).directories();
        let (watcher, mut changes) = PropertiesReloadWatcher::new(dirs)
            .watch()
            .context("监听覆盖文件目录失败")?;

        let app = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(path) = changes.recv().await {
                let current = app.engine.merged();
                match PropertiesReloadWatcher::changed_properties(&path, &current) {
                    Ok(changed) if changed.is_empty() => {
                        debug!("{} 中没有配置变更", path.display());
                    }
                    Ok(changed) => {
                        info!("从 {} 重新加载 {} 项配置", path.display(), changed.len());
                        if let Err(e) = app.reload(&changed) {
                            warn!("重新加载 {} 失败: {:#}", path.display(), e);
                        }
                    }
                    Err(e) => warn!("无法读取变更的文件 {}: {}", path.display(), e),
                }
            }
        });
        Ok(Some(ReloadGuard {
            _watcher: watcher,
            task,
        }))
    }

    /// 绑定延迟的工作单元，然后运行直到达到时长限制或收到关闭请求，返回进程退出码
    pub async fn run(&self) -> Result<i32> {
        let drained = self
            .engine
            .initializing()
            .context("绑定延迟的工作单元失败")?;
        debug!("已绑定 {} 个延迟的工作单元，跳过 {} 个", drained.bound, drained.skipped);

        let duration = self.engine.settings().duration;
        let actions = Arc::new(EngineActions {
            engine: Arc::clone(&self.engine),
        });
        let controller = Arc::new(DurationLifecycleController::new(
            duration,
            actions,
            self.shutdown.clone(),
        ));
        controller.start().context("启动时长控制器失败")?;
        controller
            .attach(&self.events)
            .context("连接时长控制器失败")?;
        *self.controller.lock() = Some(Arc::clone(&controller));

        controller.run_until_complete().await;

        controller.stop();
        self.engine.stop();
        let code = controller.hit_exit_code().unwrap_or(EXIT_OK);
        info!("应用运行结束，退出码 {}", code);
        Ok(code)
    }

    /// 请求正在运行的应用停止
    pub fn request_shutdown(&self) {
        self.events.publish(LifecycleEvent::ShutdownRequested);
        self.shutdown.trigger();
    }

    pub fn controller(&self) -> Option<Arc<DurationLifecycleController>> {
        self.controller.lock().clone()
    }
}

struct EngineActions {
    engine: Arc<ConfigurationEngine>,
}

#[async_trait]
impl LifecycleActions for EngineActions {
    async fn shutdown(&self) -> AutoconfResult<()> {
        info!("达到时长限制，开始关闭");
        self.engine.stop();
        Ok(())
    }

    async fn stop_units(&self) -> AutoconfResult<()> {
        info!("达到时长限制，停止工作单元");
        self.engine.stop();
        Ok(())
    }
}
