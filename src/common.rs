use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 进程启动配置，从 `AUTOCONF_*` 环境变量读取
#[derive(Debug, Clone, Deserialize)]
pub struct StartupSettings {
    /// 逗号分隔的配置文件位置
    pub locations: String,
    pub log_level: String,
    pub log_format: String,
}

impl StartupSettings {
    pub fn load() -> Result<Self> {
        config::Config::builder()
            .set_default("locations", "application.properties")?
            .set_default("log_level", "info")?
            .set_default("log_format", "pretty")?
            .add_source(config::Environment::with_prefix("AUTOCONF"))
            .build()
            .context("读取启动配置失败")?
            .try_deserialize()
            .context("无效的启动配置")
    }

    pub fn location_list(&self) -> Vec<String> {
        self.locations
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// 初始化日志系统，`RUST_LOG` 优先于 `log_level`
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM 信号
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装 Ctrl+C 信号处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("安装 SIGTERM 信号处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到 Ctrl+C 信号");
        },
        _ = terminate => {
            info!("收到 SIGTERM 信号");
        },
    }
}
