use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use autoconf::app::Application;
use autoconf::common::{init_logging, wait_for_shutdown_signal, StartupSettings};
use autoconf_engine::{ConfigurationEngine, EnvironmentSource, PropertiesSource};

#[tokio::main]
async fn main() -> Result<()> {
    let startup = StartupSettings::load()?;
    init_logging(&startup.log_level, &startup.log_format)?;

    let locations = startup.location_list();
    info!("启动自动配置服务，配置文件: {:?}", locations);

    let properties = locations
        .iter()
        .fold(PropertiesSource::new(), |source, location| source.with_location(location));
    let engine = ConfigurationEngine::builder()
        .source(Arc::new(EnvironmentSource::from_process()))
        .properties(properties)
        .build();

    let app = Arc::new(Application::new(engine));
    app.configure()?;
    let _reload = match app.watch_reload() {
        Ok(guard) => guard,
        Err(e) => {
            warn!("配置热重载未启用: {:#}", e);
            None
        }
    };

    let mut runner = {
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run().await })
    };

    let exit_code = tokio::select! {
        joined = &mut runner => joined.context("应用运行失败")??,
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
            app.request_shutdown();
            match tokio::time::timeout(Duration::from_secs(30), runner).await {
                Ok(joined) => joined.context("应用运行失败")??,
                Err(_) => {
                    warn!("应用关闭超时，强制退出");
                    1
                }
            }
        }
    };

    info!("服务已退出，退出码 {}", exit_code);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
