//! 运行时长限制
//!
//! 固定运行时长、完成的工作单元数量、无在途任务时的空闲时长，
//! 任一条件先满足即结束运行，配置的动作在独立任务中只执行一次。

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use autoconf_core::{AutoconfError, AutoconfResult};
use autoconf_domain::{
    DurationAction, DurationSettings, LifecycleEvent, LifecycleSignal, TriggerReason,
};

use crate::actions::LifecycleActions;
use crate::bus::EventBus;
use crate::shutdown::ShutdownManager;
use crate::stopwatch::IdleStopwatch;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Running,
    Triggering,
    Done,
}

impl ControllerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Triggering,
            _ => Self::Done,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Triggering => 1,
            Self::Done => 2,
        }
    }
}

struct ControllerInner {
    settings: DurationSettings,
    actions: Arc<dyn LifecycleActions>,
    shutdown: ShutdownManager,
    phase: AtomicU8,
    run_allowed: AtomicBool,
    hit: AtomicBool,
    completed: AtomicU64,
    in_flight: AtomicI64,
    stopwatch: IdleStopwatch,
    /// 重新开始固定时长的等待
    reset: Notify,
    /// 由 `stop` 触发，结束空闲轮询、事件转发和固定时长等待
    cancel: ShutdownManager,
    /// 触发的动作执行完毕后发出
    finished: ShutdownManager,
    signals: broadcast::Sender<LifecycleSignal>,
    handle: Mutex<Option<Handle>>,
}

impl ControllerInner {
    fn phase(&self) -> ControllerPhase {
        ControllerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: ControllerPhase) {
        self.phase.store(phase.as_u8(), Ordering::Release);
    }

    fn on_event(self: &Arc<Self>, event: LifecycleEvent) {
        match event {
            LifecycleEvent::UnitCreated => {
                self.in_flight.fetch_add(1, Ordering::AcqRel);
                self.stopwatch.restart();
            }
            LifecycleEvent::UnitCompleted { failed } => {
                let _ = self
                    .in_flight
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some((n - 1).max(0)));
                self.stopwatch.restart();
                let done = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
                if failed {
                    debug!("工作单元失败，计入已完成数量 ({})", done);
                }
                let max = self.settings.max_messages;
                if max > 0 && done >= max {
                    self.fire(TriggerReason::MaxMessages);
                }
            }
            LifecycleEvent::UnitReloaded => {
                if self.settings.restart_on_reload {
                    self.restart();
                } else {
                    debug!("时长控制器忽略重新加载事件");
                }
            }
            LifecycleEvent::ShutdownRequested => {
                self.cancel.trigger();
                self.shutdown.trigger();
            }
        }
    }

    /// 仅允许一个调用者离开 RUNNING 状态
    fn fire(self: &Arc<Self>, reason: TriggerReason) {
        if self
            .run_allowed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.set_phase(ControllerPhase::Triggering);
        self.hit.store(true, Ordering::Release);
        info!(
            "达到运行时长限制 ({})，执行 {}",
            reason, self.settings.action
        );

        let signal = match self.settings.action {
            DurationAction::Shutdown => LifecycleSignal::ShutdownTriggered { reason },
            DurationAction::Stop => LifecycleSignal::StopTriggered { reason },
        };
        let _ = self.signals.send(signal);

        let handle = self.handle.lock().clone().or_else(|| Handle::try_current().ok());
        let inner = Arc::clone(self);
        match handle {
            Some(handle) => {
                handle.spawn(async move { inner.run_action().await });
            }
            None => {
                error!("没有可用的运行时来执行 {} 动作", self.settings.action);
                if self.settings.action == DurationAction::Shutdown {
                    self.shutdown.trigger();
                }
                self.finish();
            }
        }
    }

    async fn run_action(&self) {
        match self.settings.action {
            DurationAction::Shutdown => {
                if let Err(e) = self.actions.stop_processing_engine().await {
                    warn!("停止处理引擎时出错: {}", e);
                }
                if let Err(e) = self.actions.shutdown().await {
                    error!("关闭过程中出错: {}", e);
                }
                self.shutdown.trigger();
            }
            DurationAction::Stop => {
                if let Err(e) = self.actions.stop_units().await {
                    error!("停止工作单元时出错: {}", e);
                }
            }
        }
        self.finish();
    }

    fn finish(&self) {
        self.set_phase(ControllerPhase::Done);
        self.finished.trigger();
    }

    fn restart(&self) {
        self.completed.store(0, Ordering::Release);
        self.stopwatch.restart();
        // 仅停止的运行可以再次受限，已关闭的保持完成状态
        if self.phase() == ControllerPhase::Done && self.settings.action == DurationAction::Stop {
            self.finished.rearm();
            self.set_phase(ControllerPhase::Running);
            self.run_allowed.store(true, Ordering::Release);
        }
        self.reset.notify_waiters();
        info!("时长控制器已重新开始");
    }

    /// 单次空闲检查
    fn check_idle(self: &Arc<Self>) {
        if self.phase() != ControllerPhase::Running {
            return;
        }
        let in_flight = self.in_flight.load(Ordering::Acquire);
        if in_flight > 0 {
            debug!("有 {} 个在途工作单元，跳过空闲检查", in_flight);
            return;
        }
        let idle = self.stopwatch.taken();
        if idle >= Duration::from_secs(self.settings.max_idle_seconds) {
            info!("已空闲 {} 秒", idle.as_secs());
            self.fire(TriggerReason::MaxIdle);
        }
    }
}

/// 监听生命周期事件，达到时长限制时结束运行
pub struct DurationLifecycleController {
    inner: Arc<ControllerInner>,
    poll_interval: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DurationLifecycleController {
    pub fn new(
        settings: DurationSettings,
        actions: Arc<dyn LifecycleActions>,
        shutdown: ShutdownManager,
    ) -> Self {
        let (signals, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(ControllerInner {
                settings,
                actions,
                shutdown,
                phase: AtomicU8::new(ControllerPhase::Running.as_u8()),
                run_allowed: AtomicBool::new(true),
                hit: AtomicBool::new(false),
                completed: AtomicU64::new(0),
                in_flight: AtomicI64::new(0),
                stopwatch: IdleStopwatch::new(),
                reset: Notify::new(),
                cancel: ShutdownManager::new(),
                finished: ShutdownManager::new(),
                signals,
                handle: Mutex::new(None),
            }),
            poll_interval: DEFAULT_POLL_INTERVAL,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn settings(&self) -> &DurationSettings {
        &self.inner.settings
    }

    /// 记录当前运行时并启动空闲轮询，必须在 tokio 运行时内调用
    pub fn start(&self) -> AutoconfResult<()> {
        let handle = Handle::try_current()
            .map_err(|e| AutoconfError::Lifecycle(format!("No tokio runtime: {e}")))?;
        *self.inner.handle.lock() = Some(handle.clone());
        self.inner.cancel.rearm();
        self.inner.stopwatch.restart();

        let settings = &self.inner.settings;
        if settings.max_seconds > 0 {
            info!("最长运行 {} 秒", settings.max_seconds);
        }
        if settings.max_messages > 0 {
            info!("最多处理 {} 条消息", settings.max_messages);
        }
        if settings.max_idle_seconds > 0 {
            info!("空闲 {} 秒后结束运行", settings.max_idle_seconds);
            let inner = Arc::clone(&self.inner);
            let poll_interval = self.poll_interval;
            let mut cancel_rx = self.inner.cancel.subscribe();
            let task = handle.spawn(async move {
                let mut ticker = interval(poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => inner.check_idle(),
                        _ = cancel_rx.recv() => {
                            debug!("空闲轮询任务退出");
                            break;
                        }
                    }
                }
            });
            self.tasks.lock().push(task);
        }
        Ok(())
    }

    /// 上报生命周期事件，不会阻塞，触发的动作在独立任务中执行
    pub fn on_event(&self, event: LifecycleEvent) {
        self.inner.on_event(event);
    }

    /// 从事件总线接收事件，直到控制器停止
    pub fn attach(&self, bus: &EventBus<LifecycleEvent>) -> AutoconfResult<()> {
        let handle = Handle::try_current()
            .map_err(|e| AutoconfError::Lifecycle(format!("No tokio runtime: {e}")))?;
        let inner = Arc::clone(&self.inner);
        let mut events = bus.subscribe();
        let mut cancel_rx = self.inner.cancel.subscribe();
        let task = handle.spawn(async move {
            loop {
                tokio::select! {
                    received = events.recv() => match received {
                        Ok(event) => inner.on_event(event),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("时长控制器丢失了 {} 个事件", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = cancel_rx.recv() => break,
                }
            }
        });
        self.tasks.lock().push(task);
        Ok(())
    }

    /// 等待固定时长结束或运行以其他方式结束，然后等待关闭完成
    pub async fn run_until_complete(&self) {
        let max_seconds = self.inner.settings.max_seconds;
        if max_seconds > 0 {
            loop {
                tokio::select! {
                    _ = sleep(Duration::from_secs(max_seconds)) => {
                        self.inner.fire(TriggerReason::MaxDuration);
                        break;
                    }
                    _ = self.inner.reset.notified() => {
                        debug!("固定时长等待已重新开始");
                    }
                    _ = self.inner.shutdown.wait() => return,
                    _ = self.inner.cancel.wait() => return,
                }
            }
        }
        tokio::select! {
            _ = self.inner.shutdown.wait() => {}
            _ = self.inner.cancel.wait() => {}
        }
    }

    /// 清零计数并重新开始固定时长等待
    pub fn restart(&self) {
        self.inner.restart();
    }

    /// 取消空闲轮询并唤醒所有等待者，可重复调用
    pub fn stop(&self) {
        if self.inner.cancel.trigger() {
            debug!("时长控制器已停止");
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// 等待触发的动作执行完毕
    pub async fn wait_finished(&self) {
        self.inner.finished.wait().await;
    }

    pub fn phase(&self) -> ControllerPhase {
        self.inner.phase()
    }

    /// 自启动或上次重新开始以来完成的工作单元数量
    pub fn done_count(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    pub fn in_flight(&self) -> i64 {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn is_hit(&self) -> bool {
        self.inner.hit.load(Ordering::Acquire)
    }

    /// 达到限制时上报的退出码
    pub fn hit_exit_code(&self) -> Option<i32> {
        if self.is_hit() {
            self.inner.settings.hit_exit_code
        } else {
            None
        }
    }

    pub fn signals(&self) -> broadcast::Receiver<LifecycleSignal> {
        self.inner.signals.subscribe()
    }
}

impl Drop for DurationLifecycleController {
    fn drop(&mut self) {
        self.stop();
    }
}
