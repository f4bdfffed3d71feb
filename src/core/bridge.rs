//! 同步 / 异步执行桥
//!
//! 一个专用后台线程持有单个 tokio current-thread 运行时（整个进程生命周期内复用），
//! 任意同步调用方线程（如 UI 事件处理、REPL 主线程）通过 `submit` 把 Future 投递到该运行时，
//! 并在自己的线程上带超时阻塞等待结果：
//!
//! - 首次提交时惰性启动 worker，发现 worker 已退出时自动重启
//! - 多次提交在 worker 内以独立 task 并发交错执行，桥本身不做串行化；
//!   同一 conversation_id 的提交必须由调用方自行串行
//! - 超时只取消调用方的等待，不取消 worker 中正在运行的工作，其结果在完成后被丢弃
//! - 工作中的 panic 被捕获并以 `BridgeError::Failed` 返回调用方
//! - `cleanup` 通知 worker 退出，并最多等待 `shutdown_timeout`，超时则放弃等待
//!
//! 不要在 tokio 运行时线程内调用 `submit`：它会阻塞该线程。

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::config::BridgeSection;

const WORKER_THREAD_NAME: &str = "investica-bridge";
/// cleanup 轮询 worker 线程是否退出的间隔
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// worker 退出时留给残余 task 的收尾时间
const RUNTIME_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);

/// 提交失败的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// 超过等待时限；工作可能仍在 worker 中运行
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    /// 工作 panic 或被中止
    #[error("{0}")]
    Failed(String),
    /// worker 在交付结果前已停止
    #[error("worker stopped")]
    Stopped,
}

type BoxedWork = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// 一次提交：已绑定结果槽的工作 + 截止时间；只在单次 submit 期间存在
pub(crate) struct BridgeTask {
    id: u64,
    deadline: Instant,
    work: BoxedWork,
}

impl BridgeTask {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// 执行桥配置
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// submit 默认等待时限
    pub submit_timeout: Duration,
    /// cleanup 等待 worker 退出的最长时间
    pub shutdown_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&BridgeSection> for BridgeConfig {
    fn from(section: &BridgeSection) -> Self {
        Self {
            submit_timeout: Duration::from_secs(section.submit_timeout_secs),
            shutdown_timeout: Duration::from_secs(section.shutdown_timeout_secs),
        }
    }
}

/// 后台 worker：线程句柄 + 投递通道 + 停止信号
struct Worker {
    task_tx: mpsc::UnboundedSender<BridgeTask>,
    shutdown: CancellationToken,
    thread: JoinHandle<()>,
}

impl Worker {
    fn spawn() -> std::io::Result<Self> {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(task_rx, token))?;
        Ok(Self {
            task_tx,
            shutdown,
            thread,
        })
    }

    fn is_alive(&self) -> bool {
        !self.thread.is_finished() && !self.task_tx.is_closed() && !self.shutdown.is_cancelled()
    }
}

/// worker 线程主体：构建运行时，接收任务并 spawn，直到收到停止信号或通道关闭
fn run_worker(mut task_rx: mpsc::UnboundedReceiver<BridgeTask>, shutdown: CancellationToken) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to build execution bridge runtime: {}", e);
            return;
        }
    };
    tracing::info!("Execution bridge worker started");

    runtime.block_on(async {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                task = task_rx.recv() => match task {
                    Some(task) if task.is_expired() => {
                        tracing::debug!(task_id = task.id, "Dropping bridge task whose caller already timed out");
                    }
                    Some(task) => {
                        tokio::spawn(task.work);
                    }
                    None => break,
                },
            }
        }
    });

    // 未开始的任务随通道一起丢弃，其调用方收到 Stopped
    drop(task_rx);
    runtime.shutdown_timeout(RUNTIME_DRAIN_TIMEOUT);
    tracing::info!("Execution bridge worker stopped");
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(msg) = payload.downcast_ref::<&str>() {
            format!("task panicked: {msg}")
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            format!("task panicked: {msg}")
        } else {
            "task panicked".to_string()
        }
    } else {
        "task was cancelled".to_string()
    }
}

/// 同步调用方与后台异步 worker 之间的执行桥
pub struct ExecutionBridge {
    config: BridgeConfig,
    worker: Mutex<Option<Worker>>,
}

impl ExecutionBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// worker 是否在运行
    pub fn is_running(&self) -> bool {
        self.lock_worker().as_ref().is_some_and(Worker::is_alive)
    }

    /// 以默认时限提交工作，阻塞当前线程直到结果、超时或失败
    pub fn submit<F, T>(&self, work: F) -> Result<T, BridgeError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit_with_timeout(work, self.config.submit_timeout)
    }

    /// 以指定时限提交工作
    pub fn submit_with_timeout<F, T>(&self, work: F, timeout: Duration) -> Result<T, BridgeError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + timeout;
        let (slot_tx, slot_rx) = std_mpsc::sync_channel::<Result<T, JoinError>>(1);

        let task = BridgeTask {
            id,
            deadline,
            work: Box::pin(async move {
                // 独立 task 运行，panic 只会体现为 JoinError
                let outcome = tokio::spawn(work).await;
                if slot_tx.send(outcome).is_err() {
                    tracing::debug!(task_id = id, "Caller no longer waiting; bridge result discarded");
                }
            }),
        };
        self.dispatch(task)?;

        match slot_rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join_err)) => {
                let msg = describe_join_error(join_err);
                tracing::warn!(task_id = id, "Bridge task failed: {}", msg);
                Err(BridgeError::Failed(msg))
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(task_id = id, "Bridge task timed out after {:?}", timeout);
                Err(BridgeError::TimedOut(timeout))
            }
            // 过期任务被 worker 丢弃时结果槽同样会断开
            Err(RecvTimeoutError::Disconnected) if Instant::now() >= deadline => {
                tracing::warn!(task_id = id, "Bridge task expired before it started");
                Err(BridgeError::TimedOut(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::Stopped),
        }
    }

    /// 把任务交给 worker；worker 不存在或已退出时（重新）启动
    fn dispatch(&self, task: BridgeTask) -> Result<(), BridgeError> {
        let mut guard = self.lock_worker();

        if !guard.as_ref().is_some_and(Worker::is_alive) {
            if let Some(dead) = guard.take() {
                tracing::warn!("Execution bridge worker found dead, restarting");
                dead.shutdown.cancel();
            }
            let worker = Worker::spawn()
                .map_err(|e| BridgeError::Failed(format!("failed to start worker: {e}")))?;
            *guard = Some(worker);
        }

        let worker = guard.as_ref().ok_or(BridgeError::Stopped)?;
        worker.task_tx.send(task).map_err(|_| BridgeError::Stopped)
    }

    /// 停止 worker：发出停止信号后最多等待 `shutdown_timeout`，不会无限阻塞
    pub fn cleanup(&self) {
        let Some(worker) = self.lock_worker().take() else {
            return;
        };
        let Worker {
            task_tx,
            shutdown,
            thread,
        } = worker;

        shutdown.cancel();
        drop(task_tx);

        let deadline = Instant::now() + self.config.shutdown_timeout;
        while !thread.is_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        if thread.is_finished() {
            if thread.join().is_err() {
                tracing::warn!("Execution bridge worker panicked during shutdown");
            }
        } else {
            tracing::warn!(
                "Execution bridge worker did not stop within {:?}; detaching",
                self.config.shutdown_timeout
            );
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ExecutionBridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl Drop for ExecutionBridge {
    fn drop(&mut self) {
        self.cleanup();
    }
}
