use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use super::error::BuildError;
use super::events::BuildOutcome;

/// 某条路径上正在进行的一次构建
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    path: PathBuf,
    token: CancellationToken,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 驱动构建 future，直到完成或被取消。
    ///
    /// 取消时 future 会被直接 drop：以 `kill_on_drop` 启动的子进程随之被杀掉，
    /// 进程内的异步工作也在下一个 await 点停止。
    pub async fn run<F>(&self, build: F) -> BuildOutcome
    where
        F: Future<Output = Result<(), BuildError>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => BuildOutcome::Cancelled,
            result = build => {
                // 完成与取消同时发生时，以取消为准
                if self.token.is_cancelled() {
                    BuildOutcome::Cancelled
                } else {
                    result.into()
                }
            }
        }
    }
}

/// 按路径登记构建任务，每条路径同一时刻最多一个
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<PathBuf, TaskHandle>>,
    next_id: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 `path` 登记新任务；已有任务会在登记前被取消
    pub fn start_task(&self, path: impl Into<PathBuf>) -> TaskHandle {
        let path = path.into();
        let handle = TaskHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            path: path.clone(),
            token: CancellationToken::new(),
        };

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = tasks.remove(&path) {
            previous.token.cancel();
            tracing::debug!("取消 {} 的构建任务 #{}", path.display(), previous.id);
        }
        tasks.insert(path, handle.clone());
        tracing::debug!("开始 {} 的构建任务 #{}", handle.path.display(), handle.id);
        handle
    }

    pub fn is_cancelled(&self, handle: &TaskHandle) -> bool {
        handle.is_cancelled()
    }

    /// 取消 `path` 上的任务且不登记新任务。返回是否真的取消了什么
    pub fn cancel(&self, path: &Path) -> bool {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        match tasks.remove(path) {
            Some(previous) => {
                previous.token.cancel();
                tracing::debug!("取消 {} 的构建任务 #{}", path.display(), previous.id);
                true
            }
            None => false,
        }
    }

    /// 任务结束后注销。仅当它仍是该路径的当前任务时才移除，返回是否移除
    pub fn finish(&self, handle: &TaskHandle) -> bool {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        match tasks.get(&handle.path) {
            Some(current) if current.id == handle.id => {
                tasks.remove(&handle.path);
                true
            }
            _ => false,
        }
    }

    #[allow(dead_code)]
    pub fn is_running(&self, path: &Path) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }
}
