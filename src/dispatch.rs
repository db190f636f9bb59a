use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::build::error::BuildError;
use crate::build::events::{BuildOutcome, ChangeKind, FileEvent, WatchedFile};
use crate::build::pipeline::Pipelines;
use crate::build::tasks::{TaskHandle, TaskRegistry};
use crate::status::StatusReporter;

/// 把文件变更路由到构建管道，负责取消过期构建并更新状态行。
///
/// 同一路径的事件按到达顺序处理：状态置为 building 和取消旧任务都在
/// 任何 await 之前完成，因此状态行的变化顺序与编辑顺序一致。
pub struct Dispatcher {
    pipelines: Pipelines,
    tasks: Arc<TaskRegistry>,
    status: StatusReporter,
    /// 每个文件最近一次事件，用于区分新增与修改
    last_event: HashMap<WatchedFile, ChangeKind>,
    fatal_tx: mpsc::UnboundedSender<BuildError>,
}

impl Dispatcher {
    /// 返回分发器和致命错误通道。通道收到错误时进程应当退出
    pub fn new(
        pipelines: Pipelines,
        status: StatusReporter,
    ) -> (Self, mpsc::UnboundedReceiver<BuildError>) {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            pipelines,
            tasks: Arc::new(TaskRegistry::new()),
            status,
            last_event: HashMap::new(),
            fatal_tx,
        };
        (dispatcher, fatal_rx)
    }

    /// 启动时为已存在的文件触发一次构建；index.html 缺失时显示提示
    pub fn startup(&mut self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for file in WatchedFile::ALL {
            if self.pipelines.source_path(file).exists() {
                handles.extend(self.dispatch(FileEvent::new(file, ChangeKind::Added)));
            } else {
                self.last_event.insert(file, ChangeKind::Removed);
                if file == WatchedFile::Html {
                    self.status.missing_index(file.source());
                }
            }
        }
        handles
    }

    /// 监听器只告诉我们"这个文件被动过"，按是否存在归类为新增 / 修改 / 删除。
    /// 已经不存在的文件再次收到删除通知时忽略
    pub fn touch(&mut self, file: WatchedFile) -> Option<JoinHandle<()>> {
        let exists = self.pipelines.source_path(file).exists();
        let was_present = !matches!(
            self.last_event.get(&file),
            None | Some(ChangeKind::Removed)
        );

        let kind = match (exists, was_present) {
            (true, true) => ChangeKind::Changed,
            (true, false) => ChangeKind::Added,
            (false, true) => ChangeKind::Removed,
            (false, false) => return None,
        };
        self.dispatch(FileEvent::new(file, kind))
    }

    /// 处理一个文件事件。需要运行管道时返回构建任务的 JoinHandle
    pub fn dispatch(&mut self, event: FileEvent) -> Option<JoinHandle<()>> {
        let FileEvent { file, kind } = event;
        let path = file.source();
        self.last_event.insert(file, kind);
        tracing::debug!("{path}: {kind:?}");

        self.status.building(path);

        if kind == ChangeKind::Removed {
            self.tasks.cancel(Path::new(path));
            match file {
                WatchedFile::Html => self.status.missing_index(path),
                WatchedFile::Sass | WatchedFile::Js => self.status.remove(path),
            }
            return None;
        }

        let handle = self.tasks.start_task(path);
        let pipelines = self.pipelines.clone();
        let tasks = Arc::clone(&self.tasks);
        let status = self.status.clone();
        let fatal_tx = self.fatal_tx.clone();

        Some(tokio::spawn(async move {
            let outcome = handle.run(pipelines.build(file)).await;
            settle(&tasks, &status, &fatal_tx, &handle, file, outcome);
        }))
    }

    #[allow(dead_code)]
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }
}

/// 构建结束后的处理。被取消的任务不产生任何可见变化
fn settle(
    tasks: &TaskRegistry,
    status: &StatusReporter,
    fatal_tx: &mpsc::UnboundedSender<BuildError>,
    handle: &TaskHandle,
    file: WatchedFile,
    outcome: BuildOutcome,
) {
    let path = file.source();
    if tasks.is_cancelled(handle) {
        tracing::debug!(
            "{} 的构建任务 #{} 已被取代，丢弃结果",
            handle.path().display(),
            handle.id()
        );
        return;
    }
    tasks.finish(handle);

    match outcome {
        BuildOutcome::Built => status.built(path),
        BuildOutcome::Cancelled => {}
        BuildOutcome::Failed(e) if e.is_fatal() => {
            tracing::error!("构建 {path} 时外部工具异常：{e}");
            let _ = fatal_tx.send(e);
        }
        BuildOutcome::Failed(e) => status.error(path, &e.to_string()),
    }
}
