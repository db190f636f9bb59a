use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::build::events::WatchedFile;

/// 监听器转发给主循环的消息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMessage {
    /// 某个监听文件被创建、修改或删除，具体是哪种由分发器按文件是否存在判断
    Touched(WatchedFile),
    /// src/ 目录在启动后才被创建，需要补上对它的监听
    SourceDirCreated,
}

/// 持有底层 watcher，drop 即停止监听
pub struct SourceWatcher {
    watcher: RecommendedWatcher,
    src_dir: PathBuf,
    src_watched: bool,
}

impl SourceWatcher {
    /// 非递归监听项目根目录和 src/，避免扫描 node_modules 等大目录
    pub fn start(project_root: &Path) -> Result<(Self, mpsc::UnboundedReceiver<WatchMessage>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = project_root.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for message in classify(&root, &event) {
                    // 接收端已关闭说明主循环在退出
                    if tx.send(message).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::warn!("文件监听出错：{e}"),
        })?;
        watcher
            .watch(project_root, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow::anyhow!("监听 {} 失败：{}", project_root.display(), e))?;

        let mut source_watcher = Self {
            watcher,
            src_dir: project_root.join("src"),
            src_watched: false,
        };
        source_watcher.watch_src_dir()?;
        Ok((source_watcher, rx))
    }

    /// 开始监听 src/。目录不存在时返回 false，等它被创建后再调用。
    ///
    /// src/ 被删除后重建时旧的 watch 已随旧目录失效，所以每次都先注销再重新注册
    pub fn watch_src_dir(&mut self) -> Result<bool> {
        if !self.src_dir.is_dir() {
            tracing::debug!("{} 不存在，暂不监听", self.src_dir.display());
            self.src_watched = false;
            return Ok(false);
        }
        if self.src_watched {
            // 旧目录已删除时注销会失败，忽略即可
            let _ = self.watcher.unwatch(&self.src_dir);
        }
        self.watcher
            .watch(&self.src_dir, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow::anyhow!("监听 {} 失败：{}", self.src_dir.display(), e))?;
        self.src_watched = true;
        Ok(true)
    }
}

/// 把 notify 事件映射为监听文件，其余路径一律忽略
fn classify(root: &Path, event: &Event) -> Vec<WatchMessage> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }

    let mut messages = Vec::new();
    for path in &event.paths {
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if let Some(file) = WatchedFile::from_relative(relative) {
            let message = WatchMessage::Touched(file);
            if !messages.contains(&message) {
                messages.push(message);
            }
        } else if relative == Path::new("src")
            && matches!(event.kind, EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)))
        {
            messages.push(WatchMessage::SourceDirCreated);
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, RemoveKind, RenameMode};
    use std::time::Duration;

    fn event(kind: EventKind, paths: &[&Path]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(path.to_path_buf());
        }
        event
    }

    #[test]
    fn only_watched_paths_are_forwarded() {
        let root = Path::new("/project");
        let modify = EventKind::Modify(ModifyKind::Any);

        let messages = classify(root, &event(modify, &[&root.join("src/main.scss")]));
        assert_eq!(messages, [WatchMessage::Touched(WatchedFile::Sass)]);

        assert!(classify(root, &event(modify, &[&root.join("src/other.scss")])).is_empty());
        assert!(classify(root, &event(modify, &[&root.join("public/index.html")])).is_empty());
        assert!(classify(root, &event(modify, &[Path::new("/elsewhere/index.html")])).is_empty());
    }

    #[test]
    fn renames_touch_both_ends() {
        let root = Path::new("/project");
        let rename = EventKind::Modify(ModifyKind::Name(RenameMode::Both));
        let messages = classify(
            root,
            &event(rename, &[&root.join("src/main.js"), &root.join("index.html")]),
        );
        assert_eq!(
            messages,
            [
                WatchMessage::Touched(WatchedFile::Js),
                WatchMessage::Touched(WatchedFile::Html)
            ]
        );
    }

    #[test]
    fn access_events_are_ignored() {
        let root = Path::new("/project");
        let access = EventKind::Access(AccessKind::Any);
        assert!(classify(root, &event(access, &[&root.join("index.html")])).is_empty());
        let remove = EventKind::Remove(RemoveKind::File);
        assert_eq!(
            classify(root, &event(remove, &[&root.join("index.html")])),
            [WatchMessage::Touched(WatchedFile::Html)]
        );
    }

    #[test]
    fn creating_src_is_reported() {
        let root = Path::new("/project");
        let create = EventKind::Create(CreateKind::Folder);
        assert_eq!(
            classify(root, &event(create, &[&root.join("src")])),
            [WatchMessage::SourceDirCreated]
        );

        // 整个目录被 mv 进来时只有 rename 事件
        let rename = EventKind::Modify(ModifyKind::Name(RenameMode::To));
        assert_eq!(
            classify(root, &event(rename, &[&root.join("src")])),
            [WatchMessage::SourceDirCreated]
        );
    }

    #[tokio::test]
    async fn writes_on_disk_are_observed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();

        let (_watcher, mut rx) = SourceWatcher::start(&root).unwrap();
        std::fs::write(root.join("src/main.js"), "console.log(1)").unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(WatchMessage::Touched(WatchedFile::Js)) => break true,
                    Some(_) => continue,
                    None => break false,
                }
            }
        })
        .await
        .unwrap();
        assert!(message);
    }

    async fn wait_for(
        rx: &mut mpsc::UnboundedReceiver<WatchMessage>,
        expected: WatchMessage,
    ) -> bool {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(message) if message == expected => break true,
                    Some(_) => continue,
                    None => break false,
                }
            }
        })
        .await
        .unwrap_or(false)
    }

    #[tokio::test]
    async fn recreated_src_dir_is_watched_again() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let src = root.join("src");
        std::fs::create_dir_all(&src).unwrap();

        let (mut watcher, mut rx) = SourceWatcher::start(&root).unwrap();
        std::fs::remove_dir_all(&src).unwrap();
        std::fs::create_dir_all(&src).unwrap();

        assert!(wait_for(&mut rx, WatchMessage::SourceDirCreated).await);
        assert!(watcher.watch_src_dir().unwrap());

        std::fs::write(src.join("main.js"), "console.log(2)").unwrap();
        assert!(
            wait_for(&mut rx, WatchMessage::Touched(WatchedFile::Js)).await,
            "edits under a recreated src/ should be observed"
        );
    }
}
