//! 终端状态区：每个监听文件一行，原地更新而不是追加

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crossterm::{QueueableCommand, cursor, terminal};
use is_terminal::IsTerminal;

pub const MISSING_INDEX: &str = "! your web page won't be visible until we create index.html";

/// 状态区句柄。克隆后指向同一份状态，分发器和各构建任务共用
#[derive(Clone)]
pub struct StatusReporter {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    /// 按首次出现的顺序排列，(键, 文本)
    entries: Vec<(String, String)>,
    out: Box<dyn Write + Send>,
    /// None 表示非终端输出：每次更新单独打印一行
    region: Option<LiveRegion>,
    finished: bool,
}

impl StatusReporter {
    pub fn new(out: impl Write + Send + 'static, live: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: Vec::new(),
                out: Box::new(out),
                region: live.then(LiveRegion::default),
                finished: false,
            })),
        }
    }

    /// 输出到 stdout；stdout 不是终端时退化为逐行打印
    pub fn stdout() -> Self {
        let live = io::stdout().is_terminal();
        Self::new(io::stdout(), live)
    }

    /// 创建或原地替换 `key` 对应的状态行
    pub fn notice(&self, key: &str, text: impl Into<String>) {
        let text = text.into();
        self.with_inner(|inner| {
            match inner.entries.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = text.clone(),
                None => inner.entries.push((key.to_string(), text.clone())),
            }
            inner.render(Some(&text))
        });
    }

    /// 删除 `key` 对应的状态行
    pub fn remove(&self, key: &str) {
        self.with_inner(|inner| {
            let before = inner.entries.len();
            inner.entries.retain(|(k, _)| k != key);
            if inner.entries.len() == before {
                return Ok(());
            }
            inner.render(None)
        });
    }

    pub fn building(&self, path: &str) {
        self.notice(path, format!("… building {path}"));
    }

    pub fn built(&self, path: &str) {
        self.notice(path, format!("✔ built {path}"));
    }

    pub fn error(&self, path: &str, detail: &str) {
        let mut text = format!("✖ error building {path}");
        for line in detail.lines() {
            text.push_str("\n    ");
            text.push_str(line);
        }
        self.notice(path, text);
    }

    pub fn missing_index(&self, path: &str) {
        self.notice(path, MISSING_INDEX);
    }

    /// 当前各行文本的快照
    #[allow(dead_code)]
    pub fn lines(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.iter().map(|(_, text)| text.clone()).collect()
    }

    #[allow(dead_code)]
    pub fn line(&self, key: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, text)| text.clone())
    }

    /// 停止渲染，最后一帧留在屏幕上。之后的更新只记录不输出
    pub fn finish(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.finished = true;
        let _ = inner.out.flush();
    }

    fn with_inner(&self, f: impl FnOnce(&mut Inner) -> io::Result<()>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = f(&mut inner) {
            tracing::debug!("刷新状态区失败：{e}");
        }
    }
}

impl Inner {
    fn render(&mut self, changed: Option<&str>) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        match &mut self.region {
            Some(region) => {
                let frame = self
                    .entries
                    .iter()
                    .map(|(_, text)| text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                region.update(&mut self.out, &frame)
            }
            None => {
                if let Some(text) = changed {
                    writeln!(self.out, "{text}")?;
                    self.out.flush()?;
                }
                Ok(())
            }
        }
    }
}

/// 记住上一帧占用的行数，下一帧先上移清除再重画
#[derive(Debug, Default)]
struct LiveRegion {
    last_lines: usize,
}

impl LiveRegion {
    fn update(&mut self, out: &mut impl Write, content: &str) -> io::Result<()> {
        let mut content = content.to_string();
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }

        let lines_to_clear = self.last_lines.min(u16::MAX as usize) as u16;
        if lines_to_clear > 0 {
            out.queue(cursor::MoveUp(lines_to_clear))?;
            out.queue(cursor::MoveToColumn(0))?;
            out.queue(terminal::Clear(terminal::ClearType::FromCursorDown))?;
        }

        out.write_all(content.as_bytes())?;
        out.flush()?;

        self.last_lines = content.chars().filter(|&c| c == '\n').count();
        Ok(())
    }
}
