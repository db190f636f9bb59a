use std::fmt;
use std::path::Path;

use super::error::BuildError;

/// 被监听的三个源文件，路径固定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchedFile {
    Html,
    Sass,
    Js,
}

impl WatchedFile {
    pub const ALL: [WatchedFile; 3] = [WatchedFile::Html, WatchedFile::Sass, WatchedFile::Js];

    /// 相对项目根目录的源文件路径，同时作为状态行和任务表的键
    pub fn source(self) -> &'static str {
        match self {
            Self::Html => "index.html",
            Self::Sass => "src/main.scss",
            Self::Js => "src/main.js",
        }
    }

    /// public/ 下对应的产物文件名
    pub fn artifact(self) -> &'static str {
        match self {
            Self::Html => "index.html",
            Self::Sass => "main.css",
            Self::Js => "main.js",
        }
    }

    pub fn from_relative(path: &Path) -> Option<Self> {
        Self::ALL.into_iter().find(|f| path == Path::new(f.source()))
    }
}

impl fmt::Display for WatchedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// 分发器的输入：某个监听文件发生了什么
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEvent {
    pub file: WatchedFile,
    pub kind: ChangeKind,
}

impl FileEvent {
    pub fn new(file: WatchedFile, kind: ChangeKind) -> Self {
        Self { file, kind }
    }
}

/// 一次构建任务结束时的结果
#[derive(Debug)]
pub enum BuildOutcome {
    Built,
    Failed(BuildError),
    /// 被同一路径上更新的构建取代，结果直接丢弃
    Cancelled,
}

impl From<Result<(), BuildError>> for BuildOutcome {
    fn from(result: Result<(), BuildError>) -> Self {
        match result {
            Ok(()) => Self::Built,
            Err(e) => Self::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_map_to_watched_files() {
        assert_eq!(WatchedFile::from_relative(Path::new("index.html")), Some(WatchedFile::Html));
        assert_eq!(WatchedFile::from_relative(Path::new("src/main.scss")), Some(WatchedFile::Sass));
        assert_eq!(WatchedFile::from_relative(Path::new("src/main.js")), Some(WatchedFile::Js));
        assert_eq!(WatchedFile::from_relative(Path::new("src/other.js")), None);
        assert_eq!(WatchedFile::from_relative(Path::new("public/index.html")), None);
    }

    #[test]
    fn artifacts_live_flat_in_public() {
        let names: Vec<_> = WatchedFile::ALL.iter().map(|f| f.artifact()).collect();
        assert_eq!(names, ["index.html", "main.css", "main.js"]);
    }
}
