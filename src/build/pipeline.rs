use std::path::PathBuf;
use std::sync::Arc;

use crate::build::error::BuildError;
use crate::build::events::WatchedFile;
use crate::build::stages::{self, StageContext};
use crate::config::DevConfig;

/// 三条构建管道的入口，持有构建所需的全部路径和配置，可廉价克隆到各个任务中
#[derive(Debug, Clone)]
pub struct Pipelines {
    project_root: PathBuf,
    output_dir: PathBuf,
    config: Arc<DevConfig>,
}

impl Pipelines {
    pub fn new(project_root: PathBuf, output_dir: PathBuf, config: Arc<DevConfig>) -> Self {
        Self {
            project_root,
            output_dir,
            config,
        }
    }

    pub fn source_path(&self, file: WatchedFile) -> PathBuf {
        self.project_root.join(file.source())
    }

    /// 按文件类型运行对应管道
    pub async fn build(&self, file: WatchedFile) -> Result<(), BuildError> {
        let ctx = StageContext {
            project_root: &self.project_root,
            output_dir: &self.output_dir,
            config: &self.config,
        };
        let source = self.source_path(file);

        match file {
            WatchedFile::Html => stages::html::copy_html(&ctx, &source).await,
            WatchedFile::Sass => stages::sass::compile_sass(&ctx, &source).await,
            WatchedFile::Js => stages::js::bundle_js(&ctx, &source).await,
        }
    }
}
