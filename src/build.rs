pub mod error;
pub mod events;
pub mod pipeline;
pub mod stages;
pub mod tasks;
pub mod tool;

use crate::config::DevConfig;
use crate::status::StatusReporter;
use anyhow::Result;
use events::WatchedFile;
use pipeline::Pipelines;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const OUTPUT_DIR: &str = "public";

/// 单次构建统计
#[derive(Debug, Default, Clone)]
pub struct BuildStats {
    pub built: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 确保输出目录存在并返回其路径
pub fn prepare_output_dir(project_root: &Path) -> Result<PathBuf> {
    let output_dir = project_root.join(OUTPUT_DIR);
    std::fs::create_dir_all(&output_dir)
        .map_err(|e| anyhow::anyhow!("创建输出目录 {} 失败：{}", output_dir.display(), e))?;
    Ok(output_dir)
}

/// 依次构建三个文件后退出，不监听也不启动预览服务
pub async fn run(
    project_root: &Path,
    config: Arc<DevConfig>,
    status: &StatusReporter,
) -> Result<BuildStats> {
    let output_dir = prepare_output_dir(project_root)?;
    let pipelines = Pipelines::new(project_root.to_path_buf(), output_dir, config);
    let mut stats = BuildStats::default();

    for file in WatchedFile::ALL {
        let path = file.source();
        if !pipelines.source_path(file).exists() {
            if file == WatchedFile::Html {
                status.missing_index(path);
            } else {
                tracing::warn!("跳过 {path}：文件不存在");
            }
            stats.skipped += 1;
            continue;
        }

        status.building(path);
        match pipelines.build(file).await {
            Ok(()) => {
                status.built(path);
                stats.built += 1;
            }
            Err(e) => {
                status.error(path, &e.to_string());
                stats.failed += 1;
            }
        }
    }

    tracing::info!(
        "构建完成：{} 成功，{} 失败，{} 跳过",
        stats.built,
        stats.failed,
        stats.skipped
    );
    Ok(stats)
}
