pub mod html;
pub mod js;
pub mod sass;

use std::path::Path;

use crate::config::DevConfig;

/// 各构建阶段共享的上下文
pub struct StageContext<'a> {
    pub project_root: &'a Path,
    pub output_dir: &'a Path,
    pub config: &'a DevConfig,
}

/// 先写同目录下的临时文件再 rename，新内容写完之前旧产物保持可见
pub async fn write_atomic(dest: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dest.with_file_name(format!(".{file_name}.tmp"));

    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
