use std::path::Path;

use super::StageContext;
use crate::build::error::BuildError;
use crate::build::tool::{self, Invocation};

/// 调用打包器把入口及其全部静态依赖打成 main.js（附 source map）
pub async fn bundle_js(ctx: &StageContext<'_>, source: &Path) -> Result<(), BuildError> {
    let dest = ctx.output_dir.join("main.js");
    tool::run(Invocation {
        command: &ctx.config.bundler.command,
        input: source,
        output: &dest,
        cwd: ctx.project_root,
        stdin: None,
        envs: Vec::new(),
    })
    .await?;
    tracing::debug!("已打包 {} → main.js", source.display());
    Ok(())
}
