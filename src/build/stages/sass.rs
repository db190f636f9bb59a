use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{StageContext, write_atomic};
use crate::build::error::BuildError;
use crate::build::tool::{self, Invocation};
use crate::config::SassEngine;

// sass 内嵌 source map 时写出的 data URI 带 charset 参数，postcss 解析不了
static CHARSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"data:application/json;charset=utf-8([;,])").unwrap());

/// 编译 main.scss，经 postcss 加前缀后写入 main.css
pub async fn compile_sass(ctx: &StageContext<'_>, source: &Path) -> Result<(), BuildError> {
    let dest = ctx.output_dir.join("main.css");

    let css = match ctx.config.sass.engine {
        SassEngine::External => {
            let stdout = tool::run(Invocation {
                command: &ctx.config.sass.command,
                input: source,
                output: &dest,
                cwd: ctx.project_root,
                stdin: None,
                envs: Vec::new(),
            })
            .await?;
            String::from_utf8_lossy(&stdout).into_owned()
        }
        SassEngine::Grass => {
            compile_with_grass(source, ctx.project_root.join(&ctx.config.sass.load_path)).await?
        }
    };

    let css = strip_charset(&css);

    let prefixed = tool::run(Invocation {
        command: &ctx.config.postcss.command,
        input: source,
        output: &dest,
        cwd: ctx.project_root,
        stdin: Some(css.into_bytes()),
        envs: vec![("BROWSERSLIST", ctx.config.postcss.browsers.join(", "))],
    })
    .await?;

    write_atomic(&dest, &prefixed).await?;
    tracing::debug!("已编译 {} → main.css", source.display());
    Ok(())
}

async fn compile_with_grass(source: &Path, load_path: PathBuf) -> Result<String, BuildError> {
    let source = source.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let options = grass::Options::default().load_path(&load_path);
        grass::from_path(&source, &options).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| BuildError::Diagnostic(format!("grass 编译任务异常：{e}")))?
    .map_err(BuildError::Diagnostic)
}

fn strip_charset(css: &str) -> String {
    CHARSET_RE
        .replace_all(css, "data:application/json${1}")
        .into_owned()
}
