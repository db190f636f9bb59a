use std::path::Path;

use super::{StageContext, write_atomic};
use crate::build::error::BuildError;

/// 原样复制 index.html 到输出目录
pub async fn copy_html(ctx: &StageContext<'_>, source: &Path) -> Result<(), BuildError> {
    let metadata = tokio::fs::metadata(source).await?;
    if !metadata.is_file() {
        return Err(BuildError::NotAFile);
    }

    let bytes = tokio::fs::read(source).await?;
    write_atomic(&ctx.output_dir.join("index.html"), &bytes).await?;
    tracing::debug!("已复制 {} → index.html", source.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DevConfig;

    #[tokio::test]
    async fn copies_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        std::fs::create_dir_all(&public).unwrap();
        let source = dir.path().join("index.html");
        let html = "<!doctype html>\n<title>héllo</title>\r\n\u{0}";
        std::fs::write(&source, html).unwrap();

        let config = DevConfig::default();
        let ctx = StageContext { project_root: dir.path(), output_dir: &public, config: &config };
        copy_html(&ctx, &source).await.unwrap();

        assert_eq!(std::fs::read(public.join("index.html")).unwrap(), html.as_bytes());
    }

    #[tokio::test]
    async fn directory_source_gets_a_clear_message() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        std::fs::create_dir_all(&public).unwrap();
        let source = dir.path().join("index.html");
        std::fs::create_dir_all(&source).unwrap();

        let config = DevConfig::default();
        let ctx = StageContext { project_root: dir.path(), output_dir: &public, config: &config };
        let err = copy_html(&ctx, &source).await.unwrap_err();

        assert!(matches!(err, BuildError::NotAFile));
        assert_eq!(err.to_string(), "could not copy index.html — is it a file?");
        assert!(!public.join("index.html").exists());
    }

    #[tokio::test]
    async fn missing_source_is_a_plain_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = DevConfig::default();
        let ctx = StageContext { project_root: dir.path(), output_dir: dir.path(), config: &config };
        let err = copy_html(&ctx, &dir.path().join("index.html")).await.unwrap_err();
        assert!(matches!(err, BuildError::Io(_)));
        assert!(!err.is_fatal());
    }
}
