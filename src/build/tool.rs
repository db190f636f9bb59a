use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::error::BuildError;

/// 一次外部工具调用的参数
pub struct Invocation<'a> {
    /// 程序名加参数，参数中的 `{input}` / `{output}` 会被替换
    pub command: &'a [String],
    pub input: &'a Path,
    pub output: &'a Path,
    pub cwd: &'a Path,
    pub stdin: Option<Vec<u8>>,
    pub envs: Vec<(&'static str, String)>,
}

/// 运行外部工具并返回其 stdout。
///
/// 子进程以 `kill_on_drop` 启动，返回的 future 被 drop 时子进程随之终止。
/// 非零退出时把 stdout + stderr 作为诊断；两者都为空则视为工具本身异常。
pub async fn run(invocation: Invocation<'_>) -> Result<Vec<u8>, BuildError> {
    let Some((program, args)) = invocation.command.split_first() else {
        return Err(BuildError::Diagnostic("外部命令为空".to_string()));
    };

    let args: Vec<String> = args
        .iter()
        .map(|arg| expand(arg, invocation.input, invocation.output))
        .collect();

    let mut cmd = Command::new(program);
    cmd.args(&args)
        .current_dir(invocation.cwd)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &invocation.envs {
        cmd.env(key, value);
    }

    tracing::debug!("运行 {} {}", program, args.join(" "));
    let mut child = cmd.spawn().map_err(|source| BuildError::Spawn {
        tool: program.clone(),
        source,
    })?;

    // stdin 与输出读取并行，避免大文件时双方互相等待管道
    if let (Some(bytes), Some(mut pipe)) = (invocation.stdin, child.stdin.take()) {
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(&bytes).await {
                tracing::debug!("写入子进程 stdin 失败：{e}");
            }
        });
    }

    let output = child.wait_with_output().await?;
    if output.status.success() {
        return Ok(output.stdout);
    }

    let diagnostic = collect_diagnostic(&output.stdout, &output.stderr);
    if diagnostic.is_empty() {
        Err(BuildError::Silent {
            tool: program.clone(),
            status: output.status,
        })
    } else {
        Err(BuildError::Diagnostic(diagnostic))
    }
}

fn expand(arg: &str, input: &Path, output: &Path) -> String {
    arg.replace("{input}", &input.to_string_lossy())
        .replace("{output}", &output.to_string_lossy())
}

fn collect_diagnostic(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    [stdout.trim(), stderr.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn invocation<'a>(command: &'a [String], dir: &'a Path) -> Invocation<'a> {
        Invocation {
            command,
            input: Path::new("/in/main.js"),
            output: Path::new("/out/main.js"),
            cwd: dir,
            stdin: None,
            envs: Vec::new(),
        }
    }

    #[test]
    fn placeholders_are_substituted_inside_arguments() {
        let arg = expand("--outfile={output}", Path::new("/a/b.js"), Path::new("/c/d.js"));
        assert_eq!(arg, "--outfile=/c/d.js");
        let arg = expand("cat {input} > {output}", Path::new("/a"), Path::new("/b"));
        assert_eq!(arg, "cat /a > /b");
    }

    #[test]
    fn diagnostics_join_both_streams() {
        assert_eq!(collect_diagnostic(b"  \n", b"\n"), "");
        assert_eq!(collect_diagnostic(b"out\n", b""), "out");
        assert_eq!(collect_diagnostic(b"out", b"err\n"), "out\nerr");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_is_returned_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = command(&["sh", "-c", "echo {input}"]);
        let out = run(invocation(&cmd, dir.path())).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out).trim(), "/in/main.js");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdin_and_env_reach_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = command(&["sh", "-c", "cat; printf \"$BROWSERSLIST\""]);
        let mut inv = invocation(&cmd, dir.path());
        inv.stdin = Some(b"a{b:c}\n".to_vec());
        inv.envs.push(("BROWSERSLIST", "last 2 versions".to_string()));
        let out = run(inv).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out), "a{b:c}\nlast 2 versions");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_with_output_is_a_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = command(&["sh", "-c", "echo 'Expected \"}\".' >&2; exit 65"]);
        let err = run(invocation(&cmd, dir.path())).await.unwrap_err();
        assert!(matches!(err, BuildError::Diagnostic(ref d) if d.contains("Expected")));
        assert!(!err.is_fatal());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = command(&["false"]);
        let err = run(invocation(&cmd, dir.path())).await.unwrap_err();
        assert!(matches!(err, BuildError::Silent { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn missing_binary_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = command(&["sitewatch-test-no-such-tool"]);
        let err = run(invocation(&cmd, dir.path())).await.unwrap_err();
        assert!(matches!(err, BuildError::Spawn { ref tool, .. } if tool == "sitewatch-test-no-such-tool"));
        assert!(err.is_fatal());
    }
}
