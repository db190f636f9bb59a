use std::process::ExitStatus;
use thiserror::Error;

/// 单次构建失败的原因。取消不属于错误，见 [`super::events::BuildOutcome::Cancelled`]
#[derive(Debug, Error)]
pub enum BuildError {
    /// 编译器 / 打包器给出的诊断文本，可恢复
    #[error("{0}")]
    Diagnostic(String),

    #[error("could not copy index.html — is it a file?")]
    NotAFile,

    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// 外部工具无法启动（通常是没有安装）
    #[error("无法启动 {tool}：{source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    /// 外部工具非零退出且 stdout / stderr 均为空
    #[error("{tool} 异常退出（{status}），没有任何输出")]
    Silent { tool: String, status: ExitStatus },
}

impl BuildError {
    /// 没有诊断信息的失败说明工具链本身坏了，需要终止整个进程
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Spawn { .. } | Self::Silent { .. })
    }
}
