use anyhow::Result;
use axum::Router;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;

/// 端口被占用时最多向后尝试的次数
const MAX_PORT_ATTEMPTS: u16 = 100;

/// 静态预览：直接把输出目录当作站点根目录
pub fn router(output_dir: &Path) -> Router {
    Router::new().fallback_service(tower_http::services::ServeDir::new(output_dir))
}

/// 从 `start` 开始找第一个能绑定的端口，返回已绑定的 listener，
/// 打印的地址因此一定是实际在监听的端口
pub async fn bind_first_free(host: &str, start: u16) -> Result<TcpListener> {
    let mut port = start;
    for _ in 0..MAX_PORT_ATTEMPTS {
        let addr = format!("{host}:{port}");
        match TcpListener::bind(&addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!("端口 {port} 已被占用，尝试下一个");
                port = match port.checked_add(1) {
                    Some(next) => next,
                    None => break,
                };
            }
            Err(e) => return Err(anyhow::anyhow!("绑定 {addr} 失败：{}", e)),
        }
    }
    anyhow::bail!("从 {start} 开始找不到可用端口")
}

/// 浏览器里展示的地址，回环 / 通配地址统一显示为 localhost
pub fn display_url(host: &str, port: u16) -> String {
    let host = match host {
        "127.0.0.1" | "0.0.0.0" | "::1" | "::" => "localhost",
        other => other,
    };
    format!("http://{host}:{port}")
}

/// 运行预览服务，直到进程退出
pub async fn serve(listener: TcpListener, output_dir: PathBuf) -> Result<()> {
    axum::serve(listener, router(&output_dir)).await?;
    Ok(())
}
