use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE: &str = "sitewatch.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sass: SassConfig,
    #[serde(default)]
    pub postcss: PostcssConfig,
    #[serde(default)]
    pub bundler: BundlerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 端口探测的起点，被占用时依次向后尝试
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SassEngine {
    /// 调用外部 sass 命令
    External,
    /// 进程内 grass 编译
    Grass,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SassConfig {
    #[serde(default = "default_sass_engine")]
    pub engine: SassEngine,
    #[serde(default = "default_sass_command")]
    pub command: Vec<String>,
    /// grass 引擎解析 @import / @use 的搜索目录
    #[serde(default = "default_load_path")]
    pub load_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostcssConfig {
    #[serde(default = "default_postcss_command")]
    pub command: Vec<String>,
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundlerConfig {
    #[serde(default = "default_bundler_command")]
    pub command: Vec<String>,
}

impl DevConfig {
    /// 读取项目根目录下的 sitewatch.toml；文件不存在时使用默认配置
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("读取 {CONFIG_FILE} 失败：{}", e))?;
        let config: DevConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("解析 {CONFIG_FILE} 失败：{}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let commands = [
            ("sass.command", &self.sass.command),
            ("postcss.command", &self.postcss.command),
            ("bundler.command", &self.bundler.command),
        ];
        for (key, command) in commands {
            if command.is_empty() {
                anyhow::bail!("{CONFIG_FILE} 中 {key} 不能为空");
            }
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SassConfig {
    fn default() -> Self {
        Self {
            engine: default_sass_engine(),
            command: default_sass_command(),
            load_path: default_load_path(),
        }
    }
}

impl Default for PostcssConfig {
    fn default() -> Self {
        Self {
            command: default_postcss_command(),
            browsers: default_browsers(),
        }
    }
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            command: default_bundler_command(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// 默认值函数
fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 3000 }
// 日志走 stderr，默认只保留警告，避免打乱终端状态区
fn default_log_level() -> String { "warn".into() }
fn default_sass_engine() -> SassEngine { SassEngine::External }
fn default_load_path() -> String { "node_modules".into() }
fn default_sass_command() -> Vec<String> {
    strings(&[
        "sass",
        "--embed-source-map",
        "--source-map-urls=absolute",
        "--load-path=node_modules",
        "{input}",
    ])
}
fn default_postcss_command() -> Vec<String> { strings(&["postcss", "--use", "autoprefixer"]) }
fn default_browsers() -> Vec<String> {
    strings(&["> 0.5%", "last 2 versions", "Firefox ESR", "not dead"])
}
fn default_bundler_command() -> Vec<String> {
    strings(&["esbuild", "{input}", "--bundle", "--sourcemap", "--outfile={output}"])
}
