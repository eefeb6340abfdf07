//! 应用配置模块
//!
//! - 从单个 TOML 文件或配置目录（`base.toml` + `overrides/*.toml`）加载
//! - 按 `IDP_HOOKS_ENV` 合并环境配置
//! - 字符串中的 `${VAR}` 从环境变量展开

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use toml::Value;
use tracing::warn;

use crate::hooks::expand_env;

mod manager;
pub use manager::ConfigManager;

/// HTTP 服务监听配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别，`RUST_LOG` 优先
    pub level: String,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_file: bool,
    pub with_line_number: bool,
    /// 输出 JSON 格式日志
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            json: false,
        }
    }
}

/// Hook 配置来源
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HooksSourceConfig {
    /// `hooks.toml` 文件或 `hooks.d` 目录，未设置时使用默认候选路径
    pub path: Option<PathBuf>,
}

/// 请求签名配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SigningConfig {
    /// HMAC-SHA256 密钥，未设置时不校验签名
    pub secret: Option<String>,
}

/// 应用配置主结构体
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub hooks: HooksSourceConfig,
    pub signing: SigningConfig,
}

/// 加载配置
///
/// 指定路径时必须加载成功；未指定时依次尝试 `config` 目录与 `config/app.toml`，
/// 都不存在则使用默认配置。
pub fn load_config(path: Option<&str>) -> Result<AppConfig> {
    let (mut value, root) = match path {
        Some(p) => {
            let source = Path::new(p);
            (load_value_from_source(source)?, config_root(source))
        }
        None => load_with_fallback(&[PathBuf::from("config"), PathBuf::from("config/app.toml")]),
    };

    ConfigManager::apply_environment_overlay(&mut value, &root)?;
    expand_env(&mut value).map_err(|err| anyhow!("{}", err.message()))?;

    value
        .try_into()
        .context("invalid application configuration")
}

fn load_with_fallback(candidates: &[PathBuf]) -> (Value, PathBuf) {
    for path in candidates {
        if !path.exists() {
            continue;
        }
        match load_value_from_source(path) {
            Ok(value) => return (value, config_root(path)),
            Err(err) => warn!("failed to load config from {}: {err:#}", path.display()),
        }
    }

    warn!("no configuration source succeeded, falling back to defaults");
    (Value::Table(toml::Table::new()), PathBuf::from("config"))
}

/// 配置根目录：目录来源即自身，文件来源取其所在目录
fn config_root(source: &Path) -> PathBuf {
    if source.is_dir() {
        return source.to_path_buf();
    }
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn load_value_from_source(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(anyhow!(
            "configuration path {} does not exist",
            path.display()
        ));
    }

    if path.is_dir() {
        load_value_from_directory(path)
    } else {
        load_toml_value(path)
    }
}

/// 目录布局：`base.toml` 为基础，`overrides/` 中的片段按文件名顺序覆盖；
/// 没有 `base.toml` 时退回到 `app.toml`
fn load_value_from_directory(path: &Path) -> Result<Value> {
    let base_file = path.join("base.toml");
    if !base_file.exists() {
        let app_file = path.join("app.toml");
        if app_file.exists() {
            return load_toml_value(&app_file);
        }
        return Err(anyhow!(
            "missing base configuration: {}",
            base_file.display()
        ));
    }

    let mut merged = load_toml_value(&base_file)?;
    if !merged.is_table() {
        return Err(anyhow!(
            "base configuration must be a table: {}",
            base_file.display()
        ));
    }

    merge_directory(&mut merged, &path.join("overrides"))?;
    Ok(merged)
}

fn merge_directory(root: &mut Value, dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("unable to read config directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| ext.eq_ignore_ascii_case("toml"))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let value = load_toml_value(&entry.path())?;
        merge_value(root, value);
    }

    Ok(())
}

pub(crate) fn load_toml_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config fragment {}", path.display()))?;
    let value: Value = toml::from_str(&content)
        .with_context(|| format!("invalid TOML content in fragment {}", path.display()))?;
    Ok(value)
}

/// 深度合并，表按键递归，其余值直接覆盖
pub(crate) fn merge_value(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Table(overlay_table) => {
            if let Value::Table(base_table) = base {
                for (key, overlay_value) in overlay_table.into_iter() {
                    match base_table.get_mut(&key) {
                        Some(base_value) => merge_value(base_value, overlay_value),
                        None => {
                            base_table.insert(key, overlay_value);
                        }
                    }
                }
            } else {
                *base = Value::Table(overlay_table);
            }
        }
        other => {
            *base = other;
        }
    }
}
