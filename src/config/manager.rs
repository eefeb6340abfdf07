//! 环境配置管理
//!
//! 根据 `IDP_HOOKS_ENV` 选择配置根目录下的 `environments/{env}.toml` 并合并到基础配置。

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use toml::Value;

use super::{load_toml_value, merge_value};

pub struct ConfigManager;

impl ConfigManager {
    /// 当前环境名称，未设置时为 "development"
    pub fn get_environment() -> String {
        env::var("IDP_HOOKS_ENV").unwrap_or_else(|_| "development".to_string())
    }

    pub fn environment_config_path(root: &Path, environment: &str) -> PathBuf {
        root.join("environments").join(format!("{environment}.toml"))
    }

    /// 合并当前环境的配置，文件不存在时不做任何修改
    pub fn apply_environment_overlay(base: &mut Value, root: &Path) -> Result<()> {
        let path = Self::environment_config_path(root, &Self::get_environment());
        Self::apply_overlay_file(base, &path)
    }

    pub fn apply_overlay_file(base: &mut Value, path: &Path) -> Result<()> {
        if path.exists() {
            let overlay = load_toml_value(path)?;
            merge_value(base, overlay);
            tracing::debug!(path = %path.display(), "environment config merged");
        }
        Ok(())
    }
}
