use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ErrorBuilder, ErrorCode, HookError, Result};

use super::context::InvocationContext;
use super::outcome::HookResult;
use super::registry::HookRegistry;
use super::types::{FailurePolicy, Hook, HookKind, HookMetadata};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HookConfig {
    pub pre_registration: Vec<HookDefinition>,
    pub post_identification: Vec<HookDefinition>,
    pub post_account_login: Vec<HookDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HookDefinition {
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub timeout_ms: u64,
    pub failure_policy: FailurePolicy,
    /// 集成配置，`type` 字段决定具体集成
    pub integration: toml::Table,
}

impl Default for HookDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            enabled: true,
            timeout_ms: 3_000,
            failure_policy: FailurePolicy::FailClosed,
            integration: toml::Table::new(),
        }
    }
}

impl HookDefinition {
    pub fn metadata(&self, kind: HookKind) -> HookMetadata {
        HookMetadata::default()
            .with_kind(kind)
            .with_name(self.name.clone())
            .with_description(self.description.clone())
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_failure_policy(self.failure_policy)
    }

    pub fn integration_type(&self) -> Option<&str> {
        self.integration.get("type").and_then(toml::Value::as_str)
    }

    /// 展开 `${VAR}` 占位符后的集成配置
    pub fn resolved_integration(&self) -> Result<toml::Table> {
        let mut table = self.integration.clone();
        for (_, value) in table.iter_mut() {
            expand_env(value).map_err(|err| {
                ErrorBuilder::new(ErrorCode::ConfigurationError, err.message())
                    .details(format!("hook={}", self.name))
                    .build_error()
            })?;
        }
        Ok(table)
    }
}

/// 递归展开字符串中的 `${VAR}` 环境变量占位符
pub fn expand_env(value: &mut toml::Value) -> Result<()> {
    match value {
        toml::Value::String(text) => {
            if text.contains("${") {
                *text = expand_str(text)?;
            }
            Ok(())
        }
        toml::Value::Array(items) => items.iter_mut().try_for_each(expand_env),
        toml::Value::Table(table) => table.iter_mut().try_for_each(|(_, v)| expand_env(v)),
        _ => Ok(()),
    }
}

fn expand_str(input: &str) -> Result<String> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            ErrorBuilder::new(ErrorCode::ConfigurationError, "unterminated ${ placeholder")
                .build_error()
        })?;
        let var = &after[..end];
        let resolved = env::var(var).map_err(|_| {
            ErrorBuilder::new(
                ErrorCode::ConfigurationError,
                &format!("environment variable {var} is not set"),
            )
            .build_error()
        })?;
        output.push_str(&resolved);
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    Ok(output)
}

/// 根据 Hook 定义构建 Hook 实现
#[async_trait]
pub trait HookFactory: Send + Sync {
    async fn build(&self, kind: HookKind, def: &HookDefinition) -> Result<Arc<dyn Hook>>;
}

/// 配置有误的 Hook：每次调用都返回同一个配置错误，由计划映射为 Deny
struct MisconfiguredHook {
    error: HookError,
}

#[async_trait]
impl Hook for MisconfiguredHook {
    async fn invoke(&self, _ctx: &InvocationContext) -> Result<HookResult> {
        Err(self.error.clone())
    }
}

pub struct HookConfigLoader {
    candidate_paths: Vec<PathBuf>,
}

impl Default for HookConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HookConfigLoader {
    pub fn new() -> Self {
        Self {
            candidate_paths: vec![
                PathBuf::from("config/hooks.toml"),
                PathBuf::from("config/hooks.d"),
            ],
        }
    }

    /// 只从给定路径加载
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            candidate_paths: vec![path.into()],
        }
    }

    pub fn add_candidate<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.candidate_paths.push(path.into());
        self
    }

    pub fn load(&self) -> Result<HookConfig> {
        for path in &self.candidate_paths {
            if path.is_dir() {
                return self.load_from_directory(path);
            } else if path.is_file() {
                return self.load_from_file(path);
            }
        }
        tracing::warn!("no hook configuration found, starting with no hooks");
        Ok(HookConfig::default())
    }

    fn load_from_file(&self, path: &Path) -> Result<HookConfig> {
        let content = fs::read_to_string(path).map_err(|err| {
            ErrorBuilder::new(ErrorCode::ConfigurationError, "failed to read hook config")
                .details(format!("path={}, err={err}", path.display()))
                .build_error()
        })?;
        HookConfig::from_toml_str(&content).map_err(|err| {
            ErrorBuilder::new(ErrorCode::ConfigurationError, err.message())
                .details(format!(
                    "path={}, err={}",
                    path.display(),
                    err.details().unwrap_or_default()
                ))
                .build_error()
        })
    }

    fn load_from_directory(&self, dir: &Path) -> Result<HookConfig> {
        let mut merged = HookConfig::default();

        let mut entries = fs::read_dir(dir)
            .map_err(|err| {
                ErrorBuilder::new(
                    ErrorCode::ConfigurationError,
                    "failed to read hook config dir",
                )
                .details(format!("path={}, err={err}", dir.display()))
                .build_error()
            })?
            .filter_map(|entry| entry.ok())
            .collect::<Vec<_>>();
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            if entry
                .path()
                .extension()
                .map(|ext| ext == "toml")
                .unwrap_or(false)
            {
                let cfg = self.load_from_file(&entry.path())?;
                merged.merge(cfg);
            }
        }

        merged.validate()?;
        Ok(merged)
    }
}

impl HookConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: HookConfig = toml::from_str(content).map_err(|err| {
            ErrorBuilder::new(ErrorCode::ConfigurationError, "invalid hook config format")
                .details(err.to_string())
                .build_error()
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn merge(&mut self, other: HookConfig) {
        self.pre_registration.extend(other.pre_registration);
        self.post_identification.extend(other.post_identification);
        self.post_account_login.extend(other.post_account_login);
    }

    fn definitions(&self) -> impl Iterator<Item = (HookKind, &HookDefinition)> {
        self.pre_registration
            .iter()
            .map(|def| (HookKind::PreRegistration, def))
            .chain(
                self.post_identification
                    .iter()
                    .map(|def| (HookKind::PostIdentification, def)),
            )
            .chain(
                self.post_account_login
                    .iter()
                    .map(|def| (HookKind::PostAccountLogin, def)),
            )
    }

    /// Hook 名称必须非空且全局唯一
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (_, def) in self.definitions() {
            if def.name.trim().is_empty() {
                return Err(ErrorBuilder::new(
                    ErrorCode::ConfigurationError,
                    "hook definition without a name",
                )
                .build_error());
            }
            if !seen.insert(def.name.as_str()) {
                return Err(
                    ErrorBuilder::new(ErrorCode::ConfigurationError, "duplicate hook name")
                        .details(format!("hook={}", def.name))
                        .build_error(),
                );
            }
        }
        Ok(())
    }

    /// 构建并注册所有启用的 Hook
    ///
    /// 单个 Hook 构建失败不会中断启动：该 Hook 以配置错误的形式注册，
    /// 调用时返回 Deny。
    pub async fn install(&self, registry: Arc<HookRegistry>, factory: &dyn HookFactory) -> usize {
        let mut installed = 0;
        for (kind, def) in self.definitions() {
            if !def.enabled {
                tracing::info!(hook = %def.name, kind = kind.as_str(), "hook disabled, skip");
                continue;
            }
            let handler: Arc<dyn Hook> = match factory.build(kind, def).await {
                Ok(handler) => handler,
                Err(error) => {
                    tracing::error!(
                        hook = %def.name,
                        kind = kind.as_str(),
                        error = %error,
                        details = error.details().unwrap_or_default(),
                        "failed to build hook, it will deny every invocation"
                    );
                    Arc::new(MisconfiguredHook { error })
                }
            };
            registry.register(def.metadata(kind), handler).await;
            installed += 1;
        }
        installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[pre_registration]]
        name = "crm"
        timeout_ms = 1500
        failure_policy = "fail_open"
        integration = { type = "hubspot", access_token = "${IDP_HOOKS_TEST_TOKEN}" }

        [[post_identification]]
        name = "risk"
        integration = { type = "seczetta" }

        [[post_account_login]]
        name = "audit"
        enabled = false
        integration = { type = "splunk" }
    "#;

    struct Factory;

    #[async_trait]
    impl HookFactory for Factory {
        async fn build(&self, _kind: HookKind, def: &HookDefinition) -> Result<Arc<dyn Hook>> {
            match def.integration_type() {
                Some("seczetta") => Err(ErrorBuilder::new(
                    ErrorCode::ConfigurationError,
                    "missing api key",
                )
                .build_error()),
                _ => Ok(Arc::new(MisconfiguredHook {
                    error: ErrorBuilder::new(ErrorCode::NotFound, "stub").build_error(),
                })),
            }
        }
    }

    #[test]
    fn test_parse_hook_config() {
        let cfg = HookConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.pre_registration.len(), 1);
        let crm = &cfg.pre_registration[0];
        assert_eq!(crm.integration_type(), Some("hubspot"));
        let metadata = crm.metadata(HookKind::PreRegistration);
        assert_eq!(metadata.timeout, Duration::from_millis(1500));
        assert_eq!(metadata.failure_policy, FailurePolicy::FailOpen);

        let risk = &cfg.post_identification[0];
        assert_eq!(risk.timeout_ms, 3_000);
        assert_eq!(risk.failure_policy, FailurePolicy::FailClosed);
        assert!(!cfg.post_account_login[0].enabled);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let raw = r#"
            [[pre_registration]]
            name = "dup"
            [[post_account_login]]
            name = "dup"
        "#;
        let err = HookConfig::from_toml_str(raw).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
        assert_eq!(err.message(), "duplicate hook name");
    }

    #[test]
    fn test_expand_env_placeholders() {
        let mut value: toml::Value = toml::from_str(
            r#"
            url = "https://${IDP_HOOKS_TEST_HOST}/api"
            plain = "no placeholders"
            list = ["${IDP_HOOKS_TEST_HOST}"]
            "#,
        )
        .unwrap();
        // edition 2024: 修改环境变量需要 unsafe
        unsafe { env::set_var("IDP_HOOKS_TEST_HOST", "crm.example.com") };
        expand_env(&mut value).unwrap();
        assert_eq!(value["url"].as_str(), Some("https://crm.example.com/api"));
        assert_eq!(value["plain"].as_str(), Some("no placeholders"));
        assert_eq!(value["list"][0].as_str(), Some("crm.example.com"));
    }

    #[test]
    fn test_missing_env_is_configuration_error() {
        let def = HookDefinition {
            name: "crm".into(),
            integration: toml::from_str(r#"token = "${IDP_HOOKS_SURELY_UNSET_VAR}""#).unwrap(),
            ..Default::default()
        };
        let err = def.resolved_integration().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
        assert!(err.message().contains("IDP_HOOKS_SURELY_UNSET_VAR"));
        assert_eq!(err.details(), Some("hook=crm"));
    }

    #[tokio::test]
    async fn test_install_registers_misconfigured_hooks_as_deny() {
        let cfg = HookConfig::from_toml_str(SAMPLE).unwrap();
        let registry = HookRegistry::new();
        let installed = cfg.install(registry.clone(), &Factory).await;
        assert_eq!(installed, 2);
        assert!(registry.plan("audit").await.is_none());

        let risk = registry.plan("risk").await.unwrap();
        assert_eq!(
            risk.execute(&InvocationContext::default()).await,
            HookResult::deny("configuration_error", "missing api key")
        );
    }

    #[test]
    fn test_load_from_directory_merges_in_order() {
        let dir = std::env::temp_dir().join(format!("idp-hooks-cfg-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("10-crm.toml"),
            "[[pre_registration]]\nname = \"crm\"\n",
        )
        .unwrap();
        fs::write(
            dir.join("20-audit.toml"),
            "[[post_account_login]]\nname = \"audit\"\n",
        )
        .unwrap();
        fs::write(dir.join("README.md"), "ignored").unwrap();

        let cfg = HookConfigLoader::with_path(&dir).load().unwrap();
        assert_eq!(cfg.pre_registration[0].name, "crm");
        assert_eq!(cfg.post_account_login[0].name, "audit");

        fs::remove_dir_all(&dir).unwrap();
    }
}
