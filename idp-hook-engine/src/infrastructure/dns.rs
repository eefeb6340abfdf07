//! 反向 DNS 查询

use std::net::IpAddr;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};

/// 反向解析接口，查询失败返回 None
#[async_trait]
pub trait ReverseResolver: Send + Sync {
    async fn reverse(&self, ip: IpAddr) -> Option<String>;
}

pub struct HickoryReverseResolver {
    resolver: TokioAsyncResolver,
}

impl Default for HickoryReverseResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HickoryReverseResolver {
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }
}

#[async_trait]
impl ReverseResolver for HickoryReverseResolver {
    async fn reverse(&self, ip: IpAddr) -> Option<String> {
        match self.resolver.reverse_lookup(ip).await {
            Ok(lookup) => lookup
                .iter()
                .next()
                .map(|name| name.to_string().trim_end_matches('.').to_string()),
            Err(err) => {
                tracing::debug!(ip = %ip, error = %err, "reverse dns lookup failed");
                None
            }
        }
    }
}

/// 不做解析
pub struct NoopResolver;

#[async_trait]
impl ReverseResolver for NoopResolver {
    async fn reverse(&self, _ip: IpAddr) -> Option<String> {
        None
    }
}
