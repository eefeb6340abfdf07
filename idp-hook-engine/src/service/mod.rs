//! 服务层：依赖装配与启动

pub mod bootstrap;
pub mod wire;

pub use bootstrap::ApplicationBootstrap;
