//! 基础设施层：外部集成适配器、令牌校验、电话号码与 DNS 工具

pub mod adapters;
pub mod dns;
pub mod jwks;
pub mod phone;
