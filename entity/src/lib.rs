//! # Entity 模块
//!
//! 包含所有 Sea-ORM 实体定义：配置档（profiles）、服务商（providers）、
//! 服务商密钥（provider_keys）以及配置档与服务商的关联（profile_settings）

pub mod profile_settings;
pub mod profiles;
pub mod provider_keys;
pub mod providers;

pub use profile_settings::Entity as ProfileSettings;
pub use profiles::Entity as Profiles;
pub use provider_keys::Entity as ProviderKeys;
pub use providers::Entity as Providers;

#[cfg(test)]
mod tests;
