//! # 实体定义测试
//!
//! 测试所有 Sea-ORM 实体定义的正确性

use crate::{profile_settings, profiles, provider_keys, providers};
use sea_orm::Set;

#[tokio::test]
async fn test_profile_creation() {
    let profile = profiles::ActiveModel {
        name: Set("default".to_string()),
        is_active: Set(true),
        is_default: Set(true),
        ..Default::default()
    };

    assert_eq!(profile.name.as_ref(), "default");
    assert_eq!(profile.is_active.as_ref(), &true);
}

#[tokio::test]
async fn test_provider_creation() {
    let provider = providers::ActiveModel {
        name: Set("openai".to_string()),
        base_url: Set("https://api.openai.com/v1".to_string()),
        model: Set("gpt-4o-mini".to_string()),
        ..Default::default()
    };

    assert_eq!(provider.name.as_ref(), "openai");
    assert_eq!(provider.base_url.as_ref(), "https://api.openai.com/v1");
}

#[test]
fn test_provider_key_debug_redacts_secret() {
    let key = provider_keys::Model {
        id: 1,
        provider_id: 1,
        name: "work".to_string(),
        secret: "sk-very-secret".to_string(),
        created_at: chrono::Utc::now().naive_utc(),
    };

    let rendered = format!("{key:?}");
    assert!(!rendered.contains("sk-very-secret"));
    assert!(rendered.contains("***"));
}

#[test]
fn test_profile_settings_key_is_optional() {
    let settings = profile_settings::ActiveModel {
        profile_id: Set(1),
        provider_id: Set(2),
        provider_key_id: Set(None),
        ..Default::default()
    };

    assert_eq!(settings.provider_key_id.as_ref(), &None);
}
