//! # 凭证存储集成测试
//!
//! 内存 SQLite + 迁移，覆盖激活凭证的解析链与 CLI 使用的维护操作

use keeper::error::ErrorKind;
use keeper::logging::Logger;
use keeper::registry::ProviderRegistry;
use keeper::store::{CredentialStore, NewProvider, SeaOrmCredentialStore};
use keeper::testing::{CredentialFixture, create_temp_db, create_test_db};
use pretty_assertions::assert_eq;

async fn store() -> SeaOrmCredentialStore {
    let db = create_test_db().await.expect("数据库初始化失败");
    SeaOrmCredentialStore::new(db, Logger::noop())
}

#[tokio::test]
async fn test_empty_store_has_no_credential() {
    let store = store().await;
    let err = store.active_credential().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialNotFound);
}

#[tokio::test]
async fn test_fixture_resolves_full_chain() {
    let store = store().await;
    CredentialFixture::default()
        .with_base_url("https://llm.example.com/v1")
        .insert(&store)
        .await
        .unwrap();

    let credential = store.active_credential().await.unwrap();
    assert_eq!(credential.base_url, "https://llm.example.com/v1");
    assert_eq!(credential.model, "test-model");
    assert_eq!(credential.secret, "sk-test-secret");
}

#[tokio::test]
async fn test_provider_without_key_is_not_found() {
    let store = store().await;
    CredentialFixture::default()
        .with_secret(None)
        .insert(&store)
        .await
        .unwrap();

    let err = store.active_credential().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialNotFound);
}

#[tokio::test]
async fn test_profile_without_settings_is_not_found() {
    let store = store().await;
    store.create_profile("solo", true, true).await.unwrap();

    let err = store.active_credential().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialNotFound);
}

#[tokio::test]
async fn test_seed_then_set_key_assigns_it() {
    let store = store().await;
    let registry = ProviderRegistry::builtin().unwrap();

    assert!(store.seed(&registry).await.unwrap());
    assert_eq!(
        store.active_credential().await.unwrap_err().kind(),
        ErrorKind::CredentialNotFound
    );

    let default_provider = registry.first().unwrap();
    store
        .create_provider_key(&default_provider.name, "", "sk-seeded")
        .await
        .unwrap();

    let credential = store.active_credential().await.unwrap();
    assert_eq!(credential.base_url, default_provider.base_url);
    assert_eq!(credential.model, default_provider.default_model);
    assert_eq!(credential.secret, "sk-seeded");
}

#[tokio::test]
async fn test_select_provider_switches_credential() {
    let store = store().await;
    CredentialFixture::default().insert(&store).await.unwrap();
    store
        .create_providers(&[NewProvider::new("other", "https://other.example.com", "o-1")])
        .await
        .unwrap();

    let settings = store.select_provider("other").await.unwrap();
    assert!(settings.provider_key_id.is_none());
    assert_eq!(
        store.active_credential().await.unwrap_err().kind(),
        ErrorKind::CredentialNotFound
    );

    store.create_provider_key("other", "first", "sk-o1").await.unwrap();
    store.create_provider_key("other", "second", "sk-o2").await.unwrap();
    assert_eq!(store.active_credential().await.unwrap().secret, "sk-o1");

    store.select_provider("other").await.unwrap();
    let credential = store.active_credential().await.unwrap();
    assert_eq!(credential.base_url, "https://other.example.com");
    assert_eq!(credential.secret, "sk-o2");
}

#[tokio::test]
async fn test_switching_active_profile() {
    let store = store().await;
    CredentialFixture::default().insert(&store).await.unwrap();
    store.create_profile("spare", false, false).await.unwrap();

    store.set_active_profile("spare").await.unwrap();
    assert_eq!(
        store.active_credential().await.unwrap_err().kind(),
        ErrorKind::CredentialNotFound
    );

    store.set_active_profile("default").await.unwrap();
    assert!(store.active_credential().await.is_ok());

    let err = store.set_active_profile("ghost").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_provider_summaries_mark_selection() {
    let store = store().await;
    CredentialFixture::default().insert(&store).await.unwrap();
    store
        .create_providers(&[NewProvider::new("other", "https://other.example.com", "o-1")])
        .await
        .unwrap();

    let summaries = store.list_provider_summaries().await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries[0].selected);
    assert!(summaries[0].has_assigned_key);
    assert_eq!(summaries[0].key_count, 1);
    assert!(!summaries[1].selected);
    assert_eq!(summaries[1].key_count, 0);
}

#[tokio::test]
async fn test_validation_errors() {
    let store = store().await;
    CredentialFixture::default().insert(&store).await.unwrap();

    let err = store
        .create_provider_key("test-provider", "k", "   ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = store.create_provider_key("missing", "k", "sk").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = store.create_profile_settings(0, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_get_provider_by_name() {
    let store = store().await;
    store
        .create_providers(&[NewProvider::new("alpha", "https://alpha.example.com", "a-1")])
        .await
        .unwrap();

    let provider = store.get_provider_by_name("alpha").await.unwrap();
    assert_eq!(provider.base_url, "https://alpha.example.com");
    assert_eq!(provider.model, "a-1");

    let err = store.get_provider_by_name("beta").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = store.get_provider_by_name("  ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_file_database_persists_between_connections() {
    let (db, temp_dir) = create_temp_db().await.unwrap();
    let store = SeaOrmCredentialStore::new(db, Logger::noop());
    CredentialFixture::default().insert(&store).await.unwrap();
    drop(store);

    let url = format!("sqlite://{}", temp_dir.path().join("test.db").display());
    let db = sea_orm::Database::connect(&url).await.unwrap();
    let reopened = SeaOrmCredentialStore::new(db, Logger::noop());
    assert_eq!(reopened.active_credential().await.unwrap().secret, "sk-test-secret");
}
