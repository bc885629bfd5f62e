//! # 凭证解析器
//!
//! 对 [`CredentialStore`] 的直通读取，不做任何缓存：
//! 每个请求都重新查询，密钥轮换或配置档切换在下一个请求即生效。

use std::sync::Arc;

use crate::error::{ProxyError, Result};
use crate::logging::{LogStage, Logger};
use crate::store::{ActiveCredential, CredentialStore};
use crate::{ldebug, lwarn};

/// 凭证解析器
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    logger: Logger,
}

impl CredentialResolver {
    /// 创建解析器
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, logger: Logger) -> Self {
        Self { store, logger }
    }

    /// 解析当前激活的凭证
    pub async fn resolve(&self, request_id: &str) -> Result<ActiveCredential> {
        let credential = match self.store.active_credential().await {
            Ok(credential) => credential,
            Err(e) => {
                lwarn!(
                    self.logger,
                    LogStage::Resolve,
                    "resolve",
                    "无法解析激活凭证",
                    request_id = %request_id,
                    error = %e
                );
                return Err(e);
            }
        };

        if credential.secret.trim().is_empty() {
            lwarn!(
                self.logger,
                LogStage::Resolve,
                "resolve",
                "激活凭证的密钥为空",
                request_id = %request_id
            );
            return Err(ProxyError::credential_not_found("激活配置档的密钥为空"));
        }

        ldebug!(
            self.logger,
            LogStage::Resolve,
            "resolve",
            "凭证解析成功",
            request_id = %request_id,
            base_url = %credential.base_url,
            model = %credential.model
        );
        Ok(credential)
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_error_kind;
    use crate::error::ErrorKind;
    use crate::logging::LogComponent;
    use crate::testing::{StaticCredentialStore, capture_logger};

    #[tokio::test]
    async fn test_resolve_reads_store_every_time() {
        let store = Arc::new(StaticCredentialStore::with_credential(
            "https://a.example.com",
            "sk-a",
        ));
        let resolver = CredentialResolver::new(store.clone(), Logger::noop());

        let first = resolver.resolve("req-1").await.unwrap();
        assert_eq!(first.secret, "sk-a");

        store.set(ActiveCredential::new("https://b.example.com", "m", "sk-b"));
        let second = resolver.resolve("req-2").await.unwrap();
        assert_eq!(second.base_url, "https://b.example.com");

        store.clear();
        assert_error_kind!(resolver.resolve("req-3").await, ErrorKind::CredentialNotFound);
        assert_eq!(store.calls(), 3);
    }

    #[tokio::test]
    async fn test_missing_credential_is_logged() {
        let (logger, capture) = capture_logger(LogComponent::Resolver);
        let resolver = CredentialResolver::new(Arc::new(StaticCredentialStore::new(None)), logger);

        assert_error_kind!(
            resolver.resolve("req-missing").await,
            ErrorKind::CredentialNotFound
        );
        assert!(capture.contents().contains("req-missing"));
    }

    #[tokio::test]
    async fn test_empty_secret_is_not_found() {
        let store = StaticCredentialStore::with_credential("https://a.example.com", "  ");
        let resolver = CredentialResolver::new(Arc::new(store), Logger::noop());

        assert_error_kind!(
            resolver.resolve("req-empty").await,
            ErrorKind::CredentialNotFound
        );
    }
}
