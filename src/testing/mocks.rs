//! # 测试 Mock 对象
//!
//! 提供各种组件的 Mock 实现用于单元测试

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mockall::mock;

use crate::error::{ProxyError, Result};
use crate::store::{ActiveCredential, CredentialStore};

/// 可在测试中随时替换凭证的存储
#[derive(Debug, Default)]
pub struct StaticCredentialStore {
    credential: Mutex<Option<ActiveCredential>>,
    calls: AtomicUsize,
}

impl StaticCredentialStore {
    /// 以给定凭证创建
    #[must_use]
    pub fn new(credential: Option<ActiveCredential>) -> Self {
        Self {
            credential: Mutex::new(credential),
            calls: AtomicUsize::new(0),
        }
    }

    /// 以指定地址与密钥创建
    #[must_use]
    pub fn with_credential(base_url: &str, secret: &str) -> Self {
        Self::new(Some(ActiveCredential::new(base_url, "test-model", secret)))
    }

    /// 替换当前凭证
    pub fn set(&self, credential: ActiveCredential) {
        *self
            .credential
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(credential);
    }

    /// 清除当前凭证
    pub fn clear(&self) {
        *self
            .credential
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    /// `active_credential` 被调用的次数
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn active_credential(&self) -> Result<ActiveCredential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credential
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ProxyError::credential_not_found("没有激活的配置档"))
    }
}

mock! {
    /// Mock 进程探测器
    pub ProcessProbe {}

    impl crate::supervisor::ProcessProbe for ProcessProbe {
        fn is_alive(&self, pid: i32) -> bool;
        fn terminate(&self, pid: i32) -> Result<()>;
    }
}
