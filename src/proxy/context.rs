//! # 请求上下文
//!
//! 在管道各步骤之间显式传递的强类型请求状态。

use std::time::{Duration, Instant};

use axum::http::{HeaderMap, Method, Uri};
use url::Url;

use crate::store::ActiveCredential;

/// 单次请求的上下文
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// 请求ID
    pub request_id: String,
    /// 请求开始时间
    pub start_time: Instant,
    /// 请求方法
    pub method: Method,
    /// 原始请求 URI（路径与查询）
    pub uri: Uri,
    /// 发往上游的请求头
    pub headers: HeaderMap,
    /// 设置解析步骤写入的凭证
    pub credential: Option<ActiveCredential>,
    /// 路由步骤确定的上游地址
    pub upstream: Option<Url>,
}

impl RequestContext {
    /// 为入站请求创建上下文，生成新的请求 ID
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            start_time: Instant::now(),
            method,
            uri,
            headers,
            credential: None,
            upstream: None,
        }
    }

    /// 请求路径
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// 原始查询串
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// 已耗时
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_unresolved() {
        let ctx = RequestContext::new(
            Method::POST,
            Uri::from_static("/v1/chat/completions?stream=true"),
            HeaderMap::new(),
        );
        assert_eq!(ctx.path(), "/v1/chat/completions");
        assert_eq!(ctx.query(), Some("stream=true"));
        assert!(ctx.credential.is_none());
        assert!(ctx.upstream.is_none());
        assert!(uuid::Uuid::parse_str(&ctx.request_id).is_ok());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestContext::new(Method::GET, Uri::from_static("/"), HeaderMap::new());
        let b = RequestContext::new(Method::GET, Uri::from_static("/"), HeaderMap::new());
        assert_ne!(a.request_id, b.request_id);
    }
}
