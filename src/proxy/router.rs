//! # 上游路由
//!
//! 按请求选择转发目标：`debug=true` 时转发到固定的本地调试地址，
//! 否则使用激活凭证的 `base_url`。目标地址与请求路径按反向代理的方式拼接。

use url::Url;

use super::context::RequestContext;
use crate::error::{ProxyError, Result};
use crate::store::ActiveCredential;

/// 上游路由器
#[derive(Debug, Clone)]
pub struct UpstreamRouter {
    debug_target: Url,
}

impl UpstreamRouter {
    /// 以调试目标地址创建路由器
    pub fn new(debug_target: &str) -> Result<Self> {
        Ok(Self {
            debug_target: parse_base_url(debug_target)?,
        })
    }

    /// 调试目标地址
    #[must_use]
    pub const fn debug_target(&self) -> &Url {
        &self.debug_target
    }

    /// 选择目标基础地址
    pub fn select_target(
        &self,
        query: Option<&str>,
        credential: Option<&ActiveCredential>,
    ) -> Result<Url> {
        if is_debug_request(query) {
            return Ok(self.debug_target.clone());
        }
        let Some(credential) = credential else {
            return Err(ProxyError::internal("credential not set"));
        };
        parse_base_url(&credential.base_url)
    }

    /// 计算请求的完整上游地址
    pub fn route(&self, ctx: &RequestContext) -> Result<Url> {
        let target = self.select_target(ctx.query(), ctx.credential.as_ref())?;
        Ok(rewrite(&target, ctx.path(), ctx.query()))
    }
}

/// 查询参数中第一个 `debug` 的值是否为 `true`
#[must_use]
pub fn is_debug_request(query: Option<&str>) -> bool {
    query.is_some_and(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(key, _)| key == "debug")
            .is_some_and(|(_, value)| value == "true")
    })
}

/// 解析上游基础地址，必须是带主机的 http(s) 绝对地址
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ProxyError::invalid_upstream_target_with_source(raw, e))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ProxyError::invalid_upstream_target(raw));
    }
    Ok(url)
}

/// 将请求路径与查询拼接到目标地址上
#[must_use]
pub fn rewrite(target: &Url, path: &str, query: Option<&str>) -> Url {
    let mut url = target.clone();
    url.set_path(&single_joining_slash(target.path(), path));

    let query = match (target.query().filter(|q| !q.is_empty()), query.filter(|q| !q.is_empty())) {
        (Some(a), Some(b)) => Some(format!("{a}&{b}")),
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (None, None) => None,
    };
    url.set_query(query.as_deref());
    url
}

fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{a}{}", &b[1..]),
        (false, false) => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}
