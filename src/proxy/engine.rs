//! # 转发引擎
//!
//! 将请求以流的方式转发到上游，并把上游响应原样流式返回。
//! 传输层失败与等待响应头超时统一映射为 `UpstreamUnreachable`，不重试。

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{self, HeaderName};
use axum::http::HeaderMap;
use axum::response::Response;

use super::context::RequestContext;
use crate::error::{ProxyError, Result};
use crate::logging::{LogStage, Logger};
use crate::{linfo, lwarn};

/// 逐跳请求头，不在代理两侧传递
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// 入站的转发链请求头，转发前移除
const FORWARDED_HEADERS: [&str; 4] = [
    "forwarded",
    "x-forwarded-for",
    "x-forwarded-host",
    "x-forwarded-proto",
];

/// 转发引擎
#[derive(Debug, Clone)]
pub struct ProxyEngine {
    client: reqwest::Client,
    response_timeout: Duration,
    logger: Logger,
}

impl ProxyEngine {
    /// 创建转发引擎
    ///
    /// 不跟随重定向。`response_timeout` 只约束收到响应头之前的时间，
    /// 响应体的流式传输不受限制。
    pub fn new(
        connect_timeout: Duration,
        response_timeout: Duration,
        logger: Logger,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ProxyError::internal_with_source("无法创建 HTTP 客户端", e))?;
        Ok(Self {
            client,
            response_timeout,
            logger,
        })
    }

    /// 转发请求
    pub async fn forward(&self, ctx: &RequestContext, body: Body) -> Result<Response> {
        let Some(upstream) = ctx.upstream.as_ref() else {
            return Err(ProxyError::internal("upstream not set"));
        };

        let mut headers = ctx.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        for name in FORWARDED_HEADERS {
            headers.remove(name);
        }

        let upstream_host = upstream.host_str().unwrap_or_default();
        let send = self
            .client
            .request(ctx.method.clone(), upstream.clone())
            .headers(headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()))
            .send();

        let upstream_response = match tokio::time::timeout(self.response_timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                lwarn!(
                    self.logger,
                    LogStage::Forward,
                    "forward",
                    "上游请求失败",
                    request_id = %ctx.request_id,
                    upstream_host = %upstream_host,
                    error = %e
                );
                return Err(ProxyError::upstream_unreachable_with_source(upstream_host, e));
            }
            Err(elapsed) => {
                lwarn!(
                    self.logger,
                    LogStage::Forward,
                    "forward",
                    "等待上游响应超时",
                    request_id = %ctx.request_id,
                    upstream_host = %upstream_host,
                    timeout_secs = self.response_timeout.as_secs_f64()
                );
                return Err(ProxyError::upstream_unreachable_with_source(
                    format!("{upstream_host} 响应超时"),
                    elapsed,
                ));
            }
        };

        let status = upstream_response.status();
        let mut response_headers = upstream_response.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        linfo!(
            self.logger,
            LogStage::Forward,
            "forward",
            "上游已响应",
            request_id = %ctx.request_id,
            method = %ctx.method,
            upstream_host = %upstream_host,
            status = status.as_u16(),
            elapsed_ms = u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX)
        );

        let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

/// 移除逐跳请求头，包括 `Connection` 中列出的字段
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}
