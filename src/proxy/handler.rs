//! # 请求入口
//!
//! 组合管道步骤与转发引擎，将每个入站请求转换为响应。

use std::sync::Arc;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};

use super::context::RequestContext;
use super::engine::ProxyEngine;
use super::pipeline::{
    AuthInjectionStep, PipelineBuilder, ProxyPipeline, RequestLoggingStep,
    SettingsResolutionStep, UpstreamRoutingStep,
};
use super::resolver::CredentialResolver;
use super::router::UpstreamRouter;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::lerror;
use crate::logging::{LogComponent, LogStage, Logger};
use crate::store::CredentialStore;

/// 请求管道：步骤 + 转发
pub struct RequestPipeline {
    pipeline: ProxyPipeline,
    engine: ProxyEngine,
    logger: Logger,
}

impl RequestPipeline {
    /// 由已构建的管道与转发引擎组装
    #[must_use]
    pub fn new(pipeline: ProxyPipeline, engine: ProxyEngine, logger: Logger) -> Self {
        Self {
            pipeline,
            engine,
            logger,
        }
    }

    /// 标准管道：日志 → 设置解析 → 认证注入 → 上游路由
    pub fn standard(
        store: Arc<dyn CredentialStore>,
        config: &ServerConfig,
        logger: &Logger,
    ) -> Result<Self> {
        let resolver = Arc::new(CredentialResolver::new(
            store,
            logger.for_component(LogComponent::Resolver),
        ));
        let router = Arc::new(UpstreamRouter::new(&config.debug_upstream)?);
        let engine = ProxyEngine::new(
            config.connect_timeout(),
            config.response_timeout(),
            logger.for_component(LogComponent::Engine),
        )?;

        let pipeline = PipelineBuilder::new()
            .step(Arc::new(RequestLoggingStep::new(
                logger.for_component(LogComponent::Pipeline),
            )))
            .step(Arc::new(SettingsResolutionStep::new(resolver)))
            .step(Arc::new(AuthInjectionStep))
            .step(Arc::new(UpstreamRoutingStep::new(router)))
            .build();

        Ok(Self::new(
            pipeline,
            engine,
            logger.for_component(LogComponent::Pipeline),
        ))
    }

    /// 处理单个请求，失败时返回对应的错误响应
    pub async fn handle(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let mut ctx = RequestContext::new(parts.method, parts.uri, parts.headers);

        let result = match self.pipeline.execute(&mut ctx).await {
            Ok(()) => self.engine.forward(&ctx, body).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                let (status, code) = e.to_http_response_parts();
                lerror!(
                    self.logger,
                    LogStage::Request,
                    "handle",
                    "代理请求失败",
                    request_id = %ctx.request_id,
                    method = %ctx.method,
                    path = %ctx.path(),
                    status = status.as_u16(),
                    code = code,
                    error = %e
                );
                e.into_response()
            }
        }
    }
}
