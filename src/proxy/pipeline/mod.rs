//! 请求处理管道（Pipeline）
//!
//! 将代理准备流程按职责拆分为一组可组合步骤（日志 → 解析设置 → 注入认证 → 选择上游）。
//! 步骤顺序即契约：日志最先执行，认证注入必须位于设置解析之后、转发之前。

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderValue;

use crate::error::ProxyError;
use crate::linfo;
use crate::logging::{LogStage, Logger};
use crate::proxy::{CredentialResolver, RequestContext, UpstreamRouter};

/// 步骤执行结果
#[derive(Debug)]
pub enum StepResult {
    /// 继续执行后续步骤
    Continue,
    /// 终止管道并返回错误
    Break(ProxyError),
}

/// 管道步骤 trait：每个步骤只做一件事
#[async_trait::async_trait]
pub trait ProxyStep: Send + Sync {
    /// 步骤名称，用于日志
    fn name(&self) -> &'static str;

    /// 处理请求上下文
    async fn run(&self, ctx: &mut RequestContext) -> StepResult;
}

/// 处理管道：顺序执行步骤，遇错提前返回
pub struct ProxyPipeline {
    steps: Vec<Arc<dyn ProxyStep>>,
}

impl ProxyPipeline {
    /// 按给定顺序执行的管道
    #[must_use]
    pub fn new(steps: Vec<Arc<dyn ProxyStep>>) -> Self {
        Self { steps }
    }

    /// 依次执行各步骤，遇到 `Break` 立即返回其错误
    pub async fn execute(&self, ctx: &mut RequestContext) -> Result<(), ProxyError> {
        for step in &self.steps {
            match step.run(ctx).await {
                StepResult::Continue => {}
                StepResult::Break(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// 按执行顺序列出步骤名称
    #[must_use]
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

/// 构建器：便于在服务启动时声明式组合步骤
#[derive(Default)]
pub struct PipelineBuilder {
    steps: Vec<Arc<dyn ProxyStep>>,
}

impl PipelineBuilder {
    /// 空构建器
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加步骤
    #[must_use]
    pub fn step(mut self, s: Arc<dyn ProxyStep>) -> Self {
        self.steps.push(s);
        self
    }

    /// 构建管道
    #[must_use]
    pub fn build(self) -> ProxyPipeline {
        ProxyPipeline::new(self.steps)
    }
}

// ---------------- 步骤：请求日志 ----------------

/// 记录方法与路径，从不失败
pub struct RequestLoggingStep {
    logger: Logger,
}

impl RequestLoggingStep {
    /// 创建请求日志步骤
    #[must_use]
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[async_trait::async_trait]
impl ProxyStep for RequestLoggingStep {
    fn name(&self) -> &'static str {
        "request_logging"
    }

    async fn run(&self, ctx: &mut RequestContext) -> StepResult {
        linfo!(
            self.logger,
            LogStage::Request,
            "incoming",
            "收到代理请求",
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path()
        );
        StepResult::Continue
    }
}

// ---------------- 步骤：设置解析 ----------------

/// 解析激活凭证并写入上下文
pub struct SettingsResolutionStep {
    resolver: Arc<CredentialResolver>,
}

impl SettingsResolutionStep {
    /// 创建凭证解析步骤
    #[must_use]
    pub fn new(resolver: Arc<CredentialResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait::async_trait]
impl ProxyStep for SettingsResolutionStep {
    fn name(&self) -> &'static str {
        "settings_resolution"
    }

    async fn run(&self, ctx: &mut RequestContext) -> StepResult {
        match self.resolver.resolve(&ctx.request_id).await {
            Ok(credential) => {
                ctx.credential = Some(credential);
                StepResult::Continue
            }
            Err(e) => StepResult::Break(e),
        }
    }
}

// ---------------- 步骤：认证注入 ----------------

/// 以激活凭证覆盖 `Authorization` 请求头
pub struct AuthInjectionStep;

#[async_trait::async_trait]
impl ProxyStep for AuthInjectionStep {
    fn name(&self) -> &'static str {
        "auth_injection"
    }

    async fn run(&self, ctx: &mut RequestContext) -> StepResult {
        let Some(credential) = ctx.credential.as_ref() else {
            return StepResult::Break(ProxyError::internal("credential not set"));
        };

        let mut value = match HeaderValue::from_str(&format!("Bearer {}", credential.secret)) {
            Ok(value) => value,
            Err(e) => {
                return StepResult::Break(ProxyError::internal_with_source(
                    "密钥包含非法的请求头字符",
                    e,
                ));
            }
        };
        value.set_sensitive(true);
        ctx.headers.insert(AUTHORIZATION, value);
        StepResult::Continue
    }
}

// ---------------- 步骤：上游路由 ----------------

/// 确定转发目标并写入上下文
pub struct UpstreamRoutingStep {
    router: Arc<UpstreamRouter>,
}

impl UpstreamRoutingStep {
    /// 创建上游路由步骤
    #[must_use]
    pub fn new(router: Arc<UpstreamRouter>) -> Self {
        Self { router }
    }
}

#[async_trait::async_trait]
impl ProxyStep for UpstreamRoutingStep {
    fn name(&self) -> &'static str {
        "upstream_routing"
    }

    async fn run(&self, ctx: &mut RequestContext) -> StepResult {
        match self.router.route(ctx) {
            Ok(url) => {
                ctx.upstream = Some(url);
                StepResult::Continue
            }
            Err(e) => StepResult::Break(e),
        }
    }
}
