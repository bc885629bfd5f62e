//! # 代理模块
//!
//! 每个入站请求依次经过：请求日志 → 设置解析 → 认证注入 → 上游路由，
//! 然后由 [`ProxyEngine`] 转发。凭证在每个请求中重新解析，切换配置无需重启。

mod context;
mod engine;
mod handler;
pub mod pipeline;
mod resolver;
mod router;
mod server;

pub use context::RequestContext;
pub use engine::{ProxyEngine, strip_hop_by_hop};
pub use handler::RequestPipeline;
pub use pipeline::{PipelineBuilder, ProxyPipeline, ProxyStep, StepResult};
pub use resolver::CredentialResolver;
pub use router::{UpstreamRouter, is_debug_request, parse_base_url, rewrite};
pub use server::{ProxyServer, shutdown_signal};
