//! # 代理服务器
//!
//! 所有方法与路径都交给请求管道处理。收到关闭信号后停止接收新连接，
//! 已接收的请求在宽限期内继续完成，超时后直接丢弃。

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Request, State};
use axum::response::Response;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;

use super::handler::RequestPipeline;
use crate::error::{ProxyError, Result};
use crate::logging::{LogStage, Logger};
use crate::{lerror, linfo, lwarn};

/// 代理服务器
pub struct ProxyServer {
    pipeline: Arc<RequestPipeline>,
    shutdown_grace: Duration,
    logger: Logger,
}

impl ProxyServer {
    /// 创建代理服务器，`shutdown_grace` 为关闭时的排空时限
    #[must_use]
    pub fn new(pipeline: Arc<RequestPipeline>, shutdown_grace: Duration, logger: Logger) -> Self {
        Self {
            pipeline,
            shutdown_grace,
            logger,
        }
    }

    /// 构建路由
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(self.pipeline.clone())
    }

    /// 运行直到收到 SIGTERM 或 SIGINT
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let signal = shutdown_signal(self.logger.clone())?;
        self.serve_with_shutdown(listener, signal).await
    }

    /// 运行直到 `signal` 完成，然后在宽限期内排空请求
    pub async fn serve_with_shutdown<S>(self, listener: TcpListener, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        let address = listener.local_addr()?;
        let drain = Arc::new(Notify::new());
        let trigger = drain.clone();

        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { trigger.notified().await })
            .into_future();
        let mut server = std::pin::pin!(server);

        linfo!(
            self.logger,
            LogStage::Startup,
            "serve",
            "代理服务器开始监听",
            address = %address
        );

        tokio::select! {
            result = &mut server => {
                return result.map_err(|e| {
                    lerror!(
                        self.logger,
                        LogStage::Shutdown,
                        "serve",
                        "代理服务器异常退出",
                        error = %e
                    );
                    ProxyError::server_start_with_source("代理服务器异常退出", e)
                });
            }
            () = signal => {}
        }

        drain.notify_one();
        match tokio::time::timeout(self.shutdown_grace, &mut server).await {
            Ok(result) => {
                result.map_err(|e| ProxyError::server_start_with_source("代理服务器关闭失败", e))?;
                linfo!(self.logger, LogStage::Shutdown, "drain", "在途请求已全部完成");
            }
            Err(_) => lwarn!(
                self.logger,
                LogStage::Shutdown,
                "drain",
                "宽限期已到，丢弃剩余请求",
                grace_secs = self.shutdown_grace.as_secs()
            ),
        }
        Ok(())
    }
}

async fn proxy_handler(State(pipeline): State<Arc<RequestPipeline>>, request: Request) -> Response {
    pipeline.handle(request).await
}

/// 注册 SIGTERM 与 SIGINT 监听，返回在任一信号到达时完成的 future
///
/// 监听在调用时即注册，之后到达的信号不会丢失。
pub fn shutdown_signal(logger: Logger) -> Result<impl Future<Output = ()> + Send + 'static> {
    let mut terminate = signal(SignalKind::terminate())
        .map_err(|e| ProxyError::io("无法监听 SIGTERM", e))?;
    let mut interrupt =
        signal(SignalKind::interrupt()).map_err(|e| ProxyError::io("无法监听 SIGINT", e))?;

    Ok(async move {
        let reason = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = interrupt.recv() => "SIGINT",
        };
        linfo!(
            logger,
            LogStage::Shutdown,
            "shutdown_signal",
            "收到关闭信号",
            reason = reason
        );
    })
}
