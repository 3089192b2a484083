//! 按客户端地址限流的中间件
//!
//! - 无法确定客户端地址 → 500（不绕过限流）
//! - 令牌不足 → 429

use std::rc::Rc;
use std::sync::Arc;

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::CONTENT_TYPE,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{error, trace};

use crate::services::RateLimiter;
use crate::utils::ip::client_identity;

pub const TOO_MANY_REQUESTS_TEXT: &str = "Too Many Requests";
pub const SERVER_ERROR_TEXT: &str = "Server Error";

/// 限流中间件工厂
#[derive(Clone)]
pub struct RateLimit {
    limiter: RateLimiter,
    trusted_proxies: Arc<Vec<String>>,
}

impl RateLimit {
    pub fn new(limiter: RateLimiter, trusted_proxies: Vec<String>) -> Self {
        Self {
            limiter,
            trusted_proxies: Arc::new(trusted_proxies),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            trusted_proxies: self.trusted_proxies.clone(),
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: RateLimiter,
    trusted_proxies: Arc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let client = client_identity(req.peer_addr(), req.headers(), &self.trusted_proxies);
        let admitted = client.as_deref().map(|id| self.limiter.allow(id));

        Box::pin(async move {
            match admitted {
                None => {
                    error!("Cannot determine client address for {}", req.path());
                    Ok(req.into_response(
                        HttpResponse::InternalServerError()
                            .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                            .body(SERVER_ERROR_TEXT)
                            .map_into_right_body(),
                    ))
                }
                Some(false) => {
                    trace!("Rejected {:?} on {}", client, req.path());
                    Ok(req.into_response(
                        HttpResponse::TooManyRequests()
                            .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                            .body(TOO_MANY_REQUESTS_TEXT)
                            .map_into_right_body(),
                    ))
                }
                Some(true) => srv.call(req).await.map(ServiceResponse::map_into_left_body),
            }
        })
    }
}
