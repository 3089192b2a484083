use actix_web::http::header::{CONTENT_TYPE, LOCATION};
use actix_web::{HttpRequest, HttpResponse, web};
use std::sync::Arc;
use tracing::trace;

use super::ApiSettings;
use super::shorten::OWNER_HEADER;
use crate::config::RedirectMode;
use crate::errors::ShortlinkError;
use crate::services::{AuditLog, LinkService, ResolveSource};

pub struct RedirectService;

impl RedirectService {
    pub async fn handle_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        service: web::Data<Arc<LinkService>>,
        settings: web::Data<ApiSettings>,
        audit: web::Data<Arc<dyn AuditLog>>,
    ) -> Result<HttpResponse, ShortlinkError> {
        let code = path.into_inner();
        let owner_id = Self::visitor_id(&req);
        audit.log_action(owner_id, "go to shorten link");

        let resolved = match service.resolve(&code).await {
            Ok(resolved) => resolved,
            Err(e) => {
                audit.log_error(owner_id, e.message(), e.code());
                return Err(e);
            }
        };
        trace!("Resolved {} via {:?}", code, resolved.source);

        let response = match settings.redirect_mode {
            RedirectMode::Redirect => HttpResponse::Found()
                .insert_header((LOCATION, resolved.url))
                .finish(),
            RedirectMode::Echo => {
                let prefix = match resolved.source {
                    ResolveSource::Cache => "From cache",
                    ResolveSource::Store => "Fetched and cached",
                };
                HttpResponse::Ok()
                    .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
                    .body(format!("{}: {}", prefix, resolved.url))
            }
        };

        Ok(response)
    }

    /// 跳转不要求身份，头缺失或格式错误都记为 0
    fn visitor_id(req: &HttpRequest) -> i64 {
        req.headers()
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }
}
