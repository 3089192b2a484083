use actix_web::http::header::CONTENT_TYPE;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use super::ApiSettings;
use crate::errors::ShortlinkError;
use crate::services::{AuditLog, LinkService};

/// 所有者身份头
pub const OWNER_HEADER: &str = "X-Telegram-ID";

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub url: String,
}

pub struct ShortenService;

impl ShortenService {
    pub async fn handle_shorten(
        req: HttpRequest,
        body: web::Bytes,
        service: web::Data<Arc<LinkService>>,
        settings: web::Data<ApiSettings>,
        audit: web::Data<Arc<dyn AuditLog>>,
    ) -> HttpResponse {
        if !Self::is_json(&req) {
            trace!("Rejected /short with content type {:?}", req.headers().get(CONTENT_TYPE));
            return Self::text(
                HttpResponse::UnsupportedMediaType(),
                "Content-Type must be application/json",
            );
        }

        let owner_id = match Self::owner_id(&req, settings.require_owner_header) {
            Ok(id) => id,
            Err(resp) => return resp,
        };

        let payload: ShortenRequest = match serde_json::from_slice(&body) {
            Ok(p) => p,
            Err(e) => {
                debug!("Invalid JSON body on /short: {}", e);
                let err = ShortlinkError::from(e);
                audit.log_error(owner_id, err.message(), err.code());
                return Self::text(HttpResponse::UnsupportedMediaType(), "invalid JSON body");
            }
        };

        match service.generate(&payload.url, owner_id).await {
            Ok(link) => {
                audit.log_action(owner_id, "shortened link");
                HttpResponse::Ok().json(ShortenResponse {
                    url: link.short_url,
                })
            }
            Err(e) => {
                use actix_web::ResponseError;
                audit.log_error(owner_id, e.message(), e.code());
                e.error_response()
            }
        }
    }

    /// `application/json`，允许带 charset 等参数
    fn is_json(req: &HttpRequest) -> bool {
        req.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
    }

    /// 解析 X-Telegram-ID：缺失时为 0（或按配置拒绝），格式错误返回 400
    fn owner_id(req: &HttpRequest, required: bool) -> Result<i64, HttpResponse> {
        let Some(raw) = req.headers().get(OWNER_HEADER) else {
            if required {
                return Err(Self::text(
                    HttpResponse::Unauthorized(),
                    "missing X-Telegram-ID header",
                ));
            }
            return Ok(0);
        };

        raw.to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| Self::text(HttpResponse::BadRequest(), "invalid X-Telegram-ID header"))
    }

    fn text(mut builder: actix_web::HttpResponseBuilder, body: &'static str) -> HttpResponse {
        builder
            .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
            .body(body)
    }
}
