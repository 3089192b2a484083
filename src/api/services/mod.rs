pub mod redirect;
pub mod shorten;

use actix_web::http::header::CONTENT_TYPE;
use actix_web::{HttpResponse, web};

pub use redirect::RedirectService;
pub use shorten::{OWNER_HEADER, ShortenRequest, ShortenResponse, ShortenService};

use crate::config::{RedirectMode, StaticConfig};

/// 请求处理用到的配置
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiSettings {
    pub redirect_mode: RedirectMode,
    pub require_owner_header: bool,
}

impl From<&StaticConfig> for ApiSettings {
    fn from(config: &StaticConfig) -> Self {
        Self {
            redirect_mode: config.server.redirect_mode,
            require_owner_header: config.server.require_owner_header,
        }
    }
}

fn method_not_allowed(body: &'static str) -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
        .body(body)
}

/// 未匹配的路径
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .insert_header((CONTENT_TYPE, "text/plain; charset=utf-8"))
        .body("Not Found")
}

/// 注册 `POST /short` 与 `GET /{code}`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/short")
            .route(web::post().to(ShortenService::handle_shorten))
            .default_service(web::to(|| async { method_not_allowed("must be only POST") })),
    )
    .service(
        web::resource("/{code:[0-9]+}")
            .route(web::get().to(RedirectService::handle_redirect))
            .default_service(web::to(|| async { method_not_allowed("must be only GET") })),
    );
}
