//! REST 存储后端测试
//!
//! 本地启动一个最小的 PostgREST 替身，验证请求格式与状态码映射。

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use parking_lot::Mutex;
use serde_json::{Value, json};

use shortlink_bot::errors::ShortlinkError;
use shortlink_bot::storage::backends::RestStore;
use shortlink_bot::storage::models::URLS_TABLE;
use shortlink_bot::storage::{Filter, SchemaMigrator, ShortLink, StoreGateway};

// =============================================================================
// Fake PostgREST
// =============================================================================

const API_KEY: &str = "test-key";

#[derive(Default)]
struct FakeDb {
    urls: Mutex<HashMap<String, Value>>,
    tables: Mutex<Vec<String>>,
    executed: Mutex<Vec<String>>,
}

fn authorized(req: &HttpRequest) -> bool {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    let bearer = format!("Bearer {}", API_KEY);
    header("apikey") == Some(API_KEY) && header("authorization") == Some(bearer.as_str())
}

/// `hash=eq.123` → `123`
fn hash_filter(query: &web::Query<HashMap<String, String>>) -> Option<String> {
    query
        .get("hash")
        .and_then(|v| v.strip_prefix("eq."))
        .map(str::to_string)
}

async fn get_row(
    req: HttpRequest,
    table: web::Path<String>,
    query: web::Query<HashMap<String, String>>,
    db: web::Data<Arc<FakeDb>>,
) -> HttpResponse {
    if !authorized(&req) {
        return HttpResponse::Unauthorized().body("bad key");
    }
    if table.as_str() == "broken" {
        return HttpResponse::InternalServerError().body("db down");
    }
    let single = req
        .headers()
        .get("accept")
        .is_some_and(|v| v == "application/vnd.pgrst.object+json");
    assert!(single, "lookups must ask for a single object");

    let row = hash_filter(&query).and_then(|hash| db.urls.lock().get(&hash).cloned());
    match row {
        Some(row) => HttpResponse::Ok().json(row),
        None => HttpResponse::NotAcceptable().body("multiple (or no) rows returned"),
    }
}

async fn insert_row(
    req: HttpRequest,
    table: web::Path<String>,
    body: web::Json<Value>,
    db: web::Data<Arc<FakeDb>>,
) -> HttpResponse {
    if !authorized(&req) {
        return HttpResponse::Unauthorized().body("bad key");
    }
    if table.as_str() != URLS_TABLE {
        return HttpResponse::Created().json(json!([body.into_inner()]));
    }

    let record = body.into_inner();
    let Some(hash) = record.get("hash").and_then(Value::as_str).map(str::to_string) else {
        return HttpResponse::BadRequest().body("missing hash");
    };
    let mut urls = db.urls.lock();
    if urls.contains_key(&hash) {
        return HttpResponse::Conflict().body("duplicate key value violates unique constraint");
    }
    urls.insert(hash, record.clone());
    HttpResponse::Created().json(json!([record]))
}

async fn delete_rows(
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
    db: web::Data<Arc<FakeDb>>,
) -> HttpResponse {
    if !authorized(&req) {
        return HttpResponse::Unauthorized().body("bad key");
    }
    if let Some(hash) = hash_filter(&query) {
        db.urls.lock().remove(&hash);
    }
    HttpResponse::NoContent().finish()
}

async fn rpc_table_exists(body: web::Json<Value>, db: web::Data<Arc<FakeDb>>) -> HttpResponse {
    let table = body["tbl"].as_str().unwrap_or_default().to_string();
    HttpResponse::Ok().json(db.tables.lock().contains(&table))
}

async fn rpc_execute_sql(body: web::Json<Value>, db: web::Data<Arc<FakeDb>>) -> HttpResponse {
    let sql = body["sql"].as_str().unwrap_or_default().to_string();
    if let Some(name) = sql
        .strip_prefix("create table if not exists ")
        .and_then(|rest| rest.split_whitespace().next())
    {
        db.tables.lock().push(name.to_string());
    }
    db.executed.lock().push(sql);
    HttpResponse::NoContent().finish()
}

/// 启动替身服务，返回 base url
fn start_fake(db: Arc<FakeDb>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db.clone()))
            .route("/rest/v1/rpc/table_exists", web::post().to(rpc_table_exists))
            .route("/rest/v1/rpc/execute_sql", web::post().to(rpc_execute_sql))
            .route("/rest/v1/{table}", web::get().to(get_row))
            .route("/rest/v1/{table}", web::post().to(insert_row))
            .route("/rest/v1/{table}", web::delete().to(delete_rows))
    })
    .workers(1)
    .disable_signals()
    .listen(listener)
    .unwrap()
    .run();

    actix_rt::spawn(server);
    format!("http://{}", addr)
}

fn store(base: &str, key: &str) -> RestStore {
    RestStore::new(base, key, Duration::from_secs(5)).unwrap()
}

fn link_record(hash: &str, url: &str) -> Value {
    serde_json::to_value(ShortLink::new(hash, url, 42)).unwrap()
}

// =============================================================================
// RestStore
// =============================================================================

#[actix_web::test]
async fn test_insert_then_get_single_object() {
    let db = Arc::new(FakeDb::default());
    let store = store(&start_fake(db.clone()), API_KEY);

    let inserted = store
        .insert(URLS_TABLE, &link_record("1234567890", "https://example.com"))
        .await
        .unwrap();
    let rows: Vec<ShortLink> = serde_json::from_slice(&inserted).unwrap();
    assert_eq!(rows[0].hash, "1234567890");

    let bytes = store
        .get(URLS_TABLE, &Filter::new().eq("hash", "1234567890"))
        .await
        .unwrap();
    let link: ShortLink = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(link.original_url, "https://example.com");
    assert_eq!(link.owner_id, 42);
}

#[actix_web::test]
async fn test_missing_row_is_not_found() {
    let store = store(&start_fake(Arc::default()), API_KEY);

    let err = store
        .get(URLS_TABLE, &Filter::new().eq("hash", "404"))
        .await
        .unwrap_err();
    assert!(matches!(err, ShortlinkError::NotFound(_)));
}

#[actix_web::test]
async fn test_duplicate_insert_is_rejected() {
    let store = store(&start_fake(Arc::default()), API_KEY);
    let record = link_record("1", "https://a.example");

    store.insert(URLS_TABLE, &record).await.unwrap();
    let err = store.insert(URLS_TABLE, &record).await.unwrap_err();
    assert!(matches!(err, ShortlinkError::StoreRejected(_)));
}

#[actix_web::test]
async fn test_bad_key_is_rejected_not_missing() {
    let store = store(&start_fake(Arc::default()), "wrong-key");

    let err = store
        .get(URLS_TABLE, &Filter::new().eq("hash", "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ShortlinkError::StoreRejected(_)));
}

#[actix_web::test]
async fn test_server_error_is_unavailable() {
    let store = store(&start_fake(Arc::default()), API_KEY);

    let err = store
        .get("broken", &Filter::new().eq("hash", "1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ShortlinkError::StoreUnavailable(_)));
}

#[actix_web::test]
async fn test_unreachable_store_is_unavailable() {
    // 绑定后立即释放，端口上没有服务
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let store = store(&format!("http://{}", addr), API_KEY);

    let err = store
        .insert(URLS_TABLE, &link_record("1", "https://a.example"))
        .await
        .unwrap_err();
    assert!(matches!(err, ShortlinkError::StoreUnavailable(_)));
}

#[actix_web::test]
async fn test_delete_by_filter() {
    let db = Arc::new(FakeDb::default());
    let store = store(&start_fake(db.clone()), API_KEY);

    store
        .insert(URLS_TABLE, &link_record("1", "https://a.example"))
        .await
        .unwrap();
    store
        .delete(URLS_TABLE, &Filter::new().eq("hash", "1"))
        .await
        .unwrap();
    assert!(db.urls.lock().is_empty());

    let err = store.delete(URLS_TABLE, &Filter::new()).await.unwrap_err();
    assert!(matches!(err, ShortlinkError::InvalidInput(_)));
}

// =============================================================================
// SchemaMigrator
// =============================================================================

#[actix_web::test]
async fn test_migrator_creates_only_missing_tables() {
    let db = Arc::new(FakeDb::default());
    db.tables.lock().push("urls".to_string());
    let base = start_fake(db.clone());

    let migrator = SchemaMigrator::new(&base, API_KEY, Duration::from_secs(5)).unwrap();
    let created = migrator.run().await.unwrap();
    assert_eq!(created, vec!["log_action", "log_error"]);
    assert_eq!(db.executed.lock().len(), 2);

    // 再次运行不做任何事
    let created = migrator.run().await.unwrap();
    assert!(created.is_empty());
    assert_eq!(db.executed.lock().len(), 2);
}
