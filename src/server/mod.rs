//! Inbound HTTP surface
//!
//! ```text
//! GET     /api/fuel?lan=<region>   fuel prices for a region (alias: ?region=)
//! GET     /health                  liveness probe
//! OPTIONS *                        CORS preflight
//! ```
//!
//! Every response carries permissive CORS headers because the caller is a
//! browser app served from a different origin.

mod error;

pub use error::{ApiError, ApiResult};

use std::net::SocketAddr;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::header::ContentType;
use actix_web::http::Method;
use actix_web::middleware::DefaultHeaders;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::service::FuelPriceService;

/// Default path of the fuel-price endpoint
pub const DEFAULT_ROUTE: &str = "/api/fuel";

/// Response header naming the stage that produced the payload
pub const CACHE_STATUS_HEADER: &str = "X-Cache";

/// Query string of the fuel-price endpoint
#[derive(Debug, Deserialize)]
pub struct FuelQuery {
    /// Free-text county name
    #[serde(alias = "region")]
    pub lan: Option<String>,
}

/// Builds the CORS headers added to every response
fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET, OPTIONS"))
        .add((
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, X-Requested-With",
        ))
}

/// Returns fuel prices for the region named in the query string
async fn get_fuel(
    service: web::Data<FuelPriceService>,
    query: web::Query<FuelQuery>,
) -> ApiResult<HttpResponse> {
    let region = query.lan.as_deref().unwrap_or_default();
    let lookup = service.lookup(region).await?;

    debug!(region, key = %lookup.key, origin = lookup.origin.label(), "served fuel prices");
    Ok(HttpResponse::Ok()
        .content_type(ContentType::json())
        .insert_header((CACHE_STATUS_HEADER, lookup.origin.label()))
        .body(lookup.prices.into_bytes()))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Answers CORS preflight requests with an empty 200
async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// Wrong method on a known route
async fn method_not_allowed(req: HttpRequest) -> ApiResult<HttpResponse> {
    Err(ApiError::method_not_allowed(req.method().as_str()))
}

/// Preflight for any path, 404 for everything else
async fn fallback(req: HttpRequest) -> ApiResult<HttpResponse> {
    if req.method() == Method::OPTIONS {
        return Ok(preflight().await);
    }
    Err(ApiError::not_found(req.path()))
}

/// Rejects unparseable query strings with the JSON envelope
fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::invalid_request(err.to_string()).into())
}

/// Builds the application serving `service` at `route`
pub fn build_app(
    service: web::Data<FuelPriceService>,
    route: &str,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(service)
        .app_data(query_config())
        .wrap(cors_headers())
        .service(
            web::resource(route)
                .route(web::get().to(get_fuel))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/health")
                .route(web::get().to(health))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(method_not_allowed)),
        )
        .default_service(web::to(fallback))
}

/// Constructs the HTTP server bound to `bind_addr`
///
/// # Returns
/// A [`Server`] that must be awaited to drive the listener.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    service: FuelPriceService,
    route: String,
    bind_addr: SocketAddr,
) -> std::io::Result<Server> {
    let service = web::Data::new(service);
    let server = HttpServer::new(move || build_app(service.clone(), &route))
        .bind(bind_addr)?
        .run();

    info!(addr = %bind_addr, "fuel cache proxy listening");
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheManager, DEFAULT_FRESHNESS};
    use crate::data::{CandidateStrategy, FuelPrices, PriceSource, RegionKey, UpstreamError};
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Upstream stand-in answering every key with the same body
    struct StaticSource {
        body: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PriceSource for StaticSource {
        async fn fetch(&self, _key: &RegionKey) -> Result<FuelPrices, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.body {
                Some(body) => Ok(FuelPrices::from_json_bytes(body.as_bytes().to_vec())?),
                None => Err(UpstreamError::NotJson {
                    content_type: "text/html".to_string(),
                }),
            }
        }
    }

    fn service(
        dir: &TempDir,
        body: Option<&'static str>,
    ) -> (web::Data<FuelPriceService>, Arc<StaticSource>) {
        let cache = CacheManager::with_dir(dir.path().to_path_buf(), DEFAULT_FRESHNESS);
        let source = Arc::new(StaticSource {
            body,
            calls: AtomicUsize::new(0),
        });
        let service = FuelPriceService::new(cache, source.clone(), CandidateStrategy::PluralToggle);
        (web::Data::new(service), source)
    }

    fn assert_cors(response: &ServiceResponse) {
        let headers = response.headers();
        assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "*");
        assert_eq!(headers.get("Access-Control-Allow-Methods").unwrap(), "GET, OPTIONS");
        assert!(headers.get("Access-Control-Allow-Headers").is_some());
    }

    #[actix_web::test]
    async fn test_get_fuel_returns_upstream_json() {
        let dir = TempDir::new().unwrap();
        let (svc, source) = service(&dir, Some(r#"{"95":"14.49"}"#));
        let app = actix_test::init_service(build_app(svc, DEFAULT_ROUTE)).await;

        let req = actix_test::TestRequest::get()
            .uri("/api/fuel?lan=Uppsala%20l%C3%A4n")
            .to_request();
        let response = actix_test::call_service(&app, req).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(response.headers().get(CACHE_STATUS_HEADER).unwrap(), "MISS");
        let body = actix_test::read_body(response).await;
        assert_eq!(body.as_ref(), br#"{"95":"14.49"}"#);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn test_region_alias_and_cache_hit() {
        let dir = TempDir::new().unwrap();
        let (svc, source) = service(&dir, Some(r#"{"95":"14.49"}"#));
        let app = actix_test::init_service(build_app(svc, DEFAULT_ROUTE)).await;

        let first = actix_test::TestRequest::get()
            .uri("/api/fuel?lan=uppsala-lan")
            .to_request();
        actix_test::call_service(&app, first).await;
        let second = actix_test::TestRequest::get()
            .uri("/api/fuel?region=UPPSALA%20COUNTY")
            .to_request();
        let response = actix_test::call_service(&app, second).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CACHE_STATUS_HEADER).unwrap(), "HIT");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn test_missing_region_is_a_client_error() {
        let dir = TempDir::new().unwrap();
        let (svc, source) = service(&dir, Some("{}"));
        let app = actix_test::init_service(build_app(svc, DEFAULT_ROUTE)).await;

        for uri in ["/api/fuel", "/api/fuel?lan=", "/api/fuel?lan=%20%20"] {
            let req = actix_test::TestRequest::get().uri(uri).to_request();
            let response = actix_test::call_service(&app, req).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert_cors(&response);
            let body: Value = actix_test::read_body_json(response).await;
            assert_eq!(body["code"], "invalid_request");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn test_upstream_failure_without_cache_is_502() {
        let dir = TempDir::new().unwrap();
        let (svc, _source) = service(&dir, None);
        let app = actix_test::init_service(build_app(svc, DEFAULT_ROUTE)).await;

        let req = actix_test::TestRequest::get()
            .uri("/api/fuel?lan=Kalmar")
            .to_request();
        let response = actix_test::call_service(&app, req).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_cors(&response);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["code"], "upstream_unavailable");
        assert_eq!(body["details"]["candidates"], json!(["kalmar-lan", "kalmars-lan"]));
    }

    #[actix_web::test]
    async fn test_options_preflight_is_empty_200() {
        let dir = TempDir::new().unwrap();
        let (svc, _source) = service(&dir, Some("{}"));
        let app = actix_test::init_service(build_app(svc, DEFAULT_ROUTE)).await;

        for uri in ["/api/fuel", "/health", "/anything/else"] {
            let req = actix_test::TestRequest::default()
                .method(Method::OPTIONS)
                .uri(uri)
                .to_request();
            let response = actix_test::call_service(&app, req).await;

            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
            assert_cors(&response);
            let body = actix_test::read_body(response).await;
            assert!(body.is_empty());
        }
    }

    #[actix_web::test]
    async fn test_unknown_route_and_wrong_method() {
        let dir = TempDir::new().unwrap();
        let (svc, _source) = service(&dir, Some("{}"));
        let app = actix_test::init_service(build_app(svc, DEFAULT_ROUTE)).await;

        let req = actix_test::TestRequest::get().uri("/nope").to_request();
        let response = actix_test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_cors(&response);

        let req = actix_test::TestRequest::post()
            .uri("/api/fuel?lan=Kalmar")
            .to_request();
        let response = actix_test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body["code"], "method_not_allowed");
    }

    #[actix_web::test]
    async fn test_custom_route_and_health() {
        let dir = TempDir::new().unwrap();
        let (svc, _source) = service(&dir, Some("{}"));
        let app = actix_test::init_service(build_app(svc, "/fuel")).await;

        let req = actix_test::TestRequest::get().uri("/fuel?lan=Kalmar").to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = actix_test::TestRequest::get().uri("/health").to_request();
        let response = actix_test::call_service(&app, req).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(response).await;
        assert_eq!(body, json!({"status": "ok"}));
    }
}
