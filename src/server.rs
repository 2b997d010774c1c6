//! Native HTTP front door: actix-web receives the request, the spin-typed
//! router handles it.

use actix_web::http::{header::CONTENT_TYPE, StatusCode};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use spin_sdk::http::{Method, Request, Response};
use tracing::{info, warn};

use crate::config::Config;
use crate::core::store::KvStore;
use crate::{router, AppContext};

pub fn actix_to_spin_request(req: &HttpRequest, body: web::Bytes) -> anyhow::Result<Request> {
    let method = match req.method().as_str() {
        "GET" => Method::Get,
        "POST" => Method::Post,
        "PUT" => Method::Put,
        "DELETE" => Method::Delete,
        "HEAD" => Method::Head,
        "OPTIONS" => Method::Options,
        "PATCH" => Method::Patch,
        other => anyhow::bail!("unsupported method {other}"),
    };

    let uri = req.uri().to_string();

    let mut builder = Request::builder();
    builder.method(method).uri(&uri);
    for (name, value) in req.headers() {
        if let Ok(val_str) = value.to_str() {
            builder.header(name.as_str(), val_str);
        }
    }

    Ok(builder.body(body.to_vec()).build())
}

pub fn spin_to_actix_response(spin_resp: Response) -> HttpResponse {
    let status = StatusCode::from_u16(*spin_resp.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = HttpResponse::build(status);
    if let Some(content_type) = spin_resp.header("content-type").and_then(|h| h.as_str()) {
        response.insert_header((CONTENT_TYPE, content_type.to_string()));
    }

    response.body(spin_resp.body().to_vec())
}

pub async fn handle_all(req: HttpRequest, body: web::Bytes, ctx: web::Data<AppContext>) -> HttpResponse {
    let spin_req = match actix_to_spin_request(&req, body) {
        Ok(r) => r,
        Err(err) => {
            warn!(error = %err, "rejected request");
            return HttpResponse::BadRequest().json(serde_json::json!({ "message": "Invalid request" }));
        }
    };

    let response = router::route(&ctx, spin_req);
    info!(method = %req.method(), path = %req.path(), status = *response.status(), "request");
    spin_to_actix_response(response)
}

/// Serves until shutdown. Each worker gets its own [`AppContext`] over a
/// clone of `store`, so clones must share state.
pub async fn run<S>(config: Config, store: S) -> std::io::Result<()>
where
    S: KvStore + Clone + Send + 'static,
{
    let bind_addr = config.bind_addr.clone();
    info!("Server listening on http://{bind_addr}");

    HttpServer::new(move || {
        let ctx = AppContext::new(config.clone(), store.clone());
        App::new()
            .app_data(web::Data::new(ctx))
            .default_service(web::route().to(handle_all))
    })
    .bind(bind_addr)?
    .run()
    .await
}
