use crate::helper::public_helpers;
use crate::models::ContentType;
use crate::store::ContentStore;
use crate::routes::changes;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(rename = "type")]
    content_type: Option<ContentType>,
    page: Option<usize>,
    per_page: Option<usize>,
}

#[derive(Deserialize)]
pub struct LatestQuery {
    limit: Option<usize>,
}

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/is_server_active", web::get().to(is_server_active))
            .route("/content", web::get().to(get_content_page))
            .route("/content/latest", web::get().to(get_latest_content))
            .route("/content/featured", web::get().to(get_featured_content))
            .route("/content/slug/{slug}", web::get().to(get_content_by_slug))
            .route("/content/{id}", web::get().to(get_content_by_id))
            .configure(changes::config_changes),
    );
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().json("active")
}

async fn get_content_page(store: web::Data<ContentStore>, query: web::Query<PageQuery>) -> impl Responder {
    let page = public_helpers::fetch_content_page(&store, query.content_type, query.page, query.per_page);
    HttpResponse::Ok().json(page)
}

async fn get_latest_content(store: web::Data<ContentStore>, query: web::Query<LatestQuery>) -> impl Responder {
    HttpResponse::Ok().json(public_helpers::fetch_latest_items(&store, query.limit))
}

async fn get_featured_content(store: web::Data<ContentStore>) -> impl Responder {
    match public_helpers::fetch_featured_item(&store) {
        Some(item) => HttpResponse::Ok().json(item),
        None => HttpResponse::NotFound().body("No content yet"),
    }
}

async fn get_content_by_slug(slug: web::Path<String>, store: web::Data<ContentStore>) -> impl Responder {
    match public_helpers::fetch_item_by_slug(&store, &slug) {
        Some(item) => HttpResponse::Ok().json(item),
        None => HttpResponse::NotFound().body("Content not found"),
    }
}

async fn get_content_by_id(id: web::Path<String>, store: web::Data<ContentStore>) -> impl Responder {
    match public_helpers::fetch_item_by_id(&store, &id) {
        Some(item) => HttpResponse::Ok().json(item),
        None => HttpResponse::NotFound().body("Content not found"),
    }
}
