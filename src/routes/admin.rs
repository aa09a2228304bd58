use crate::helper::admin_helpers::{self, ContentForm, ContentPatchForm};
use crate::helper::image_suggestion_helpers::ImageSuggester;
use crate::helper::upload_helpers::{self, UploadSettings};
use crate::store::{ContentStore, StoreError};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    url: Option<String>,
    message: String,
}

#[derive(Deserialize)]
pub struct SuggestImagesRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

pub fn config_admin_api(cfg: &mut web::ServiceConfig) {
    cfg.route("/content", web::post().to(create_content_action))
        .route("/content/{id}", web::put().to(update_content_action))
        .route("/content/{id}", web::delete().to(delete_content_action))
        .route("/upload", web::post().to(upload_image_action))
        .route("/suggest-images", web::post().to(suggest_images_action));
}

fn store_error_response(context: &str, e: StoreError) -> HttpResponse {
    match e {
        StoreError::SlugConflict(_)
        | StoreError::VersionConflict { .. }
        | StoreError::DuplicateId(_)
        | StoreError::DuplicateSlug(_) => {
            HttpResponse::Conflict().json(json!({ "success": false, "message": e.to_string() }))
        }
        StoreError::InvalidSlug(_) => {
            HttpResponse::BadRequest().json(json!({ "success": false, "message": e.to_string() }))
        }
        StoreError::Storage(inner) => {
            log::error!("Failed to {}: {}", context, inner);
            HttpResponse::InternalServerError()
                .json(json!({ "success": false, "message": "The content could not be saved. Please try again." }))
        }
    }
}

fn blocking_error_response(context: &str, e: actix_web::error::BlockingError) -> HttpResponse {
    log::error!("Blocking error while trying to {}: {}", context, e);
    HttpResponse::InternalServerError().json(json!({ "success": false, "message": "Internal server error." }))
}

fn validation_error_response(errors: &[admin_helpers::FormError]) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "errors": admin_helpers::field_errors(errors),
    }))
}

async fn create_content_action(store: web::Data<ContentStore>, form: web::Json<ContentForm>) -> impl Responder {
    let fields = match form.into_inner().validate() {
        Ok(fields) => fields,
        Err(errors) => return validation_error_response(&errors),
    };

    let store = store.clone();
    match web::block(move || store.create(fields)).await {
        Ok(Ok(item)) => HttpResponse::Created().json(item),
        Ok(Err(e)) => store_error_response("create content", e),
        Err(e) => blocking_error_response("create content", e),
    }
}

async fn update_content_action(
    store: web::Data<ContentStore>,
    id: web::Path<String>,
    form: web::Json<ContentPatchForm>,
) -> impl Responder {
    let (patch, expected_updated_at) = match form.into_inner().validate() {
        Ok(validated) => validated,
        Err(errors) => return validation_error_response(&errors),
    };
    if patch.is_empty() {
        return HttpResponse::BadRequest().json(json!({ "success": false, "message": "Nothing to update." }));
    }

    let id = id.into_inner();
    let store = store.clone();
    let result = web::block(move || match expected_updated_at {
        Some(expected) => store.update_if_unchanged(&id, expected, patch),
        None => store.update(&id, patch),
    })
    .await;

    match result {
        Ok(Ok(Some(item))) => HttpResponse::Ok().json(item),
        Ok(Ok(None)) => HttpResponse::NotFound().json(json!({ "success": false, "message": "Content not found." })),
        Ok(Err(e)) => store_error_response("update content", e),
        Err(e) => blocking_error_response("update content", e),
    }
}

async fn delete_content_action(store: web::Data<ContentStore>, id: web::Path<String>) -> impl Responder {
    let id = id.into_inner();
    let store = store.clone();
    match web::block(move || store.delete(&id)).await {
        Ok(Ok(true)) => HttpResponse::Ok().json(json!({ "success": true })),
        Ok(Ok(false)) => HttpResponse::NotFound().json(json!({ "success": false, "message": "Content not found." })),
        Ok(Err(e)) => store_error_response("delete content", e),
        Err(e) => blocking_error_response("delete content", e),
    }
}

async fn upload_image_action(settings: web::Data<UploadSettings>, payload: Multipart) -> impl Responder {
    match upload_helpers::save_image_upload(&settings, payload).await {
        Ok(url) => HttpResponse::Ok().json(UploadResponse {
            success: true,
            url: Some(url),
            message: "File uploaded successfully.".to_string(),
        }),
        Err(e) if e.is_client_error() => HttpResponse::BadRequest().json(UploadResponse {
            success: false,
            url: None,
            message: e.to_string(),
        }),
        Err(e) => {
            log::error!("Failed to save upload: {}", e);
            HttpResponse::InternalServerError().json(UploadResponse {
                success: false,
                url: None,
                message: "Failed to upload file.".to_string(),
            })
        }
    }
}

async fn suggest_images_action(
    suggester: web::Data<ImageSuggester>,
    request: web::Json<SuggestImagesRequest>,
) -> impl Responder {
    let SuggestImagesRequest { title, description } = request.into_inner();
    if title.trim().is_empty() || description.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "message": "Title and description are required." }));
    }

    let suggester = suggester.clone();
    match web::block(move || suggester.suggest(&title, &description)).await {
        Ok(images) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": format!("Found {} suggested images", images.len()),
            "images": images,
        })),
        Err(e) => blocking_error_response("suggest images", e),
    }
}
