// src/handlers.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use futures::future::{join_all, try_join_all};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::category;
use crate::copy_generation::build_prompt;
use crate::detail_page::render_detail_page;
use crate::errors::AppError;
use crate::images::{
    API_JPEG_QUALITY, API_MAX_WIDTH, compress_for_api, crop_to_portrait, crop_to_square,
    decode_image_payload, process_blocking, to_data_url,
};
use crate::models::{
    CategoryQuery, CropAspect, CropPayload, DetailPagePayload, GeneratePayload, GeneratedCopy,
    RegisterPayload, RegistrationRequest, SuggestCategoryPayload, UploadOutcome, UploadPayload,
    UploadedImage,
};
use crate::state::{AppState, RunHandle};

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn generate_copy_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GeneratePayload>,
) -> Result<Json<GeneratedCopy>, AppError> {
    if payload.images.is_empty() {
        return Err(AppError::BadRequest("at least one image is required".to_string()));
    }
    tracing::info!(
        "Generating copy for {} images (gender={})",
        payload.images.len(),
        payload.product_info.gender
    );

    let compressions = payload.images.iter().map(|image| async move {
        let bytes = decode_image_payload(&image.data)?;
        process_blocking(bytes, |b| compress_for_api(b, API_MAX_WIDTH, API_JPEG_QUALITY)).await
    });
    let images: Vec<Vec<u8>> = try_join_all(compressions).await?;

    let prompt = build_prompt(
        &payload.product_info,
        payload.custom_prompt.as_deref(),
        payload.outfit_image_count,
    );
    let copy = app_state.copy_generator.generate(&images, &prompt).await?;
    Ok(Json(copy))
}

pub async fn list_categories_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let keyword = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty());
    let categories = app_state.commerce.get_categories(keyword).await?;
    tracing::info!("Fetched {} categories (keyword={:?})", categories.len(), keyword);
    Ok(Json(json!({ "categories": categories })))
}

pub async fn suggest_categories_handler(
    Json(payload): Json<SuggestCategoryPayload>,
) -> Result<impl IntoResponse, AppError> {
    let product_type = payload.product_type.trim();
    let Some(gender) = payload.gender.filter(|_| !product_type.is_empty()) else {
        return Err(AppError::BadRequest(
            "productType and gender are required".to_string(),
        ));
    };
    let ids = category::suggest(product_type, gender);
    Ok(Json(json!({ "suggestedCategoryIds": ids })))
}

pub async fn upload_images_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<UploadPayload>,
) -> Result<impl IntoResponse, AppError> {
    if payload.images.is_empty() {
        return Err(AppError::BadRequest("no images to upload".to_string()));
    }

    let uploads = payload.images.iter().map(|image| {
        let commerce = app_state.commerce.clone();
        async move {
            match commerce.upload_image(&image.data, image.role).await {
                Ok(url) if !url.is_empty() => UploadOutcome {
                    url,
                    role: image.role,
                    success: true,
                    error: None,
                },
                Ok(_) => UploadOutcome {
                    url: String::new(),
                    role: image.role,
                    success: false,
                    error: Some("provider returned no URL".to_string()),
                },
                Err(e) => UploadOutcome {
                    url: String::new(),
                    role: image.role,
                    success: false,
                    error: Some(e.to_string()),
                },
            }
        }
    });
    let results: Vec<UploadOutcome> = join_all(uploads).await;

    let succeeded = results.iter().filter(|r| r.success).count();
    tracing::info!("Batch upload finished: {}/{} succeeded", succeeded, results.len());

    Ok(Json(json!({
        "success": succeeded > 0,
        "images": results,
        "message": format!("{} of {} images uploaded", succeeded, payload.images.len()),
    })))
}

pub async fn register_product_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.product.validate()?;
    let product_id = app_state.commerce.register_product(&payload.product).await?;
    tracing::info!("Registered product {}", product_id);
    Ok(Json(json!({ "productId": product_id })))
}

fn spawn_run(app_state: &AppState, run_id: Uuid, handle: RunHandle) {
    let orchestrator = app_state.orchestrator.clone();
    tokio::spawn(async move {
        tracing::info!("Registration run {} started", run_id);
        // The outcome is recorded on the progress channel.
        let _ = orchestrator.run(&handle.request, &handle.progress).await;
    });
}

pub async fn start_registration_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<RegistrationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let run_id = Uuid::new_v4();
    let handle = RunHandle::new(request);
    app_state.runs.insert(run_id, handle.clone()).await;
    spawn_run(&app_state, run_id, handle);

    Ok((StatusCode::ACCEPTED, Json(json!({ "runId": run_id }))))
}

pub async fn get_registration_handler(
    State(app_state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let handle = app_state.runs.get(&run_id).await.ok_or(AppError::NotFound)?;
    Ok(Json(handle.snapshot()))
}

pub async fn retry_registration_handler(
    State(app_state): State<Arc<AppState>>,
    Path(run_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let handle = app_state.runs.get(&run_id).await.ok_or(AppError::NotFound)?;
    if !handle.progress.send_if_modified(|run| run.restart()) {
        return Err(AppError::BadRequest(
            "only a failed registration can be retried".to_string(),
        ));
    }

    tracing::info!("Retrying registration run {}", run_id);
    let snapshot = handle.snapshot();
    spawn_run(&app_state, run_id, handle);
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

pub async fn crop_image_handler(Json(payload): Json<CropPayload>) -> Result<impl IntoResponse, AppError> {
    let bytes = decode_image_payload(&payload.data)?;
    let width = payload.width;
    let cropped = match payload.aspect {
        CropAspect::Square => process_blocking(bytes, move |b| crop_to_square(b, width)).await?,
        CropAspect::Portrait => {
            process_blocking(bytes, move |b| crop_to_portrait(b, width)).await?
        }
    };
    Ok(Json(json!({ "data": to_data_url(&cropped) })))
}

pub async fn detail_page_handler(
    Json(payload): Json<DetailPagePayload>,
) -> Result<Html<String>, AppError> {
    let images: Vec<UploadedImage> = payload
        .images
        .into_iter()
        .map(|image| UploadedImage {
            kind: image.kind,
            role: image.kind.upload_role(),
            url: image.url,
        })
        .collect();
    let html = render_detail_page(&payload.copy, &images, &payload.colors)?;
    Ok(Html(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commerce::CommerceApi;
    use crate::copy_generation::{CopyGenerator, fallback_copy};
    use crate::models::{CategoryInfo, Gender, ImageRole, ProductDraft, UploadPayloadImage};
    use crate::registration::RegistrationStep;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StubCommerce;

    #[async_trait]
    impl CommerceApi for StubCommerce {
        async fn upload_image(&self, image: &str, _role: ImageRole) -> Result<String, AppError> {
            match image {
                "bad" => return Err(AppError::Network("connection reset".into())),
                "empty" => return Ok(String::new()),
                _ => {}
            }
            Ok(format!("https://img/{}.jpg", image))
        }

        async fn get_categories(&self, _keyword: Option<&str>) -> Result<Vec<CategoryInfo>, AppError> {
            Ok(vec![])
        }

        async fn register_product(&self, _draft: &ProductDraft) -> Result<String, AppError> {
            Err(AppError::Registration("provider down".into()))
        }
    }

    struct StubCopy;

    #[async_trait]
    impl CopyGenerator for StubCopy {
        async fn generate(&self, _images: &[Vec<u8>], _prompt: &str) -> Result<GeneratedCopy, AppError> {
            Ok(fallback_copy())
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(StubCommerce),
            Arc::new(StubCopy),
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn suggestion_requires_type_and_gender() {
        let missing = SuggestCategoryPayload {
            product_type: "원피스".into(),
            gender: None,
        };
        assert!(matches!(
            suggest_categories_handler(Json(missing)).await,
            Err(AppError::BadRequest(_))
        ));

        let blank = SuggestCategoryPayload {
            product_type: "  ".into(),
            gender: Some(Gender::Female),
        };
        assert!(suggest_categories_handler(Json(blank)).await.is_err());
    }

    #[tokio::test]
    async fn empty_upload_batch_is_rejected() {
        let result = upload_images_handler(State(state()), Json(UploadPayload { images: vec![] })).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn upload_batch_reports_each_image() {
        let payload = UploadPayload {
            images: vec![
                UploadPayloadImage {
                    data: "front".into(),
                    role: ImageRole::Representative,
                },
                UploadPayloadImage {
                    data: "bad".into(),
                    role: ImageRole::Detail,
                },
            ],
        };
        let response = upload_images_handler(State(state()), Json(payload))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "1 of 2 images uploaded");

        let images = body["images"].as_array().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0]["success"], true);
        assert_eq!(images[0]["url"], "https://img/front.jpg");
        assert_eq!(images[0]["type"], "REPRESENTATIVE");
        assert!(images[0].get("error").is_none());

        assert_eq!(images[1]["success"], false);
        assert_eq!(images[1]["type"], "DETAIL");
        assert!(images[1]["error"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn upload_without_url_counts_as_failure() {
        let payload = UploadPayload {
            images: vec![UploadPayloadImage {
                data: "empty".into(),
                role: ImageRole::Detail,
            }],
        };
        let response = upload_images_handler(State(state()), Json(payload))
            .await
            .unwrap()
            .into_response();

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "0 of 1 images uploaded");
        assert_eq!(body["images"][0]["success"], false);
        assert_eq!(body["images"][0]["url"], "");
        assert_eq!(body["images"][0]["error"], "provider returned no URL");
    }

    #[tokio::test]
    async fn unknown_run_is_not_found() {
        let result = get_registration_handler(State(state()), Path(Uuid::new_v4())).await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn retry_is_refused_unless_failed() {
        let app_state = state();
        let run_id = Uuid::new_v4();
        let request: RegistrationRequest = serde_json::from_value(json!({
            "images": [{ "type": "main", "data": "front" }],
            "copy": {},
            "sales": { "productName": "니트", "salePrice": 29000, "categoryId": "50000160" }
        }))
        .unwrap();
        let handle = RunHandle::new(request);
        app_state.runs.insert(run_id, handle.clone()).await;

        let refused = retry_registration_handler(State(app_state.clone()), Path(run_id)).await;
        assert!(matches!(refused, Err(AppError::BadRequest(_))));

        // The stub provider rejects registration, so the run ends failed.
        let _ = app_state.orchestrator.run(&handle.request, &handle.progress).await;
        assert_eq!(handle.snapshot().step, RegistrationStep::Failed);

        let accepted = retry_registration_handler(State(app_state.clone()), Path(run_id)).await;
        assert!(accepted.is_ok());
        assert_eq!(handle.snapshot().attempt, 2);
    }
}
