// src/registration.rs

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use strum_macros::Display;
use tokio::sync::watch;
use validator::Validate;

use crate::commerce::CommerceApi;
use crate::detail_page::render_detail_page;
use crate::errors::AppError;
use crate::models::{ImageKind, ImageRole, PendingImage, ProductDraft, RegistrationRequest, UploadedImage};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegistrationStep {
    Preparing,
    UploadingImages,
    GeneratingHtml,
    RegisteringProduct,
    Completed,
    Failed,
}

impl RegistrationStep {
    pub fn is_terminal(self) -> bool {
        matches!(self, RegistrationStep::Completed | RegistrationStep::Failed)
    }
}

/// Snapshot of one registration attempt as shown to the caller.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRun {
    pub step: RegistrationStep,
    pub progress: u8,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub uploaded_images: Vec<UploadedImage>,
}

impl Default for RegistrationRun {
    fn default() -> Self {
        Self {
            step: RegistrationStep::Preparing,
            progress: 0,
            attempt: 1,
            error: None,
            retryable: false,
            product_id: None,
            uploaded_images: Vec::new(),
        }
    }
}

impl RegistrationRun {
    /// Moves to `step`. Progress never goes backwards and stays below 100
    /// until the run completes.
    pub fn advance(&mut self, step: RegistrationStep, progress: u8) {
        if self.step.is_terminal() {
            return;
        }
        self.step = step;
        self.progress = self.progress.max(progress.min(99));
    }

    pub fn complete(&mut self, product_id: String) {
        self.step = RegistrationStep::Completed;
        self.progress = 100;
        self.product_id = Some(product_id);
        self.error = None;
    }

    pub fn fail(&mut self, err: &AppError) {
        self.step = RegistrationStep::Failed;
        self.error = Some(match err {
            AppError::ValidationError(errors) => {
                format!("{}: {}", err, AppError::validation_summary(errors))
            }
            other => other.to_string(),
        });
        self.retryable = err.is_retryable();
    }

    /// Starts a new attempt from `preparing`. Only a failed run can restart.
    pub fn restart(&mut self) -> bool {
        if self.step != RegistrationStep::Failed {
            return false;
        }
        *self = RegistrationRun {
            attempt: self.attempt + 1,
            ..RegistrationRun::default()
        };
        true
    }
}

/// Drives one listing from pending images to a created product.
pub struct RegistrationOrchestrator {
    api: Arc<dyn CommerceApi>,
    timeout: Duration,
}

impl RegistrationOrchestrator {
    pub fn new(api: Arc<dyn CommerceApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    /// Runs every step once, publishing progress through `progress`. Nothing
    /// is retried here; a failed run is restarted by the caller.
    pub async fn run(
        &self,
        request: &RegistrationRequest,
        progress: &watch::Sender<RegistrationRun>,
    ) -> Result<String, AppError> {
        let result = match tokio::time::timeout(self.timeout, self.execute(request, progress)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "registration did not finish within {}s",
                self.timeout.as_secs()
            ))),
        };

        match &result {
            Ok(product_id) => {
                tracing::info!("Registration completed: product_id={}", product_id);
                progress.send_modify(|run| run.complete(product_id.clone()));
            }
            Err(e) => {
                tracing::error!("Registration failed: {}", e);
                progress.send_modify(|run| run.fail(e));
            }
        }
        result
    }

    async fn execute(
        &self,
        request: &RegistrationRequest,
        progress: &watch::Sender<RegistrationRun>,
    ) -> Result<String, AppError> {
        let step = |step, pct| progress.send_modify(|run| run.advance(step, pct));

        step(RegistrationStep::Preparing, 5);
        validate_request(request)?;
        let pending = upload_order(&request.images);
        step(RegistrationStep::Preparing, 10);

        step(RegistrationStep::UploadingImages, 20);
        let uploaded = self.upload_all(&pending).await?;
        progress.send_modify(|run| {
            run.uploaded_images = uploaded.clone();
            run.advance(RegistrationStep::UploadingImages, 50);
        });

        step(RegistrationStep::GeneratingHtml, 60);
        let html = render_detail_page(&request.copy, &uploaded, &request.colors)?;
        step(RegistrationStep::GeneratingHtml, 70);

        step(RegistrationStep::RegisteringProduct, 80);
        let draft = build_draft(request, &uploaded, html);
        draft.validate()?;
        let product_id = self.api.register_product(&draft).await?;
        step(RegistrationStep::RegisteringProduct, 95);

        Ok(product_id)
    }

    /// Uploads concurrently and keeps request order. Fails when no image made
    /// it or when the representative image is among the failures.
    async fn upload_all(&self, images: &[&PendingImage]) -> Result<Vec<UploadedImage>, AppError> {
        let uploads = images.iter().map(|image| {
            let role = image.kind.upload_role();
            async move { (image.kind, role, self.api.upload_image(&image.data, role).await) }
        });
        let results = join_all(uploads).await;

        let mut uploaded = Vec::new();
        let mut failures: Vec<(ImageRole, String)> = Vec::new();
        for (idx, (kind, role, result)) in results.into_iter().enumerate() {
            let failure = match result {
                Ok(url) if !url.is_empty() => {
                    uploaded.push(UploadedImage { kind, role, url });
                    continue;
                }
                Ok(_) => format!("image {} ({}): provider returned no URL", idx + 1, kind),
                Err(e) => format!("image {} ({}): {}", idx + 1, kind, e),
            };
            tracing::warn!("Upload failed: {}", failure);
            failures.push((role, failure));
        }
        tracing::info!("Uploaded {}/{} images", uploaded.len(), images.len());

        if uploaded.is_empty() {
            let all: Vec<&str> = failures.iter().map(|(_, msg)| msg.as_str()).collect();
            return Err(AppError::UploadsFailed(all.join("; ")));
        }
        if !uploaded.iter().any(|img| img.role == ImageRole::Representative) {
            let representative: Vec<&str> = failures
                .iter()
                .filter(|(role, _)| *role == ImageRole::Representative)
                .map(|(_, msg)| msg.as_str())
                .collect();
            return Err(AppError::UploadsFailed(format!(
                "representative image did not upload: {}",
                representative.join("; ")
            )));
        }
        Ok(uploaded)
    }
}

fn validate_request(request: &RegistrationRequest) -> Result<(), AppError> {
    request.sales.validate()?;
    match request.images.iter().filter(|img| img.kind == ImageKind::Main).count() {
        0 => Err(AppError::Validation("representative image is required".into())),
        1 => Ok(()),
        n => Err(AppError::Validation(format!(
            "exactly one main image is allowed, got {}",
            n
        ))),
    }
}

// Representative first, then the rest in the order given.
fn upload_order(images: &[PendingImage]) -> Vec<&PendingImage> {
    let (main, rest): (Vec<&PendingImage>, Vec<&PendingImage>) =
        images.iter().partition(|img| img.kind == ImageKind::Main);
    main.into_iter().chain(rest).collect()
}

pub fn build_draft(
    request: &RegistrationRequest,
    uploaded: &[UploadedImage],
    detail_content_html: String,
) -> ProductDraft {
    let sales = &request.sales;
    let representative_image_url = uploaded
        .iter()
        .find(|img| img.role == ImageRole::Representative)
        .map(|img| img.url.clone())
        .unwrap_or_default();
    let optional_image_urls = uploaded
        .iter()
        .filter(|img| img.role == ImageRole::Detail)
        .map(|img| img.url.clone())
        .collect();

    ProductDraft {
        name: sales.product_name.clone(),
        sale_price: sales.sale_price,
        stock_quantity: sales.stock_quantity,
        category_id: sales.category_id.clone(),
        detail_content_html,
        representative_image_url,
        optional_image_urls,
        delivery_policy: sales.delivery_policy.clone(),
        options: sales.options(),
    }
}
