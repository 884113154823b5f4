// src/commerce.rs

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::{Client, multipart};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::errors::AppError;
use crate::images::decode_image_payload;
use crate::models::{CategoryInfo, DeliveryPolicy, ImageRole, ProductDraft, ProductOptions};
use crate::token::TokenManager;

const IMAGE_UPLOAD_PATH: &str = "/external/v1/product-images/upload";
const CATEGORIES_PATH: &str = "/external/v1/categories";
const PRODUCTS_PATH: &str = "/external/v2/products";

const SALE_WINDOW_DAYS: i64 = 365;

/// Authenticated operations against the commerce provider.
#[async_trait]
pub trait CommerceApi: Send + Sync {
    /// Uploads one image and returns the provider URL. An empty string means
    /// the provider accepted the file but returned no URL.
    async fn upload_image(&self, image: &str, role: ImageRole) -> Result<String, AppError>;

    async fn get_categories(&self, keyword: Option<&str>) -> Result<Vec<CategoryInfo>, AppError>;

    /// Submits the draft and returns the created product id.
    async fn register_product(&self, draft: &ProductDraft) -> Result<String, AppError>;
}

#[derive(Debug, Deserialize)]
struct UploadedImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ImageUploadResponse {
    #[serde(default)]
    images: Vec<UploadedImageUrl>,
}

#[derive(Debug, Deserialize)]
struct CategoryResponse {
    #[serde(default)]
    contents: Vec<CategoryInfo>,
}

pub struct CommerceGateway {
    client: Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl CommerceGateway {
    pub fn new(client: Client, base_url: impl Into<String>, tokens: Arc<TokenManager>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl CommerceApi for CommerceGateway {
    async fn upload_image(&self, image: &str, role: ImageRole) -> Result<String, AppError> {
        let bytes = decode_image_payload(image).map_err(|e| AppError::Upload {
            role,
            message: e.to_string(),
        })?;
        let token = self.tokens.get_valid_token().await?;

        let file_name = format!("image_{}.jpg", Utc::now().timestamp_millis());
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(|e| {
                tracing::error!("Could not set MIME type: {}", e);
                AppError::InternalServerError("Failed to prepare the image file".to_string())
            })?;
        let form = multipart::Form::new().part("imageFiles", part);

        let response = self
            .client
            .post(self.url(IMAGE_UPLOAD_PATH))
            .query(&[("imageType", role.to_string())])
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await;

        let resp = match response {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!("Network error while uploading a {} image: {}", role, e);
                return Err(AppError::Upload {
                    role,
                    message: e.to_string(),
                });
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "No error body".to_string());
            tracing::error!(
                "Image upload failed: Status={}, Role={}, Body={}",
                status,
                role,
                error_text
            );
            return Err(AppError::Upload {
                role,
                message: format!("({}) {}", status, error_text),
            });
        }

        let body: ImageUploadResponse = resp.json().await.map_err(|e| {
            tracing::error!("Could not parse image upload response: {}", e);
            AppError::Upload {
                role,
                message: format!("unreadable upload response: {}", e),
            }
        })?;

        let url = body
            .images
            .into_iter()
            .next()
            .map(|image| image.url)
            .unwrap_or_default();
        tracing::debug!("Uploaded {} image: {}", role, url);
        Ok(url)
    }

    async fn get_categories(&self, keyword: Option<&str>) -> Result<Vec<CategoryInfo>, AppError> {
        let token = self.tokens.get_valid_token().await?;

        let url = match keyword.map(str::trim).filter(|k| !k.is_empty()) {
            Some(keyword) => format!(
                "{}?keyword={}",
                self.url(CATEGORIES_PATH),
                urlencoding::encode(keyword)
            ),
            None => self.url(CATEGORIES_PATH),
        };

        let resp = self.client.get(&url).bearer_auth(&token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "No error body".to_string());
            tracing::error!("Category lookup failed: Status={}, Body={}", status, error_text);
            return Err(AppError::CategoryLookup(format!("({}) {}", status, error_text)));
        }

        let body: CategoryResponse = resp.json().await.map_err(|e| {
            AppError::CategoryLookup(format!("unreadable category response: {}", e))
        })?;
        Ok(body.contents)
    }

    async fn register_product(&self, draft: &ProductDraft) -> Result<String, AppError> {
        let token = self.tokens.get_valid_token().await?;
        let request_body = build_product_request(draft, Utc::now());

        let resp = self
            .client
            .post(self.url(PRODUCTS_PATH))
            .bearer_auth(&token)
            .json(&request_body)
            .send()
            .await?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| "No error body".to_string());
        if !status.is_success() {
            tracing::error!("Product registration failed: Status={}, Body={}", status, body);
            return Err(AppError::Registration(format!("({}) {}", status, body)));
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|e| {
            AppError::Registration(format!("unreadable registration response ({}): {}", e, body))
        })?;
        let product_id = extract_product_id(&parsed).ok_or_else(|| {
            AppError::Registration(format!("registration response has no product id: {}", body))
        })?;

        tracing::info!("Registered product '{}' as {}", draft.name, product_id);
        Ok(product_id)
    }
}

/// Provider date format: ISO-8601 with milliseconds and offset.
fn provider_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Maps a draft onto the provider's nested product schema.
pub fn build_product_request(draft: &ProductDraft, now: DateTime<Utc>) -> Value {
    let optional_images: Vec<Value> = draft
        .optional_image_urls
        .iter()
        .map(|url| json!({ "url": url }))
        .collect();

    let mut detail_attribute = json!({
        "naverShoppingSearchInfo": { "manufacturerMadeYn": false },
        "afterServiceInfo": {
            "afterServiceTelephoneNumber": "010-0000-0000",
            "afterServiceGuideContent": "고객센터로 문의해주세요",
        },
        "purchaseQuantityInfo": {
            "minPurchaseQuantity": 1,
            "maxPurchaseQuantityPerId": 0,
            "maxPurchaseQuantityPerOrder": 0,
        },
        "originAreaInfo": {
            "originAreaCode": "03",
            "content": "상세페이지 참조",
        },
        "sellerCodeInfo": {},
        "certificationTargetExcludeContent": {
            "childCertifiedProductExclusionYn": true,
            "kcExemptionType": "OVERSEAS",
            "kcCertifiedProductExclusionYn": "TRUE",
        },
        "minorPurchasable": true,
    });
    if let Some(options) = &draft.options {
        detail_attribute["optionInfo"] = build_option_info(options, draft.stock_quantity);
    }

    json!({
        "originProduct": {
            "statusType": "SALE",
            "saleType": "NEW",
            "leafCategoryId": draft.category_id,
            "name": draft.name,
            "detailContent": draft.detail_content_html,
            "images": {
                "representativeImage": { "url": draft.representative_image_url },
                "optionalImages": optional_images,
            },
            "saleStartDate": provider_timestamp(now),
            "saleEndDate": provider_timestamp(now + Duration::days(SALE_WINDOW_DAYS)),
            "salePrice": draft.sale_price,
            "stockQuantity": draft.stock_quantity,
            "deliveryInfo": build_delivery_info(&draft.delivery_policy),
            "detailAttribute": detail_attribute,
        },
        "smartstoreChannelProduct": {
            "naverShoppingRegistration": true,
            "channelProductDisplayStatusType": "ON",
        },
    })
}

fn build_delivery_info(policy: &DeliveryPolicy) -> Value {
    let mut delivery_fee = json!({
        "deliveryFeeType": policy.fee_type(),
        "baseFee": policy.base_fee(),
    });
    if let DeliveryPolicy::ConditionalFree { threshold, .. } = policy {
        delivery_fee["conditionalFree"] = json!({ "baseConditionAmount": threshold });
    }

    json!({
        "deliveryType": "DELIVERY",
        "deliveryAttributeType": "NORMAL",
        "deliveryCompany": "CJGLS",
        "deliveryFee": delivery_fee,
        "claimDeliveryInfo": {
            "returnDeliveryFee": 3000,
            "exchangeDeliveryFee": 6000,
        },
    })
}

/// Combination-type option block: one line per primary value, or per
/// primary x secondary pair when both axes are present.
fn build_option_info(options: &ProductOptions, total_stock: u32) -> Value {
    let mut group_names = json!({ "optionGroupName1": options.primary.name });
    if let Some(secondary) = &options.secondary {
        group_names["optionGroupName2"] = json!(secondary.name);
    }

    json!({
        "optionCombinationSortType": "CREATE",
        "optionCombinationGroupNames": group_names,
        "optionCombinations": option_combinations(options, total_stock),
    })
}

pub fn stock_per_line(total_stock: u32, lines: usize) -> u32 {
    if lines == 0 {
        return 0;
    }
    total_stock / lines as u32
}

pub fn option_combinations(options: &ProductOptions, total_stock: u32) -> Vec<Value> {
    let stock = stock_per_line(total_stock, options.line_count());
    let mut combinations = Vec::with_capacity(options.line_count());

    for first in &options.primary.values {
        match &options.secondary {
            Some(secondary) if !secondary.values.is_empty() => {
                for second in &secondary.values {
                    combinations.push(json!({
                        "stockQuantity": stock,
                        "price": 0,
                        "usable": true,
                        "optionName1": first,
                        "optionName2": second,
                    }));
                }
            }
            _ => combinations.push(json!({
                "stockQuantity": stock,
                "price": 0,
                "usable": true,
                "optionName1": first,
            })),
        }
    }
    combinations
}

/// Reads the created product id; the provider has answered with
/// `originProductNo`, `originProduct.id` or a bare `id`.
pub fn extract_product_id(body: &Value) -> Option<String> {
    let candidates = [
        body.get("originProductNo"),
        body.get("originProduct").and_then(|p| p.get("id")),
        body.get("id"),
    ];
    candidates.into_iter().flatten().find_map(|value| match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
