// src/models.rs
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use strum_macros::{Display, EnumIter, EnumString};
use validator::{Validate, ValidationError};

/// Role under which an image is uploaded to the commerce provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageRole {
    Representative,
    Detail,
}

/// What the picture shows on the detail page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ImageKind {
    Main,
    SizeChart,
    Outfit,
    Detail,
}

impl ImageKind {
    pub fn upload_role(self) -> ImageRole {
        match self {
            ImageKind::Main => ImageRole::Representative,
            _ => ImageRole::Detail,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Gender {
    Female,
    Male,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "wholeCategoryName", default)]
    pub full_path: String,
    #[serde(rename = "lastChildYn", default)]
    pub is_leaf: bool,
}

/// Delivery fee policy of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryPolicy {
    Free,
    Paid { fee: u32 },
    ConditionalFree { fee: u32, threshold: u32 },
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        DeliveryPolicy::ConditionalFree {
            fee: 3000,
            threshold: 50000,
        }
    }
}

impl DeliveryPolicy {
    pub fn fee_type(&self) -> &'static str {
        match self {
            DeliveryPolicy::Free => "FREE",
            DeliveryPolicy::Paid { .. } => "PAID",
            DeliveryPolicy::ConditionalFree { .. } => "CONDITIONAL_FREE",
        }
    }

    pub fn base_fee(&self) -> u32 {
        match self {
            DeliveryPolicy::Free => 0,
            DeliveryPolicy::Paid { fee } | DeliveryPolicy::ConditionalFree { fee, .. } => *fee,
        }
    }
}

pub const SIZE_AXIS_NAME: &str = "사이즈";
pub const COLOR_AXIS_NAME: &str = "색상";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionAxis {
    pub name: String,
    pub values: Vec<String>,
}

/// Up to two option axes. With both present every combination becomes one
/// purchasable line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductOptions {
    pub primary: OptionAxis,
    #[serde(default)]
    pub secondary: Option<OptionAxis>,
}

impl ProductOptions {
    /// Sizes become the primary axis; colors are primary only when there are
    /// no sizes. Returns `None` when both lists are empty.
    pub fn from_sizes_and_colors(sizes: &[String], colors: &[String]) -> Option<Self> {
        let sizes = clean_values(sizes);
        let colors = clean_values(colors);

        match (sizes.is_empty(), colors.is_empty()) {
            (true, true) => None,
            (false, true) => Some(ProductOptions {
                primary: OptionAxis {
                    name: SIZE_AXIS_NAME.to_string(),
                    values: sizes,
                },
                secondary: None,
            }),
            (true, false) => Some(ProductOptions {
                primary: OptionAxis {
                    name: COLOR_AXIS_NAME.to_string(),
                    values: colors,
                },
                secondary: None,
            }),
            (false, false) => Some(ProductOptions {
                primary: OptionAxis {
                    name: SIZE_AXIS_NAME.to_string(),
                    values: sizes,
                },
                secondary: Some(OptionAxis {
                    name: COLOR_AXIS_NAME.to_string(),
                    values: colors,
                }),
            }),
        }
    }

    pub fn line_count(&self) -> usize {
        let secondary = self
            .secondary
            .as_ref()
            .map_or(1, |axis| axis.values.len().max(1));
        self.primary.values.len() * secondary
    }
}

// Accepts "S, M,L" style input as well as already split lists.
fn clean_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(|c: char| c == ',' || c.is_whitespace()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Everything the provider needs to create one listing.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_option_stock"))]
pub struct ProductDraft {
    #[validate(length(min = 1, message = "product name is required"))]
    pub name: String,

    #[validate(range(min = 1, message = "sale price must be a positive amount"))]
    pub sale_price: u64,

    pub stock_quantity: u32,

    #[validate(length(min = 1, message = "category is required"))]
    pub category_id: String,

    #[serde(default)]
    pub detail_content_html: String,

    #[validate(custom(function = "validate_uploaded_image_url"))]
    pub representative_image_url: String,

    #[serde(default)]
    pub optional_image_urls: Vec<String>,

    #[serde(default)]
    pub delivery_policy: DeliveryPolicy,

    #[serde(default)]
    pub options: Option<ProductOptions>,
}

fn validate_uploaded_image_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        return Ok(());
    }
    let mut err = ValidationError::new("representative_image");
    err.message = Some(Cow::from(if url.is_empty() {
        "representative image is required"
    } else {
        "representative image must be a URL returned by the image upload"
    }));
    Err(err)
}

fn validate_option_stock(draft: &ProductDraft) -> Result<(), ValidationError> {
    check_option_stock(draft.stock_quantity, draft.options.as_ref())
}

fn check_option_stock(stock: u32, options: Option<&ProductOptions>) -> Result<(), ValidationError> {
    let Some(options) = options else {
        return Ok(());
    };
    let empty_axis = options.primary.values.is_empty()
        || options.secondary.as_ref().is_some_and(|axis| axis.values.is_empty());
    if empty_axis {
        let mut err = ValidationError::new("option_axis");
        err.message = Some(Cow::from("option axes need at least one value"));
        return Err(err);
    }
    if (stock as usize) < options.line_count() {
        let mut err = ValidationError::new("option_stock");
        err.message = Some(Cow::from(format!(
            "stock quantity {} cannot cover {} option lines",
            stock,
            options.line_count()
        )));
        return Err(err);
    }
    Ok(())
}

// --- Generated marketing copy ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SellingPoint {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CopyDetail {
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub fit: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub etc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCopy {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub hooking_copy: String,
    #[serde(default)]
    pub size_color: String,
    #[serde(default)]
    pub selling_points: Vec<SellingPoint>,
    #[serde(default)]
    pub outfit_copies: Vec<String>,
    #[serde(default)]
    pub detail: CopyDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColorInfo {
    pub name: String,
    #[serde(default)]
    pub is_main: bool,
}

// --- Payloads ---

#[derive(Debug, Clone, Deserialize)]
pub struct PendingImage {
    #[serde(rename = "type")]
    pub kind: ImageKind,
    /// Data URL or bare base64.
    pub data: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadedImage {
    pub kind: ImageKind,
    pub role: ImageRole,
    pub url: String,
}

fn default_stock_quantity() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_sales_option_stock"))]
pub struct SalesInfo {
    #[validate(length(min = 1, message = "product name is required"))]
    pub product_name: String,
    #[validate(range(min = 1, message = "sale price must be a positive amount"))]
    pub sale_price: u64,
    #[serde(default = "default_stock_quantity")]
    pub stock_quantity: u32,
    #[serde(default)]
    pub delivery_policy: DeliveryPolicy,
    #[validate(length(min = 1, message = "category is required"))]
    pub category_id: String,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
}

impl SalesInfo {
    pub fn options(&self) -> Option<ProductOptions> {
        ProductOptions::from_sizes_and_colors(&self.sizes, &self.colors)
    }
}

fn validate_sales_option_stock(sales: &SalesInfo) -> Result<(), ValidationError> {
    check_option_stock(sales.stock_quantity, sales.options().as_ref())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub images: Vec<PendingImage>,
    pub copy: GeneratedCopy,
    #[serde(default)]
    pub colors: Vec<ColorInfo>,
    pub sales: SalesInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub gender: Gender,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub colors: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePayload {
    pub images: Vec<PendingImage>,
    pub product_info: ProductInfo,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub outfit_image_count: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestCategoryPayload {
    #[serde(default)]
    pub product_type: String,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadPayloadImage {
    pub data: String,
    #[serde(rename = "type")]
    pub role: ImageRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadPayload {
    #[serde(default)]
    pub images: Vec<UploadPayloadImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub url: String,
    #[serde(rename = "type")]
    pub role: ImageRole,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterPayload {
    pub product: ProductDraft,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryQuery {
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CropAspect {
    Square,
    Portrait,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CropPayload {
    pub data: String,
    pub aspect: CropAspect,
    /// Output width in pixels; the crop keeps its own size when absent.
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailPagePayload {
    pub copy: GeneratedCopy,
    pub images: Vec<UploadedImagePayload>,
    #[serde(default)]
    pub colors: Vec<ColorInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadedImagePayload {
    #[serde(rename = "type")]
    pub kind: ImageKind,
    pub url: String,
}
