// src/images.rs

use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose::STANDARD},
};
use image::{DynamicImage, codecs::jpeg::JpegEncoder, imageops::FilterType};

use crate::errors::AppError;

/// Longest edge sent to the copy-generation model.
pub const API_MAX_WIDTH: u32 = 800;
pub const API_JPEG_QUALITY: u8 = 70;
const CROP_JPEG_QUALITY: u8 = 90;

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest rectangle of the given aspect ratio centred inside the image.
pub fn center_crop(width: u32, height: u32, aspect_w: u32, aspect_h: u32) -> CropRect {
    if width == 0 || height == 0 || aspect_w == 0 || aspect_h == 0 {
        return CropRect {
            x: 0,
            y: 0,
            width,
            height,
        };
    }

    // Compare width/height against aspect_w/aspect_h without floats.
    let wider = width as u64 * aspect_h as u64 > height as u64 * aspect_w as u64;
    let (crop_w, crop_h) = if wider {
        let crop_w = (height as u64 * aspect_w as u64 / aspect_h as u64) as u32;
        (crop_w.max(1), height)
    } else {
        let crop_h = (width as u64 * aspect_h as u64 / aspect_w as u64) as u32;
        (width, crop_h.max(1))
    };

    CropRect {
        x: (width - crop_w) / 2,
        y: (height - crop_h) / 2,
        width: crop_w,
        height: crop_h,
    }
}

/// Scale that makes the source cover the whole box (the overflow is cropped).
pub fn cover_scale(src_w: u32, src_h: u32, box_w: u32, box_h: u32) -> f64 {
    if src_w == 0 || src_h == 0 {
        return 1.0;
    }
    let scale_x = box_w as f64 / src_w as f64;
    let scale_y = box_h as f64 / src_h as f64;
    scale_x.max(scale_y)
}

/// Target size that keeps the aspect ratio and does not exceed `max_width`.
pub fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled_h = (height as u64 * max_width as u64 / width as u64) as u32;
    (max_width, scaled_h.max(1))
}

/// Accepts a `data:image/...;base64,` URL or bare base64 and returns the bytes.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, AppError> {
    let encoded = match payload.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => payload,
    };
    let encoded: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if encoded.is_empty() {
        return Err(AppError::ImageProcessing("image payload is empty".into()));
    }
    LENIENT_BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| AppError::ImageProcessing(format!("image payload is not base64: {}", e)))
}

pub fn to_data_url(jpeg_bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg_bytes))
}

/// Base64 without the data URL header, as inline model parts expect it.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn load(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    image::load_from_memory(bytes)
        .map_err(|e| AppError::ImageProcessing(format!("unsupported image: {}", e)))
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| AppError::ImageProcessing(format!("JPEG encoding failed: {}", e)))?;
    Ok(out)
}

fn crop_to_aspect(
    bytes: &[u8],
    aspect_w: u32,
    aspect_h: u32,
    target_width: Option<u32>,
) -> Result<Vec<u8>, AppError> {
    let img = load(bytes)?;
    let rect = center_crop(img.width(), img.height(), aspect_w, aspect_h);
    let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);

    let out = match target_width {
        Some(box_w) if box_w > 0 => {
            let box_h = ((box_w as u64 * aspect_h as u64 / aspect_w as u64) as u32).max(1);
            let scale = cover_scale(cropped.width(), cropped.height(), box_w, box_h);
            let w = ((cropped.width() as f64 * scale).round() as u32).max(box_w);
            let h = ((cropped.height() as f64 * scale).round() as u32).max(box_h);
            cropped
                .resize_exact(w, h, FilterType::Triangle)
                .crop_imm((w - box_w) / 2, (h - box_h) / 2, box_w, box_h)
        }
        _ => cropped,
    };
    encode_jpeg(&out, CROP_JPEG_QUALITY)
}

/// 1:1 centre crop used for the representative image, optionally scaled to
/// `target_width`.
pub fn crop_to_square(bytes: &[u8], target_width: Option<u32>) -> Result<Vec<u8>, AppError> {
    crop_to_aspect(bytes, 1, 1, target_width)
}

/// 3:4 centre crop used for outfit and detail shots.
pub fn crop_to_portrait(bytes: &[u8], target_width: Option<u32>) -> Result<Vec<u8>, AppError> {
    crop_to_aspect(bytes, 3, 4, target_width)
}

/// Downscales to `max_width` and re-encodes as JPEG.
pub fn compress_for_api(bytes: &[u8], max_width: u32, quality: u8) -> Result<Vec<u8>, AppError> {
    let img = load(bytes)?;
    let (w, h) = fit_width(img.width(), img.height(), max_width);
    let resized = if (w, h) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(w, h, FilterType::Triangle)
    };
    encode_jpeg(&resized, quality)
}

/// Runs an image operation on the blocking pool.
pub async fn process_blocking<F>(bytes: Vec<u8>, op: F) -> Result<Vec<u8>, AppError>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&bytes))
        .await
        .map_err(|e| AppError::InternalServerError(format!("image worker failed: {}", e)))?
}
