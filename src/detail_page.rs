// src/detail_page.rs

use maud::{DOCTYPE, Markup, html};

use crate::errors::AppError;
use crate::models::{ColorInfo, GeneratedCopy, ImageKind, UploadedImage};

const PAGE_STYLE: &str = "max-width:860px;margin:0 auto;font-family:'Noto Sans KR',sans-serif;color:#222;line-height:1.7;";
const SECTION_STYLE: &str = "padding:48px 24px;text-align:center;";
const IMAGE_STYLE: &str = "display:block;width:100%;height:auto;margin:0 auto;";

fn urls_of(images: &[UploadedImage], kind: ImageKind) -> impl Iterator<Item = &str> {
    images
        .iter()
        .filter(move |img| img.kind == kind && !img.url.is_empty())
        .map(|img| img.url.as_str())
}

/// Detail-page HTML for the product listing.
///
/// The representative image falls back to the first uploaded image when none
/// is tagged as main. Fails only when there is no image URL at all.
pub fn render_detail_page(
    copy: &GeneratedCopy,
    images: &[UploadedImage],
    colors: &[ColorInfo],
) -> Result<String, AppError> {
    let main_url = urls_of(images, ImageKind::Main)
        .next()
        .or_else(|| images.iter().map(|img| img.url.as_str()).find(|url| !url.is_empty()))
        .ok_or_else(|| {
            AppError::Validation("detail page needs at least one uploaded image".into())
        })?;
    let size_chart_url = urls_of(images, ImageKind::SizeChart).next();
    let outfit_urls: Vec<&str> = urls_of(images, ImageKind::Outfit).collect();
    let detail_urls: Vec<&str> = urls_of(images, ImageKind::Detail).collect();

    let markup = html! {
        (DOCTYPE)
        div style=(PAGE_STYLE) {
            section style=(SECTION_STYLE) {
                h2 style="font-size:26px;font-weight:700;margin:0 0 12px;" { (copy.hooking_copy) }
                @if !copy.size_color.is_empty() {
                    p style="font-size:14px;color:#888;margin:0;" { (copy.size_color) }
                }
            }

            img style=(IMAGE_STYLE) src=(main_url) alt=(copy.product_name);

            @if let Some(url) = size_chart_url {
                section style=(SECTION_STYLE) {
                    h3 style="font-size:18px;letter-spacing:2px;" { "SIZE" }
                    img style=(IMAGE_STYLE) src=(url) alt="size chart";
                }
            }

            section style=(SECTION_STYLE) {
                h3 style="font-size:20px;margin-bottom:32px;" { "이 상품이 특별한 이유" }
                @for (idx, point) in copy.selling_points.iter().enumerate() {
                    div style="margin-bottom:28px;" {
                        p style="font-size:13px;color:#b08d57;margin:0;" { "POINT " (idx + 1) }
                        p style="font-size:18px;font-weight:700;margin:4px 0;" { (point.title) }
                        p style="font-size:15px;color:#555;margin:0;" { (point.desc) }
                    }
                }
            }

            @if !colors.is_empty() {
                section style=(SECTION_STYLE) {
                    h3 style="font-size:18px;letter-spacing:2px;" { "COLOR" }
                    ul style="list-style:none;padding:0;margin:0;" {
                        @for color in colors {
                            @if color.is_main {
                                li style="font-weight:700;color:#b08d57;" { (color.name) " (MAIN)" }
                            } @else {
                                li style="color:#555;" { (color.name) }
                            }
                        }
                    }
                }
            }

            @for (idx, url) in outfit_urls.iter().enumerate() {
                div style="margin-bottom:40px;" {
                    img style=(IMAGE_STYLE) src=(url) alt="outfit";
                    @if let Some(text) = copy.outfit_copies.get(idx) {
                        p style="font-size:16px;text-align:center;margin:16px 0 0;" { (text) }
                    }
                }
            }

            @for url in &detail_urls {
                img style=(IMAGE_STYLE) src=(url) alt="detail";
            }

            (product_info(copy))

            footer style="padding:32px 24px;text-align:center;font-size:13px;color:#999;" {
                "상품 관련 문의는 채팅 또는 고객센터를 이용해주세요"
            }
        }
    };

    Ok(markup.into_string())
}

fn product_info(copy: &GeneratedCopy) -> Markup {
    let rows = [
        ("소재", copy.detail.material.as_str()),
        ("핏", copy.detail.fit.as_str()),
        ("디테일", copy.detail.detail.as_str()),
        ("기타", copy.detail.etc.as_str()),
    ];
    html! {
        section style=(SECTION_STYLE) {
            h3 style="font-size:18px;letter-spacing:2px;" { "PRODUCT INFO" }
            dl style="display:grid;grid-template-columns:120px 1fr;gap:8px 16px;text-align:left;" {
                @for (label, value) in rows {
                    dt style="font-weight:700;" { (label) }
                    dd style="margin:0;color:#555;" { (value) }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy_generation::fallback_copy;
    use crate::models::ImageRole;

    fn image(kind: ImageKind, url: &str) -> UploadedImage {
        UploadedImage {
            kind,
            role: kind.upload_role(),
            url: url.into(),
        }
    }

    #[test]
    fn sections_appear_in_order() {
        let mut copy = fallback_copy();
        copy.outfit_copies = vec!["첫 번째 코디".into()];
        let images = vec![
            image(ImageKind::Outfit, "https://img/outfit-1.jpg"),
            image(ImageKind::Main, "https://img/main.jpg"),
            image(ImageKind::SizeChart, "https://img/size.jpg"),
            image(ImageKind::Outfit, "https://img/outfit-2.jpg"),
        ];
        let colors = vec![
            ColorInfo { name: "블랙".into(), is_main: true },
            ColorInfo { name: "아이보리".into(), is_main: false },
        ];

        let html = render_detail_page(&copy, &images, &colors).unwrap();

        let pos = |needle: &str| html.find(needle).unwrap_or_else(|| panic!("missing {}", needle));
        assert!(pos("생성된 문구를 확인해주세요") < pos("https://img/main.jpg"));
        assert!(pos("https://img/main.jpg") < pos("https://img/size.jpg"));
        assert!(pos("https://img/size.jpg") < pos("이 상품이 특별한 이유"));
        assert!(pos("이 상품이 특별한 이유") < pos("블랙 (MAIN)"));
        assert!(pos("블랙 (MAIN)") < pos("https://img/outfit-1.jpg"));
        assert!(pos("https://img/outfit-1.jpg") < pos("첫 번째 코디"));
        assert!(pos("첫 번째 코디") < pos("https://img/outfit-2.jpg"));
        assert!(pos("https://img/outfit-2.jpg") < pos("PRODUCT INFO"));
        assert!(pos("PRODUCT INFO") < pos("고객센터"));
    }

    #[test]
    fn first_image_stands_in_for_missing_main() {
        let images = vec![UploadedImage {
            kind: ImageKind::Detail,
            role: ImageRole::Detail,
            url: "https://img/detail.jpg".into(),
        }];
        let html = render_detail_page(&fallback_copy(), &images, &[]).unwrap();
        assert!(html.contains("https://img/detail.jpg"));
        assert!(!html.contains("COLOR"));
        assert!(!html.contains(">SIZE<"));
    }

    #[test]
    fn copy_text_is_escaped() {
        let mut copy = fallback_copy();
        copy.hooking_copy = "<script>alert(1)</script>".into();
        let html =
            render_detail_page(&copy, &[image(ImageKind::Main, "https://img/a.jpg")], &[]).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn no_images_is_an_error() {
        let err = render_detail_page(&fallback_copy(), &[], &[]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let blank = vec![image(ImageKind::Main, "")];
        assert!(render_detail_page(&fallback_copy(), &blank, &[]).is_err());
    }
}
