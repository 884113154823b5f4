// src/copy_generation.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;
use crate::errors::AppError;
use crate::images::to_base64;
use crate::models::{CopyDetail, GeneratedCopy, ProductInfo, SellingPoint};
use crate::prompts::{PromptVariables, apply_variables, default_prompt};

/// Turns product photos plus a prompt into detail-page copy.
#[async_trait]
pub trait CopyGenerator: Send + Sync {
    /// `images` are JPEG bytes. Unparseable model output yields
    /// [`fallback_copy`] instead of an error.
    async fn generate(&self, images: &[Vec<u8>], prompt: &str) -> Result<GeneratedCopy, AppError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Clone)]
pub struct GeminiCopyGenerator {
    client: Client,
    config: GeminiConfig,
}

impl GeminiCopyGenerator {
    pub fn new(client: Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl CopyGenerator for GeminiCopyGenerator {
    async fn generate(&self, images: &[Vec<u8>], prompt: &str) -> Result<GeneratedCopy, AppError> {
        let mut parts = vec![Part::Text {
            text: prompt.to_string(),
        }];
        parts.extend(images.iter().map(|bytes| Part::InlineData {
            inline_data: InlineData {
                mime_type: "image/jpeg".to_string(),
                data: to_base64(bytes),
            },
        }));
        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        let resp = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            tracing::error!("Copy generation failed: Status={}, Body={}", status, error_text);
            return Err(AppError::CopyGeneration(format!("({}) {}", status, error_text)));
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| AppError::CopyGeneration(format!("unreadable model response: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(parse_generated_copy(&text))
    }
}

/// Prompt for one generation call. A custom prompt replaces the built-in
/// template; placeholders are filled either way.
pub fn build_prompt(
    info: &ProductInfo,
    custom_prompt: Option<&str>,
    outfit_image_count: Option<usize>,
) -> String {
    let template = custom_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| default_prompt(info.gender));
    apply_variables(
        template,
        &PromptVariables {
            features: Some(&info.features),
            size: Some(&info.size),
            colors: Some(&info.colors),
            outfit_image_count,
        },
    )
}

/// Extracts the outermost JSON object from the model text.
pub fn parse_generated_copy(text: &str) -> GeneratedCopy {
    let json_block = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            tracing::warn!("Model output contains no JSON object, using placeholder copy");
            return fallback_copy();
        }
    };

    match serde_json::from_str::<GeneratedCopy>(json_block) {
        Ok(copy) => copy,
        Err(e) => {
            tracing::warn!("Could not parse model output ({}), using placeholder copy", e);
            fallback_copy()
        }
    }
}

pub fn fallback_copy() -> GeneratedCopy {
    GeneratedCopy {
        product_name: "상품명을 확인해주세요".to_string(),
        hooking_copy: "생성된 문구를 확인해주세요".to_string(),
        size_color: String::new(),
        selling_points: (1..=3)
            .map(|i| SellingPoint {
                title: format!("포인트 {}", i),
                desc: "설명".to_string(),
            })
            .collect(),
        outfit_copies: (1..=6).map(|i| format!("문구 {}", i)).collect(),
        detail: CopyDetail {
            material: "-".to_string(),
            fit: "-".to_string(),
            detail: "-".to_string(),
            etc: "-".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;
    use mockito::Matcher;
    use serde_json::json;

    const MODEL_JSON: &str = r#"{
        "productName": "[당일출고] 아엔 여성 크롭 니트",
        "hookingCopy": "데일리의 정석",
        "sizeColor": "FREE | 블랙 · 아이보리",
        "sellingPoints": [
            {"title": "소프트 터치", "desc": "부드럽습니다."},
            {"title": "내추럴 핏", "desc": "자연스럽습니다."},
            {"title": "무드 컬러", "desc": "차분합니다."}
        ],
        "outfitCopies": ["가벼운 무게감", "소프트한 터치감"],
        "detail": {"material": "아크릴", "fit": "세미크롭", "detail": "퍼프소매", "etc": "-"}
    }"#;

    fn config(url: String) -> GeminiConfig {
        GeminiConfig {
            api_key: "gemini-key".into(),
            api_url: url,
            model: "gemini-2.0-flash".into(),
        }
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let text = format!("물론이죠!\n```json\n{}\n```", MODEL_JSON);
        let copy = parse_generated_copy(&text);
        assert_eq!(copy.hooking_copy, "데일리의 정석");
        assert_eq!(copy.selling_points.len(), 3);
        assert_eq!(copy.outfit_copies.len(), 2);
        assert_eq!(copy.detail.fit, "세미크롭");
    }

    #[test]
    fn unparseable_output_falls_back() {
        assert_eq!(parse_generated_copy("죄송합니다"), fallback_copy());
        assert_eq!(parse_generated_copy("{ broken json"), fallback_copy());
        assert_eq!(parse_generated_copy("{\"sellingPoints\": 3}"), fallback_copy());
    }

    #[test]
    fn fallback_has_fixed_shape() {
        let copy = fallback_copy();
        assert_eq!(copy.selling_points.len(), 3);
        assert_eq!(copy.outfit_copies.len(), 6);
        assert_eq!(copy.detail.material, "-");
    }

    #[test]
    fn custom_prompt_replaces_template() {
        let info = ProductInfo {
            gender: Gender::Male,
            features: "오버핏".into(),
            size: String::new(),
            colors: String::new(),
        };
        assert_eq!(
            build_prompt(&info, Some("특징={{features}}, 사이즈={{size}}"), None),
            "특징=오버핏, 사이즈=미정"
        );
        assert!(build_prompt(&info, None, Some(3)).contains("남성"));
    }

    #[tokio::test]
    async fn gemini_call_sends_prompt_and_images() {
        let mut server = mockito::Server::new_async().await;
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "text": MODEL_JSON }] } }]
        });
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .match_header("x-goog-api-key", "gemini-key")
            .match_body(Matcher::PartialJson(json!({
                "contents": [{ "parts": [
                    { "text": "prompt" },
                    { "inline_data": { "mime_type": "image/jpeg", "data": "AQID" } }
                ]}]
            })))
            .with_status(200)
            .with_body(response.to_string())
            .create_async()
            .await;

        let generator = GeminiCopyGenerator::new(Client::new(), config(server.url()));
        let copy = generator.generate(&[vec![1, 2, 3]], "prompt").await.unwrap();

        assert_eq!(copy.product_name, "[당일출고] 아엔 여성 크롭 니트");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn gemini_error_status_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .with_status(429)
            .with_body("RESOURCE_EXHAUSTED")
            .create_async()
            .await;

        let generator = GeminiCopyGenerator::new(Client::new(), config(server.url()));
        let err = generator.generate(&[], "prompt").await.unwrap_err();
        assert!(matches!(err, AppError::CopyGeneration(ref m) if m.contains("RESOURCE_EXHAUSTED")));
    }
}
