//! Birth-info auto-fill: read the header block of a chart image.
//!
//! Never fails from the caller's point of view. Anything the model cannot
//! read, or any reply that does not parse, comes back as an empty record.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use tuvi_core::{
    ChartImage, ExtractedBirthInfo, GenerateRequest, GenerationOptions, ModelGateway, PromptPart,
    ResponseFormat, ResponseSchema,
};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json|JSON)?").unwrap());

const OCR_PROMPT: &str = "Bạn là chuyên gia đọc lá số Tử Vi. Hãy đọc phần thông tin đương số \
trên ảnh lá số và trả về JSON với các khóa: fullName (họ tên), gender (\"Nam\" hoặc \"Nữ\"), \
birthDay, birthMonth, birthYear, birthHour, birthMinute (đều là chữ số dạng chuỗi). \
Chỉ trả về JSON, không kèm giải thích. Trường nào không đọc được thì để chuỗi rỗng.";

/// Schema of the seven fields the OCR call is asked for.
pub fn birth_info_schema() -> ResponseSchema {
    ResponseSchema::default()
        .string_field("fullName", "Họ tên đương số")
        .string_field("gender", "Nam hoặc Nữ")
        .string_field("birthDay", "Ngày sinh (số)")
        .string_field("birthMonth", "Tháng sinh (số)")
        .string_field("birthYear", "Năm sinh (số)")
        .string_field("birthHour", "Giờ sinh (số)")
        .string_field("birthMinute", "Phút sinh (số)")
}

pub struct BirthInfoExtractor {
    gateway: Arc<dyn ModelGateway>,
    model: String,
}

impl BirthInfoExtractor {
    pub fn new(gateway: Arc<dyn ModelGateway>, model: impl Into<String>) -> Self {
        Self { gateway, model: model.into() }
    }

    pub fn request(&self, image: &ChartImage) -> GenerateRequest {
        GenerateRequest::new(
            self.model.clone(),
            vec![image.to_prompt_part(), PromptPart::text(OCR_PROMPT)],
        )
        .with_options(GenerationOptions {
            response_format: ResponseFormat::Json { schema: Some(birth_info_schema()) },
            ..Default::default()
        })
    }

    pub async fn extract(&self, image: &ChartImage) -> ExtractedBirthInfo {
        let response = match self.gateway.generate(&self.request(image)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = self.gateway.name(), error = %e, "Birth-info OCR call failed");
                return ExtractedBirthInfo::default();
            }
        };

        match parse_birth_info(&response.text) {
            Some(info) => {
                info!(
                    latency_ms = response.latency_ms,
                    empty = info.is_empty(),
                    "Birth info extracted from chart"
                );
                info
            }
            None => {
                warn!(reply_len = response.text.len(), "Birth-info OCR reply was not usable JSON");
                ExtractedBirthInfo::default()
            }
        }
    }
}

/// Parse the OCR reply, tolerating Markdown code fences around the JSON.
pub fn parse_birth_info(text: &str) -> Option<ExtractedBirthInfo> {
    let cleaned = CODE_FENCE.replace_all(text, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(cleaned).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuvi_core::{GatewayError, UserProfile};
    use tuvi_providers::MockGateway;

    fn chart() -> ChartImage {
        ChartImage::from_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap()
    }

    #[test]
    fn parses_fenced_json() {
        let info = parse_birth_info("```json\n{\"fullName\":\"Phạm D\",\"birthYear\":\"1969\"}\n```")
            .unwrap();
        assert_eq!(info.full_name.as_deref(), Some("Phạm D"));
        assert_eq!(info.birth_year.as_deref(), Some("1969"));
    }

    #[test]
    fn rejects_non_objects_and_garbage() {
        assert!(parse_birth_info("").is_none());
        assert!(parse_birth_info("not json").is_none());
        assert!(parse_birth_info("[1,2]").is_none());
        assert!(parse_birth_info("{\"birthYear\": {\"nested\": 1}}").is_some());
    }

    #[tokio::test]
    async fn request_uses_json_mode_and_image_first() {
        let gateway = Arc::new(MockGateway::new("mock").with_response("{}"));
        let extractor = BirthInfoExtractor::new(gateway.clone(), "ocr-model");
        extractor.extract(&chart()).await;

        let requests = gateway.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model, "ocr-model");
        assert!(matches!(request.contents[0].parts[0], PromptPart::InlineImage { .. }));
        match &request.options.response_format {
            ResponseFormat::Json { schema: Some(schema) } => assert_eq!(schema.fields.len(), 7),
            other => panic!("expected schema-constrained JSON, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_object_leaves_profile_unchanged() {
        let gateway = Arc::new(MockGateway::new("mock").with_response("{}"));
        let extractor = BirthInfoExtractor::new(gateway, "ocr-model");
        let profile = UserProfile { full_name: "Vũ E".into(), ..Default::default() };

        let info = extractor.extract(&chart()).await;
        assert!(info.is_empty());
        assert_eq!(profile.merged_with(&info), profile);
    }

    #[tokio::test]
    async fn gateway_failure_and_empty_text_yield_empty_record() {
        let gateway = Arc::new(
            MockGateway::new("mock")
                .with_error(GatewayError::Transport("offline".into()))
                .with_response(""),
        );
        let extractor = BirthInfoExtractor::new(gateway, "ocr-model");
        assert!(extractor.extract(&chart()).await.is_empty());
        assert!(extractor.extract(&chart()).await.is_empty());
    }

    #[tokio::test]
    async fn populated_fields_override_profile() {
        let gateway = Arc::new(MockGateway::new("mock").with_response(
            r#"{"fullName":"Đỗ F","gender":"Nữ","birthDay":"12","birthMonth":"","birthYear":1992}"#,
        ));
        let extractor = BirthInfoExtractor::new(gateway, "ocr-model");
        let profile = UserProfile::default();

        let merged = profile.merged_with(&extractor.extract(&chart()).await);
        assert_eq!(merged.full_name, "Đỗ F");
        assert_eq!(merged.birth_day, "12");
        assert_eq!(merged.birth_year, "1992");
        assert_eq!(merged.birth_month, profile.birth_month);
        assert_eq!(merged.gender, tuvi_core::Gender::Female);
    }
}
