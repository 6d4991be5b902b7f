//! Chart transcription: turn the twelve-palace grid of a chart image into
//! organised Markdown that later prompts can quote verbatim.

use std::sync::Arc;

use tracing::info;

use tuvi_core::{ChartImage, GatewayError, GenerateRequest, ModelGateway, PromptPart};

const TRANSCRIPTION_PROMPT: &str = "Bạn là chuyên gia số hóa lá số Tử Vi. Hãy chép lại đầy đủ \
12 cung trên ảnh lá số dưới dạng Markdown. Với mỗi cung ghi rõ: tên cung, Can cung, các Chính \
tinh, các Phụ tinh quan trọng (kèm Hóa Lộc, Hóa Quyền, Hóa Khoa, Hóa Kỵ nếu có), mốc Đại vận và \
Lưu niên ghi trên cung. Giữ nguyên thuật ngữ như trên lá số, không tự luận giải.";

pub struct ChartTranscriber {
    gateway: Arc<dyn ModelGateway>,
    model: String,
}

impl ChartTranscriber {
    pub fn new(gateway: Arc<dyn ModelGateway>, model: impl Into<String>) -> Self {
        Self { gateway, model: model.into() }
    }

    pub fn request(&self, image: &ChartImage) -> GenerateRequest {
        GenerateRequest::new(
            self.model.clone(),
            vec![image.to_prompt_part(), PromptPart::text(TRANSCRIPTION_PROMPT)],
        )
    }

    /// Free-form text is accepted as-is, including an empty reply.
    pub async fn transcribe(&self, image: &ChartImage) -> Result<String, GatewayError> {
        let response = self.gateway.generate(&self.request(image)).await?;
        info!(
            provider = %response.provider,
            model = %response.model,
            latency_ms = response.latency_ms,
            chars = response.text.chars().count(),
            "Chart transcribed"
        );
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuvi_core::ResponseFormat;
    use tuvi_providers::MockGateway;

    #[tokio::test]
    async fn transcription_is_free_text() {
        let gateway = Arc::new(MockGateway::new("mock").with_response("## Mệnh\n- Tử Vi"));
        let transcriber = ChartTranscriber::new(gateway.clone(), "flash");
        let image = ChartImage::from_data_uri("data:image/png;base64,AAAA").unwrap();

        let text = transcriber.transcribe(&image).await.unwrap();
        assert_eq!(text, "## Mệnh\n- Tử Vi");

        let request = &gateway.requests()[0];
        assert_eq!(request.options.response_format, ResponseFormat::Text);
        assert!(request.prompt_text().contains("12 cung"));
    }

    #[tokio::test]
    async fn failure_propagates() {
        let gateway = Arc::new(MockGateway::new("mock").with_error(GatewayError::Timeout(3)));
        let transcriber = ChartTranscriber::new(gateway, "flash");
        let image = ChartImage::from_data_uri("AAAA").unwrap();
        assert_eq!(transcriber.transcribe(&image).await, Err(GatewayError::Timeout(3)));
    }
}
