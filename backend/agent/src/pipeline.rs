//! Two-stage chart analysis: transcribe the palaces, then interpret them.

use std::sync::Arc;

use tracing::{info, instrument};

use tuvi_core::{
    AnalysisResult, ChartImage, GenerateRequest, GenerationOptions, ModelGateway, PipelineError,
    PipelineStage, PromptPart, UserProfile,
};
use tuvi_understanding::ChartTranscriber;

use crate::knowledge::active_knowledge;
use crate::prompts::PromptBuilder;

pub struct AnalysisPipeline {
    transcriber: ChartTranscriber,
    gateway: Arc<dyn ModelGateway>,
    interpretation_model: String,
    thinking_budget: Option<u32>,
}

impl AnalysisPipeline {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        transcription_model: impl Into<String>,
        interpretation_model: impl Into<String>,
    ) -> Self {
        Self {
            transcriber: ChartTranscriber::new(Arc::clone(&gateway), transcription_model),
            gateway,
            interpretation_model: interpretation_model.into(),
            thinking_budget: None,
        }
    }

    pub fn with_thinking_budget(mut self, budget: Option<u32>) -> Self {
        self.thinking_budget = budget.filter(|b| *b > 0);
        self
    }

    pub fn interpretation_request(
        &self,
        extracted_data: &str,
        profile: &UserProfile,
    ) -> GenerateRequest {
        let prompt =
            PromptBuilder::interpretation(active_knowledge(profile), extracted_data, profile);
        GenerateRequest::new(self.interpretation_model.clone(), vec![PromptPart::text(prompt)])
            .with_options(GenerationOptions {
                thinking_budget: self.thinking_budget,
                ..Default::default()
            })
    }

    /// Either both stages succeed or the whole run fails; a failed
    /// transcription never reaches the interpretation model.
    #[instrument(skip_all, fields(view_year = %profile.view_year))]
    pub async fn run(
        &self,
        image: &ChartImage,
        profile: &UserProfile,
    ) -> Result<AnalysisResult, PipelineError> {
        let extracted_data = self.transcriber.transcribe(image).await.map_err(|source| {
            PipelineError { stage: PipelineStage::Transcription, source }
        })?;

        let request = self.interpretation_request(&extracted_data, profile);
        let response = self.gateway.generate(&request).await.map_err(|source| PipelineError {
            stage: PipelineStage::Interpretation,
            source,
        })?;
        info!(
            model = %response.model,
            latency_ms = response.latency_ms,
            chars = response.text.chars().count(),
            "Chart interpreted"
        );

        Ok(AnalysisResult { extracted_data, interpretation: response.text })
    }
}
