pub mod error;
pub mod gateway;
pub mod image;
pub mod types;

pub use error::{
    ChatError, GatewayError, PipelineError, PipelineStage, TransitionError, TuviError,
};
pub use gateway::{
    Content, FieldType, GenerateRequest, GenerateResponse, GenerationOptions, ModelGateway,
    PromptPart, ResponseFormat, ResponseSchema, SchemaField,
};
pub use image::{mime_for_path, ChartImage};
pub use types::{
    AnalysisResult, CalendarType, ChatMessage, ChatRole, ExtractedBirthInfo, Gender, Language,
    Step, UserProfile, DEFAULT_VIEW_YEAR,
};
