//! Prompt builders for the interpretation stage and the consultation chat.
//!
//! All builders are pure string assembly so the same inputs always produce
//! byte-identical prompts.

use tuvi_core::{Language, UserProfile};

use crate::consultation::SessionContext;

pub struct PromptBuilder;

impl PromptBuilder {
    /// Stage-2 prompt: knowledge base, chart transcript, profile, then the reading request.
    pub fn interpretation(knowledge: &str, extracted_data: &str, profile: &UserProfile) -> String {
        let year = &profile.view_year;
        format!(
            "DỰA TRÊN TÀI LIỆU CƠ SỞ ƯU TIÊN:\n{knowledge}\n\n\
             DỮ LIỆU LÁ SỐ:\n{extracted_data}\n\n\
             THÔNG TIN ĐƯƠNG SỐ: {profile}\n\n\
             YÊU CẦU LUẬN GIẢI CHUYÊN SÂU NĂM {year}:\n\
             1. TỨ HÓA PHI TINH: Xác định Can cung Đại vận đang hành và Can năm {year}. \
             Chỉ rõ Lộc, Kỵ bay vào Ngã cung hay Tha cung.\n\
             2. TRUY NGUYÊN NHÂN: Với mỗi biến cố xấu do Kỵ, dùng quy tắc \"Lộc là nhân\" \
             để tìm cung khởi điểm.\n\
             3. KẾT HỢP NAM PHÁI: Luận các sao lưu (Thái Tuế, Kình Dương, Đà La, Thiên Mã...) \
             tại các cung trọng yếu.\n\
             4. HÓA GIẢI: Đưa ra lời khuyên \"ứng số\" và \"dùng Lộc giải Kỵ\" cụ thể cho năm {year}.\n\n\
             {language}",
            profile = Self::profile_summary(profile),
            language = Self::reading_language(profile.language),
        )
    }

    /// System instruction for every consultation turn.
    pub fn consultation(context: &SessionContext) -> String {
        format!(
            "Bạn là chuyên gia Tử Vi theo trường phái Nam Phái kết hợp Tứ Hóa. \
             Bạn trả lời dựa trên:\n\
             1. Tài liệu cơ sở ưu tiên:\n{knowledge}\n\
             2. Dữ liệu lá số đã số hóa:\n{extracted}\n\
             3. Nội dung đã luận giải:\n{interpretation}\n\
             4. Thông tin đương số: {profile}\n\n\
             QUY TẮC:\n\
             - Luôn lần theo đường bay Phi Hóa Lộc, Kỵ để giải thích bản chất vấn đề.\n\
             - Phân biệt Ngã cung và Tha cung để xác định biến cố chủ động hay bị động.\n\
             - Đề xuất hóa giải theo nguyên tắc \"dùng Lộc giải Kỵ\".\n\
             - {language}",
            knowledge = context.knowledge_base(),
            extracted = context.analysis().extracted_data,
            interpretation = context.analysis().interpretation,
            profile = Self::profile_summary(context.profile()),
            language = Self::chat_language(context.profile().language),
        )
    }

    /// Profile as compact JSON, without the knowledge base (quoted separately).
    pub fn profile_summary(profile: &UserProfile) -> String {
        let mut summary = profile.clone();
        summary.knowledge_base = None;
        serde_json::to_string(&summary).unwrap_or_default()
    }

    fn reading_language(language: Language) -> &'static str {
        match language {
            Language::Vi => "Trả lời bằng tiếng Việt, phong cách uyên bác, trang trọng.",
            Language::En => "Answer in English with a scholarly, formal tone; keep Vietnamese star and palace names in parentheses.",
        }
    }

    fn chat_language(language: Language) -> &'static str {
        match language {
            Language::Vi => "Trả lời bằng tiếng Việt, súc tích và chính xác.",
            Language::En => "Answer in English, concisely and precisely.",
        }
    }
}

/// Notice shown when the analysis pipeline fails and the flow returns to upload.
pub fn analysis_failed_notice(language: Language) -> &'static str {
    match language {
        Language::Vi => "Đã xảy ra lỗi trong quá trình phân tích chuyên sâu. Vui lòng kiểm tra lại hình ảnh.",
        Language::En => "Deep analysis failed. Please check your image.",
    }
}

/// Reply recorded when the model answers a consultation turn with nothing.
pub fn empty_reply_placeholder(language: Language) -> &'static str {
    match language {
        Language::Vi => "Chuyên gia đang bấm độn, vui lòng đợi trong giây lát.",
        Language::En => "The expert is still calculating, please wait a moment.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::DEFAULT_KNOWLEDGE;

    #[test]
    fn interpretation_sections_are_in_order() {
        let profile = UserProfile::default().with_view_year("2026");
        let prompt = PromptBuilder::interpretation("KB-TEXT", "CHART-TEXT", &profile);

        let kb = prompt.find("KB-TEXT").unwrap();
        let chart = prompt.find("CHART-TEXT").unwrap();
        let info = prompt.find("\"viewYear\":\"2026\"").unwrap();
        let request = prompt.find("YÊU CẦU LUẬN GIẢI CHUYÊN SÂU NĂM 2026").unwrap();
        assert!(kb < chart && chart < info && info < request);
    }

    #[test]
    fn profile_summary_omits_knowledge_base() {
        let profile = UserProfile {
            knowledge_base: Some(DEFAULT_KNOWLEDGE.to_string()),
            ..Default::default()
        };
        let summary = PromptBuilder::profile_summary(&profile);
        assert!(!summary.contains("knowledgeBase"));
        assert!(summary.contains("\"birthYear\":\"1988\""));
    }

    #[test]
    fn english_profiles_get_english_instructions() {
        let profile = UserProfile { language: Language::En, ..Default::default() };
        let prompt = PromptBuilder::interpretation("kb", "chart", &profile);
        assert!(prompt.ends_with("keep Vietnamese star and palace names in parentheses."));
    }
}
