//! Knowledge base: the ranked rule document quoted into every prompt.

use tuvi_core::UserProfile;

/// Built-in rule document used when the user supplies none.
pub const DEFAULT_KNOWLEDGE: &str = include_str!("../assets/default_knowledge.md");

/// The document a reading should follow: the user's override, else the default.
pub fn active_knowledge(profile: &UserProfile) -> &str {
    profile.knowledge_override().unwrap_or(DEFAULT_KNOWLEDGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_applies_without_override() {
        let profile = UserProfile::default();
        assert_eq!(active_knowledge(&profile), DEFAULT_KNOWLEDGE);
        assert!(!DEFAULT_KNOWLEDGE.trim().is_empty());
    }

    #[test]
    fn default_covers_every_rule_section() {
        assert!(DEFAULT_KNOWLEDGE.starts_with("HỆ THỐNG LÝ LUẬN TỬ VI KẾT HỢP NAM PHÁI & TỨ HÓA"));
        for heading in [
            "1. NGUYÊN TẮC QUẢN LÝ TẦNG THỨ",
            "2. PHÂN LOẠI CUNG VỊ KHÍ SỐ",
            "3. LOGIC PHI HÓA CHUYÊN SÂU",
            "4. PHÂN BIỆT BIẾN CỐ",
            "5. NGUYỆT HẠN (THÁNG)",
        ] {
            assert!(DEFAULT_KNOWLEDGE.contains(heading), "missing {heading}");
        }
        assert!(DEFAULT_KNOWLEDGE.contains("Ưu tiên Đào Hồng Hỷ (Nam Phái)"));
    }

    #[test]
    fn override_wins() {
        let profile = UserProfile {
            knowledge_base: Some("Quy tắc riêng".into()),
            ..Default::default()
        };
        assert_eq!(active_knowledge(&profile), "Quy tắc riêng");
    }
}
