use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// View year preselected on a fresh profile.
pub const DEFAULT_VIEW_YEAR: &str = "2026";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Gender {
    #[default]
    #[serde(alias = "Nam", alias = "male")]
    Male,
    #[serde(alias = "Nữ", alias = "female")]
    Female,
}

impl Gender {
    /// Parse the labels a chart may print, in either language.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("male") || label == "Nam" {
            Some(Gender::Male)
        } else if label.eq_ignore_ascii_case("female") || label == "Nữ" {
            Some(Gender::Female)
        } else {
            None
        }
    }

    pub fn label(&self, language: Language) -> &'static str {
        match (self, language) {
            (Gender::Male, Language::Vi) => "Nam",
            (Gender::Female, Language::Vi) => "Nữ",
            (Gender::Male, Language::En) => "Male",
            (Gender::Female, Language::En) => "Female",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CalendarType {
    #[default]
    #[serde(alias = "Dương Lịch", alias = "solar")]
    Solar,
    #[serde(alias = "Âm Lịch", alias = "lunar")]
    Lunar,
}

impl CalendarType {
    pub fn label(&self, language: Language) -> &'static str {
        match (self, language) {
            (CalendarType::Solar, Language::Vi) => "Dương Lịch",
            (CalendarType::Lunar, Language::Vi) => "Âm Lịch",
            (CalendarType::Solar, Language::En) => "Solar",
            (CalendarType::Lunar, Language::En) => "Lunar",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Vi,
    En,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Vi => write!(f, "vi"),
            Language::En => write!(f, "en"),
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vi" => Ok(Language::Vi),
            "en" => Ok(Language::En),
            other => Err(format!("unsupported language `{other}` (expected vi or en)")),
        }
    }
}

/// Birth data and reading preferences of the person whose chart is read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub calendar_type: CalendarType,
    pub birth_year: String,
    pub birth_month: String,
    pub birth_day: String,
    pub birth_hour: String,
    pub birth_minute: String,
    pub view_year: String,
    #[serde(default)]
    pub language: Language,
    /// User-supplied rule document; the built-in one is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base: Option<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            full_name: String::new(),
            gender: Gender::Male,
            calendar_type: CalendarType::Solar,
            birth_year: "1988".to_string(),
            birth_month: "4".to_string(),
            birth_day: "9".to_string(),
            birth_hour: "11".to_string(),
            birth_minute: "0".to_string(),
            view_year: DEFAULT_VIEW_YEAR.to_string(),
            language: Language::Vi,
            knowledge_base: None,
        }
    }
}

impl UserProfile {
    pub fn with_view_year(mut self, year: impl Into<String>) -> Self {
        self.view_year = year.into();
        self
    }

    /// The user's own knowledge base, if one was supplied and is not blank.
    pub fn knowledge_override(&self) -> Option<&str> {
        self.knowledge_base
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// Apply OCR output: populated fields win, everything else is kept.
    pub fn merged_with(&self, info: &ExtractedBirthInfo) -> UserProfile {
        let mut next = self.clone();
        override_if_present(&mut next.full_name, &info.full_name);
        override_if_present(&mut next.birth_day, &info.birth_day);
        override_if_present(&mut next.birth_month, &info.birth_month);
        override_if_present(&mut next.birth_year, &info.birth_year);
        override_if_present(&mut next.birth_hour, &info.birth_hour);
        override_if_present(&mut next.birth_minute, &info.birth_minute);
        if let Some(gender) = info.gender.as_deref().and_then(Gender::from_label) {
            next.gender = gender;
        }
        next
    }
}

fn override_if_present(slot: &mut String, candidate: &Option<String>) {
    if let Some(value) = candidate.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        *slot = value.to_string();
    }
}

/// Birth fields recognised on a chart image. Any of them may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedBirthInfo {
    #[serde(default, deserialize_with = "lenient_text")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub birth_day: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub birth_month: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub birth_year: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub birth_hour: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub birth_minute: Option<String>,
}

impl ExtractedBirthInfo {
    /// Number of fields that carry a non-blank value.
    pub fn populated_fields(&self) -> usize {
        [
            &self.full_name,
            &self.gender,
            &self.birth_day,
            &self.birth_month,
            &self.birth_year,
            &self.birth_hour,
            &self.birth_minute,
        ]
        .iter()
        .filter(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.populated_fields() == 0
    }
}

/// Models tend to emit numbers for numeric fields even when asked for strings.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Output of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Palace-by-palace transcription of the chart image.
    pub extracted_data: String,
    /// Long-form reading for the profile's view year.
    pub interpretation: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Model, text: text.into() }
    }
}

/// Steps of the reading flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Form,
    Upload,
    Processing,
    Result,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Form => "FORM",
            Step::Upload => "UPLOAD",
            Step::Processing => "PROCESSING",
            Step::Result => "RESULT",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_touches_populated_fields() {
        let profile = UserProfile {
            full_name: "Trần Văn A".into(),
            ..Default::default()
        };
        let info = ExtractedBirthInfo {
            birth_year: Some("1990".into()),
            birth_day: Some("   ".into()),
            full_name: Some(String::new()),
            ..Default::default()
        };

        let merged = profile.merged_with(&info);
        assert_eq!(merged.birth_year, "1990");
        assert_eq!(merged.birth_day, profile.birth_day);
        assert_eq!(merged.full_name, profile.full_name);
        assert_eq!(merged.birth_month, profile.birth_month);
        assert_eq!(merged.gender, profile.gender);
        assert_eq!(merged.view_year, profile.view_year);
    }

    #[test]
    fn empty_extraction_leaves_profile_identical() {
        let profile = UserProfile {
            full_name: "Lê Thị B".into(),
            gender: Gender::Female,
            knowledge_base: Some("rules".into()),
            ..Default::default()
        };
        let info: ExtractedBirthInfo = serde_json::from_str("{}").unwrap();
        assert!(info.is_empty());
        assert_eq!(profile.merged_with(&info), profile);
    }

    #[test]
    fn unknown_gender_label_keeps_existing() {
        let profile = UserProfile { gender: Gender::Female, ..Default::default() };
        let info = ExtractedBirthInfo { gender: Some("?".into()), ..Default::default() };
        assert_eq!(profile.merged_with(&info).gender, Gender::Female);

        let info = ExtractedBirthInfo { gender: Some("Nam".into()), ..Default::default() };
        assert_eq!(profile.merged_with(&info).gender, Gender::Male);
    }

    #[test]
    fn extracted_info_accepts_numbers_and_nulls() {
        let info: ExtractedBirthInfo = serde_json::from_str(
            r#"{"fullName":"Nguyễn C","birthYear":1975,"birthDay":null,"birthHour":"7"}"#,
        )
        .unwrap();
        assert_eq!(info.birth_year.as_deref(), Some("1975"));
        assert_eq!(info.birth_day, None);
        assert_eq!(info.birth_hour.as_deref(), Some("7"));
    }

    #[test]
    fn profile_accepts_vietnamese_labels() {
        let json = r#"{
            "fullName": "X", "gender": "Nữ", "calendarType": "Âm Lịch",
            "birthYear": "1990", "birthMonth": "1", "birthDay": "2",
            "birthHour": "3", "birthMinute": "4", "viewYear": "2026", "language": "en"
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.gender, Gender::Female);
        assert_eq!(profile.calendar_type, CalendarType::Lunar);
        assert_eq!(profile.language, Language::En);
        assert!(profile.knowledge_override().is_none());
    }

    #[test]
    fn blank_knowledge_base_is_not_an_override() {
        let profile = UserProfile { knowledge_base: Some(" \n".into()), ..Default::default() };
        assert!(profile.knowledge_override().is_none());
    }
}
