//! The printable reading: header, interpretation and the consultation.
//!
//! The palace transcription is deliberately left out; it is working data,
//! not part of the reading handed to the client.

use chrono::{DateTime, Utc};
use pulldown_cmark::{Event, Parser, html};

use tuvi_core::{AnalysisResult, ChartImage, ChatMessage, ChatRole, Language, UserProfile};

struct Labels {
    title: &'static str,
    born: &'static str,
    fortune: &'static str,
    consultation: &'static str,
    question: &'static str,
    answer: &'static str,
}

fn labels(language: Language) -> Labels {
    match language {
        Language::Vi => Labels {
            title: "BÁO CÁO LUẬN GIẢI TỬ VI",
            born: "Sinh ngày",
            fortune: "VẬN TRÌNH CHI TIẾT NĂM",
            consultation: "PHẦN HỎI ĐÁP & LÀM RÕ VẬN HẠN",
            question: "Câu hỏi của bạn:",
            answer: "Chuyên gia giải đáp:",
        },
        Language::En => Labels {
            title: "TU VI READING REPORT",
            born: "Born",
            fortune: "DETAILED FORTUNE FOR",
            consultation: "QUESTIONS & CLARIFICATIONS",
            question: "Your question:",
            answer: "Expert answer:",
        },
    }
}

#[derive(Debug, Clone)]
pub struct ReadingReport {
    pub profile: UserProfile,
    pub analysis: AnalysisResult,
    pub transcript: Vec<ChatMessage>,
    pub chart: Option<ChartImage>,
    pub generated_at: DateTime<Utc>,
}

impl ReadingReport {
    pub fn new(profile: UserProfile, analysis: AnalysisResult, transcript: Vec<ChatMessage>) -> Self {
        Self { profile, analysis, transcript, chart: None, generated_at: Utc::now() }
    }

    /// Embed the chart image in HTML output.
    pub fn with_chart(mut self, chart: Option<ChartImage>) -> Self {
        self.chart = chart;
        self
    }

    fn identity_line(&self) -> String {
        let p = &self.profile;
        let l = labels(p.language);
        let name = if p.full_name.trim().is_empty() { "—" } else { p.full_name.trim() };
        format!(
            "{name} - {gender} - {born}: {}/{}/{}",
            p.birth_day,
            p.birth_month,
            p.birth_year,
            gender = p.gender.label(p.language),
            born = l.born,
        )
    }

    fn fortune_line(&self) -> String {
        format!("{} {}", labels(self.profile.language).fortune, self.profile.view_year)
    }

    pub fn to_markdown(&self) -> String {
        let l = labels(self.profile.language);
        let mut out = format!(
            "# {}\n\n**{}**\n\n**{}**\n\n---\n\n{}\n",
            l.title,
            self.identity_line(),
            self.fortune_line(),
            self.analysis.interpretation.trim_end(),
        );

        if !self.transcript.is_empty() {
            out.push_str(&format!("\n---\n\n## {}\n", l.consultation));
            for message in &self.transcript {
                let label = match message.role {
                    ChatRole::User => l.question,
                    ChatRole::Model => l.answer,
                };
                out.push_str(&format!("\n**{label}**\n\n{}\n", message.text.trim_end()));
            }
        }
        out
    }

    pub fn to_html(&self) -> String {
        let l = labels(self.profile.language);
        let chart = self
            .chart
            .as_ref()
            .map(|img| {
                format!(
                    r#"<figure class="chart"><img src="{}" alt="chart"></figure>"#,
                    escape_attr(img.as_data_uri())
                )
            })
            .unwrap_or_default();

        let messages: String = self
            .transcript
            .iter()
            .map(|m| {
                let (class, label) = match m.role {
                    ChatRole::User => ("msg-user", l.question),
                    ChatRole::Model => ("msg-model", l.answer),
                };
                format!(
                    r#"<div class="message {class}"><span class="role">{label}</span><div class="content">{}</div></div>"#,
                    markdown_to_html(&m.text),
                )
            })
            .collect();
        let consultation = if messages.is_empty() {
            String::new()
        } else {
            format!("<section class=\"chat\"><h2>{}</h2>\n{messages}</section>", html_escape(l.consultation))
        };

        format!(
            r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
body {{ font-family: Georgia, serif; max-width: 820px; margin: 2rem auto; padding: 0 1rem; background: #fdf8f0; color: #2b2b2b; }}
header {{ text-align: center; border-bottom: 4px solid #8b4513; padding-bottom: 1.5rem; margin-bottom: 2rem; }}
header h1 {{ color: #8b4513; letter-spacing: 0.15em; }}
.fortune {{ color: #b22222; font-weight: 700; }}
.chart img {{ max-width: 100%; }}
.reading h2 {{ color: #b22222; border-left: 6px solid #b22222; padding-left: 0.75rem; }}
.reading h3 {{ color: #8b4513; }}
.chat h2 {{ color: #8b4513; border-bottom: 2px solid #8b4513; }}
.message {{ margin-bottom: 1rem; border-radius: 8px; padding: 0.75rem 1rem; }}
.msg-user {{ background: #f0e6d6; }}
.msg-model {{ background: #fff; border-left: 3px solid #8b4513; }}
.role {{ font-weight: 700; font-size: 0.75rem; text-transform: uppercase; color: #6b7280; display: block; margin-bottom: 0.25rem; }}
footer {{ margin-top: 3rem; font-size: 0.75rem; color: #9ca3af; text-align: center; }}
</style>
</head>
<body>
<header>
<h1>{title}</h1>
<p><strong>{identity}</strong></p>
<p class="fortune">{fortune}</p>
</header>
{chart}
<article class="reading">
{reading}
</article>
{consultation}
<footer>{generated}</footer>
</body>
</html>"#,
            lang = self.profile.language,
            title = html_escape(l.title),
            identity = html_escape(&self.identity_line()),
            fortune = html_escape(&self.fortune_line()),
            reading = markdown_to_html(&self.analysis.interpretation),
            generated = self.generated_at.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}

/// Model text is Markdown; raw HTML in it is shown, never interpreted.
fn markdown_to_html(markdown: &str) -> String {
    let events = Parser::new(markdown).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, events);
    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    html_escape(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuvi_core::Gender;

    fn report(language: Language) -> ReadingReport {
        let profile = UserProfile {
            full_name: "Nguyễn Văn A".into(),
            gender: Gender::Male,
            language,
            ..Default::default()
        };
        ReadingReport::new(
            profile,
            AnalysisResult {
                extracted_data: "SECRET-CHART-DUMP".into(),
                interpretation: "## Tài Bạch\n\nHóa Lộc nhập <b>Tài</b>.".into(),
            },
            vec![ChatMessage::user("Năm nay mua nhà?"), ChatMessage::model("Nên chờ tháng 8.")],
        )
    }

    #[test]
    fn markdown_has_header_reading_and_labelled_turns() {
        let md = report(Language::Vi).to_markdown();
        assert!(md.starts_with("# BÁO CÁO LUẬN GIẢI TỬ VI"));
        assert!(md.contains("Nguyễn Văn A - Nam - Sinh ngày: 9/4/1988"));
        assert!(md.contains("VẬN TRÌNH CHI TIẾT NĂM 2026"));
        assert!(md.contains("**Câu hỏi của bạn:**\n\nNăm nay mua nhà?"));
        assert!(md.contains("**Chuyên gia giải đáp:**\n\nNên chờ tháng 8."));
        assert!(!md.contains("SECRET-CHART-DUMP"));
    }

    #[test]
    fn html_escapes_model_markup() {
        let html = report(Language::En).to_html();
        assert!(html.contains("<h2>Tài Bạch</h2>"));
        assert!(html.contains("&lt;b&gt;"));
        assert!(html.contains("Your question:"));
        assert!(html.contains("<html lang=\"en\">"));
        assert!(!html.contains("SECRET-CHART-DUMP"));
    }

    #[test]
    fn empty_transcript_omits_consultation() {
        let mut r = report(Language::Vi);
        r.transcript.clear();
        assert!(!r.to_markdown().contains("PHẦN HỎI ĐÁP"));
        assert!(!r.to_html().contains("class=\"chat\""));
    }

    #[test]
    fn chart_is_embedded_when_present() {
        let chart = ChartImage::from_data_uri("data:image/png;base64,iVBORw0KGgo=").ok();
        let html = report(Language::Vi).with_chart(chart).to_html();
        assert!(html.contains(r#"<img src="data:image/png;base64,iVBORw0KGgo=""#));
    }
}
