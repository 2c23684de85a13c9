use chrono::{DateTime, FixedOffset, Offset, Utc};
use domain::Comment;
use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use std::collections::HashMap;

pub const DELETED_CONTENT: &str = "This comment has been deleted";
pub const DELETED_NICKNAME: &str = "deleted";

/// Email → verified, as resolved by one batched commenter lookup.
pub type VerificationMap = HashMap<String, bool>;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWrapper {
    pub data: Vec<DisplayComment>,
    pub comment_count: u64,
    pub page_size: u32,
    pub page_count: u32,
}

impl CommentWrapper {
    pub fn nested(data: Vec<DisplayComment>) -> Self {
        Self {
            comment_count: data.len() as u64,
            data,
            page_size: 0,
            page_count: 0,
        }
    }

    pub fn count_only(count: u64) -> Self {
        Self {
            data: Vec::new(),
            comment_count: count,
            page_size: 0,
            page_count: 0,
        }
    }

    pub fn redact_emails(&mut self) {
        for item in &mut self.data {
            item.redact_emails();
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayComment {
    #[serde(flatten)]
    pub comment: Comment,
    pub parsed_content: String,
    pub parsed_created_at: String,
    pub is_email_verified: bool,
    pub replies: CommentWrapper,
}

impl DisplayComment {
    pub fn redact_emails(&mut self) {
        self.comment.by_email = None;
        self.replies.redact_emails();
    }
}

/// Markdown renderer restricted to inline markup: links and images are
/// reduced to their text, raw HTML is escaped.
pub struct MarkdownRenderer {
    options: Options,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            options: Options::ENABLE_STRIKETHROUGH,
        }
    }

    pub fn render(&self, source: &str) -> String {
        let events = Parser::new_ext(source, self.options).filter_map(|event| match event {
            Event::Start(Tag::Link { .. }) | Event::End(TagEnd::Link) => None,
            Event::Start(Tag::Image { .. }) | Event::End(TagEnd::Image) => None,
            Event::Html(raw) | Event::InlineHtml(raw) => Some(Event::Text(raw)),
            other => Some(other),
        });

        let mut out = String::with_capacity(source.len() + source.len() / 2);
        html::push_html(&mut out, events);
        out
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats `created_at` as `YYYY-MM-DD HH:mm` in the caller's timezone.
/// Offsets outside ±24h fall back to UTC.
pub fn format_timestamp(ts: DateTime<Utc>, offset_minutes: i32) -> String {
    let offset = offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());
    ts.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string()
}

pub struct CommentFormatter {
    markdown: MarkdownRenderer,
}

impl CommentFormatter {
    pub fn new(markdown: MarkdownRenderer) -> Self {
        Self { markdown }
    }

    pub fn format(
        &self,
        comment: &Comment,
        timezone_offset_minutes: i32,
        verification: &VerificationMap,
        is_admin: bool,
    ) -> DisplayComment {
        let mut shown = comment.clone();
        if comment.is_deleted() && !is_admin {
            shown.content = DELETED_CONTENT.to_string();
            shown.by_nickname = Some(DELETED_NICKNAME.to_string());
            shown.by_email = None;
        }

        let is_email_verified = if comment.is_moderator() {
            true
        } else {
            match &comment.by_email {
                None => true,
                Some(email) => verification.get(email).copied().unwrap_or(false),
            }
        };

        DisplayComment {
            parsed_content: self.markdown.render(&shown.content),
            parsed_created_at: format_timestamp(comment.created_at, timezone_offset_minutes),
            is_email_verified,
            replies: CommentWrapper::default(),
            comment: shown,
        }
    }
}

impl Default for CommentFormatter {
    fn default() -> Self {
        Self::new(MarkdownRenderer::new())
    }
}
