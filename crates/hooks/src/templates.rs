use crate::mailer::MailMessage;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub(crate) struct NewCommentNotice<'a> {
    pub to: &'a str,
    pub page_slug: &'a str,
    pub nickname: &'a str,
    pub content: &'a str,
    pub approve_link: &'a str,
    pub email_verified: bool,
    pub auto_approved: bool,
    pub first_comment: bool,
}

impl NewCommentNotice<'_> {
    pub fn render(&self) -> MailMessage {
        let html = format!(
            "<p><b>{nickname}</b> commented on <code>{slug}</code>:</p>\
             <blockquote>{content}</blockquote>\
             <ul><li>email verified: {verified}</li>\
             <li>auto-approved: {auto}</li>\
             <li>first comment on this site: {first}</li></ul>\
             <p><a href=\"{link}\">Approve or reply</a></p>",
            nickname = escape(self.nickname),
            slug = escape(self.page_slug),
            content = escape(self.content),
            verified = yes_no(self.email_verified),
            auto = yes_no(self.auto_approved),
            first = yes_no(self.first_comment),
            link = escape(self.approve_link),
        );
        MailMessage {
            to: self.to.to_string(),
            subject: format!("New comment on {}", self.page_slug),
            html,
        }
    }
}

pub(crate) struct ConfirmNotice<'a> {
    pub to: &'a str,
    pub page_slug: &'a str,
    pub verify_link: &'a str,
    pub notify_link: &'a str,
}

impl ConfirmNotice<'_> {
    pub fn render(&self) -> MailMessage {
        let html = format!(
            "<p>Thanks for commenting on <code>{slug}</code>.</p>\
             <p><a href=\"{verify}\">Confirm your email</a> so future comments skip the queue.</p>\
             <p><a href=\"{notify}\">Email me when someone replies</a></p>",
            slug = escape(self.page_slug),
            verify = escape(self.verify_link),
            notify = escape(self.notify_link),
        );
        MailMessage {
            to: self.to.to_string(),
            subject: "Confirm your comment".to_string(),
            html,
        }
    }
}

pub(crate) struct ReplyNotice<'a> {
    pub to: &'a str,
    pub page_slug: &'a str,
    pub nickname: &'a str,
    pub content: &'a str,
    pub unsubscribe_link: &'a str,
}

impl ReplyNotice<'_> {
    pub fn render(&self) -> MailMessage {
        let html = format!(
            "<p><b>{nickname}</b> replied in a thread you follow on <code>{slug}</code>:</p>\
             <blockquote>{content}</blockquote>\
             <p><a href=\"{link}\">Stop these emails</a></p>",
            nickname = escape(self.nickname),
            slug = escape(self.page_slug),
            content = escape(self.content),
            link = escape(self.unsubscribe_link),
        );
        MailMessage {
            to: self.to.to_string(),
            subject: format!("New reply on {}", self.page_slug),
            html,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_text_is_escaped() {
        let mail = ReplyNotice {
            to: "a@x.com",
            page_slug: "post",
            nickname: "<b>eve</b>",
            content: "a & b",
            unsubscribe_link: "https://x/?a=1&b=2",
        }
        .render();
        assert!(mail.html.contains("&lt;b&gt;eve&lt;/b&gt;"));
        assert!(mail.html.contains("a &amp; b"));
        assert_eq!(mail.subject, "New reply on post");
    }
}
