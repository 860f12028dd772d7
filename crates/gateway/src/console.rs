//! A [`ChatSurface`] that prints prompts to stdout.

use std::io::Write;
use std::sync::atomic::{AtomicI64, Ordering};

use wl_domain::UserId;
use wl_flows::{ButtonAction, ChatSurface, MessageId, Prompt, SurfaceError};

#[derive(Default)]
pub struct ConsoleSurface {
    next_id: AtomicI64,
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn print(&self, header: &str, body: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "── {header} ──");
        let _ = writeln!(out, "{body}");
        let _ = out.flush();
    }
}

/// Plain-text rendering of a prompt: HTML tags stripped, one line per
/// keyboard row.
pub fn render(prompt: &Prompt) -> String {
    let mut out = strip_tags(&prompt.text);
    for row in &prompt.keyboard.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|b| match &b.action {
                ButtonAction::Callback(data) => format!("[{}] ({data})", b.text),
                ButtonAction::Url(url) => format!("[{}] <{url}>", b.text),
            })
            .collect();
        out.push('\n');
        out.push_str(&cells.join("  "));
    }
    out
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            '\u{200b}' => {}
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[async_trait::async_trait]
impl ChatSurface for ConsoleSurface {
    async fn send_message(&self, user_id: UserId, prompt: &Prompt) -> Result<MessageId, SurfaceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.print(&format!("user {user_id} · message #{id}"), &render(prompt));
        Ok(id)
    }

    async fn edit_message(
        &self,
        user_id: UserId,
        message_id: MessageId,
        prompt: &Prompt,
    ) -> Result<(), SurfaceError> {
        self.print(&format!("user {user_id} · edit #{message_id}"), &render(prompt));
        Ok(())
    }

    async fn delete_message(&self, user_id: UserId, message_id: MessageId) -> Result<(), SurfaceError> {
        self.print(&format!("user {user_id} · delete #{message_id}"), "");
        Ok(())
    }
}
