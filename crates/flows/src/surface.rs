//! Chat surface contract and the message replacement ladder.
//!
//! Each flow keeps one "live" message per user.  Showing a new prompt
//! tries, in order: edit the live message in place; send a new message
//! and delete the old one; if the old one cannot be deleted, overwrite it
//! with a placeholder.  Only errors from a known set of "already gone or
//! unmodifiable" descriptions move down the ladder; anything else is
//! returned to the caller.

use std::sync::Arc;

use wl_domain::error::{Error, Result};
use wl_domain::trace::TraceEvent;
use wl_domain::UserId;

pub type MessageId = i64;

const EDIT_ERRORS: &[&str] = &[
    "no text in the message",
    "message can't be edited",
    "message is not modified",
    "message to edit not found",
];

const DELETE_ERRORS: &[&str] = &["message can't be deleted", "message to delete not found"];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Opaque data routed back through [`crate::actions::FlowAction::parse`].
    Callback(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    /// Append `buttons` wrapped at `width` per row.
    pub fn grid(mut self, buttons: Vec<Button>, width: usize) -> Self {
        let width = width.max(1);
        let mut row = Vec::with_capacity(width);
        for b in buttons {
            row.push(b);
            if row.len() == width {
                self.rows.push(std::mem::take(&mut row));
            }
        }
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Prompt {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::default(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Surface trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error reported by the chat platform, carrying its description verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceError {
    pub description: String,
}

impl SurfaceError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    fn matches(&self, known: &[&str]) -> bool {
        known.iter().any(|k| self.description.contains(k))
    }
}

impl From<SurfaceError> for Error {
    fn from(e: SurfaceError) -> Self {
        Error::Surface(e.description)
    }
}

/// Messaging operations the flows need from a chat platform.  The user id
/// doubles as the chat id (private chats).
#[async_trait::async_trait]
pub trait ChatSurface: Send + Sync {
    async fn send_message(&self, user_id: UserId, prompt: &Prompt) -> std::result::Result<MessageId, SurfaceError>;

    async fn edit_message(
        &self,
        user_id: UserId,
        message_id: MessageId,
        prompt: &Prompt,
    ) -> std::result::Result<(), SurfaceError>;

    async fn delete_message(&self, user_id: UserId, message_id: MessageId) -> std::result::Result<(), SurfaceError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Renderer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct PromptRenderer {
    surface: Arc<dyn ChatSurface>,
}

impl PromptRenderer {
    pub fn new(surface: Arc<dyn ChatSurface>) -> Self {
        Self { surface }
    }

    /// Show `prompt`, replacing `previous` if there is one.  Returns the id
    /// of the message now holding the prompt.
    pub async fn show(
        &self,
        user_id: UserId,
        previous: Option<MessageId>,
        prompt: &Prompt,
        outdated_text: &str,
    ) -> Result<MessageId> {
        if let Some(id) = previous {
            match self.surface.edit_message(user_id, id, prompt).await {
                Ok(()) => return Ok(id),
                Err(e) if e.matches(EDIT_ERRORS) => fallback(user_id, "edit", &e),
                Err(e) => return Err(e.into()),
            }
        }

        let new_id = self.surface.send_message(user_id, prompt).await?;
        if let Some(old) = previous {
            self.retire(user_id, old, outdated_text).await?;
        }
        Ok(new_id)
    }

    /// Delete a superseded message, or blank it out if it can't be deleted.
    async fn retire(&self, user_id: UserId, message_id: MessageId, outdated_text: &str) -> Result<()> {
        match self.surface.delete_message(user_id, message_id).await {
            Ok(()) => Ok(()),
            Err(e) if e.matches(DELETE_ERRORS) => {
                fallback(user_id, "delete", &e);
                let placeholder = Prompt::plain(outdated_text);
                match self.surface.edit_message(user_id, message_id, &placeholder).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.matches(EDIT_ERRORS) => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn fallback(user_id: UserId, step: &str, e: &SurfaceError) {
    TraceEvent::PromptFallback {
        user_id,
        step: step.to_string(),
        description: e.description.clone(),
    }
    .emit();
}
