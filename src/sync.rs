//! Chat feed reconciliation.
//!
//! The server's change feed and the optimistic local echo can both deliver
//! the same logical message. Every merge here is keyed by message id and
//! replaces in place instead of appending, so a duplicate delivery is a
//! no-op. Each event application is a single state transition.

use uuid::Uuid;

use crate::dto::{MessageDto, ReactionDto};

#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A new message row arrived on the feed, fetched in full (files and
    /// reactions nested, sender resolved).
    MessageInserted(MessageDto),
    /// A file attachment landed after its message; carries the re-fetched
    /// parent row.
    MessagePatched(MessageDto),
    /// Reaction added or removed; carries the full refreshed reaction set
    /// for the message, never a delta.
    ReactionsChanged {
        message_id: Uuid,
        reactions: Vec<ReactionDto>,
    },
    MessageDeleted {
        message_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub enum ReactionToggle {
    Add,
    Remove { reaction_id: Uuid },
}

/// Draft and reply target captured at send time so a failed POST can
/// restore them for retry.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub content: String,
    pub reply_to: Option<Uuid>,
}

#[derive(Debug, Default)]
pub enum ChatFeed {
    #[default]
    Uninitialized,
    Loading,
    Ready(ChatSession),
}

impl ChatFeed {
    pub fn new() -> Self {
        Self::Uninitialized
    }

    pub fn begin_load(&mut self) {
        if matches!(self, Self::Uninitialized) {
            *self = Self::Loading;
        }
    }

    /// Enter `Ready` with the initial history (ascending order).
    pub fn ready(&mut self, chat_id: Uuid, messages: Vec<MessageDto>) {
        *self = Self::Ready(ChatSession {
            chat_id,
            messages,
            draft: String::new(),
            reply_to: None,
        });
    }

    pub fn session(&self) -> Option<&ChatSession> {
        match self {
            Self::Ready(session) => Some(session),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut ChatSession> {
        match self {
            Self::Ready(session) => Some(session),
            _ => None,
        }
    }

    /// Feed events are meaningless before the history has loaded.
    pub fn apply(&mut self, event: ChatEvent) {
        let Some(session) = self.session_mut() else {
            return;
        };
        match event {
            ChatEvent::MessageInserted(message) => session.merge_message(message),
            ChatEvent::MessagePatched(message) => session.patch_message(message),
            ChatEvent::ReactionsChanged {
                message_id,
                reactions,
            } => session.set_reactions(message_id, reactions),
            ChatEvent::MessageDeleted { message_id } => session.mark_deleted(message_id),
        }
    }
}

#[derive(Debug)]
pub struct ChatSession {
    pub chat_id: Uuid,
    messages: Vec<MessageDto>,
    draft: String,
    reply_to: Option<Uuid>,
}

impl ChatSession {
    pub fn messages(&self) -> &[MessageDto] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn reply_to(&self) -> Option<Uuid> {
        self.reply_to
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn set_reply_to(&mut self, target: Option<Uuid>) {
        self.reply_to = target;
    }

    /// Dedup-by-id merge: replace in place when the id is already present
    /// (an optimistic echo), append otherwise.
    pub fn merge_message(&mut self, incoming: MessageDto) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == incoming.id) {
            *existing = incoming;
        } else {
            self.messages.push(incoming);
        }
    }

    /// Replace-only: a patch for an unknown id is dropped rather than
    /// appended out of order.
    pub fn patch_message(&mut self, incoming: MessageDto) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == incoming.id) {
            *existing = incoming;
        }
    }

    pub fn set_reactions(&mut self, message_id: Uuid, reactions: Vec<ReactionDto>) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.reactions = reactions;
        }
    }

    pub fn mark_deleted(&mut self, message_id: Uuid) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.is_deleted = true;
        }
    }

    /// Clear the draft and reply target optimistically, handing back what
    /// was cleared so `fail_send` can restore it.
    pub fn begin_send(&mut self) -> Option<PendingSend> {
        let content = self.draft.trim().to_string();
        if content.is_empty() {
            return None;
        }
        self.draft.clear();
        let reply_to = self.reply_to.take();
        Some(PendingSend { content, reply_to })
    }

    pub fn confirm_send(&mut self, message: MessageDto) {
        self.merge_message(message);
    }

    pub fn fail_send(&mut self, pending: PendingSend) {
        self.draft = pending.content;
        self.reply_to = pending.reply_to;
    }

    /// Toggle semantics: a second reaction with the same emoji by the same
    /// user removes the first, it never counts up.
    pub fn reaction_toggle_intent(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        reaction: &str,
    ) -> Option<ReactionToggle> {
        let message = self.messages.iter().find(|m| m.id == message_id)?;
        match message
            .reactions
            .iter()
            .find(|r| r.user_id == user_id && r.reaction == reaction)
        {
            Some(existing) => Some(ReactionToggle::Remove {
                reaction_id: existing.id,
            }),
            None => Some(ReactionToggle::Add),
        }
    }
}
