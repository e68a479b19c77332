//! Conversation history sent with every request.

use super::types::Message;

/// Ordered conversation turns.
///
/// Grows by one user turn per dispatch and one assistant turn per successful answer. The only
/// removals are [`Conversation::clear`] and [`Conversation::rollback_user_turn`].
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove the optimistically appended user turn after a timed-out request.
    pub fn rollback_user_turn(&mut self) -> Option<Message> {
        match self.messages.last() {
            Some(last) if last.role == super::types::Role::User => self.messages.pop(),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_only_removes_trailing_user_turn() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("first"));
        conversation.push(Message::assistant("answer"));
        assert!(conversation.rollback_user_turn().is_none());
        assert_eq!(conversation.len(), 2);

        conversation.push(Message::user("second"));
        assert_eq!(conversation.rollback_user_turn(), Some(Message::user("second")));
        assert_eq!(conversation.len(), 2);
    }
}
