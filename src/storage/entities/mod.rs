pub mod conversations;
pub mod message_feedback;
pub mod messages;
