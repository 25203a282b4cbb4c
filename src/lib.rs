//! Rule-based assistant behind the Muloqot Plus chat widget.
//!
//! Free text and `/commands` are matched against a data-driven knowledge
//! base; each open widget is a [`dialogue::DialogueController`] owning its
//! own transcript.

pub mod conversation;
pub mod dialogue;
pub mod error;
pub mod intent;
pub mod knowledge;
pub mod selection;
pub mod server;
pub mod settings;
pub mod timing;
pub mod topic;

pub use conversation::{ConversationState, Message, MessageId, Origin};
pub use dialogue::{DialogueController, PendingReply};
pub use error::{DialogueError, KnowledgeError};
pub use knowledge::{KnowledgeBase, Variant};
pub use topic::{Category, Topic};
