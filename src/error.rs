use thiserror::Error;

/// Reasons a dialogue command is turned away. None of them is fatal.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DialogueError {
    #[error("input is empty")]
    EmptyInput,
    #[error("a reply is still pending for this session")]
    ConcurrentSubmission,
    #[error("the session has been closed")]
    SessionClosed,
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge base: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse knowledge base: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("topic id '{0}' is declared more than once")]
    DuplicateTopic(String),
    #[error("command topic '{id}' must have exactly one trigger starting with '{prefix}'")]
    InvalidCommandTrigger { id: String, prefix: char },
    #[error("free-text topic '{id}' has keyword '{keyword}' starting with the command prefix")]
    PrefixedKeyword { id: String, keyword: String },
    #[error("{role} topic '{id}' is not defined")]
    MissingTopic { role: &'static str, id: String },
    #[error("topic '{id}' aliases unknown topic '{target}'")]
    DanglingAlias { id: String, target: String },
    #[error("topic '{id}' aliases '{target}', which is itself an alias")]
    ChainedAlias { id: String, target: String },
    #[error("command prefix cannot be used in a pattern: {0}")]
    Pattern(#[from] regex::Error),
}
