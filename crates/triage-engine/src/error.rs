/// Rejections the engine surfaces to its caller. Backend failures never
/// appear here; the analysis loop degrades them to empty results internally.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("analysis already in progress")]
    Busy,

    #[error("no follow-up questions pending")]
    NoPendingFollowUps,

    #[error("unknown test: {0}")]
    UnknownTest(String),
}
