pub mod api;
pub mod confidence;
pub mod errors;
pub mod events;
pub mod ids;
pub mod messages;
pub mod registry;
pub mod session;
pub mod symptoms;

pub use api::{DiseaseDetail, FollowUpQuestion, ParsedIntent, Prediction, TriageApi};
pub use errors::ApiError;
pub use events::SessionEvent;
pub use ids::{MessageId, SessionId};
pub use messages::{Message, MessageKind, Transcript};
pub use registry::{TabularFeatures, TestOutcome, TestRegistry, TestSource};
pub use session::{AnalysisPhase, AnalysisSettings};
pub use symptoms::SymptomSet;
