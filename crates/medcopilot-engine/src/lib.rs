pub mod assistant;
pub mod retrieval;

pub use assistant::{clinical_prompt, AskMode, AssistantReply, ClinicalAssistant};
pub use retrieval::{EngineSettings, EngineStatus, GroundingContext, RetrievalEngine};
