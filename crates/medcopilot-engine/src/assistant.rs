//! Question answering modes layered over a retrieval engine and a synthesizer.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use medcopilot_core::{AnswerSynthesizer, Error, Result};

use crate::retrieval::{GroundingContext, RetrievalEngine};

pub const HOSPITAL_TOP_K: usize = 5;
pub const HYBRID_TOP_K: usize = 3;

const HOSPITAL_HEADING: &str = "### 🏥 Hospital Clinical Intelligence";
const GLOBAL_HEADING: &str = "### 🌍 Global Medical Research";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskMode {
    /// Answer only from the local corpus.
    Hospital,
    /// Send the question as-is to the synthesizer.
    Global,
    /// Local answer (when an index exists) followed by the global one.
    Hybrid,
}

impl AskMode {
    pub fn retrieval_k(self) -> Option<usize> {
        match self {
            Self::Hospital => Some(HOSPITAL_TOP_K),
            Self::Global => None,
            Self::Hybrid => Some(HYBRID_TOP_K),
        }
    }
}

impl fmt::Display for AskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hospital => "hospital",
            Self::Global => "global",
            Self::Hybrid => "hybrid",
        })
    }
}

impl FromStr for AskMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hospital" => Ok(Self::Hospital),
            "global" => Ok(Self::Global),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown mode '{}' (expected hospital, global or hybrid)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub mode: AskMode,
    pub answer: String,
    /// Provenance of the local evidence used, in rank order.
    pub sources: Vec<String>,
    /// True when any part of the answer is a synthesizer diagnostic.
    pub degraded: bool,
}

/// Evidence-only prompt for answering from local documents.
pub fn clinical_prompt(question: &str, evidence: &str) -> String {
    format!(
        "You are a senior hospital clinical decision support AI.\n\n\
         Using ONLY the hospital evidence below, answer the doctor's question\n\
         in a structured medical format with:\n\n\
         - Diagnosis Summary\n\
         - Treatment Protocol\n\
         - Drug Dosage (if available)\n\
         - Monitoring Plan\n\
         - Follow-up Plan\n\n\
         Doctor Question:\n{}\n\n\
         Hospital Evidence:\n{}\n\n\
         Rules:\n\
         - Use only hospital evidence\n\
         - Do not hallucinate\n\
         - Be concise and clinical\n",
        question.trim(),
        evidence
    )
}

pub struct ClinicalAssistant {
    engine: Arc<RetrievalEngine>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
}

impl ClinicalAssistant {
    pub fn new(engine: Arc<RetrievalEngine>, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        Self { engine, synthesizer }
    }

    pub fn ask(&self, question: &str, mode: AskMode) -> Result<AssistantReply> {
        if question.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        match mode {
            AskMode::Hospital => {
                let grounding = self.engine.grounding_context(question, HOSPITAL_TOP_K)?;
                let (answer, degraded) = self.answer_from(question, &grounding);
                Ok(AssistantReply { mode, answer, sources: grounding.sources, degraded })
            }
            AskMode::Global => {
                let reply = self.synthesizer.answer(question);
                let degraded = reply.is_diagnostic();
                Ok(AssistantReply { mode, answer: reply.answer, sources: Vec::new(), degraded })
            }
            AskMode::Hybrid => {
                let mut output = String::new();
                let mut sources = Vec::new();
                let mut degraded = false;
                match self.engine.grounding_context(question, HYBRID_TOP_K) {
                    Ok(grounding) => {
                        let (local, local_degraded) = self.answer_from(question, &grounding);
                        output.push_str(&format!("{}\n\n{}\n\n", HOSPITAL_HEADING, local));
                        sources = grounding.sources;
                        degraded |= local_degraded;
                    }
                    Err(Error::IndexNotReady) => {
                        tracing::info!("No local index; hybrid answer uses global research only");
                    }
                    Err(e) => return Err(e),
                }
                let global = self.synthesizer.answer(question);
                degraded |= global.is_diagnostic();
                output.push_str(&format!("{}\n\n{}", GLOBAL_HEADING, global.answer));
                Ok(AssistantReply { mode, answer: output, sources, degraded })
            }
        }
    }

    fn answer_from(&self, question: &str, grounding: &GroundingContext) -> (String, bool) {
        let reply = self.synthesizer.answer(&clinical_prompt(question, &grounding.context));
        let degraded = reply.is_diagnostic();
        (reply.answer, degraded)
    }
}
