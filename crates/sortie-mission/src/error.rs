use std::time::Duration;

use sortie_fc::LinkFault;

#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("link fault: {0}")]
    Link(#[from] LinkFault),
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },
    #[error("position corrector failed: {0:#}")]
    Correction(anyhow::Error),
}

impl MissionError {
    pub fn is_link_fault(&self) -> bool {
        matches!(self, MissionError::Link(_))
    }
}
