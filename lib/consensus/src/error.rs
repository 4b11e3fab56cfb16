use concord_similarity::ScoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AggregationError>;

#[derive(Error, Debug, Clone)]
pub enum AggregationError {
    #[error("Candidate set is empty")]
    EmptyCandidateSet,

    #[error("Candidate {candidate} is missing required field '{field}'")]
    MissingField { candidate: usize, field: String },

    #[error(transparent)]
    Score(#[from] ScoreError),
}
