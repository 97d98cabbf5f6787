// ABOUTME: Errors reported by the particle manager and its async service.
// ABOUTME: Only malformed groups and a closed service are errors; unknown ids are no-ops.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParticleError {
    #[error("Particle group id must not be empty")]
    EmptyId,

    #[error("Particle group {0} has no particles")]
    ZeroCount(String),

    #[error("Attribute {name} of group {id} holds {actual} values, expected {expected}")]
    AttributeLength {
        id: String,
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Particle group {id} has too many particles ({count}) for its attributes")]
    CountOverflow { id: String, count: usize },

    #[error("Particle service has shut down")]
    ServiceClosed,
}
