//! Strategy trait shared by every step of the cascade

use crate::error::StrategyError;
use crate::model::{Container, StrategyTag, SubStreamRecord};

/// One way of recovering sub-streams from a container
///
/// Implementations return `Ok(vec![])` when the container is simply not
/// in their format, and an error when it looks like their format but is
/// broken. The cascade treats both as "nothing found".
pub trait ExtractionStrategy: Send + Sync {
    /// Tag reported for records produced by this strategy
    fn tag(&self) -> StrategyTag;

    /// Attempt extraction on a whole container
    fn attempt(&self, container: &Container) -> Result<Vec<SubStreamRecord>, StrategyError>;
}
