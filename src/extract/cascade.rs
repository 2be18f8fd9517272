//! Ordered fallback across extraction strategies

use super::entropy::{EntropyConfig, EntropyHeuristic};
use super::signature::{SignatureConfig, SignatureScanner};
use super::structured::StructuredParser;
use super::traits::ExtractionStrategy;
use crate::batch::pool::panic_message;
use crate::model::{Container, StrategyTag, SubStreamRecord};
use std::panic::{self, AssertUnwindSafe};

/// Records produced by the first strategy that found anything
#[derive(Debug, Clone)]
pub struct CascadeResult {
    /// Origin of the winning records (`whole-file` when the heuristic had
    /// to fall back)
    pub strategy: StrategyTag,

    pub records: Vec<SubStreamRecord>,
}

/// Strategies tried in priority order until one yields records
pub struct ExtractionCascade {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ExtractionCascade {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Structured parse, then signature scan, then the entropy heuristic
    pub fn standard(signature: SignatureConfig, entropy: EntropyConfig) -> Self {
        Self::new(vec![
            Box::new(StructuredParser::new()),
            Box::new(SignatureScanner::new(signature)),
            Box::new(EntropyHeuristic::new(entropy)),
        ])
    }

    /// Entropy heuristic only
    pub fn heuristic_only(entropy: EntropyConfig) -> Self {
        Self::new(vec![Box::new(EntropyHeuristic::new(entropy))])
    }

    /// Put a strategy ahead of all others
    pub fn with_leading(mut self, strategy: Box<dyn ExtractionStrategy>) -> Self {
        self.strategies.insert(0, strategy);
        self
    }

    /// Strategy tags in the order they are tried
    pub fn order(&self) -> Vec<StrategyTag> {
        self.strategies.iter().map(|s| s.tag()).collect()
    }

    /// Run the strategies against one container
    ///
    /// Returns `None` only if every strategy came back empty, which the
    /// entropy heuristic rules out for non-empty input.
    pub fn run(&self, container: &Container) -> Option<CascadeResult> {
        for strategy in &self.strategies {
            let records = attempt(strategy.as_ref(), container);
            if let Some(first) = records.first() {
                let result = CascadeResult {
                    strategy: first.origin,
                    records,
                };
                log::debug!(
                    "{:?}: {} sub-streams via {}",
                    container.path(),
                    result.records.len(),
                    result.strategy
                );
                return Some(result);
            }
        }
        None
    }
}

/// Run one strategy, mapping errors and panics to "nothing found"
fn attempt(strategy: &dyn ExtractionStrategy, container: &Container) -> Vec<SubStreamRecord> {
    match panic::catch_unwind(AssertUnwindSafe(|| strategy.attempt(container))) {
        Ok(Ok(records)) => records,
        Ok(Err(e)) => {
            log::debug!(
                "{} strategy gave up on {:?}: {}",
                strategy.tag(),
                container.path(),
                e
            );
            Vec::new()
        }
        Err(payload) => {
            log::warn!(
                "{} strategy panicked on {:?}: {}",
                strategy.tag(),
                container.path(),
                panic_message(payload.as_ref())
            );
            Vec::new()
        }
    }
}
