//! Consensus over independent population estimates.
//!
//! The engine walks a strict priority hierarchy (census, footprints, area density) and
//! either selects one estimate or blends the census with the footprint figure when the two
//! disagree badly. It never adds estimates together: the consensus always lies between the
//! smallest and largest contributing figure.

use serde::{Deserialize, Serialize};

use crate::config::PopulationConfig;
use crate::model::Confidence;
use crate::population::{PopulationEstimate, SourceKind, SourceOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// How the consensus figure was obtained.
pub enum ConsensusStrategy {
    /// A single source was taken as is.
    Selected,
    /// Census and footprint figures were averaged by confidence weight.
    Blended {
        /// Blended figure divided by the census figure.
        adjustment_factor: f64,
        /// Larger figure divided by the smaller one.
        disagreement: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Raw figure of one source, kept for audit.
pub struct MethodComparison {
    /// Source consulted.
    pub source: SourceKind,
    /// Its estimate, when it produced one.
    pub estimated_population: Option<f64>,
    /// Its confidence, when it produced an estimate.
    pub confidence: Option<Confidence>,
    /// Derivation method or reason for absence.
    pub note: String,
}

impl From<&SourceOutcome> for MethodComparison {
    fn from(outcome: &SourceOutcome) -> Self {
        match outcome {
            SourceOutcome::Present(estimate) => Self {
                source: estimate.source,
                estimated_population: Some(estimate.estimated_population),
                confidence: Some(estimate.confidence),
                note: estimate.method.clone(),
            },
            SourceOutcome::Absent { source, reason } => Self {
                source: *source,
                estimated_population: None,
                confidence: None,
                note: reason.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// The authoritative population figure of one analysis run.
pub struct ConsensusPopulation {
    /// Consensus residents.
    pub value: f64,
    /// Trust in the consensus.
    pub confidence: Confidence,
    /// Highest-priority source that contributed.
    pub primary_source: SourceKind,
    /// Selection or blend.
    pub strategy: ConsensusStrategy,
    /// Estimates that entered the figure.
    pub contributing_estimates: Vec<PopulationEstimate>,
    /// Every consulted source with its raw figure.
    pub method_comparison: Vec<MethodComparison>,
}

/// Chooses or blends one population figure out of several source outcomes.
#[derive(Debug, Clone, Copy)]
pub struct PopulationConsensusEngine {
    disagreement_ratio: f64,
}

impl PopulationConsensusEngine {
    /// Engine blending census and footprint figures once their ratio exceeds
    /// `disagreement_ratio`.
    #[must_use]
    pub fn new(disagreement_ratio: f64) -> Self {
        Self {
            disagreement_ratio: disagreement_ratio.max(1.0),
        }
    }

    /// Engine using the configured ratio.
    #[must_use]
    pub fn from_config(config: &PopulationConfig) -> Self {
        Self::new(config.disagreement_ratio)
    }

    /// Merge the outcomes of one run. Returns `None` only when no source produced anything.
    #[must_use]
    pub fn merge(&self, outcomes: &[SourceOutcome]) -> Option<ConsensusPopulation> {
        let present = |kind: SourceKind| {
            outcomes
                .iter()
                .filter_map(SourceOutcome::estimate)
                .find(|estimate| estimate.source == kind)
        };
        let method_comparison = outcomes.iter().map(MethodComparison::from).collect();

        let census = present(SourceKind::GriddedCensus);
        let footprint = present(SourceKind::BuildingFootprint);

        if let (Some(census), Some(footprint)) = (census, footprint) {
            let disagreement = ratio(census.estimated_population, footprint.estimated_population);
            if disagreement > self.disagreement_ratio {
                return Some(Self::blend(census, footprint, disagreement, method_comparison));
            }
        }

        let chosen = SourceKind::PRIORITY.into_iter().find_map(present)?;
        log::debug!(
            "Consensus selected {} = {} ({})",
            chosen.source,
            chosen.estimated_population,
            chosen.confidence
        );
        Some(ConsensusPopulation {
            value: chosen.estimated_population,
            confidence: chosen.confidence,
            primary_source: chosen.source,
            strategy: ConsensusStrategy::Selected,
            contributing_estimates: vec![chosen.clone()],
            method_comparison,
        })
    }

    fn blend(
        census: &PopulationEstimate,
        footprint: &PopulationEstimate,
        disagreement: f64,
        method_comparison: Vec<MethodComparison>,
    ) -> ConsensusPopulation {
        let census_weight = census.confidence.weight();
        let footprint_weight = footprint.confidence.weight();
        let value = ((census.estimated_population * census_weight
            + footprint.estimated_population * footprint_weight)
            / (census_weight + footprint_weight))
            .round();
        let adjustment_factor = if census.estimated_population > 0.0 {
            value / census.estimated_population
        } else {
            1.0
        };
        log::warn!(
            "Census ({}) and footprint ({}) disagree {disagreement:.2}x, blended to {value}",
            census.estimated_population,
            footprint.estimated_population
        );

        ConsensusPopulation {
            value,
            confidence: Confidence::Medium,
            primary_source: SourceKind::GriddedCensus,
            strategy: ConsensusStrategy::Blended {
                adjustment_factor,
                disagreement,
            },
            contributing_estimates: vec![census.clone(), footprint.clone()],
            method_comparison,
        }
    }
}

/// Larger of two figures divided by the smaller; infinite when the smaller is not positive.
fn ratio(first: f64, second: f64) -> f64 {
    let (low, high) = if first <= second {
        (first, second)
    } else {
        (second, first)
    };
    if low <= 0.0 { f64::INFINITY } else { high / low }
}
