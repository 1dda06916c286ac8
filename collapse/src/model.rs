use grid_2d::Grid;

use crate::error::Error;
use crate::indexer::ColourId;
use crate::pattern::{extract_patterns, Pattern, PatternId, PatternTable};
use crate::rules::{build_rules, RuleTable};
use crate::symmetry::SymmetrySet;

/// Weight of one pattern with its `w * log2(w)` term precomputed, so cells
/// can maintain their entropy sums by subtraction alone.
#[derive(Debug, Clone, Copy)]
pub struct PatternWeight {
    weight: u32,
    weight_log_weight: f64,
}

impl PatternWeight {
    fn new(weight: u32) -> Self {
        Self {
            weight,
            weight_log_weight: f64::from(weight) * f64::from(weight).log2(),
        }
    }
    pub fn weight(&self) -> u32 {
        self.weight
    }
    pub fn weight_log_weight(&self) -> f64 {
        self.weight_log_weight
    }
}

/// Per-pattern weights plus the whole-distribution sums every cell starts
/// from.
#[derive(Debug, Clone)]
pub struct ModelStats {
    pattern_weights: PatternTable<PatternWeight>,
    sum_weight: u32,
    sum_weight_log_weight: f64,
}

impl ModelStats {
    fn new(patterns: &PatternTable<Pattern>) -> Self {
        let pattern_weights = patterns
            .iter()
            .map(|pattern| PatternWeight::new(pattern.weight()))
            .collect::<PatternTable<_>>();
        let sum_weight = pattern_weights.iter().map(PatternWeight::weight).sum();
        let sum_weight_log_weight = pattern_weights
            .iter()
            .map(PatternWeight::weight_log_weight)
            .sum();
        Self {
            pattern_weights,
            sum_weight,
            sum_weight_log_weight,
        }
    }
    pub fn num_patterns(&self) -> usize {
        self.pattern_weights.len()
    }
    pub fn pattern(&self, pattern_id: PatternId) -> &PatternWeight {
        &self.pattern_weights[pattern_id]
    }
    pub fn sum_weight(&self) -> u32 {
        self.sum_weight
    }
    pub fn sum_weight_log_weight(&self) -> f64 {
        self.sum_weight_log_weight
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOptions {
    pub symmetries: SymmetrySet,
    /// When set, every bottom-row cell of the output is clamped to this
    /// pattern before the first observation.
    pub ground: Option<PatternId>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            symmetries: SymmetrySet::default(),
            ground: None,
        }
    }
}

/// Everything learned from one input: the weighted patterns, the adjacency
/// rules and the entropy bookkeeping. Immutable once built; any number of
/// solver runs may share one model.
#[derive(Debug, Clone)]
pub struct Model {
    patterns: PatternTable<Pattern>,
    rules: RuleTable,
    stats: ModelStats,
    pattern_size: u32,
    ground: Option<PatternId>,
}

impl Model {
    pub fn patterns(&self) -> &PatternTable<Pattern> {
        &self.patterns
    }
    pub fn pattern(&self, pattern_id: PatternId) -> &Pattern {
        &self.patterns[pattern_id]
    }
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }
    pub fn stats(&self) -> &ModelStats {
        &self.stats
    }
    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }
    pub fn pattern_size(&self) -> u32 {
        self.pattern_size
    }
    pub fn ground(&self) -> Option<PatternId> {
        self.ground
    }
}

pub fn build_model(
    grid: &Grid<ColourId>,
    pattern_size: u32,
    options: ModelOptions,
) -> Result<Model, Error> {
    let patterns = extract_patterns(grid, pattern_size, &options.symmetries)?;
    if let Some(ground) = options.ground {
        if ground as usize >= patterns.len() {
            return Err(Error::InvalidParameter(
                "ground pattern id is out of range",
            ));
        }
    }
    let rules = build_rules(&patterns);
    let stats = ModelStats::new(&patterns);
    Ok(Model {
        patterns,
        rules,
        stats,
        pattern_size,
        ground: options.ground,
    })
}
