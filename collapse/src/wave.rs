use coord_2d::{Coord, Size};
use grid_2d::Grid;
use rand::Rng;

use crate::model::ModelStats;
use crate::pattern::PatternId;
use crate::pattern_set::PatternSet;

/// Outcome of narrowing a cell against a support set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Restriction {
    Unchanged,
    Narrowed,
    Emptied,
}

#[derive(Debug)]
pub enum ChosenPatternError {
    NoPossiblePatterns,
    MultiplePossiblePatterns,
}

/// One cell of the wave: the surviving pattern set plus the running sums its
/// entropy is derived from. The sums shrink in lockstep with the set; entropy
/// is recomputed only when a bit is actually cleared.
#[derive(Debug, Default, Clone)]
pub struct WaveCell {
    possible: PatternSet,
    num_possible: u32,
    sum_weight: u32,
    sum_weight_log_weight: f64,
    entropy: f64,
    noise: f64,
    collapsed: bool,
}

impl WaveCell {
    fn init<R: Rng>(&mut self, stats: &ModelStats, entropy_noise: f64, rng: &mut R) {
        self.possible = PatternSet::full(stats.num_patterns());
        self.num_possible = stats.num_patterns() as u32;
        self.sum_weight = stats.sum_weight();
        self.sum_weight_log_weight = stats.sum_weight_log_weight();
        self.noise = rng.gen::<f64>() * entropy_noise;
        self.collapsed = false;
        self.recompute_entropy();
    }

    fn recompute_entropy(&mut self) {
        if self.num_possible > 1 {
            // log2(w0+w1+...) - (w0*log2(w0) + w1*log2(w1) + ...) / (w0+w1+...)
            let sum_weight = f64::from(self.sum_weight);
            self.entropy = sum_weight.log2() - self.sum_weight_log_weight / sum_weight;
        } else {
            self.entropy = 0.0;
        }
    }

    pub fn possible(&self) -> &PatternSet {
        &self.possible
    }

    pub fn num_possible(&self) -> usize {
        self.num_possible as usize
    }

    /// Decided means a singleton survivor, whether observed or forced by
    /// propagation. `collapsed` is only ever set by an observation.
    pub fn is_decided(&self) -> bool {
        self.num_possible == 1
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Noise-adjusted entropy. Decided and contradicted cells report infinity
    /// so they are never selected for observation.
    pub fn entropy(&self) -> f64 {
        if self.num_possible <= 1 {
            f64::INFINITY
        } else {
            self.entropy - self.noise
        }
    }

    pub(crate) fn sum_weight(&self) -> u32 {
        self.sum_weight
    }

    pub fn chosen_pattern(&self) -> Result<PatternId, ChosenPatternError> {
        match self.num_possible {
            0 => Err(ChosenPatternError::NoPossiblePatterns),
            1 => Ok(self
                .possible
                .singleton()
                .expect("count and bitset out of sync")),
            _ => Err(ChosenPatternError::MultiplePossiblePatterns),
        }
    }

    fn remove_possible(&mut self, pattern_id: PatternId, stats: &ModelStats) {
        let pattern = stats.pattern(pattern_id);
        assert!(self.num_possible >= 1);
        assert!(self.sum_weight >= pattern.weight());
        self.num_possible -= 1;
        self.sum_weight -= pattern.weight();
        self.sum_weight_log_weight -= pattern.weight_log_weight();
    }

    /// Clears one bit. Returns whether the set changed and whether it is now
    /// empty.
    pub fn remove(&mut self, pattern_id: PatternId, stats: &ModelStats) -> (bool, bool) {
        if !self.possible.remove(pattern_id) {
            return (false, self.num_possible == 0);
        }
        self.remove_possible(pattern_id, stats);
        self.recompute_entropy();
        (true, self.num_possible == 0)
    }

    /// Intersects the cell with a support set, maintaining the entropy sums
    /// for every pattern that drops out.
    pub(crate) fn restrict(&mut self, support: &PatternSet, stats: &ModelStats) -> Restriction {
        let mut removed = Vec::new();
        for pattern_id in self.possible.iter() {
            if !support.contains(pattern_id) {
                removed.push(pattern_id);
            }
        }
        if removed.is_empty() {
            return Restriction::Unchanged;
        }
        for pattern_id in removed {
            self.possible.remove(pattern_id);
            self.remove_possible(pattern_id, stats);
        }
        if self.num_possible == 0 {
            return Restriction::Emptied;
        }
        self.recompute_entropy();
        Restriction::Narrowed
    }

    /// Forces the cell to a singleton as the result of an observation.
    pub fn collapse_to(&mut self, pattern_id: PatternId, stats: &ModelStats) {
        assert!(self.possible.contains(pattern_id));
        let pattern = stats.pattern(pattern_id);
        self.possible = PatternSet::empty(self.possible.num_patterns());
        self.possible.insert(pattern_id);
        self.num_possible = 1;
        self.sum_weight = pattern.weight();
        self.sum_weight_log_weight = pattern.weight_log_weight();
        self.collapsed = true;
        self.recompute_entropy();
    }
}

/// The output grid of superpositions. Owned exclusively by the solver while
/// it runs; callers receive it only after a successful collapse.
#[derive(Debug, Clone)]
pub struct Wave {
    grid: Grid<WaveCell>,
}

impl Wave {
    pub fn new(size: Size) -> Self {
        Self {
            grid: Grid::new_default(size),
        }
    }

    /// Resets every cell to the full superposition and draws fresh
    /// tie-breaking noise, in storage order so a seeded rng reproduces the
    /// same wave.
    pub fn init<R: Rng>(&mut self, stats: &ModelStats, entropy_noise: f64, rng: &mut R) {
        self.grid
            .iter_mut()
            .for_each(|cell| cell.init(stats, entropy_noise, rng));
    }

    pub fn size(&self) -> Size {
        self.grid.size()
    }

    pub fn grid(&self) -> &Grid<WaveCell> {
        &self.grid
    }

    pub fn cell(&self, coord: Coord) -> &WaveCell {
        self.grid.get_checked(coord)
    }

    pub fn cell_mut(&mut self, coord: Coord) -> &mut WaveCell {
        self.grid.get_checked_mut(coord)
    }

    pub fn num_undecided(&self) -> usize {
        self.grid.iter().filter(|cell| !cell.is_decided()).count()
    }
}
