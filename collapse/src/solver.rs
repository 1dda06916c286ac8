use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use coord_2d::{Coord, Size};
use direction::Direction;
use grid_2d::Grid;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::error::Error;
use crate::model::Model;
use crate::pattern::PatternId;
use crate::pattern_set::PatternSet;
use crate::rules::{CARDINAL_DIRECTIONS, COMPASS_DIRECTIONS};
use crate::wave::{Restriction, Wave};

/// How a pattern is drawn for an observed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Sample the survivors proportionally to their weight.
    Weighted,
    /// Sample uniformly among the survivors of maximal probability.
    MaxProbability,
}

/// Which neighbours propagation visits. The rule table always holds all
/// eight directions; the cardinal neighbourhood just skips the diagonals,
/// trading local consistency for convergence speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbourhood {
    Cardinal,
    Compass,
}

impl Neighbourhood {
    pub fn directions(self) -> &'static [Direction] {
        match self {
            Neighbourhood::Cardinal => &CARDINAL_DIRECTIONS,
            Neighbourhood::Compass => &COMPASS_DIRECTIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOptions {
    pub seed: u64,
    /// Number of restarts granted after the first attempt. Zero means a
    /// single attempt.
    pub max_restarts: u32,
    pub selection: Selection,
    pub neighbourhood: Neighbourhood,
    /// Amplitude of the per-cell noise subtracted from reported entropies.
    pub entropy_noise: f64,
    pub deadline: Option<Duration>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            max_restarts: 10,
            selection: Selection::Weighted,
            neighbourhood: Neighbourhood::Compass,
            entropy_noise: 0.01,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Incomplete,
    /// A contradiction was hit and the wave was re-initialized.
    Restarted,
    Complete,
}

struct Contradiction {
    coord: Coord,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CoordEntropy {
    coord: Coord,
    entropy: f64,
}

impl Eq for CoordEntropy {}

impl PartialOrd for CoordEntropy {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        // Reversed so the max-heap pops the minimum entropy; exact ties fall
        // back to row-major order.
        match other.entropy.partial_cmp(&self.entropy) {
            Some(Ordering::Equal) => {
                Some((other.coord.y, other.coord.x).cmp(&(self.coord.y, self.coord.x)))
            }
            ordering => ordering,
        }
    }
}

impl Ord for CoordEntropy {
    fn cmp(&self, other: &Self) -> Ordering {
        if self < other {
            return Ordering::Less;
        }
        if self == other {
            return Ordering::Equal;
        }
        Ordering::Greater
    }
}

/// LIFO worklist of cells whose neighbours still need narrowing, with a
/// membership grid so a cell is never queued twice.
struct Propagator {
    stack: Vec<Coord>,
    queued: Grid<bool>,
}

impl Propagator {
    fn new(size: Size) -> Self {
        Self {
            stack: Vec::new(),
            queued: Grid::new_clone(size, false),
        }
    }
    fn clear(&mut self) {
        self.stack.clear();
        self.queued.iter_mut().for_each(|queued| *queued = false);
    }
    fn push(&mut self, coord: Coord) {
        let queued = self.queued.get_checked_mut(coord);
        if !*queued {
            *queued = true;
            self.stack.push(coord);
        }
    }
    fn pop(&mut self) -> Option<Coord> {
        let coord = self.stack.pop()?;
        *self.queued.get_checked_mut(coord) = false;
        Some(coord)
    }
}

#[derive(Default)]
struct Observer {
    entropy_priority_queue: BinaryHeap<CoordEntropy>,
}

/// A running collapse of one output grid. Owns the wave for its lifetime;
/// restarts re-initialize it in place with an rng reseeded from
/// `seed ^ attempt`.
pub struct Solver<'a> {
    model: &'a Model,
    wave: Wave,
    propagator: Propagator,
    observer: Observer,
    selection: Selection,
    neighbourhood: Neighbourhood,
    entropy_noise: f64,
    seed: u64,
    attempt: u32,
    max_restarts: u32,
    deadline: Option<Instant>,
    num_undecided: u32,
    rng: XorShiftRng,
}

impl<'a> Solver<'a> {
    pub fn new(
        model: &'a Model,
        output_size: Size,
        options: &SolveOptions,
    ) -> Result<Self, Error> {
        if output_size.count() == 0 {
            return Err(Error::InvalidParameter("output size must be non-empty"));
        }
        if !options.entropy_noise.is_finite() || options.entropy_noise < 0.0 {
            return Err(Error::InvalidParameter(
                "entropy noise must be finite and non-negative",
            ));
        }
        let mut solver = Self {
            model,
            wave: Wave::new(output_size),
            propagator: Propagator::new(output_size),
            observer: Observer::default(),
            selection: options.selection,
            neighbourhood: options.neighbourhood,
            entropy_noise: options.entropy_noise,
            seed: options.seed,
            attempt: 0,
            max_restarts: options.max_restarts,
            deadline: options.deadline.map(|duration| Instant::now() + duration),
            num_undecided: 0,
            rng: XorShiftRng::seed_from_u64(options.seed),
        };
        if let Err(Contradiction { coord }) = solver.reset() {
            log::debug!(
                "contradiction at ({}, {}) while clamping the ground row",
                coord.x,
                coord.y
            );
            solver.restart()?;
        }
        Ok(solver)
    }

    /// Attempts run so far, including the one in progress.
    pub fn attempts(&self) -> u32 {
        self.attempt + 1
    }

    pub fn num_undecided(&self) -> usize {
        self.num_undecided as usize
    }

    pub fn wave(&self) -> &Wave {
        &self.wave
    }

    pub fn into_wave(self) -> Wave {
        self.wave
    }

    fn reset(&mut self) -> Result<(), Contradiction> {
        self.rng = XorShiftRng::seed_from_u64(self.seed ^ u64::from(self.attempt));
        self.wave
            .init(self.model.stats(), self.entropy_noise, &mut self.rng);
        self.propagator.clear();
        self.observer.entropy_priority_queue.clear();
        if self.model.num_patterns() > 1 {
            self.num_undecided = self.wave.size().count() as u32;
            let queue = &mut self.observer.entropy_priority_queue;
            self.wave.grid().enumerate().for_each(|(coord, cell)| {
                queue.push(CoordEntropy {
                    coord,
                    entropy: cell.entropy(),
                });
            });
        } else {
            self.num_undecided = 0;
        }
        if let Some(ground) = self.model.ground() {
            self.clamp_ground_row(ground)?;
        }
        Ok(())
    }

    fn clamp_ground_row(&mut self, ground: PatternId) -> Result<(), Contradiction> {
        let size = self.wave.size();
        let y = size.height() as i32 - 1;
        for x in 0..size.width() as i32 {
            let coord = Coord::new(x, y);
            let cell = self.wave.cell_mut(coord);
            if !cell.possible().contains(ground) {
                return Err(Contradiction { coord });
            }
            if !cell.is_decided() {
                cell.collapse_to(ground, self.model.stats());
                self.num_undecided -= 1;
                self.propagator.push(coord);
            }
        }
        self.propagate()
    }

    fn restart(&mut self) -> Result<(), Error> {
        loop {
            if self.attempt >= self.max_restarts {
                return Err(Error::Unsolvable {
                    attempts: self.attempt + 1,
                });
            }
            self.attempt += 1;
            log::debug!(
                "restarting, attempt {} of {}",
                self.attempt + 1,
                self.max_restarts + 1
            );
            match self.reset() {
                Ok(()) => return Ok(()),
                Err(Contradiction { coord }) => {
                    log::debug!(
                        "contradiction at ({}, {}) while clamping the ground row",
                        coord.x,
                        coord.y
                    );
                }
            }
        }
    }

    /// Pops entries until one still describes its cell. An entry is stale
    /// when the cell has been decided or its entropy has changed since the
    /// push; the push that changed it left a fresh entry behind.
    fn choose_next_cell(&mut self) -> Option<Coord> {
        while let Some(entry) = self.observer.entropy_priority_queue.pop() {
            let cell = self.wave.cell(entry.coord);
            if !cell.is_decided() && cell.entropy() == entry.entropy {
                return Some(entry.coord);
            }
        }
        None
    }

    fn choose_pattern_id(&mut self, coord: Coord) -> PatternId {
        let cell = self.wave.cell(coord);
        let stats = self.model.stats();
        match self.selection {
            Selection::Weighted => {
                let sum_weight = cell.sum_weight();
                assert!(sum_weight > 0);
                let mut remaining = self.rng.gen_range(0..sum_weight);
                for pattern_id in cell.possible().iter() {
                    let weight = stats.pattern(pattern_id).weight();
                    if remaining >= weight {
                        remaining -= weight;
                    } else {
                        return pattern_id;
                    }
                }
                unreachable!("the sampled value is below the sum of weights")
            }
            Selection::MaxProbability => {
                let max_weight = cell
                    .possible()
                    .iter()
                    .map(|pattern_id| stats.pattern(pattern_id).weight())
                    .max()
                    .expect("observed cell has no possible patterns");
                let num_candidates = cell
                    .possible()
                    .iter()
                    .filter(|&pattern_id| stats.pattern(pattern_id).weight() == max_weight)
                    .count();
                let chosen = self.rng.gen_range(0..num_candidates);
                cell.possible()
                    .iter()
                    .filter(|&pattern_id| stats.pattern(pattern_id).weight() == max_weight)
                    .nth(chosen)
                    .expect("candidate index is in range")
            }
        }
    }

    fn propagate(&mut self) -> Result<(), Contradiction> {
        let num_patterns = self.model.num_patterns();
        let wave_size = self.wave.size();
        while let Some(coord) = self.propagator.pop() {
            for &direction in self.neighbourhood.directions() {
                let neighbour = coord + direction.coord();
                if !neighbour.is_valid(wave_size) {
                    continue;
                }
                // Everything the neighbour may still be, given what this
                // cell may still be.
                let mut support = PatternSet::empty(num_patterns);
                for pattern_id in self.wave.cell(coord).possible().iter() {
                    support.union_with(self.model.rules().allowed(pattern_id, direction));
                }
                let cell = self.wave.cell_mut(neighbour);
                match cell.restrict(&support, self.model.stats()) {
                    Restriction::Unchanged => (),
                    Restriction::Narrowed => {
                        if cell.is_decided() {
                            self.num_undecided -= 1;
                        } else {
                            self.observer.entropy_priority_queue.push(CoordEntropy {
                                coord: neighbour,
                                entropy: cell.entropy(),
                            });
                        }
                        self.propagator.push(neighbour);
                    }
                    Restriction::Emptied => {
                        return Err(Contradiction { coord: neighbour });
                    }
                }
            }
        }
        Ok(())
    }

    /// One observe/propagate cycle. A contradiction restarts the attempt
    /// in place and reports `Step::Restarted`; running out of restarts or
    /// missing the deadline surfaces as an error.
    pub fn step(&mut self) -> Result<Step, Error> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::TimedOut);
            }
        }
        if self.num_undecided == 0 {
            return Ok(Step::Complete);
        }
        let coord = match self.choose_next_cell() {
            Some(coord) => coord,
            None => {
                debug_assert_eq!(self.num_undecided, 0);
                return Ok(Step::Complete);
            }
        };
        let pattern_id = self.choose_pattern_id(coord);
        self.wave
            .cell_mut(coord)
            .collapse_to(pattern_id, self.model.stats());
        self.num_undecided -= 1;
        self.propagator.push(coord);
        match self.propagate() {
            Ok(()) => Ok(if self.num_undecided == 0 {
                Step::Complete
            } else {
                Step::Incomplete
            }),
            Err(Contradiction { coord }) => {
                log::debug!(
                    "contradiction at ({}, {}) on attempt {}",
                    coord.x,
                    coord.y,
                    self.attempt + 1
                );
                self.restart()?;
                Ok(Step::Restarted)
            }
        }
    }

    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            match self.step()? {
                Step::Complete => return Ok(()),
                Step::Incomplete | Step::Restarted => (),
            }
        }
    }
}

/// Collapses a fresh wave of the given size against the model. Given the
/// same model and options the result is identical on every call.
pub fn generate(model: &Model, output_size: Size, options: &SolveOptions) -> Result<Wave, Error> {
    let mut solver = Solver::new(model, output_size, options)?;
    solver.run()?;
    log::debug!(
        "wave of {}x{} collapsed after {} attempt(s)",
        output_size.width(),
        output_size.height(),
        solver.attempts()
    );
    Ok(solver.into_wave())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::indexer::ColourId;
    use crate::model::{build_model, Model, ModelOptions};
    use crate::render::render;
    use crate::symmetry::SymmetrySet;

    fn checkerboard_model() -> Model {
        let grid = Grid::new_fn(Size::new(4, 4), |Coord { x, y }| {
            ((x + y) % 2) as ColourId
        });
        build_model(&grid, 2, ModelOptions::default()).unwrap()
    }

    fn stripes_model() -> Model {
        // Rows 0 and 1 are colour 0, rows 2 and 3 are colour 1.
        let grid = Grid::new_fn(Size::new(4, 4), |Coord { y, .. }| {
            if y < 2 {
                0
            } else {
                1
            }
        });
        let options = ModelOptions {
            symmetries: SymmetrySet::identity(),
            ground: None,
        };
        build_model(&grid, 2, options).unwrap()
    }

    fn assert_locally_consistent(wave: &Wave, model: &Model, neighbourhood: Neighbourhood) {
        let size = wave.size();
        for (coord, cell) in wave.grid().enumerate() {
            let pattern_id = cell.chosen_pattern().unwrap();
            for &direction in neighbourhood.directions() {
                let neighbour = coord + direction.coord();
                if !neighbour.is_valid(size) {
                    continue;
                }
                let neighbour_id = wave.cell(neighbour).chosen_pattern().unwrap();
                assert!(
                    model.rules().allowed(pattern_id, direction).contains(neighbour_id),
                    "adjacent collapsed cells must satisfy the rule table",
                );
            }
        }
    }

    #[test]
    fn checkerboard_output_is_a_checkerboard() {
        let model = checkerboard_model();
        let options = SolveOptions {
            seed: 0,
            max_restarts: 3,
            ..Default::default()
        };
        let wave = generate(&model, Size::new(8, 8), &options).unwrap();
        assert_locally_consistent(&wave, &model, Neighbourhood::Compass);
        let out = render(&wave, &model).unwrap();
        for (coord, &colour) in out.enumerate() {
            for neighbour in [coord + Coord::new(1, 0), coord + Coord::new(0, 1)] {
                if neighbour.is_valid(out.size()) {
                    assert_ne!(colour, *out.get_checked(neighbour));
                }
            }
        }
    }

    #[test]
    fn stripes_stay_stripes() {
        let model = stripes_model();
        let options = SolveOptions {
            seed: 7,
            ..Default::default()
        };
        let wave = generate(&model, Size::new(6, 6), &options).unwrap();
        let out = render(&wave, &model).unwrap();
        // Every row is a single colour.
        for y in 0..6 {
            let first = *out.get_checked(Coord::new(0, y));
            for x in 1..6 {
                assert_eq!(first, *out.get_checked(Coord::new(x, y)));
            }
        }
        // Columns switch from colour 0 to colour 1 at most once.
        for x in 0..6 {
            let mut transitions = 0;
            for y in 1..6 {
                let above = *out.get_checked(Coord::new(x, y - 1));
                let here = *out.get_checked(Coord::new(x, y));
                if above != here {
                    transitions += 1;
                    assert_eq!(above, 0);
                    assert_eq!(here, 1);
                }
            }
            assert!(transitions <= 1);
        }
    }

    #[test]
    fn single_pattern_collapses_immediately() {
        let grid = Grid::new_fn(Size::new(3, 3), |_| 5 as ColourId);
        let model = build_model(&grid, 2, ModelOptions::default()).unwrap();
        assert_eq!(model.num_patterns(), 1);
        for seed in [0, 1, 99] {
            let options = SolveOptions {
                seed,
                ..Default::default()
            };
            let wave = generate(&model, Size::new(10, 10), &options).unwrap();
            let out = render(&wave, &model).unwrap();
            assert!(out.iter().all(|&colour| colour == 5));
        }
    }

    #[test]
    fn contradiction_is_detected_by_propagation() {
        let model = checkerboard_model();
        let options = SolveOptions::default();
        let mut solver = Solver::new(&model, Size::new(4, 4), &options).unwrap();
        let stats = model.stats();
        // Force two horizontally adjacent cells to the same phase, which the
        // rule table forbids.
        for coord in [Coord::new(0, 0), Coord::new(1, 0)] {
            solver.wave.cell_mut(coord).collapse_to(0, stats);
            solver.num_undecided -= 1;
            solver.propagator.push(coord);
        }
        assert!(!model.rules().allowed(0, Direction::East).contains(0));
        assert!(solver.propagate().is_err());
    }

    #[test]
    fn awkward_input_never_panics() {
        // Sparse corners leave the diagonals unconstrained under the cardinal
        // neighbourhood, which makes dead ends likely for many seeds.
        let rows: [[ColourId; 3]; 3] = [[0, 1, 0], [1, 1, 1], [0, 1, 0]];
        let grid = Grid::new_fn(Size::new(3, 3), |Coord { x, y }| {
            rows[y as usize][x as usize]
        });
        let options = ModelOptions {
            symmetries: SymmetrySet::identity(),
            ground: None,
        };
        let model = build_model(&grid, 2, options).unwrap();
        for seed in 0..8 {
            let options = SolveOptions {
                seed,
                max_restarts: 50,
                neighbourhood: Neighbourhood::Cardinal,
                ..Default::default()
            };
            match generate(&model, Size::new(6, 6), &options) {
                Ok(wave) => {
                    assert_locally_consistent(&wave, &model, Neighbourhood::Cardinal)
                }
                Err(Error::Unsolvable { attempts }) => assert_eq!(attempts, 51),
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn impossible_ground_exhausts_restarts() {
        // In the column gradient each pattern only tolerates its successor to
        // the east, so clamping a whole row to one pattern cannot propagate.
        let grid = Grid::new_fn(Size::new(4, 2), |Coord { x, y }| (x + y) as ColourId);
        let options = ModelOptions {
            symmetries: SymmetrySet::identity(),
            ground: Some(0),
        };
        let model = build_model(&grid, 2, options).unwrap();
        let solve_options = SolveOptions {
            max_restarts: 2,
            ..Default::default()
        };
        assert_eq!(
            generate(&model, Size::new(3, 3), &solve_options).unwrap_err(),
            Error::Unsolvable { attempts: 3 },
        );
    }

    #[test]
    fn ground_row_is_clamped() {
        let model = {
            let grid = Grid::new_fn(Size::new(4, 4), |Coord { y, .. }| {
                if y < 2 {
                    0
                } else {
                    1
                }
            });
            // Pattern 2 is the all-colour-1 window in insertion order.
            let options = ModelOptions {
                symmetries: SymmetrySet::identity(),
                ground: Some(2),
            };
            build_model(&grid, 2, options).unwrap()
        };
        let wave = generate(&model, Size::new(5, 4), &SolveOptions::default()).unwrap();
        for x in 0..5 {
            let cell = wave.cell(Coord::new(x, 3));
            assert_eq!(cell.chosen_pattern().unwrap(), 2);
        }
    }

    #[test]
    fn fixed_seed_reproduces_output() {
        let model = checkerboard_model();
        for selection in [Selection::Weighted, Selection::MaxProbability] {
            let options = SolveOptions {
                seed: 42,
                max_restarts: 3,
                selection,
                ..Default::default()
            };
            let first = {
                let wave = generate(&model, Size::new(8, 8), &options).unwrap();
                render(&wave, &model).unwrap()
            };
            let second = {
                let wave = generate(&model, Size::new(8, 8), &options).unwrap();
                render(&wave, &model).unwrap()
            };
            let first: Vec<ColourId> = first.iter().copied().collect();
            let second: Vec<ColourId> = second.iter().copied().collect();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn zero_deadline_times_out() {
        let model = checkerboard_model();
        let options = SolveOptions {
            deadline: Some(Duration::from_secs(0)),
            ..Default::default()
        };
        assert_eq!(
            generate(&model, Size::new(8, 8), &options).unwrap_err(),
            Error::TimedOut,
        );
    }

    #[test]
    fn rejects_degenerate_arguments() {
        let model = checkerboard_model();
        assert!(matches!(
            generate(&model, Size::new(0, 4), &SolveOptions::default()),
            Err(Error::InvalidParameter(_)),
        ));
        let options = SolveOptions {
            entropy_noise: -0.5,
            ..Default::default()
        };
        assert!(matches!(
            generate(&model, Size::new(4, 4), &options),
            Err(Error::InvalidParameter(_)),
        ));
    }

    #[test]
    fn propagation_is_monotone() {
        let model = stripes_model();
        let options = SolveOptions {
            seed: 3,
            ..Default::default()
        };
        let mut solver = Solver::new(&model, Size::new(5, 5), &options).unwrap();
        let mut previous: Vec<usize> = solver
            .wave()
            .grid()
            .iter()
            .map(|cell| cell.num_possible())
            .collect();
        loop {
            match solver.step().unwrap() {
                Step::Complete => break,
                Step::Restarted => {
                    previous = solver
                        .wave()
                        .grid()
                        .iter()
                        .map(|cell| cell.num_possible())
                        .collect();
                }
                Step::Incomplete => {
                    let current: Vec<usize> = solver
                        .wave()
                        .grid()
                        .iter()
                        .map(|cell| cell.num_possible())
                        .collect();
                    for (before, after) in previous.iter().zip(current.iter()) {
                        assert!(after <= before, "cells never regain patterns");
                    }
                    previous = current;
                }
            }
        }
    }
}
