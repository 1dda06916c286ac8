//! Overlapping wave function collapse over integer-indexed colour grids.
//! File decoding, CLIs and viewers live in surrounding crates; this one
//! learns the local statistics of an example grid and synthesizes new grids
//! whose every window is locally consistent with it.

pub mod error;
mod indexer;
mod model;
mod pattern;
mod pattern_set;
mod render;
mod rules;
mod solver;
pub mod symmetry;
mod wave;

pub use coord_2d::{Coord, Size};
pub use error::Error;
pub use indexer::{index_image, ColourId, Palette};
pub use model::{build_model, Model, ModelOptions, ModelStats, PatternWeight};
pub use pattern::{extract_patterns, Pattern, PatternId, PatternTable};
pub use pattern_set::PatternSet;
pub use render::{render, render_tiled};
pub use rules::{build_rules, RuleTable};
pub use solver::{generate, Neighbourhood, Selection, SolveOptions, Solver, Step};
pub use symmetry::{Symmetry, SymmetrySet};
pub use wave::{ChosenPatternError, Wave, WaveCell};
