use coord_2d::Coord;
use grid_2d::Grid;
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use std::iter;
use std::ops::{Index, IndexMut};
use std::slice;

use crate::error::Error;
use crate::indexer::ColourId;
use crate::symmetry::{Symmetry, SymmetrySet};

pub type PatternId = u32;

/// Dense storage for anything keyed by pattern id.
#[derive(Default, Clone, Debug)]
pub struct PatternTable<T> {
    table: Vec<T>,
}

impl<T> PatternTable<T> {
    pub fn from_vec(table: Vec<T>) -> Self {
        Self { table }
    }
    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
    pub fn iter(&self) -> slice::Iter<T> {
        self.table.iter()
    }
    pub fn enumerate(&self) -> impl Iterator<Item = (PatternId, &T)> {
        self.iter()
            .enumerate()
            .map(|(index, item)| (index as PatternId, item))
    }
}

impl<T> iter::FromIterator<T> for PatternTable<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            table: Vec::from_iter(iter),
        }
    }
}

impl<T> Index<PatternId> for PatternTable<T> {
    type Output = T;
    fn index(&self, index: PatternId) -> &Self::Output {
        self.table.index(index as usize)
    }
}

impl<T> IndexMut<PatternId> for PatternTable<T> {
    fn index_mut(&mut self, index: PatternId) -> &mut Self::Output {
        self.table.index_mut(index as usize)
    }
}

/// A square window of colour ids cut from the input, together with how often
/// it (or a symmetry variant of it) occurred there.
#[derive(Debug, Clone)]
pub struct Pattern {
    id: PatternId,
    size: u32,
    pixels: Vec<ColourId>,
    weight: u32,
    probability: f64,
}

impl Pattern {
    pub fn id(&self) -> PatternId {
        self.id
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn get_checked(&self, coord: Coord) -> ColourId {
        let size = self.size as i32;
        if coord.x < 0 || coord.y < 0 || coord.x >= size || coord.y >= size {
            panic!("coord is out of bounds");
        }
        self.pixels[(coord.y * size + coord.x) as usize]
    }

    /// The canonical value a collapsed cell renders as.
    pub fn top_left(&self) -> ColourId {
        self.pixels[0]
    }
}

fn copy_window(grid: &Grid<ColourId>, top_left: Coord, pattern_size: u32) -> Vec<ColourId> {
    let mut window = Vec::with_capacity((pattern_size * pattern_size) as usize);
    for dy in 0..pattern_size as i32 {
        for dx in 0..pattern_size as i32 {
            window.push(*grid.get_checked(top_left + Coord::new(dx, dy)));
        }
    }
    window
}

fn transform_window(window: &[ColourId], pattern_size: u32, symmetry: Symmetry) -> Vec<ColourId> {
    let size = pattern_size as i32;
    let mut transformed = Vec::with_capacity(window.len());
    for y in 0..size {
        for x in 0..size {
            let source = symmetry.transform_coord(pattern_size, Coord::new(x, y));
            transformed.push(window[(source.y * size + source.x) as usize]);
        }
    }
    transformed
}

/// Cuts every in-bounds window out of the grid, applies the enabled symmetry
/// transforms and folds structurally equal results into one weighted pattern.
/// Ids follow insertion order, so they are a pure function of the input, the
/// traversal order and the symmetry set.
pub fn extract_patterns(
    grid: &Grid<ColourId>,
    pattern_size: u32,
    symmetries: &SymmetrySet,
) -> Result<PatternTable<Pattern>, Error> {
    if pattern_size < 2 {
        return Err(Error::InvalidParameter("pattern size must be at least 2"));
    }
    if symmetries.is_empty() {
        return Err(Error::InvalidParameter("symmetry set must be non-empty"));
    }
    let input_size = grid.size();
    if input_size.width() < pattern_size || input_size.height() < pattern_size {
        return Err(Error::InputTooSmall {
            input: input_size,
            pattern_size,
        });
    }
    let mut ids: HashMap<Vec<ColourId>, PatternId> = HashMap::new();
    let mut patterns: Vec<Pattern> = Vec::new();
    for y in 0..=(input_size.height() - pattern_size) as i32 {
        for x in 0..=(input_size.width() - pattern_size) as i32 {
            let window = copy_window(grid, Coord::new(x, y), pattern_size);
            for symmetry in symmetries.iter() {
                let pixels = transform_window(&window, pattern_size, symmetry);
                match ids.entry(pixels) {
                    Entry::Occupied(entry) => {
                        patterns[*entry.get() as usize].weight += 1;
                    }
                    Entry::Vacant(entry) => {
                        let id = patterns.len() as PatternId;
                        patterns.push(Pattern {
                            id,
                            size: pattern_size,
                            pixels: entry.key().clone(),
                            weight: 1,
                            probability: 0.0,
                        });
                        entry.insert(id);
                    }
                }
            }
        }
    }
    let sum_weight: u32 = patterns.iter().map(|pattern| pattern.weight).sum();
    for pattern in patterns.iter_mut() {
        pattern.probability = f64::from(pattern.weight) / f64::from(sum_weight);
    }
    log::debug!(
        "extracted {} patterns of size {} (total weight {})",
        patterns.len(),
        pattern_size,
        sum_weight
    );
    Ok(PatternTable::from_vec(patterns))
}
