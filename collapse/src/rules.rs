use coord_2d::Coord;
use direction::{Direction, DirectionTable};

use crate::pattern::{Pattern, PatternId, PatternTable};
use crate::pattern_set::PatternSet;

pub const COMPASS_DIRECTIONS: [Direction; 8] = [
    Direction::North,
    Direction::NorthEast,
    Direction::East,
    Direction::SouthEast,
    Direction::South,
    Direction::SouthWest,
    Direction::West,
    Direction::NorthWest,
];

pub const CARDINAL_DIRECTIONS: [Direction; 4] = [
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
];

/// Whether `other` may sit at offset `direction` from `pattern`: the two
/// windows must agree on every pixel of their shared sub-rectangle.
fn are_patterns_compatible(pattern: &Pattern, other: &Pattern, direction: Direction) -> bool {
    let size = pattern.size() as i32;
    let offset = direction.coord();
    for y in 0..size {
        for x in 0..size {
            let in_other = Coord::new(x - offset.x, y - offset.y);
            if in_other.x < 0 || in_other.y < 0 || in_other.x >= size || in_other.y >= size {
                continue;
            }
            if pattern.get_checked(Coord::new(x, y)) != other.get_checked(in_other) {
                return false;
            }
        }
    }
    true
}

/// For every pattern and compass direction, the set of patterns whose overlap
/// agrees. All eight directions are built even when the solver is later run
/// with the cardinal neighbourhood only.
#[derive(Debug, Clone)]
pub struct RuleTable {
    table: PatternTable<DirectionTable<PatternSet>>,
}

impl RuleTable {
    pub fn allowed(&self, pattern_id: PatternId, direction: Direction) -> &PatternSet {
        self.table[pattern_id].get(direction)
    }

    pub fn num_patterns(&self) -> usize {
        self.table.len()
    }
}

pub fn build_rules(patterns: &PatternTable<Pattern>) -> RuleTable {
    let num_patterns = patterns.len();
    let mut num_rules = 0usize;
    let table = patterns
        .iter()
        .map(|pattern| {
            let mut by_direction: DirectionTable<PatternSet> = DirectionTable::default();
            for direction in COMPASS_DIRECTIONS {
                let mut allowed = PatternSet::empty(num_patterns);
                for (other_id, other) in patterns.enumerate() {
                    if are_patterns_compatible(pattern, other, direction) {
                        allowed.insert(other_id);
                    }
                }
                num_rules += allowed.count();
                *by_direction.get_mut(direction) = allowed;
            }
            by_direction
        })
        .collect::<PatternTable<_>>();
    log::debug!(
        "built {} adjacency rules over {} patterns",
        num_rules,
        num_patterns
    );
    RuleTable { table }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pattern::extract_patterns;
    use crate::symmetry::SymmetrySet;
    use coord_2d::Size;
    use grid_2d::Grid;

    fn rules_for(grid: &Grid<u32>, symmetries: &SymmetrySet) -> (RuleTable, usize) {
        let patterns = extract_patterns(grid, 2, symmetries).unwrap();
        let len = patterns.len();
        (build_rules(&patterns), len)
    }

    #[test]
    fn compatible_patterns() {
        // Column gradient: the only horizontal neighbour of a window is the
        // window one step to its east.
        let grid = Grid::new_fn(Size::new(4, 2), |Coord { x, y }| (x + y) as u32);
        let patterns = extract_patterns(&grid, 2, &SymmetrySet::identity()).unwrap();
        assert_eq!(patterns.len(), 3);
        let rules = build_rules(&patterns);
        assert!(rules.allowed(0, Direction::East).contains(1));
        assert!(!rules.allowed(0, Direction::East).contains(0));
        assert!(rules.allowed(1, Direction::West).contains(0));
        assert!(rules.allowed(2, Direction::East).is_empty());
    }

    #[test]
    fn diagonal_overlap_is_single_pixel() {
        let grid = Grid::new_fn(Size::new(4, 4), |Coord { x, y }| ((x + y) % 2) as u32);
        let (rules, num_patterns) = rules_for(&grid, &SymmetrySet::rotations());
        assert_eq!(num_patterns, 2);
        // On a checkerboard the north-east overlap pixel matches the pattern
        // itself, never the opposite phase.
        assert!(rules.allowed(0, Direction::NorthEast).contains(0));
        assert!(!rules.allowed(0, Direction::NorthEast).contains(1));
    }

    #[test]
    fn rule_symmetry_on_three_colour_diagonal() {
        let grid = Grid::new_fn(Size::new(4, 4), |Coord { x, y }| ((x + y) % 3) as u32);
        for symmetries in [SymmetrySet::identity(), SymmetrySet::rotations()] {
            let (rules, num_patterns) = rules_for(&grid, &symmetries);
            for p in 0..num_patterns as PatternId {
                for q in 0..num_patterns as PatternId {
                    for direction in COMPASS_DIRECTIONS {
                        assert_eq!(
                            rules.allowed(p, direction).contains(q),
                            rules.allowed(q, direction.opposite()).contains(p),
                            "rule table must be symmetric under direction negation",
                        );
                    }
                }
            }
        }
    }
}
