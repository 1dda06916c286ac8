use coord_2d::Coord;
use coord_2d::Size;
use grid_2d::Grid;

use crate::error::Error;
use crate::indexer::ColourId;
use crate::model::Model;
use crate::wave::Wave;

/// Reads a fully collapsed wave back into a colour grid of the wave's size,
/// taking the top-left pixel of each cell's surviving pattern.
pub fn render(wave: &Wave, model: &Model) -> Result<Grid<ColourId>, Error> {
    let mut out = Grid::new_clone(wave.size(), 0 as ColourId);
    for (coord, cell) in wave.grid().enumerate() {
        let pattern_id = cell
            .chosen_pattern()
            .map_err(|_| Error::NotFullyCollapsed)?;
        *out.get_checked_mut(coord) = model.pattern(pattern_id).top_left();
    }
    Ok(out)
}

/// Alternative mode: every cell expands to its full pattern window, so the
/// output is the wave size scaled by the pattern size.
pub fn render_tiled(wave: &Wave, model: &Model) -> Result<Grid<ColourId>, Error> {
    let pattern_size = model.pattern_size() as i32;
    let out_size = Size::new(
        wave.size().width() * model.pattern_size(),
        wave.size().height() * model.pattern_size(),
    );
    let mut out = Grid::new_clone(out_size, 0 as ColourId);
    for (coord, cell) in wave.grid().enumerate() {
        let pattern_id = cell
            .chosen_pattern()
            .map_err(|_| Error::NotFullyCollapsed)?;
        let pattern = model.pattern(pattern_id);
        for dy in 0..pattern_size {
            for dx in 0..pattern_size {
                let out_coord =
                    Coord::new(coord.x * pattern_size + dx, coord.y * pattern_size + dy);
                *out.get_checked_mut(out_coord) = pattern.get_checked(Coord::new(dx, dy));
            }
        }
    }
    Ok(out)
}
