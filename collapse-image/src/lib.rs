//! Feeds image files through the collapse engine: pixels are chunked into
//! tiles, indexed into the core's colour grid, and the collapsed output is
//! reassembled into an image.

pub use coord_2d::{Coord, Size};
use grid_2d::Grid;
use image::{DynamicImage, Rgba, RgbaImage};

pub use collapse::{
    Error, Model, ModelOptions, Neighbourhood, Selection, SolveOptions, Solver, Step, Symmetry,
    SymmetrySet,
};
use collapse::{build_model, index_image, render, render_tiled, ColourId, Palette};

/// One tile of the input: a `tile_size`-sided block of pixels in row-major
/// order. With the default tile size of one this is a single pixel.
type Tile = Vec<Rgba<u8>>;

/// A model learned from an image, together with everything needed to turn a
/// collapsed wave back into pixels.
#[derive(Debug)]
pub struct ImageModel {
    model: Model,
    palette: Palette<Tile>,
    tile_size: u32,
}

impl ImageModel {
    pub fn new(
        image: &DynamicImage,
        pattern_size: u32,
        options: ModelOptions,
    ) -> Result<Self, Error> {
        Self::with_tile_size(image, 1, pattern_size, options)
    }

    /// Chunks the image into `tile_size`-sided blocks before indexing, the
    /// way coarse inputs (e.g. street maps drawn in 8x8 tiles) are meant to
    /// be sampled. The image dimensions must be multiples of the tile size.
    pub fn with_tile_size(
        image: &DynamicImage,
        tile_size: u32,
        pattern_size: u32,
        options: ModelOptions,
    ) -> Result<Self, Error> {
        if tile_size == 0 {
            return Err(Error::InvalidParameter("tile size must be at least 1"));
        }
        let rgba_image = image.to_rgba8();
        if rgba_image.width() % tile_size != 0 || rgba_image.height() % tile_size != 0 {
            return Err(Error::InvalidParameter(
                "image dimensions must be a multiple of the tile size",
            ));
        }
        let size = Size::new(
            rgba_image.width() / tile_size,
            rgba_image.height() / tile_size,
        );
        let tiles = Grid::new_fn(size, |Coord { x, y }| {
            let mut tile = Tile::with_capacity((tile_size * tile_size) as usize);
            for dy in 0..tile_size {
                for dx in 0..tile_size {
                    tile.push(*rgba_image.get_pixel(
                        x as u32 * tile_size + dx,
                        y as u32 * tile_size + dy,
                    ));
                }
            }
            tile
        });
        let (indexed, palette) = index_image(&tiles);
        log::debug!(
            "indexed {}x{} image into {} distinct tiles of size {}",
            rgba_image.width(),
            rgba_image.height(),
            palette.len(),
            tile_size
        );
        let model = build_model(&indexed, pattern_size, options)?;
        Ok(Self {
            model,
            palette,
            tile_size,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Collapses a wave of `output_size` cells and renders it in the
    /// canonical top-left mode. The returned image measures `output_size`
    /// scaled by the tile size.
    pub fn generate(
        &self,
        output_size: Size,
        options: &SolveOptions,
    ) -> Result<DynamicImage, Error> {
        let wave = self.collapse_wave(output_size, options)?;
        let colours = render(&wave, &self.model)?;
        Ok(self.image_from_colours(&colours))
    }

    /// Like [`generate`](Self::generate) but expands every cell to its full
    /// pattern window, scaling the output by the pattern size as well.
    pub fn generate_tiled(
        &self,
        output_size: Size,
        options: &SolveOptions,
    ) -> Result<DynamicImage, Error> {
        let wave = self.collapse_wave(output_size, options)?;
        let colours = render_tiled(&wave, &self.model)?;
        Ok(self.image_from_colours(&colours))
    }

    fn collapse_wave(
        &self,
        output_size: Size,
        options: &SolveOptions,
    ) -> Result<collapse::Wave, Error> {
        let mut solver = Solver::new(&self.model, output_size, options)?;
        loop {
            match solver.step()? {
                Step::Complete => break,
                Step::Restarted => {
                    log::debug!("attempt {} after a contradiction", solver.attempts())
                }
                Step::Incomplete => (),
            }
        }
        Ok(solver.into_wave())
    }

    fn image_from_colours(&self, colours: &Grid<ColourId>) -> DynamicImage {
        let tile_size = self.tile_size;
        let mut rgba_image = RgbaImage::new(
            colours.size().width() * tile_size,
            colours.size().height() * tile_size,
        );
        for (Coord { x, y }, &colour) in colours.enumerate() {
            let tile = self.palette.get_checked(colour);
            for dy in 0..tile_size {
                for dx in 0..tile_size {
                    rgba_image.put_pixel(
                        x as u32 * tile_size + dx,
                        y as u32 * tile_size + dy,
                        tile[(dy * tile_size + dx) as usize],
                    );
                }
            }
        }
        DynamicImage::ImageRgba8(rgba_image)
    }
}

/// One-shot wrapper: learn a model from `image` and collapse one output.
pub fn generate_image(
    image: &DynamicImage,
    pattern_size: u32,
    output_size: Size,
    model_options: ModelOptions,
    solve_options: &SolveOptions,
) -> Result<DynamicImage, Error> {
    ImageModel::new(image, pattern_size, model_options)?.generate(output_size, solve_options)
}
