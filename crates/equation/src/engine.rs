//! Tile evaluation entry point

use crate::broadcast::assign;
use crate::cast::TileCaster;
use crate::context::EvalContext;
use crate::error::{EquationError, Result};
use crate::params::{EquationParams, Keywordlist, Property};
use crate::parser::evaluate_value;
use bandcalc_core::{IRect, ScalarType, Tile, TileSource};
use std::sync::Arc;
use tracing::{debug, warn};

/// Evaluates a band-algebra equation one output tile at a time.
///
/// Inputs are connected in order and referenced from the equation as
/// `im[0]`, `im[1]`, and so on. The engine owns its output tile and reuses
/// it between requests. An empty equation passes input 0 through untouched.
///
/// An engine is not shared between threads; create one per worker.
///
/// # Example
///
/// ```ignore
/// let mut engine = EquationCombiner::new("(im[0] - im[1]) / (im[0] + im[1])");
/// engine.connect(nir);
/// engine.connect(red);
/// let ndvi = engine.get_tile(&IRect::new(0, 0, 256, 256), 0)?;
/// ```
pub struct EquationCombiner {
    params: EquationParams,
    sources: Vec<Arc<dyn TileSource>>,
    output_bands: Option<usize>,
    tile: Option<Tile>,
    caster: TileCaster,
}

impl Default for EquationCombiner {
    fn default() -> Self {
        Self::with_params(EquationParams::default())
    }
}

impl EquationCombiner {
    pub fn new(equation: impl Into<String>) -> Self {
        Self::with_params(EquationParams::new(equation))
    }

    pub fn with_params(params: EquationParams) -> Self {
        let caster = TileCaster::new(params.output_scalar_type);
        Self {
            params,
            sources: Vec::new(),
            output_bands: None,
            tile: None,
            caster,
        }
    }

    /// Builder: fix the output band count instead of following the inputs
    pub fn with_output_bands(mut self, bands: usize) -> Self {
        self.set_output_bands(Some(bands));
        self
    }

    // Inputs

    /// Append an input; its index is the number of inputs connected before it
    pub fn connect(&mut self, source: Arc<dyn TileSource>) -> usize {
        self.sources.push(source);
        let index = self.sources.len() - 1;
        debug!(index, "connected input");
        index
    }

    pub fn disconnect_all(&mut self) {
        self.sources.clear();
    }

    pub fn number_of_inputs(&self) -> usize {
        self.sources.len()
    }

    pub fn sources(&self) -> &[Arc<dyn TileSource>] {
        &self.sources
    }

    // Parameters

    pub fn params(&self) -> &EquationParams {
        &self.params
    }

    pub fn set_params(&mut self, params: EquationParams) {
        self.params = params;
        self.caster.set_scalar_type(self.params.output_scalar_type);
    }

    pub fn equation(&self) -> &str {
        &self.params.equation
    }

    pub fn set_equation(&mut self, equation: impl Into<String>) {
        self.params.equation = equation.into();
        debug!(equation = %self.params.equation, "equation set");
    }

    pub fn set_output_scalar_type(&mut self, scalar_type: ScalarType) {
        self.params.output_scalar_type = scalar_type;
        self.caster.set_scalar_type(scalar_type);
    }

    pub fn set_output_bands(&mut self, bands: Option<usize>) {
        self.output_bands = bands.map(|b| b.max(1));
    }

    /// Whether requests bypass evaluation and return input 0's tiles
    pub fn is_passthrough(&self) -> bool {
        self.params.equation.is_empty()
    }

    // Output metadata

    pub fn number_of_output_bands(&self) -> usize {
        if self.is_passthrough()
            && let Some(src) = self.sources.first()
        {
            return src.number_of_output_bands();
        }
        self.output_bands.unwrap_or_else(|| {
            self.sources
                .iter()
                .map(|s| s.number_of_output_bands())
                .max()
                .unwrap_or(1)
                .max(1)
        })
    }

    pub fn output_scalar_type(&self) -> ScalarType {
        match self.passthrough_source() {
            Some(src) => src.output_scalar_type(),
            None => self.params.output_scalar_type,
        }
    }

    pub fn null_pixel_value(&self, band: usize) -> f64 {
        match self.passthrough_source() {
            Some(src) => src.null_pixel_value(band),
            None => self.params.output_scalar_type.default_null(),
        }
    }

    pub fn min_pixel_value(&self, band: usize) -> f64 {
        match self.passthrough_source() {
            Some(src) => src.min_pixel_value(band),
            None => self.params.output_scalar_type.default_min(),
        }
    }

    pub fn max_pixel_value(&self, band: usize) -> f64 {
        match self.passthrough_source() {
            Some(src) => src.max_pixel_value(band),
            None => self.params.output_scalar_type.default_max(),
        }
    }

    fn passthrough_source(&self) -> Option<&Arc<dyn TileSource>> {
        if self.is_passthrough() {
            self.sources.first()
        } else {
            None
        }
    }

    /// The engine's output tile as left by the last request, before the
    /// output cast
    pub fn output_tile(&self) -> Option<&Tile> {
        self.tile.as_ref()
    }

    // Evaluation

    /// Evaluate the equation over `rect` at `res_level`.
    ///
    /// On failure the output tile is left blank and the error is returned;
    /// the engine stays usable for later requests.
    pub fn get_tile(&mut self, rect: &IRect, res_level: u32) -> Result<Tile> {
        if self.is_passthrough() {
            let src = self.sources.first().ok_or(EquationError::NoInputs)?;
            return src
                .get_tile(rect, res_level)
                .map_err(|source| EquationError::SourceFailed { index: 0, source })?
                .ok_or(EquationError::NoTile { index: 0 });
        }

        let mut tile = self.take_output_tile(rect);
        let bands = 0..tile.number_of_bands();
        let min = bands.clone().map(|b| tile.min_pixel(b)).collect();
        let max = bands.map(|b| tile.max_pixel(b)).collect();

        let ctx = EvalContext::new(&self.sources, *rect, res_level).with_output_range(min, max);
        let assigned =
            evaluate_value(&self.params.equation, &ctx).and_then(|value| assign(&mut tile, &value));

        let result = match assigned {
            Ok(()) => {
                tile.validate();
                Ok(self.caster.cast(&tile))
            }
            Err(e) => {
                tile.make_blank();
                warn!(equation = %self.params.equation, error = %e, "equation evaluation failed");
                Err(e)
            }
        };
        self.tile = Some(tile);
        result
    }

    /// Output tile sized for `rect`, blanked, with the output type's range
    fn take_output_tile(&mut self, rect: &IRect) -> Tile {
        let bands = self.number_of_output_bands();
        let st = self.params.output_scalar_type;

        let mut tile = match self.tile.take() {
            Some(mut t) if t.number_of_bands() == bands && t.size_per_band() == rect.size() => {
                t.set_rect(*rect);
                t
            }
            _ => {
                debug!(?rect, bands, "allocating output tile");
                Tile::new(*rect, bands)
            }
        };
        tile.set_valid_range(st.default_min(), st.default_max());
        tile.initialize();
        tile
    }

    // Configuration surface

    pub fn property_names(&self) -> [&'static str; 2] {
        EquationParams::property_names()
    }

    pub fn property(&self, name: &str) -> Option<Property> {
        self.params.property(name)
    }

    pub fn set_property(&mut self, name: &str, value: &str) -> Result<()> {
        self.params.set_property(name, value)?;
        self.caster.set_scalar_type(self.params.output_scalar_type);
        Ok(())
    }

    pub fn save_state(&self, kwl: &mut Keywordlist, prefix: &str) {
        self.params.save_state(kwl, prefix);
    }

    pub fn load_state(&mut self, kwl: &Keywordlist, prefix: &str) {
        self.params.load_state(kwl, prefix);
        self.caster.set_scalar_type(self.params.output_scalar_type);
    }
}

/// Evaluate `equation` once over `rect` with a fresh engine.
///
/// `bands` fixes the output band count; `None` follows the inputs.
pub fn evaluate(
    equation: &str,
    rect: &IRect,
    res_level: u32,
    bands: Option<usize>,
    sources: &[Arc<dyn TileSource>],
) -> Result<Tile> {
    let mut engine = EquationCombiner::new(equation);
    engine.set_output_bands(bands);
    for source in sources {
        engine.connect(Arc::clone(source));
    }
    engine.get_tile(rect, res_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandcalc_core::{MemorySource, TileStatus};
    use ndarray::Array3;

    fn ramp(bands: usize) -> Arc<dyn TileSource> {
        let data = Array3::from_shape_fn((bands, 4, 4), |(b, r, c)| (b * 100 + r * 4 + c) as f64);
        Arc::new(MemorySource::new(data).unwrap().with_null(-1.0))
    }

    fn rect() -> IRect {
        IRect::from_size(4, 4)
    }

    #[test]
    fn test_scalar_equation_fills_tile() {
        let mut engine = EquationCombiner::new("2*3^2");
        engine.connect(ramp(1));
        let tile = engine.get_tile(&rect(), 0).unwrap();
        assert_eq!(tile.status(), TileStatus::Full);
        assert_eq!(tile.get(0, 3, 3).unwrap(), 36.0);
    }

    #[test]
    fn test_image_arithmetic() {
        let mut engine = EquationCombiner::new("im[0] * 2 + 1");
        engine.connect(ramp(1));
        let tile = engine.get_tile(&rect(), 0).unwrap();
        assert_eq!(tile.get(0, 1, 2).unwrap(), 13.0);
    }

    #[test]
    fn test_output_band_count_follows_inputs() {
        let mut engine = EquationCombiner::new("im[0] + im[1]");
        engine.connect(ramp(1));
        engine.connect(ramp(3));
        assert_eq!(engine.number_of_output_bands(), 3);
        let tile = engine.get_tile(&rect(), 0).unwrap();
        assert_eq!(tile.number_of_bands(), 3);
        // band 2 of input 1 plus band 0 of input 0
        assert_eq!(tile.get(2, 0, 1).unwrap(), 201.0 + 1.0);
    }

    #[test]
    fn test_passthrough() {
        let src = ramp(2);
        let mut engine = EquationCombiner::new("");
        engine.connect(Arc::clone(&src));
        let direct = src.get_tile(&rect(), 0).unwrap().unwrap();
        assert_eq!(engine.get_tile(&rect(), 0).unwrap(), direct);
        assert_eq!(engine.null_pixel_value(0), -1.0);
        assert_eq!(engine.number_of_output_bands(), 2);

        let mut empty = EquationCombiner::new("");
        assert!(matches!(
            empty.get_tile(&rect(), 0),
            Err(EquationError::NoInputs)
        ));
    }

    #[test]
    fn test_whitespace_equation_is_evaluated() {
        let mut engine = EquationCombiner::new("  ");
        engine.connect(ramp(1));
        assert!(!engine.is_passthrough());
        assert!(matches!(
            engine.get_tile(&rect(), 0),
            Err(EquationError::Syntax { .. })
        ));
    }

    #[test]
    fn test_failure_leaves_blank_tile_and_recovers() {
        let mut engine = EquationCombiner::new("im[0] + (");
        engine.connect(ramp(1));
        assert!(engine.get_tile(&rect(), 0).is_err());
        assert_eq!(engine.output_tile().map(|t| t.status()), Some(TileStatus::Null));

        engine.set_equation("im[0]");
        let tile = engine.get_tile(&rect(), 0).unwrap();
        assert_eq!(tile.get(0, 0, 3).unwrap(), 3.0);
    }

    #[test]
    fn test_geometry_change_reallocates() {
        let mut engine = EquationCombiner::new("im[0]");
        engine.connect(ramp(1));
        engine.get_tile(&rect(), 0).unwrap();
        let small = engine.get_tile(&IRect::new(1, 1, 2, 2), 0).unwrap();
        assert_eq!(small.width(), 2);
        assert_eq!(small.get(0, 0, 0).unwrap(), 5.0);
    }

    #[test]
    fn test_output_cast_and_metadata() {
        let mut engine = EquationCombiner::new("im[0] / 4");
        engine.connect(ramp(1));
        engine.set_output_scalar_type(ScalarType::UInt8);
        let tile = engine.get_tile(&rect(), 0).unwrap();
        assert_eq!(tile.scalar_type(), ScalarType::UInt8);
        // 0 / 4 narrows up to the u8 minimum
        assert_eq!(tile.get(0, 0, 0).unwrap(), 1.0);
        assert_eq!(tile.get(0, 0, 2).unwrap(), 1.0);
        assert_eq!(tile.get(0, 3, 3).unwrap(), 4.0);
        assert_eq!(engine.max_pixel_value(0), 255.0);
    }

    #[test]
    fn test_free_evaluate() {
        let sources = vec![ramp(1)];
        let tile = evaluate("band(im[0], 0) - 1", &rect(), 0, Some(2), &sources).unwrap();
        assert_eq!(tile.number_of_bands(), 2);
        assert_eq!(tile.get(1, 0, 1).unwrap(), 0.0);
    }
}
