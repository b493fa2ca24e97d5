use crate::backend::{BackendError, TensorData};
use crate::types::{GridShape, GridStats, SeedConfig, SeedVariant};

/// Channel-major NCA state: `index(c, y, x) = c*H*W + y*W + x`.
///
/// The buffer length always equals `shape.volume()`; outputs that would
/// break that are refused by [`Grid::from_tensor`].
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    shape: GridShape,
    data: Vec<f32>,
}

impl Grid {
    pub fn zeros(shape: GridShape) -> Self {
        Self {
            shape,
            data: vec![0.0; shape.volume()],
        }
    }

    pub fn seeded(shape: GridShape, seed: &SeedConfig) -> Self {
        let mut grid = Self::zeros(shape);
        grid.seed(seed);
        grid
    }

    pub fn from_tensor(tensor: TensorData, expected: GridShape) -> Result<Self, BackendError> {
        let expected_dims = expected.dims();
        if tensor.dims.as_slice() != expected_dims.as_slice() {
            return Err(BackendError::ShapeMismatch {
                expected: expected_dims.to_vec(),
                actual: tensor.dims,
            });
        }
        if tensor.data.len() != expected.volume() {
            return Err(BackendError::Malformed {
                expected: expected.volume(),
                actual: tensor.data.len(),
            });
        }

        Ok(Self {
            shape: expected,
            data: tensor.data,
        })
    }

    pub fn into_tensor(self) -> TensorData {
        TensorData::new(self.shape.dims().to_vec(), self.data)
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn index(&self, channel: usize, y: usize, x: usize) -> usize {
        channel * self.shape.plane() + y * self.shape.width + x
    }

    pub fn get(&self, channel: usize, y: usize, x: usize) -> f32 {
        self.data[self.index(channel, y, x)]
    }

    pub fn set(&mut self, channel: usize, y: usize, x: usize, value: f32) {
        let idx = self.index(channel, y, x);
        self.data[idx] = value;
    }

    /// Zeroes every channel of one cell.
    pub fn clear_cell(&mut self, y: usize, x: usize) {
        let plane = self.shape.plane();
        let offset = y * self.shape.width + x;
        for channel in 0..self.shape.channels {
            self.data[channel * plane + offset] = 0.0;
        }
    }

    /// Resets to all zeros plus the seed neighborhood at the center.
    pub fn reseed(&mut self, seed: &SeedConfig) {
        self.data.fill(0.0);
        self.seed(seed);
    }

    pub fn stats(&self) -> GridStats {
        let data = self.data();
        if data.is_empty() {
            return GridStats::default();
        }

        let mut sum = 0.0f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &value in data {
            sum += value as f64;
            min = min.min(value);
            max = max.max(value);
        }

        GridStats {
            mean: (sum / data.len() as f64) as f32,
            min,
            max,
        }
    }

    fn seed(&mut self, seed: &SeedConfig) {
        let cy = self.shape.height / 2;
        let cx = self.shape.width / 2;
        let seeded_channels = match seed.variant {
            SeedVariant::Mirrored => self.shape.channels,
            SeedVariant::RgbaOnly => self.shape.channels.min(4),
        };

        let y_end = cy.saturating_add(seed.radius).saturating_add(1).min(self.shape.height);
        let x_end = cx.saturating_add(seed.radius).saturating_add(1).min(self.shape.width);
        for y in cy.saturating_sub(seed.radius)..y_end {
            for x in cx.saturating_sub(seed.radius)..x_end {
                for channel in 0..seeded_channels {
                    self.set(channel, y, x, seed.value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonzero_cells(grid: &Grid) -> usize {
        grid.data().iter().filter(|v| **v != 0.0).count()
    }

    #[test]
    fn index_is_channel_major() {
        let grid = Grid::zeros(GridShape::NCA);
        assert_eq!(grid.index(0, 0, 0), 0);
        assert_eq!(grid.index(0, 0, 1), 1);
        assert_eq!(grid.index(0, 1, 0), 64);
        assert_eq!(grid.index(1, 0, 0), 4096);
        assert_eq!(grid.index(15, 63, 63), 16 * 4096 - 1);
    }

    #[test]
    fn mirrored_seed_fills_every_channel_of_center() {
        let grid = Grid::seeded(GridShape::NCA, &SeedConfig::default());
        assert_eq!(grid.data().len(), GridShape::NCA.volume());
        for channel in 0..16 {
            assert_eq!(grid.get(channel, 32, 32), 0.8);
        }
        assert_eq!(nonzero_cells(&grid), 16);
    }

    #[test]
    fn rgba_only_seed_leaves_hidden_channels_zero() {
        let seed = SeedConfig {
            variant: SeedVariant::RgbaOnly,
            ..SeedConfig::default()
        };
        let grid = Grid::seeded(GridShape::NCA, &seed);
        for channel in 0..4 {
            assert_eq!(grid.get(channel, 32, 32), 0.8);
        }
        for channel in 4..16 {
            assert_eq!(grid.get(channel, 32, 32), 0.0);
        }
        assert_eq!(nonzero_cells(&grid), 4);
    }

    #[test]
    fn seed_radius_covers_square_neighborhood() {
        let seed = SeedConfig {
            variant: SeedVariant::RgbaOnly,
            value: 1.0,
            radius: 1,
        };
        let grid = Grid::seeded(GridShape::NCA, &seed);
        assert_eq!(nonzero_cells(&grid), 9 * 4);
        assert_eq!(grid.get(3, 31, 33), 1.0);
        assert_eq!(grid.get(3, 30, 32), 0.0);
    }

    #[test]
    fn oversized_seed_radius_fills_whole_grid() {
        let seed = SeedConfig {
            radius: usize::MAX,
            ..SeedConfig::default()
        };
        let grid = Grid::seeded(GridShape::NCA, &seed);
        assert_eq!(nonzero_cells(&grid), GridShape::NCA.volume());
        assert_eq!(grid.get(0, 0, 0), 0.8);
        assert_eq!(grid.get(15, 63, 63), 0.8);
    }

    #[test]
    fn reseed_discards_previous_state() {
        let mut grid = Grid::zeros(GridShape::NCA);
        grid.set(5, 0, 0, 3.0);
        grid.reseed(&SeedConfig::default());
        assert_eq!(grid.get(5, 0, 0), 0.0);
        assert_eq!(nonzero_cells(&grid), 16);
        assert_eq!(grid.data().len(), GridShape::NCA.volume());
    }

    #[test]
    fn from_tensor_accepts_matching_shape() {
        let source = Grid::seeded(GridShape::NCA, &SeedConfig::default());
        let grid = Grid::from_tensor(source.clone().into_tensor(), GridShape::NCA).unwrap();
        assert_eq!(grid, source);
    }

    #[test]
    fn from_tensor_rejects_wrong_dims() {
        let tensor = TensorData::new(vec![1, 16, 32, 32], vec![0.0; 16 * 32 * 32]);
        let err = Grid::from_tensor(tensor, GridShape::NCA).unwrap_err();
        assert!(matches!(err, BackendError::ShapeMismatch { .. }));
    }

    #[test]
    fn from_tensor_rejects_short_buffer() {
        let tensor = TensorData::new(vec![1, 16, 64, 64], vec![0.0; 10]);
        let err = Grid::from_tensor(tensor, GridShape::NCA).unwrap_err();
        assert!(matches!(
            err,
            BackendError::Malformed {
                expected: 65536,
                actual: 10
            }
        ));
    }

    #[test]
    fn stats_cover_whole_buffer() {
        let mut grid = Grid::zeros(GridShape::NCA);
        grid.set(0, 0, 0, 2.0);
        grid.set(9, 10, 10, -1.0);
        let stats = grid.stats();
        assert_eq!(stats.max, 2.0);
        assert_eq!(stats.min, -1.0);
        assert!((stats.mean - 1.0 / 65536.0).abs() < 1e-9);
    }

    #[test]
    fn clear_cell_zeroes_all_channels() {
        let mut grid = Grid::seeded(GridShape::NCA, &SeedConfig::default());
        grid.clear_cell(32, 32);
        assert_eq!(nonzero_cells(&grid), 0);
    }
}
