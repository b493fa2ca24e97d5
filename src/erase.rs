use crate::grid::Grid;
use crate::types::GridShape;

/// Circular brush that clears every channel under it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EraseBrush {
    radius: i32,
}

impl EraseBrush {
    pub fn new(radius: i32) -> Self {
        Self {
            radius: radius.max(0),
        }
    }

    /// Zeroes all cells with `(x-cx)^2 + (y-cy)^2 <= r^2`, clipped to the
    /// grid. Returns the number of cells cleared.
    pub fn erase(&self, grid: &mut Grid, cx: i32, cy: i32) -> usize {
        let shape = grid.shape();
        let r = self.radius as i64;
        let (cx, cy) = (cx as i64, cy as i64);

        let y0 = (cy - r).max(0);
        let y1 = (cy + r).min(shape.height as i64 - 1);
        let x0 = (cx - r).max(0);
        let x1 = (cx + r).min(shape.width as i64 - 1);

        let mut cleared = 0;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy <= r * r {
                    grid.clear_cell(y as usize, x as usize);
                    cleared += 1;
                }
            }
        }
        cleared
    }

    /// Maps a pointer position, relative to the displayed canvas, onto a
    /// grid cell. `None` when the canvas has no area.
    pub fn cell_from_pointer(pointer: [f32; 2], display: [f32; 2], shape: GridShape) -> Option<(i32, i32)> {
        if display[0] <= 0.0 || display[1] <= 0.0 {
            return None;
        }
        let scale_x = shape.width as f32 / display[0];
        let scale_y = shape.height as f32 / display[1];
        Some((
            (pointer[0] * scale_x).floor() as i32,
            (pointer[1] * scale_y).floor() as i32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> Grid {
        let mut grid = Grid::zeros(GridShape::NCA);
        for c in 0..16 {
            for y in 0..64 {
                for x in 0..64 {
                    grid.set(c, y, x, 1.0);
                }
            }
        }
        grid
    }

    #[test]
    fn clears_exactly_the_disc() {
        let mut grid = filled();
        let brush = EraseBrush::new(5);
        brush.erase(&mut grid, 20, 30);

        for y in 0..64i32 {
            for x in 0..64i32 {
                let inside = (x - 20).pow(2) + (y - 30).pow(2) <= 25;
                for c in 0..16 {
                    let value = grid.get(c, y as usize, x as usize);
                    if inside {
                        assert_eq!(value, 0.0, "({x},{y}) c{c} not cleared");
                    } else {
                        assert_eq!(value, 1.0, "({x},{y}) c{c} touched");
                    }
                }
            }
        }
    }

    #[test]
    fn disc_edge_is_inclusive() {
        let mut grid = filled();
        EraseBrush::new(5).erase(&mut grid, 32, 32);
        assert_eq!(grid.get(0, 37, 32), 0.0);
        assert_eq!(grid.get(0, 32, 27), 0.0);
        assert_eq!(grid.get(0, 38, 32), 1.0);
    }

    #[test]
    fn corner_erase_stays_in_bounds() {
        let mut grid = filled();
        let cleared = EraseBrush::new(5).erase(&mut grid, 0, 0);
        // quarter disc of radius 5 including both axes
        assert_eq!(cleared, 26);
        assert_eq!(grid.data().len(), GridShape::NCA.volume());
        assert_eq!(grid.get(15, 0, 0), 0.0);
    }

    #[test]
    fn far_outside_center_is_a_no_op() {
        let mut grid = filled();
        let brush = EraseBrush::new(5);
        assert_eq!(brush.erase(&mut grid, -100, 10), 0);
        assert_eq!(brush.erase(&mut grid, 10, i32::MAX), 0);
        assert_eq!(grid, filled());
    }

    #[test]
    fn zero_radius_clears_one_cell() {
        let mut grid = filled();
        assert_eq!(EraseBrush::new(0).erase(&mut grid, 63, 63), 1);
        assert_eq!(EraseBrush::new(-3).erase(&mut grid, 10, 10), 1);
    }

    #[test]
    fn pointer_is_scaled_to_logical_resolution() {
        let shape = GridShape::NCA;
        assert_eq!(EraseBrush::cell_from_pointer([0.0, 0.0], [512.0, 512.0], shape), Some((0, 0)));
        assert_eq!(EraseBrush::cell_from_pointer([100.0, 511.9], [512.0, 512.0], shape), Some((12, 63)));
        assert_eq!(EraseBrush::cell_from_pointer([32.0, 16.0], [64.0, 32.0], shape), Some((32, 32)));
        assert_eq!(EraseBrush::cell_from_pointer([1.0, 1.0], [0.0, 10.0], shape), None);
    }
}
