use crate::types::{CoverageEntry, PlayerColor, Vec2};

/// Arena discretized into square cells; each cell remembers the color that
/// painted it last.
#[derive(Clone, Debug)]
pub struct CoverageGrid {
    cols: usize,
    rows: usize,
    cell_size: f32,
    cells: Vec<Option<PlayerColor>>,
}

impl CoverageGrid {
    pub fn new(cols: usize, rows: usize, cell_size: f32) -> Self {
        Self {
            cols,
            rows,
            cell_size,
            cells: vec![None; cols * rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[Option<PlayerColor>] {
        &self.cells
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    pub fn get(&self, col: usize, row: usize) -> Option<PlayerColor> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells[row * self.cols + col]
    }

    /// Cell containing an arena point, if the point lies inside the grid.
    pub fn cell_at(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let col = (x / self.cell_size).floor();
        let row = (y / self.cell_size).floor();
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some((col, row))
    }

    fn set(&mut self, col: usize, row: usize, color: PlayerColor) {
        self.cells[row * self.cols + col] = Some(color);
    }

    /// Paints every cell touched by a unit-step sampling of the disc around
    /// `center`. Out-of-bounds samples are dropped.
    pub fn paint_disc(&mut self, center: Vec2, radius: f32, color: PlayerColor) {
        let reach = radius.floor() as i32;
        let radius_sq = radius * radius;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if ((dx * dx + dy * dy) as f32) > radius_sq {
                    continue;
                }
                if let Some((col, row)) = self.cell_at(center.x + dx as f32, center.y + dy as f32)
                {
                    self.set(col, row, color);
                }
            }
        }
    }

    /// Paints every cell whose center lies within `radius` of `center`.
    pub fn paint_area(&mut self, center: Vec2, radius: f32, color: PlayerColor) {
        for row in 0..self.rows {
            for col in 0..self.cols {
                let cell_center = Vec2::new(
                    (col as f32 + 0.5) * self.cell_size,
                    (row as f32 + 0.5) * self.cell_size,
                );
                if cell_center.distance_to(center) <= radius {
                    self.set(col, row, color);
                }
            }
        }
    }

    pub fn owned_by(&self, color: PlayerColor) -> usize {
        self.cells
            .iter()
            .filter(|cell| **cell == Some(color))
            .count()
    }

    pub fn coverage_percent(&self, color: PlayerColor) -> f32 {
        let total = self.total_cells();
        if total == 0 {
            return 0.0;
        }
        self.owned_by(color) as f32 / total as f32 * 100.0
    }

    pub fn coverage_for(&self, colors: &[PlayerColor]) -> Vec<CoverageEntry> {
        colors
            .iter()
            .map(|color| CoverageEntry {
                color: *color,
                percent: self.coverage_percent(*color),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn painted(grid: &CoverageGrid, color: PlayerColor) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                if grid.get(col, row) == Some(color) {
                    out.push((col, row));
                }
            }
        }
        out
    }

    #[test]
    fn disc_paints_cells_around_center() {
        let mut grid = CoverageGrid::new(10, 10, 20.0);
        grid.paint_disc(Vec2::new(100.0, 100.0), 10.0, PlayerColor::Red);
        assert_eq!(
            painted(&grid, PlayerColor::Red),
            vec![(4, 4), (5, 4), (4, 5), (5, 5)]
        );
    }

    #[test]
    fn disc_inside_one_cell_paints_only_that_cell() {
        let mut grid = CoverageGrid::new(10, 10, 20.0);
        grid.paint_disc(Vec2::new(50.0, 50.0), 5.0, PlayerColor::Blue);
        assert_eq!(painted(&grid, PlayerColor::Blue), vec![(2, 2)]);
    }

    #[test]
    fn disc_overwrites_previous_owner() {
        let mut grid = CoverageGrid::new(10, 10, 20.0);
        grid.paint_disc(Vec2::new(50.0, 50.0), 5.0, PlayerColor::Blue);
        grid.paint_disc(Vec2::new(50.0, 50.0), 5.0, PlayerColor::Green);
        assert_eq!(grid.get(2, 2), Some(PlayerColor::Green));
        assert_eq!(grid.owned_by(PlayerColor::Blue), 0);
    }

    #[test]
    fn disc_at_corner_drops_out_of_bounds_samples() {
        let mut grid = CoverageGrid::new(4, 4, 20.0);
        grid.paint_disc(Vec2::new(0.0, 0.0), 10.0, PlayerColor::Red);
        assert_eq!(painted(&grid, PlayerColor::Red), vec![(0, 0)]);
    }

    #[test]
    fn area_paint_uses_cell_centers() {
        let mut grid = CoverageGrid::new(10, 10, 10.0);
        grid.paint_area(Vec2::new(55.0, 55.0), 10.0, PlayerColor::Orange);
        assert_eq!(
            painted(&grid, PlayerColor::Orange),
            vec![(5, 4), (4, 5), (5, 5), (6, 5), (5, 6)]
        );
    }

    #[test]
    fn coverage_counts_every_cell() {
        let mut grid = CoverageGrid::new(2, 2, 10.0);
        assert_eq!(grid.coverage_percent(PlayerColor::Red), 0.0);
        grid.paint_disc(Vec2::new(5.0, 5.0), 1.0, PlayerColor::Red);
        assert_eq!(grid.coverage_percent(PlayerColor::Red), 25.0);
        grid.clear();
        assert_eq!(grid.coverage_percent(PlayerColor::Red), 0.0);
    }

    #[test]
    fn cell_at_rejects_points_outside() {
        let grid = CoverageGrid::new(3, 2, 10.0);
        assert_eq!(grid.cell_at(-0.1, 5.0), None);
        assert_eq!(grid.cell_at(30.0, 5.0), None);
        assert_eq!(grid.cell_at(29.9, 19.9), Some((2, 1)));
        assert_eq!(grid.cell_at(f32::NAN, 1.0), None);
    }
}
