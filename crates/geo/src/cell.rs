/// Represents a location in the spatial plane using row, col coordinates.
/// Cells outside of the raster can be represented using negative indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    pub row: i64,
    pub col: i64,
}

impl Cell {
    pub const fn from_row_col(row: i64, col: i64) -> Self {
        Cell { row, col }
    }

    pub const fn is_valid(&self) -> bool {
        self.row >= 0 && self.col >= 0
    }

    /// The 8 cells sharing an edge or a corner with this cell
    pub fn neighbours(&self) -> impl Iterator<Item = Cell> + '_ {
        const OFFSETS: [(i64, i64); 8] = [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];
        OFFSETS
            .iter()
            .map(move |(dr, dc)| Cell::from_row_col(self.row + dr, self.col + dc))
    }

    pub fn distance(&self, other: &Cell) -> f64 {
        let x = (other.col - self.col) as f64;
        let y = (other.row - self.row) as f64;
        x.hypot(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_neighbours() {
        let cell = Cell::from_row_col(0, 0);
        let neighbours: Vec<Cell> = cell.neighbours().collect();
        assert_eq!(neighbours.len(), 8);
        assert_eq!(neighbours.iter().filter(|c| c.is_valid()).count(), 3);
        assert!(neighbours.iter().all(|c| c.distance(&cell) <= 2f64.sqrt() + 1e-12));
    }
}
