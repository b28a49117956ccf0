//! Binary occupancy grid consumed by the planner.

use crate::error::{Error, Result};

use super::{GridCell, GridSize};

/// Occupancy state of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    #[default]
    Free,
    Blocked,
}

impl Cell {
    /// Wire encoding: free = 1, blocked = 0.
    pub fn from_value(v: u8) -> Self {
        if v == 0 {
            Cell::Blocked
        } else {
            Cell::Free
        }
    }

    pub fn value(self) -> u8 {
        match self {
            Cell::Free => 1,
            Cell::Blocked => 0,
        }
    }
}

/// Row-major `rows × cols` grid of [`Cell`]s, built fresh per planning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    size: GridSize,
    cells: Vec<Cell>,
}

impl OccupancyGrid {
    /// All-free grid.
    pub fn open(rows: usize, cols: usize) -> Self {
        Self {
            size: GridSize::new(rows, cols),
            cells: vec![Cell::Free; rows * cols],
        }
    }

    /// Build from rows of 0/1 values (1 = free, 0 = blocked).
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut cells = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != n_cols {
                return Err(Error::InvalidInput(format!(
                    "ragged occupancy rows: row {i} has {} cells, expected {n_cols}",
                    row.len()
                )));
            }
            cells.extend(row.iter().map(|&v| Cell::from_value(v)));
        }
        Ok(Self {
            size: GridSize::new(n_rows, n_cols),
            cells,
        })
    }

    pub fn rows(&self) -> usize {
        self.size.rows
    }

    pub fn cols(&self) -> usize {
        self.size.cols
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        self.size.contains(cell)
    }

    /// `None` outside the grid.
    pub fn get(&self, cell: GridCell) -> Option<Cell> {
        self.index(cell).map(|i| self.cells[i])
    }

    /// Outside the grid counts as not free.
    pub fn is_free(&self, cell: GridCell) -> bool {
        self.get(cell) == Some(Cell::Free)
    }

    /// Returns `false` if `cell` lies outside the grid.
    pub fn set(&mut self, cell: GridCell, state: Cell) -> bool {
        match self.index(cell) {
            Some(i) => {
                self.cells[i] = state;
                true
            }
            None => false,
        }
    }

    pub fn set_blocked(&mut self, cell: GridCell) -> bool {
        self.set(cell, Cell::Blocked)
    }

    /// Block every in-range cell of `cells`; returns how many were set.
    pub fn block_cells<'a>(&mut self, cells: impl IntoIterator<Item = &'a GridCell>) -> usize {
        cells
            .into_iter()
            .filter(|&&c| self.set_blocked(c))
            .count()
    }

    pub fn blocked_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == Cell::Blocked).count()
    }

    /// In-grid 4-connected neighbours in the order down, up, right, left.
    pub(crate) fn neighbors4(&self, cell: GridCell) -> impl Iterator<Item = GridCell> + '_ {
        const STEPS: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
        STEPS.iter().filter_map(move |&(dr, dc)| {
            let row = cell.row.checked_add_signed(dr)?;
            let col = cell.col.checked_add_signed(dc)?;
            let next = GridCell::new(row, col);
            self.contains(next).then_some(next)
        })
    }

    fn index(&self, cell: GridCell) -> Option<usize> {
        self.contains(cell)
            .then(|| cell.row * self.size.cols + cell.col)
    }
}
