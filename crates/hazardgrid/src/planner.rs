//! A* shortest paths on a 4-connected occupancy grid.
//!
//! Uniform step cost with the Manhattan heuristic, which is admissible and
//! consistent here, so the first pop of the goal is optimal. The open set may
//! hold stale entries for a cell; they are skipped when popped with a `g`
//! worse than the best known. Exact `f` ties resolve in insertion order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::{Error, Result};
use crate::grid::{GridCell, OccupancyGrid};

/// Ordered cells from start to goal inclusive; empty when unreachable.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Path {
    cells: Vec<GridCell>,
}

impl Path {
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<GridCell> {
        self.cells
    }

    /// Number of cells, endpoints included.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` means no path exists.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Moves taken (`len - 1`), or `None` for an empty path.
    pub fn steps(&self) -> Option<usize> {
        self.cells.len().checked_sub(1)
    }

    pub fn start(&self) -> Option<GridCell> {
        self.cells.first().copied()
    }

    pub fn goal(&self) -> Option<GridCell> {
        self.cells.last().copied()
    }
}

/// Search counters, mostly for logs and benches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub pushed: usize,
    pub popped: usize,
    pub expanded: usize,
}

/// Shortest path from `start` to `goal` on `grid`.
///
/// Fails with [`Error::OutOfBounds`] when either endpoint lies outside the
/// grid. Returns `[start]` when `start == goal`, and an empty path when the
/// goal cannot be reached.
pub fn plan(grid: &OccupancyGrid, start: GridCell, goal: GridCell) -> Result<Path> {
    plan_with_stats(grid, start, goal).map(|(path, _)| path)
}

/// [`plan`] plus search counters.
pub fn plan_with_stats(
    grid: &OccupancyGrid,
    start: GridCell,
    goal: GridCell,
) -> Result<(Path, SearchStats)> {
    for cell in [start, goal] {
        if !grid.contains(cell) {
            return Err(Error::OutOfBounds {
                cell,
                rows: grid.rows(),
                cols: grid.cols(),
            });
        }
    }

    let cols = grid.cols();
    let index = |c: GridCell| c.row * cols + c.col;

    let mut g = vec![usize::MAX; grid.rows() * cols];
    let mut came_from: Vec<Option<GridCell>> = vec![None; grid.rows() * cols];
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;
    let mut stats = SearchStats::default();

    g[index(start)] = 0;
    open.push(Reverse((start.manhattan(&goal), seq, start)));
    stats.pushed += 1;

    while let Some(Reverse((f, _, current))) = open.pop() {
        stats.popped += 1;
        if current == goal {
            let path = reconstruct(&came_from, index, start, goal);
            tracing::debug!(
                steps = path.len() - 1,
                popped = stats.popped,
                pushed = stats.pushed,
                "A* reached goal"
            );
            return Ok((Path { cells: path }, stats));
        }

        let g_current = g[index(current)];
        if f > g_current + current.manhattan(&goal) {
            // Superseded by a cheaper push of the same cell.
            continue;
        }
        stats.expanded += 1;

        for next in grid.neighbors4(current) {
            if !grid.is_free(next) {
                continue;
            }
            let tentative = g_current + 1;
            let slot = index(next);
            if tentative < g[slot] {
                g[slot] = tentative;
                came_from[slot] = Some(current);
                seq += 1;
                open.push(Reverse((tentative + next.manhattan(&goal), seq, next)));
                stats.pushed += 1;
            }
        }
    }

    tracing::debug!(
        ?start,
        ?goal,
        popped = stats.popped,
        "A* exhausted open set without reaching goal"
    );
    Ok((Path::default(), stats))
}

fn reconstruct(
    came_from: &[Option<GridCell>],
    index: impl Fn(GridCell) -> usize,
    start: GridCell,
    goal: GridCell,
) -> Vec<GridCell> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from[index(current)] {
            Some(prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
