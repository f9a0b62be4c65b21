use std::ops::{Index, IndexMut};

use crate::env::Pos;

/// A dense, fixed-size 2-D table with one entry per grid cell
///
/// Entries are stored row-major in a single flat buffer, so cell `(r, c)` lives
/// at `r * cols + c`. Indexing with a [`Pos`] panics if the position is outside
/// the grid; use [`Grid::get`] when that is not known in advance.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    cells: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Clone> Grid<T> {
    /// Constructs a `rows x cols` grid with every cell set to `value`
    pub fn new(rows: usize, cols: usize, value: T) -> Self {
        Self {
            cells: vec![value; rows * cols],
            rows,
            cols,
        }
    }

    /// Set every cell to `value`
    pub fn fill(&mut self, value: T) {
        self.cells.fill(value);
    }
}

impl<T> Grid<T> {
    /// Grid dimensions as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn offset(&self, pos: Pos) -> Option<usize> {
        let (r, c) = pos;
        (r >= 0 && c >= 0 && (r as usize) < self.rows && (c as usize) < self.cols)
            .then(|| r as usize * self.cols + c as usize)
    }

    pub fn contains(&self, pos: Pos) -> bool {
        self.offset(pos).is_some()
    }

    pub fn get(&self, pos: Pos) -> Option<&T> {
        self.offset(pos).map(|i| &self.cells[i])
    }

    /// Every position in raster (row-major) order
    pub fn positions(&self) -> impl Iterator<Item = Pos> {
        let cols = self.cols;
        (0..self.rows * self.cols).map(move |i| ((i / cols) as i32, (i % cols) as i32))
    }

    /// Iterate over `(pos, value)` pairs in raster order
    pub fn iter(&self) -> impl Iterator<Item = (Pos, &T)> {
        self.positions().zip(self.cells.iter())
    }

    /// Iterate over the rows as slices
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // `max(1)` keeps `chunks` happy on a zero-column grid
        self.cells.chunks(self.cols.max(1))
    }

    /// Get a slice view of the flat row-major buffer
    pub fn view(&self) -> &[T] {
        &self.cells
    }
}

impl<T> Index<Pos> for Grid<T> {
    type Output = T;

    fn index(&self, pos: Pos) -> &Self::Output {
        let i = self
            .offset(pos)
            .unwrap_or_else(|| panic!("{pos:?} is outside a {}x{} grid", self.rows, self.cols));
        &self.cells[i]
    }
}

impl<T> IndexMut<Pos> for Grid<T> {
    fn index_mut(&mut self, pos: Pos) -> &mut Self::Output {
        let (rows, cols) = (self.rows, self.cols);
        let i = self
            .offset(pos)
            .unwrap_or_else(|| panic!("{pos:?} is outside a {rows}x{cols} grid"));
        &mut self.cells[i]
    }
}
