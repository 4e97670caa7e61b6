//! Othello-style placement puzzle used to drive the search.
//!
//! Pieces are placed one at a time on an empty board, either colour, and
//! every run of opposite-coloured pieces capped by the placed colour is
//! flipped. A finished board scores the number of white pieces that were
//! flipped to black along the way.
//!
//! Fingerprints fold symmetric boards together. Non-square boards use the
//! identity, both mirrors and the half turn; the half turn keeps that set
//! closed under composition, so any two boards related by a symmetry share
//! one fingerprint and so do all of their descendants.

use crate::candidate::Candidate;
use crate::order::Comparator;
use crate::SearchError;
use bincode::{Decode, Encode};
use std::cmp::Reverse;
use std::fmt;

const DIRECTIONS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub enum Cell {
    Empty,
    White,
    Black,
}

impl Cell {
    /// Digit used in fingerprints and placement history.
    pub fn code(self) -> char {
        match self {
            Cell::Empty => '0',
            Cell::White => '1',
            Cell::Black => '2',
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::White => 'W',
            Cell::Black => 'B',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' => Some(Cell::Empty),
            'W' => Some(Cell::White),
            'B' => Some(Cell::Black),
            _ => None,
        }
    }

    fn opposite(self) -> Self {
        match self {
            Cell::White => Cell::Black,
            Cell::Black => Cell::White,
            Cell::Empty => Cell::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub struct FlipCount {
    pub white_to_black: u32,
    pub black_to_white: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Placement {
    pub row: usize,
    pub col: usize,
    pub color: Cell,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.row, self.col, self.color.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Board {
    width: usize,
    height: usize,
    // Column-major: index = row + col * height.
    cells: Vec<Cell>,
    flips: FlipCount,
    history: Vec<Placement>,
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width * height],
            flips: FlipCount::default(),
            history: Vec::new(),
        }
    }

    /// Build a board from rows of `.`, `W` and `B`. No flips or history are
    /// recorded.
    pub fn parse(rows: &[&str]) -> Result<Self, SearchError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.chars().count());
        let mut board = Board::new(width, height);
        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() != width {
                return Err(SearchError::Other(format!("row {} has the wrong width", row)));
            }
            for (col, symbol) in line.chars().enumerate() {
                let cell = Cell::from_symbol(symbol)
                    .ok_or_else(|| SearchError::Other(format!("unknown cell symbol {:?}", symbol)))?;
                let index = board.index(row, col);
                board.cells[index] = cell;
            }
        }
        Ok(board)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn flips(&self) -> FlipCount {
        self.flips
    }

    pub fn history(&self) -> &[Placement] {
        &self.history
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        if row < self.height && col < self.width {
            Some(self.cells[self.index(row, col)])
        } else {
            None
        }
    }

    /// Occupied cells in row-major order.
    pub fn pieces(&self) -> Vec<(usize, usize)> {
        self.coords()
            .filter(|&(row, col)| self.cells[self.index(row, col)] != Cell::Empty)
            .collect()
    }

    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        self.coords()
            .filter(|&(row, col)| self.cells[self.index(row, col)] == Cell::Empty)
            .collect()
    }

    /// Put a piece on an empty cell and flip every run it captures.
    pub fn place(&mut self, row: usize, col: usize, color: Cell) -> Result<(), SearchError> {
        match self.get(row, col) {
            None => {
                return Err(SearchError::Other(format!("cell ({}, {}) is off the board", row, col)));
            }
            Some(Cell::Empty) => {}
            Some(_) => {
                return Err(SearchError::Other(format!("cell ({}, {}) is occupied", row, col)));
            }
        }
        if color == Cell::Empty {
            return Err(SearchError::Other("cannot place an empty piece".to_string()));
        }
        self.put(row, col, color);
        Ok(())
    }

    /// Place on a cell already known to be empty and on the board.
    fn put(&mut self, row: usize, col: usize, color: Cell) {
        let index = self.index(row, col);
        debug_assert_eq!(self.cells[index], Cell::Empty);
        self.cells[index] = color;
        for flipped in self.captured(row, col, color) {
            match self.cells[flipped] {
                Cell::White => self.flips.white_to_black += 1,
                Cell::Black => self.flips.black_to_white += 1,
                Cell::Empty => continue,
            }
            self.cells[flipped] = color;
        }
        self.history.push(Placement { row, col, color });
    }

    /// Rows of symbols, optionally followed by the placement history.
    pub fn render(&self, with_history: bool) -> String {
        let mut out = String::new();
        for row in 0..self.height {
            out.push(if row == 0 { '(' } else { ' ' });
            out.push('\'');
            for col in 0..self.width {
                out.push(self.cells[self.index(row, col)].symbol());
            }
            out.push('\'');
            if row + 1 < self.height {
                out.push_str(",\n");
            } else {
                out.push(')');
            }
        }
        if with_history {
            for placement in &self.history {
                out.push_str(&placement.to_string());
            }
        }
        out
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row + col * self.height
    }

    fn coords(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.height).flat_map(move |row| (0..self.width).map(move |col| (row, col)))
    }

    fn cell_at(&self, row: isize, col: isize) -> Option<Cell> {
        if row < 0 || col < 0 {
            return None;
        }
        self.get(row as usize, col as usize)
    }

    // Indices of opposite-coloured pieces enclosed between (row, col) and
    // another piece of `color`.
    fn captured(&self, row: usize, col: usize, color: Cell) -> Vec<usize> {
        let opponent = color.opposite();
        let mut captured = Vec::new();
        for (dr, dc) in DIRECTIONS {
            let mut run = Vec::new();
            let (mut r, mut c) = (row as isize + dr, col as isize + dc);
            while let Some(cell) = self.cell_at(r, c) {
                if cell == opponent {
                    run.push(self.index(r as usize, c as usize));
                } else {
                    if cell == color {
                        captured.append(&mut run);
                    }
                    break;
                }
                r += dr;
                c += dc;
            }
        }
        captured
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// Board symmetries. The first four form a group on any rectangle; the
/// last four only apply to square boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symmetry {
    Identity,
    MirrorVertical,
    MirrorHorizontal,
    Rotate180,
    Transpose,
    AntiTranspose,
    Rotate90,
    Rotate270,
}

impl Symmetry {
    pub fn for_shape(width: usize, height: usize) -> &'static [Symmetry] {
        static ALL: [Symmetry; 8] = [
            Symmetry::Identity,
            Symmetry::MirrorVertical,
            Symmetry::MirrorHorizontal,
            Symmetry::Rotate180,
            Symmetry::Transpose,
            Symmetry::AntiTranspose,
            Symmetry::Rotate90,
            Symmetry::Rotate270,
        ];
        if width == height { &ALL } else { &ALL[..4] }
    }

    /// Source cell read for target cell (row, col).
    fn source(self, row: usize, col: usize, width: usize, height: usize) -> (usize, usize) {
        match self {
            Symmetry::Identity => (row, col),
            Symmetry::MirrorVertical => (row, width - col - 1),
            Symmetry::MirrorHorizontal => (height - row - 1, col),
            Symmetry::Rotate180 => (height - row - 1, width - col - 1),
            Symmetry::Transpose => (col, row),
            Symmetry::AntiTranspose => (width - col - 1, height - row - 1),
            Symmetry::Rotate90 => (height - col - 1, row),
            Symmetry::Rotate270 => (col, width - row - 1),
        }
    }

    /// Cell codes of the transformed board, row-major.
    pub fn apply(self, board: &Board, width: usize, height: usize) -> String {
        let mut codes = String::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                let (r, c) = self.source(row, col, width, height);
                codes.push(board.get(r, c).map_or('0', Cell::code));
            }
        }
        codes
    }
}

/// Smallest cell-code string over every symmetry of a `width` x `height`
/// board, so boards that differ only by reflection or rotation collide.
pub fn fingerprint(board: &Board, width: usize, height: usize) -> String {
    Symmetry::for_shape(width, height)
        .iter()
        .map(|symmetry| symmetry.apply(board, width, height))
        .min()
        .unwrap_or_default()
}

/// Sum over pieces of the Manhattan distance to the nearest other piece.
pub fn distance_sum(board: &Board) -> usize {
    let pieces = board.pieces();
    pieces
        .iter()
        .map(|&(row, col)| {
            pieces
                .iter()
                .filter(|&&other| other != (row, col))
                .map(|&(r, c)| row.abs_diff(r) + col.abs_diff(c))
                .min()
                .unwrap_or(0)
        })
        .sum()
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct OthelloCandidate {
    place_limit: usize,
    board: Board,
    fingerprint: String,
    distance_sum: usize,
}

impl OthelloCandidate {
    pub fn new(place_limit: usize, board: Board) -> Self {
        let fingerprint = fingerprint(&board, board.width(), board.height());
        let distance_sum = distance_sum(&board);
        Self {
            place_limit,
            board,
            fingerprint,
            distance_sum,
        }
    }

    /// An empty board; its expansion is the usual search seed.
    pub fn start(width: usize, height: usize, place_limit: usize) -> Self {
        Self::new(place_limit, Board::new(width, height))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn place_limit(&self) -> usize {
        self.place_limit
    }

    pub fn distance_sum(&self) -> usize {
        self.distance_sum
    }

    /// Compact pieces first: smaller distance sums pop earlier.
    pub fn comparator() -> Comparator<OthelloCandidate> {
        Comparator::by_key(|candidate: &OthelloCandidate| Reverse(candidate.distance_sum))
    }
}

impl Candidate for OthelloCandidate {
    type Fingerprint = String;
    type Score = u32;

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    fn score(&self) -> u32 {
        self.board.flips().white_to_black
    }

    fn is_terminal(&self) -> bool {
        self.board.history().len() >= self.place_limit
    }

    fn expand(&self) -> Vec<Self> {
        let mut children = Vec::new();
        for (row, col) in self.board.empty_cells() {
            for color in [Cell::White, Cell::Black] {
                let mut next = self.board.clone();
                next.put(row, col, color);
                children.push(OthelloCandidate::new(self.place_limit, next));
            }
        }
        children
    }
}
