use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::state::state_model::StateId;

/// `(row, col)` position inside a grid.
pub type Cell = (usize, usize);

/// Fixed token vocabulary of the encoded grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Token {
    Wall = 0,
    Walkable = 1,
    Current = 2,
    Target = 3,
}

impl Token {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Token> {
        match code {
            0 => Some(Token::Wall),
            1 => Some(Token::Walkable),
            2 => Some(Token::Current),
            3 => Some(Token::Target),
            _ => None,
        }
    }

    pub fn is_passable(self) -> bool {
        self != Token::Wall
    }
}

/// Square token grid produced from a state graph and a (current, target) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GridEncoding {
    pub width: usize,
    pub height: usize,

    /// Row-major 2-D tokens
    pub rows: Vec<Vec<Token>>,

    /// Same tokens flattened row by row
    pub flat: Vec<Token>,

    /// Cell → state occupying it
    pub state_at: BTreeMap<Cell, StateId>,

    /// State → the cell it occupies
    pub cell_of: BTreeMap<StateId, Cell>,

    pub current: Cell,
    pub target: Cell,
}

impl GridEncoding {
    /// Token at `cell`; out-of-bounds reads as WALL.
    pub fn token(&self, cell: Cell) -> Token {
        self.rows
            .get(cell.0)
            .and_then(|row| row.get(cell.1))
            .copied()
            .unwrap_or(Token::Wall)
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.0 < self.height && cell.1 < self.width
    }

    /// Flattened numeric codes, the form remote solvers consume.
    pub fn to_codes(&self) -> Vec<u8> {
        self.flat.iter().map(|t| t.code()).collect()
    }

    /// Passable 4-neighbours of `cell`, in up/down/left/right order.
    pub fn passable_neighbors(&self, cell: Cell) -> Vec<Cell> {
        let (r, c) = cell;
        let mut out = Vec::with_capacity(4);
        if r > 0 {
            out.push((r - 1, c));
        }
        if r + 1 < self.height {
            out.push((r + 1, c));
        }
        if c > 0 {
            out.push((r, c - 1));
        }
        if c + 1 < self.width {
            out.push((r, c + 1));
        }
        out.retain(|&n| self.token(n).is_passable());
        out
    }
}

/// 4-directional adjacency.
pub fn is_adjacent(a: Cell, b: Cell) -> bool {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1) == 1
}

/// Text picture of a grid for debugging and the `encode` command.
///
/// `#` wall, `.` carved corridor, `o` state, `S` current, `T` target.
pub fn render(grid: &GridEncoding) -> String {
    let mut out = String::with_capacity((grid.width + 1) * grid.height);
    for (r, row) in grid.rows.iter().enumerate() {
        for (c, token) in row.iter().enumerate() {
            out.push(match token {
                Token::Wall => '#',
                Token::Current => 'S',
                Token::Target => 'T',
                Token::Walkable if grid.state_at.contains_key(&(r, c)) => 'o',
                Token::Walkable => '.',
            });
        }
        out.push('\n');
    }
    out
}
