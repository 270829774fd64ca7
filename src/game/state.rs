use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::rules::RuleError;

/// 棋盘格子数量（固定 3×3）。
pub const CELL_COUNT: usize = 9;

/// 格子下标，按行优先 0..9。
pub type CellIndex = usize;

/// 八条连线：三行、右列、两条对角线、左列、中列。
pub const LINES: [[CellIndex; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
    [0, 3, 6],
    [1, 4, 7],
];

/// 落子符号。人类执 X 先手，电脑执 O。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub const PLAYER: Mark = Mark::X;
    pub const COMPUTER: Mark = Mark::O;

    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

impl FromStr for Mark {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "X" | "x" => Ok(Mark::X),
            "O" | "o" => Ok(Mark::O),
            other => Err(RuleError::invalid_input(format!("unknown mark `{other}`"))),
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => f.write_str("X"),
            Mark::O => f.write_str("O"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Cell {
    #[default]
    #[serde(rename = "")]
    Empty,
    X,
    O,
}

impl Cell {
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Mark::X),
            Cell::O => Some(Mark::O),
        }
    }

    pub fn is_empty(self) -> bool {
        self == Cell::Empty
    }
}

impl From<Mark> for Cell {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Cell::X,
            Mark::O => Cell::O,
        }
    }
}

/// 对局结果，总是由棋盘即时推导，不单独保存。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameOutcome {
    Ongoing,
    Win { mark: Mark },
    Draw,
}

impl GameOutcome {
    pub fn is_ongoing(&self) -> bool {
        matches!(self, GameOutcome::Ongoing)
    }

    pub fn winner(&self) -> Option<Mark> {
        match self {
            GameOutcome::Win { mark } => Some(*mark),
            _ => None,
        }
    }
}

/// 棋盘快照。值类型，假想落子通过 `with_mark` 产生新棋盘。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Board([Cell; CELL_COUNT]);

impl Board {
    pub fn empty() -> Self {
        Self([Cell::Empty; CELL_COUNT])
    }

    pub fn from_cells(cells: [Cell; CELL_COUNT]) -> Self {
        Self(cells)
    }

    pub fn cells(&self) -> &[Cell; CELL_COUNT] {
        &self.0
    }

    pub fn get(&self, index: CellIndex) -> Option<Cell> {
        self.0.get(index).copied()
    }

    pub fn empty_cells(&self) -> Vec<CellIndex> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_empty())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(|cell| !cell.is_empty())
    }

    pub fn count(&self, mark: Mark) -> usize {
        let target = Cell::from(mark);
        self.0.iter().filter(|cell| **cell == target).count()
    }

    /// 返回落子后的新棋盘；目标越界或已被占用时拒绝，原棋盘不变。
    pub fn with_mark(&self, index: CellIndex, mark: Mark) -> Result<Board, RuleError> {
        match self.get(index) {
            None => Err(RuleError::OutOfBounds { index }),
            Some(cell) if !cell.is_empty() => Err(RuleError::InvalidMoveTarget { index }),
            Some(_) => {
                let mut next = *self;
                next.0[index] = mark.into();
                Ok(next)
            }
        }
    }

    pub fn outcome(&self) -> GameOutcome {
        evaluate(self)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, cells) in self.0.chunks(3).enumerate() {
            if row > 0 {
                writeln!(f)?;
            }
            for cell in cells {
                let symbol = match cell {
                    Cell::Empty => '.',
                    Cell::X => 'X',
                    Cell::O => 'O',
                };
                write!(f, "{symbol}")?;
            }
        }
        Ok(())
    }
}

/// 第一条被同一符号占满的连线。
pub fn winning_line(board: &Board) -> Option<[CellIndex; 3]> {
    LINES.iter().copied().find(|&[a, b, c]| {
        let first = board.0[a];
        !first.is_empty() && first == board.0[b] && first == board.0[c]
    })
}

/// 胜负判定：先查连线，再看是否下满。不校验双方步数是否合法。
pub fn evaluate(board: &Board) -> GameOutcome {
    if let Some(mark) = winning_line(board).and_then(|[a, _, _]| board.0[a].mark()) {
        return GameOutcome::Win { mark };
    }
    if board.is_full() {
        GameOutcome::Draw
    } else {
        GameOutcome::Ongoing
    }
}
