//! 游戏核心逻辑模块（棋盘、胜负判定、回合会话）。

pub mod rules;
pub mod session;
pub mod state;

pub use rules::{apply_move, ensure_ongoing, RuleError};
pub use session::{
    Resolution,
    Session,
    SessionConfig,
    SessionEvent,
    SessionSnapshot,
    SessionVerdict,
    Tally,
    TurnState,
};
pub use state::{evaluate, winning_line, Board, Cell, CellIndex, GameOutcome, Mark, CELL_COUNT, LINES};
