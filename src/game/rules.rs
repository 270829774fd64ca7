use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::state::{evaluate, Board, CellIndex, GameOutcome, Mark};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Display, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[display("cell {index} is already occupied")]
    InvalidMoveTarget { index: CellIndex },
    #[display("cell {index} is outside the board")]
    OutOfBounds { index: CellIndex },
    #[display("no move is possible once the game is {outcome:?}")]
    PreconditionViolation { outcome: GameOutcome },
    #[display("it is not the player's turn")]
    NotPlayerTurn,
    #[display("it is not the computer's turn")]
    NotComputerTurn,
    #[display("all {rounds} rounds of the session have been played")]
    SessionComplete { rounds: u32 },
    #[display("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RuleError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        RuleError::InvalidInput {
            message: message.into(),
        }
    }
}

/// 只有进行中且仍有空格的棋盘才允许落子或求解。
pub fn ensure_ongoing(board: &Board) -> Result<(), RuleError> {
    let outcome = evaluate(board);
    if !outcome.is_ongoing() || board.is_full() {
        return Err(RuleError::PreconditionViolation { outcome });
    }
    Ok(())
}

/// 校验并落子，返回新棋盘与落子后的结果。
pub fn apply_move(
    board: &Board,
    index: CellIndex,
    mark: Mark,
) -> Result<(Board, GameOutcome), RuleError> {
    ensure_ongoing(board)?;
    let next = board.with_mark(index, mark)?;
    let outcome = evaluate(&next);
    trace!(index, %mark, ?outcome, "move applied");
    Ok((next, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_move_reports_new_outcome() {
        let board = Board::empty()
            .with_mark(0, Mark::X)
            .and_then(|b| b.with_mark(1, Mark::X))
            .expect("setup moves should succeed");

        let (next, outcome) = apply_move(&board, 2, Mark::X).expect("move should succeed");

        assert_eq!(outcome, GameOutcome::Win { mark: Mark::X });
        assert_eq!(next.count(Mark::X), 3);
        assert_eq!(board.count(Mark::X), 2, "source board is not mutated");
    }

    #[test]
    fn apply_move_rejects_finished_game() {
        let mut board = Board::empty();
        for index in [0, 1, 2] {
            board = board.with_mark(index, Mark::O).expect("cell should be empty");
        }

        let error = apply_move(&board, 5, Mark::X).expect_err("finished game must reject moves");

        assert_eq!(
            error,
            RuleError::PreconditionViolation {
                outcome: GameOutcome::Win { mark: Mark::O }
            }
        );
    }

    #[test]
    fn apply_move_rejects_occupied_cell() {
        let board = Board::empty().with_mark(4, Mark::X).expect("cell should be empty");
        assert_eq!(
            apply_move(&board, 4, Mark::O),
            Err(RuleError::InvalidMoveTarget { index: 4 })
        );
    }

    #[test]
    fn errors_render_for_humans_and_json() {
        let error = RuleError::InvalidMoveTarget { index: 3 };
        assert_eq!(error.to_string(), "cell 3 is already occupied");
        let json = serde_json::to_string(&error).expect("error should serialize");
        assert_eq!(json, r#"{"type":"InvalidMoveTarget","index":3}"#);
    }
}
