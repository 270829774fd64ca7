use std::str::FromStr;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::{ensure_ongoing, evaluate, Board, CellIndex, GameOutcome, Mark, RuleError};

const DEFAULT_THINK_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiStrategy {
    Random,
    Optimal,
}

impl FromStr for AiStrategy {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(AiStrategy::Random),
            "optimal" | "minimax" => Ok(AiStrategy::Optimal),
            other => Err(RuleError::invalid_input(format!("unknown strategy `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    Hard,
}

impl AiDifficulty {
    pub fn strategy(self) -> AiStrategy {
        match self {
            AiDifficulty::Easy => AiStrategy::Random,
            AiDifficulty::Hard => AiStrategy::Optimal,
        }
    }
}

impl FromStr for AiDifficulty {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" | "random" => Ok(AiDifficulty::Easy),
            "hard" | "optimal" | "minimax" => Ok(AiDifficulty::Hard),
            other => Err(RuleError::invalid_input(format!("unknown difficulty `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub strategy: AiStrategy,
    /// 前端在电脑落子前等待的时长，核心计算本身不等待。
    pub think_delay: Duration,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        Self {
            strategy: difficulty.strategy(),
            think_delay: DEFAULT_THINK_DELAY,
        }
    }

    pub fn with_strategy(mut self, strategy: AiStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_think_delay(mut self, delay: Duration) -> Self {
        self.think_delay = delay;
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::Hard)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiDecision {
    pub index: CellIndex,
    pub mark: Mark,
    /// +1 必胜，0 和棋，-1 必败（随机策略为落子后的即时局面分）。
    pub evaluation: i8,
    pub nodes: u64,
    pub strategy: AiStrategy,
}

struct SearchStats {
    nodes: u64,
}

impl SearchStats {
    fn new() -> Self {
        Self { nodes: 0 }
    }
}

pub struct AiAgent {
    config: AiConfig,
    rng: SmallRng,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn decide_action(&mut self, board: &Board, mark: Mark) -> Result<AiDecision, RuleError> {
        ensure_ongoing(board)?;
        let strategy = self.config.strategy;
        let decision = match strategy {
            AiStrategy::Random => {
                let index = random_move(board, &mut self.rng)?;
                let child = board.with_mark(index, mark)?;
                AiDecision {
                    index,
                    mark,
                    evaluation: terminal_score(&evaluate(&child), mark).unwrap_or(0),
                    nodes: 1,
                    strategy,
                }
            }
            AiStrategy::Optimal => {
                let mut stats = SearchStats::new();
                let (index, evaluation) = search_root(board, mark, &mut stats)?;
                AiDecision {
                    index,
                    mark,
                    evaluation,
                    nodes: stats.nodes,
                    strategy,
                }
            }
        };
        debug!(
            index = decision.index,
            %mark,
            evaluation = decision.evaluation,
            nodes = decision.nodes,
            ?strategy,
            "ai decision"
        );
        Ok(decision)
    }
}

/// 按策略为 `mark` 选择下一步。棋局已结束或无空格时返回错误。
pub fn select_move<R: Rng + ?Sized>(
    board: &Board,
    mark: Mark,
    strategy: AiStrategy,
    rng: &mut R,
) -> Result<CellIndex, RuleError> {
    match strategy {
        AiStrategy::Random => random_move(board, rng),
        AiStrategy::Optimal => optimal_move(board, mark),
    }
}

/// 在所有空格中均匀随机选一个。
pub fn random_move<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Result<CellIndex, RuleError> {
    ensure_ongoing(board)?;
    let empty = board.empty_cells();
    empty
        .choose(rng)
        .copied()
        .ok_or(RuleError::PreconditionViolation {
            outcome: evaluate(board),
        })
}

/// 穷举 minimax；同分时取下标最小的格子。
pub fn optimal_move(board: &Board, mark: Mark) -> Result<CellIndex, RuleError> {
    let mut stats = SearchStats::new();
    search_root(board, mark, &mut stats).map(|(index, _)| index)
}

fn search_root(
    board: &Board,
    mark: Mark,
    stats: &mut SearchStats,
) -> Result<(CellIndex, i8), RuleError> {
    ensure_ongoing(board)?;

    let mut best: Option<(CellIndex, i8)> = None;
    for index in board.empty_cells() {
        let child = board.with_mark(index, mark)?;
        let score = minimax_rec(&child, mark, false, stats);
        // 严格大于：后出现的同分格子不会替换已记录的最优解
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }

    best.ok_or(RuleError::PreconditionViolation {
        outcome: evaluate(board),
    })
}

fn terminal_score(outcome: &GameOutcome, root: Mark) -> Option<i8> {
    match outcome {
        GameOutcome::Win { mark } if *mark == root => Some(1),
        GameOutcome::Win { .. } => Some(-1),
        GameOutcome::Draw => Some(0),
        GameOutcome::Ongoing => None,
    }
}

fn minimax_rec(board: &Board, root: Mark, maximizing: bool, stats: &mut SearchStats) -> i8 {
    stats.nodes += 1;

    if let Some(score) = terminal_score(&evaluate(board), root) {
        return score;
    }

    let actor = if maximizing { root } else { root.opponent() };
    let children = board
        .empty_cells()
        .into_iter()
        .filter_map(|index| board.with_mark(index, actor).ok())
        .map(|child| minimax_rec(&child, root, !maximizing, stats));

    if maximizing {
        children.max().unwrap_or(0)
    } else {
        children.min().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Cell;

    fn board(cells: &str) -> Board {
        let mut parsed = [Cell::Empty; 9];
        for (slot, symbol) in parsed.iter_mut().zip(cells.chars()) {
            *slot = match symbol {
                'X' => Cell::X,
                'O' => Cell::O,
                _ => Cell::Empty,
            };
        }
        Board::from_cells(parsed)
    }

    fn play_out(first: Mark) -> GameOutcome {
        let mut current = Board::empty();
        let mut to_move = first;
        loop {
            let outcome = evaluate(&current);
            if !outcome.is_ongoing() {
                return outcome;
            }
            let index = optimal_move(&current, to_move).expect("ongoing board has a move");
            current = current
                .with_mark(index, to_move)
                .expect("selector must pick an empty cell");
            to_move = to_move.opponent();
        }
    }

    #[test]
    fn optimal_blocks_immediate_threat() {
        let current = board("XX..O....");
        assert_eq!(optimal_move(&current, Mark::O), Ok(2));
    }

    #[test]
    fn optimal_takes_win_over_block() {
        // O can finish the middle row; X threatens the top row
        let current = board("XX.OO.X..");
        assert_eq!(optimal_move(&current, Mark::O), Ok(5));
    }

    #[test]
    fn optimal_on_empty_board_follows_index_tie_break() {
        // every opening draws under perfect play, so the earliest cell wins the tie
        let index = optimal_move(&Board::empty(), Mark::O).expect("empty board has moves");
        assert_eq!(index, 0);
        assert!([0, 2, 4, 6, 8].contains(&index), "opening should be corner or center");
    }

    #[test]
    fn optimal_is_deterministic() {
        let current = board("X...O...X");
        let first = optimal_move(&current, Mark::O).expect("board is ongoing");
        for _ in 0..5 {
            assert_eq!(optimal_move(&current, Mark::O), Ok(first));
        }
    }

    #[test]
    fn optimal_answers_opposite_corners_with_an_edge() {
        let current = board("X...O...X");
        let index = optimal_move(&current, Mark::O).expect("board is ongoing");
        assert!([1, 3, 5, 7].contains(&index), "corner reply loses, got {index}");
    }

    #[test]
    fn self_play_always_draws() {
        for game in 0..4 {
            let first = if game % 2 == 0 { Mark::X } else { Mark::O };
            assert_eq!(play_out(first), GameOutcome::Draw, "game {game} first={first}");
        }
    }

    #[test]
    fn optimal_never_loses_to_random_opponent() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut current = Board::empty();
            let mut to_move = Mark::PLAYER;
            while evaluate(&current).is_ongoing() {
                let index = if to_move == Mark::PLAYER {
                    random_move(&current, &mut rng).expect("ongoing board has a move")
                } else {
                    optimal_move(&current, to_move).expect("ongoing board has a move")
                };
                current = current.with_mark(index, to_move).expect("empty cell");
                to_move = to_move.opponent();
            }
            assert_ne!(evaluate(&current), GameOutcome::Win { mark: Mark::PLAYER });
        }
    }

    fn walk_every_human_line(current: Board, finished_games: &mut u32) {
        for index in current.empty_cells() {
            let after_human = current.with_mark(index, Mark::PLAYER).expect("empty cell");
            match evaluate(&after_human) {
                GameOutcome::Win { .. } => panic!("human wins with\n{after_human}"),
                GameOutcome::Draw => {
                    *finished_games += 1;
                    continue;
                }
                GameOutcome::Ongoing => {}
            }

            let reply = optimal_move(&after_human, Mark::COMPUTER).expect("ongoing board");
            let after_computer = after_human
                .with_mark(reply, Mark::COMPUTER)
                .expect("selector must pick an empty cell");
            if evaluate(&after_computer).is_ongoing() {
                walk_every_human_line(after_computer, finished_games);
            } else {
                *finished_games += 1;
            }
        }
    }

    #[test]
    fn optimal_never_loses_to_any_human_line() {
        let mut finished_games = 0;
        walk_every_human_line(Board::empty(), &mut finished_games);
        assert!(finished_games > 0);
    }

    #[test]
    fn sole_empty_cell_is_chosen_by_both_strategies() {
        let current = board("XOXXOO.XO");
        assert_eq!(evaluate(&current), GameOutcome::Ongoing);
        let mut rng = SmallRng::seed_from_u64(1);
        for strategy in [AiStrategy::Random, AiStrategy::Optimal] {
            assert_eq!(select_move(&current, Mark::O, strategy, &mut rng), Ok(6));
        }
    }

    #[test]
    fn random_never_picks_occupied_cell() {
        let current = board("X.O.X.O..");
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..500 {
            let index = random_move(&current, &mut rng).expect("board is ongoing");
            assert_eq!(current.get(index), Some(Cell::Empty));
        }
    }

    #[test]
    fn random_covers_every_empty_cell() {
        let current = board("X...O....");
        let mut rng = SmallRng::seed_from_u64(3);
        let mut seen = [false; 9];
        for _ in 0..500 {
            seen[random_move(&current, &mut rng).expect("board is ongoing")] = true;
        }
        let expected: Vec<bool> = (0..9).map(|i| i != 0 && i != 4).collect();
        assert_eq!(seen.to_vec(), expected);
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let current = Board::empty();
        let mut a = SmallRng::seed_from_u64(99);
        let mut b = SmallRng::seed_from_u64(99);
        for _ in 0..10 {
            assert_eq!(random_move(&current, &mut a), random_move(&current, &mut b));
        }
    }

    #[test]
    fn selectors_reject_finished_boards() {
        let won = board("OOO.XX.X.");
        let drawn = board("XOXXOOOXX");
        let mut rng = SmallRng::seed_from_u64(5);
        for strategy in [AiStrategy::Random, AiStrategy::Optimal] {
            assert_eq!(
                select_move(&won, Mark::X, strategy, &mut rng),
                Err(RuleError::PreconditionViolation {
                    outcome: GameOutcome::Win { mark: Mark::O }
                })
            );
            assert_eq!(
                select_move(&drawn, Mark::X, strategy, &mut rng),
                Err(RuleError::PreconditionViolation {
                    outcome: GameOutcome::Draw
                })
            );
        }
    }

    #[test]
    fn agent_reports_search_statistics() {
        let mut agent = AiAgent::with_seed(AiConfig::from_difficulty(AiDifficulty::Hard), 11);
        let decision = agent
            .decide_action(&board("XX..O...."), Mark::O)
            .expect("board is ongoing");
        assert_eq!(decision.index, 2);
        assert_eq!(decision.strategy, AiStrategy::Optimal);
        assert!(decision.nodes > 1);
    }

    #[test]
    fn seeded_easy_agents_agree() {
        let config = AiConfig::from_difficulty(AiDifficulty::Easy);
        let mut first = AiAgent::with_seed(config.clone(), 2024);
        let mut second = AiAgent::with_seed(config, 2024);
        let current = board("X........");
        for _ in 0..5 {
            assert_eq!(
                first.decide_action(&current, Mark::O),
                second.decide_action(&current, Mark::O)
            );
        }
    }

    #[test]
    fn difficulty_parsing_accepts_aliases() {
        assert_eq!("EASY".parse::<AiDifficulty>(), Ok(AiDifficulty::Easy));
        assert_eq!("minimax".parse::<AiDifficulty>(), Ok(AiDifficulty::Hard));
        assert_eq!("Optimal".parse::<AiStrategy>(), Ok(AiStrategy::Optimal));
        assert!("expert".parse::<AiDifficulty>().is_err());
        assert_eq!(AiDifficulty::Easy.strategy(), AiStrategy::Random);
        assert_eq!(AiConfig::default().strategy, AiStrategy::Optimal);
        assert_eq!(AiConfig::default().think_delay, Duration::from_millis(500));
    }
}
