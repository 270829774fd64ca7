use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::rules::{apply_move, RuleError};
use super::state::{Board, CellIndex, GameOutcome, Mark};
use crate::ai::{AiAgent, AiConfig, AiDifficulty, AiStrategy};

const DEFAULT_ROUNDS: u32 = 6;
const DEFAULT_THINK_DELAY_MS: u32 = 500;

fn default_rounds() -> u32 {
    DEFAULT_ROUNDS
}

fn default_think_delay_ms() -> u32 {
    DEFAULT_THINK_DELAY_MS
}

/// 一局会话的配置；前端可只传部分字段。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub difficulty: AiDifficulty,
    /// 覆盖难度自带的策略。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<AiStrategy>,
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    #[serde(default = "default_think_delay_ms")]
    pub think_delay_ms: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl SessionConfig {
    pub fn new(difficulty: AiDifficulty) -> Self {
        Self {
            difficulty,
            strategy: None,
            rounds: DEFAULT_ROUNDS,
            think_delay_ms: DEFAULT_THINK_DELAY_MS,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_strategy(mut self, strategy: AiStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        if self.rounds == 0 {
            return Err(RuleError::invalid_input("a session needs at least one round"));
        }
        Ok(())
    }

    pub fn ai_config(&self) -> AiConfig {
        let config = AiConfig::from_difficulty(self.difficulty)
            .with_think_delay(Duration::from_millis(u64::from(self.think_delay_ms)));
        match self.strategy {
            Some(strategy) => config.with_strategy(strategy),
            None => config,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig::new(AiDifficulty::Hard)
    }
}

/// 回合状态机：人类先手，双方交替，直到胜负或和棋。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TurnState {
    AwaitingPlayerMove,
    AwaitingComputerMove,
    Won { mark: Mark },
    Drawn,
}

impl TurnState {
    fn after(outcome: GameOutcome, mover: Mark) -> Self {
        match outcome {
            GameOutcome::Win { mark } => TurnState::Won { mark },
            GameOutcome::Draw => TurnState::Drawn,
            GameOutcome::Ongoing if mover == Mark::PLAYER => TurnState::AwaitingComputerMove,
            GameOutcome::Ongoing => TurnState::AwaitingPlayerMove,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, TurnState::Won { .. } | TurnState::Drawn)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub player: u32,
    pub computer: u32,
    pub draw: u32,
}

impl Tally {
    fn record(&mut self, outcome: GameOutcome) {
        match outcome {
            GameOutcome::Win { mark } if mark == Mark::PLAYER => self.player += 1,
            GameOutcome::Win { .. } => self.computer += 1,
            GameOutcome::Draw => self.draw += 1,
            GameOutcome::Ongoing => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionVerdict {
    PlayerWins,
    ComputerWins,
    Tie,
}

impl SessionVerdict {
    pub fn message(&self) -> &'static str {
        match self {
            SessionVerdict::PlayerWins => "You won this session, congratulations",
            SessionVerdict::ComputerWins => "The Winner for this session is Computer",
            SessionVerdict::Tie => "It's a draw for this session",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum SessionEvent {
    MovePlayed { mark: Mark, index: CellIndex },
    RoundEnded { round: u32, outcome: GameOutcome },
    RoundStarted { round: u32 },
    SessionRestarted,
}

/// 前端渲染所需的完整快照。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub board: Board,
    pub turn: TurnState,
    pub outcome: GameOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_line: Option<[CellIndex; 3]>,
    pub round: u32,
    pub rounds: u32,
    pub results: Tally,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<SessionVerdict>,
    pub strategy: AiStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub snapshot: SessionSnapshot,
    pub events: Vec<SessionEvent>,
}

pub struct Session {
    config: SessionConfig,
    agent: AiAgent,
    board: Board,
    turn: TurnState,
    round: u32,
    results: Tally,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, RuleError> {
        config.validate()?;
        let agent = match config.seed {
            Some(seed) => AiAgent::with_seed(config.ai_config(), seed),
            None => AiAgent::new(config.ai_config()),
        };
        debug!(
            difficulty = ?config.difficulty,
            strategy = ?agent.config().strategy,
            rounds = config.rounds,
            "session created"
        );
        Ok(Self {
            config,
            agent,
            board: Board::empty(),
            turn: TurnState::AwaitingPlayerMove,
            round: 1,
            results: Tally::default(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> TurnState {
        self.turn
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn results(&self) -> Tally {
        self.results
    }

    pub fn strategy(&self) -> AiStrategy {
        self.agent.config().strategy
    }

    /// 人类落子。
    pub fn play(&mut self, index: CellIndex) -> Result<Resolution, RuleError> {
        match self.turn {
            TurnState::AwaitingPlayerMove => {}
            TurnState::AwaitingComputerMove => return Err(RuleError::NotPlayerTurn),
            _ => {
                return Err(RuleError::PreconditionViolation {
                    outcome: self.board.outcome(),
                })
            }
        }
        let events = self.place(index, Mark::PLAYER)?;
        Ok(self.resolution(events))
    }

    /// 电脑按当前难度思考并落子。
    pub fn computer_move(&mut self) -> Result<Resolution, RuleError> {
        self.ensure_computer_turn()?;
        let decision = self.agent.decide_action(&self.board, Mark::COMPUTER)?;
        let events = self.place(decision.index, Mark::COMPUTER)?;
        Ok(self.resolution(events))
    }

    /// 应用在别处（延时 Promise）算好的电脑落子。
    pub fn apply_computer_move(&mut self, index: CellIndex) -> Result<Resolution, RuleError> {
        self.ensure_computer_turn()?;
        let events = self.place(index, Mark::COMPUTER)?;
        Ok(self.resolution(events))
    }

    pub fn next_round(&mut self) -> Result<Resolution, RuleError> {
        if self.round >= self.config.rounds {
            return Err(RuleError::SessionComplete {
                rounds: self.config.rounds,
            });
        }
        self.round += 1;
        self.board = Board::empty();
        self.turn = TurnState::AwaitingPlayerMove;
        debug!(round = self.round, "round started");
        Ok(self.resolution(vec![SessionEvent::RoundStarted { round: self.round }]))
    }

    pub fn restart(&mut self) -> Resolution {
        self.board = Board::empty();
        self.turn = TurnState::AwaitingPlayerMove;
        self.round = 1;
        self.results = Tally::default();
        debug!("session restarted");
        self.resolution(vec![SessionEvent::SessionRestarted])
    }

    pub fn status_text(&self) -> String {
        match self.turn {
            TurnState::Won { mark } if mark == Mark::PLAYER => "The winner is Human!".into(),
            TurnState::Won { .. } => "The winner is Computer!".into(),
            TurnState::Drawn => "It's a draw!".into(),
            TurnState::AwaitingPlayerMove => "Next player is Human".into(),
            TurnState::AwaitingComputerMove => "Next player is Computer".into(),
        }
    }

    /// 进入最后一回合后才给出会话结论，并随比分实时更新。
    pub fn verdict(&self) -> Option<SessionVerdict> {
        if self.round < self.config.rounds {
            return None;
        }
        let Tally {
            player, computer, ..
        } = self.results;
        Some(if player > computer {
            SessionVerdict::PlayerWins
        } else if computer > player {
            SessionVerdict::ComputerWins
        } else {
            SessionVerdict::Tie
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            board: self.board,
            turn: self.turn,
            outcome: self.board.outcome(),
            winning_line: super::state::winning_line(&self.board),
            round: self.round,
            rounds: self.config.rounds,
            results: self.results,
            status: self.status_text(),
            verdict: self.verdict(),
            strategy: self.strategy(),
        }
    }

    fn ensure_computer_turn(&self) -> Result<(), RuleError> {
        match self.turn {
            TurnState::AwaitingComputerMove => Ok(()),
            TurnState::AwaitingPlayerMove => Err(RuleError::NotComputerTurn),
            _ => Err(RuleError::PreconditionViolation {
                outcome: self.board.outcome(),
            }),
        }
    }

    fn place(&mut self, index: CellIndex, mark: Mark) -> Result<Vec<SessionEvent>, RuleError> {
        let (board, outcome) = apply_move(&self.board, index, mark)?;
        self.board = board;
        self.turn = TurnState::after(outcome, mark);

        let mut events = vec![SessionEvent::MovePlayed { mark, index }];
        if self.turn.is_finished() {
            self.results.record(outcome);
            debug!(round = self.round, ?outcome, "round ended");
            events.push(SessionEvent::RoundEnded {
                round: self.round,
                outcome,
            });
        }
        Ok(events)
    }

    fn resolution(&self, events: Vec<SessionEvent>) -> Resolution {
        Resolution {
            snapshot: self.snapshot(),
            events,
        }
    }
}
