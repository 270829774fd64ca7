pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use tracing::info;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{
    optimal_move, random_move, select_move, AiAgent, AiConfig, AiDecision, AiDifficulty,
    AiStrategy,
};
pub use game::{
    apply_move, ensure_ongoing, evaluate, winning_line, Board, Cell, CellIndex, GameOutcome, Mark,
    Resolution, RuleError, Session, SessionConfig, SessionEvent, SessionSnapshot, SessionVerdict,
    Tally, TurnState, CELL_COUNT, LINES,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    utils::init_logging();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn input_error<E: std::fmt::Display>(error: E) -> JsValue {
    to_js_error(RuleError::invalid_input(error.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn resolution_json(resolution: Resolution) -> Result<String, JsValue> {
    serde_json::to_string(&resolution).map_err(serde_to_js_error)
}

fn parse_board(board: JsValue) -> Result<Board, JsValue> {
    from_value(board).map_err(input_error)
}

#[wasm_bindgen]
pub struct TicTacToe {
    session: Session,
}

#[wasm_bindgen]
impl TicTacToe {
    /// `config_json` 形如 `{"difficulty":"hard","rounds":6}`，缺省为困难模式。
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<TicTacToe, JsValue> {
        let config = match config_json {
            Some(json) => serde_json::from_str(&json).map_err(input_error)?,
            None => SessionConfig::default(),
        };
        let session = Session::new(config).map_err(to_js_error)?;
        info!(
            difficulty = ?session.config().difficulty,
            rounds = session.config().rounds,
            "tic-tac-toe session ready"
        );
        Ok(TicTacToe { session })
    }

    /// 以难度字符串（"easy" / "hard"）快速创建会话。
    #[wasm_bindgen(js_name = "withDifficulty")]
    pub fn with_difficulty(difficulty: &str) -> Result<TicTacToe, JsValue> {
        let difficulty = AiDifficulty::from_str(difficulty).map_err(to_js_error)?;
        let session = Session::new(SessionConfig::new(difficulty)).map_err(to_js_error)?;
        Ok(TicTacToe { session })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.snapshot()).map_err(serde_to_js_error)
    }

    pub fn status_text(&self) -> String {
        self.session.status_text()
    }

    pub fn play(&mut self, index: usize) -> Result<String, JsValue> {
        let resolution = self.session.play(index).map_err(to_js_error)?;
        resolution_json(resolution)
    }

    pub fn computer_move(&mut self) -> Result<String, JsValue> {
        let resolution = self.session.computer_move().map_err(to_js_error)?;
        resolution_json(resolution)
    }

    pub fn apply_computer_move(&mut self, index: usize) -> Result<String, JsValue> {
        let resolution = self.session.apply_computer_move(index).map_err(to_js_error)?;
        resolution_json(resolution)
    }

    pub fn next_round(&mut self) -> Result<String, JsValue> {
        let resolution = self.session.next_round().map_err(to_js_error)?;
        resolution_json(resolution)
    }

    pub fn restart(&mut self) -> Result<String, JsValue> {
        resolution_json(self.session.restart())
    }

    /// 等待思考时间后给出电脑的落子决策（JSON）；调用方再用 `apply_computer_move` 落子。
    pub fn think(&self, delay_ms: Option<u32>) -> Promise {
        let board = *self.session.board();
        let turn = self.session.turn();
        let config = self.session.config().ai_config();
        let delay = delay_ms.unwrap_or_else(|| {
            u32::try_from(config.think_delay.as_millis()).unwrap_or(u32::MAX)
        });

        future_to_promise(async move {
            if turn != TurnState::AwaitingComputerMove {
                return Err(to_js_error(RuleError::NotComputerTurn));
            }
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let mut agent = AiAgent::new(config);
            let decision = agent
                .decide_action(&board, Mark::COMPUTER)
                .map_err(to_js_error)?;
            let json = serde_json::to_string(&decision).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }
}

#[wasm_bindgen(js_name = "emptyBoard")]
pub fn empty_board() -> Result<JsValue, JsValue> {
    to_value(&Board::empty()).map_err(JsValue::from)
}

/// 判定传入棋盘的结果：`{"type":"Ongoing"}`、`{"type":"Win","mark":"X"}` 或 `{"type":"Draw"}`。
#[wasm_bindgen(js_name = "evaluateBoard")]
pub fn evaluate_board(board: JsValue) -> Result<JsValue, JsValue> {
    let board = parse_board(board)?;
    to_value(&evaluate(&board)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "winningLine")]
pub fn winning_line_of(board: JsValue) -> Result<JsValue, JsValue> {
    let board = parse_board(board)?;
    to_value(&winning_line(&board)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "selectMove")]
pub fn select_move_js(board: JsValue, mark: &str, strategy: &str) -> Result<usize, JsValue> {
    let board = parse_board(board)?;
    let mark = Mark::from_str(mark).map_err(to_js_error)?;
    let strategy = AiStrategy::from_str(strategy).map_err(to_js_error)?;
    let mut rng = SmallRng::from_entropy();
    select_move(&board, mark, strategy, &mut rng).map_err(to_js_error)
}
