//! AI 算法模块（随机落子与穷举 minimax）。

pub mod minimax;

pub use minimax::{
    optimal_move, random_move, select_move, AiAgent, AiConfig, AiDecision, AiDifficulty,
    AiStrategy,
};
