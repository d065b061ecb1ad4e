//! Модуль просодии и тайминга диалога
//!
//! Этот модуль выводит паузы, темп и эмоциональный тон каждой реплики
//! из эвристик разговорного анализа и скользящего состояния диалога.

pub mod analysis;
pub mod heuristics;
pub mod state;

pub use analysis::{
    AnalysisCache, AnalysisRequest, ConversationAnalysis, ConversationAnalyzer,
    HeuristicAnalyzer, IntentType,
};
pub use heuristics::{analyze_turn, TimingDecision};
pub use state::ConversationState;
