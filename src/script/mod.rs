//! Модуль сценария диалога
//!
//! Этот модуль содержит типы реплик диалога и парсер текста сценария
//! с тегами спикеров вида `[speaker|modifiers] текст`.

pub mod parser;
pub mod types;

pub use parser::{parse, to_script};
pub use types::{
    DialogueTurn, Emotion, PaceTag, Speaker, SpeakerRegistry, TurnModifiers, VoiceSettings,
};
