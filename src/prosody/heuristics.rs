//! Эвристики тайминга реплик
//!
//! Этот модуль выводит паузы до/после реплики, темп речи и
//! дискреционные паузы внутри реплики из результата разговорного
//! анализа и скользящего состояния диалога.

use rand::rngs::StdRng;
use rand::Rng;

use crate::script::{DialogueTurn, PaceTag};
use super::analysis::ConversationAnalysis;
use super::state::ConversationState;

/// Базовая пауза перед репликой при смене спикера (секунды)
const PRE_PAUSE_SPEAKER_CHANGE: f32 = 0.5;
/// Базовая пауза перед репликой без смены спикера
const PRE_PAUSE_SAME_SPEAKER: f32 = 0.2;
/// Базовая пауза после реплики при смене спикера
const POST_PAUSE_SPEAKER_CHANGE: f32 = 0.3;
/// Базовая пауза после реплики без смены спикера
const POST_PAUSE_SAME_SPEAKER: f32 = 0.2;
/// Потолок паузы перед репликой
const PRE_PAUSE_CEILING: f32 = 1.5;
/// Потолок паузы после реплики
const POST_PAUSE_CEILING: f32 = 1.0;
/// Границы множителя темпа
const PACE_MIN: f32 = 0.8;
const PACE_MAX: f32 = 1.3;
/// Границы случайного джиттера пауз
const JITTER_MIN: f32 = 0.9;
const JITTER_MAX: f32 = 1.1;

/// Решение о тайминге одной реплики
#[derive(Debug, Clone, PartialEq)]
pub struct TimingDecision {
    /// Пауза перед репликой (секунды)
    pub pre_pause: f32,
    /// Пауза после реплики (секунды)
    pub post_pause: f32,
    /// Множитель темпа речи
    pub pace: f32,
    /// Дискреционные паузы внутри реплики (секунды)
    pub natural_breaks: Vec<f32>,
}

impl TimingDecision {
    /// Значения тайминга по умолчанию
    ///
    /// Единственный источник запасных значений: сюда деградируют все
    /// пути с недоступными данными анализа.
    pub fn default_timing(speaker_changed: bool) -> Self {
        if speaker_changed {
            Self {
                pre_pause: PRE_PAUSE_SPEAKER_CHANGE,
                post_pause: POST_PAUSE_SPEAKER_CHANGE,
                pace: 1.0,
                natural_breaks: Vec::new(),
            }
        } else {
            Self {
                pre_pause: PRE_PAUSE_SAME_SPEAKER,
                post_pause: POST_PAUSE_SAME_SPEAKER,
                pace: 1.0,
                natural_breaks: Vec::new(),
            }
        }
    }
}

/// Вывести решение о тайминге для реплики и обновить состояние диалога
///
/// Состояние изменяется ровно один раз за вызов. Проверки позиции реплики
/// (`turn_count < 3`, первые две реплики) используют снимок счетчика до
/// инкремента; поправки по моменту используют обновленный момент.
/// Единственный недетерминированный вход — джиттер из переданного
/// генератора, поэтому с фиксированным зерном результат воспроизводим.
pub fn analyze_turn(
    turn: &DialogueTurn,
    analysis: &ConversationAnalysis,
    speaker_changed: bool,
    state: &mut ConversationState,
    rng: &mut StdRng,
) -> TimingDecision {
    let turns_before = state.turn_count;
    state.register_turn(&turn.speaker, analysis.tone);
    let momentum = state.emotional_momentum;

    let defaults = TimingDecision::default_timing(speaker_changed);

    // Пауза перед репликой: фиксированная цепочка множителей
    let mut pre_pause = defaults.pre_pause;
    pre_pause *= 1.0 - momentum.abs() * 0.3;
    if turns_before < 3 {
        pre_pause *= 1.2;
    }
    if analysis.topic_continuity < 0.3 {
        pre_pause *= 1.3;
    }
    pre_pause *= rng.gen_range(JITTER_MIN..JITTER_MAX);
    pre_pause = pre_pause.clamp(0.0, PRE_PAUSE_CEILING);

    // Пауза после реплики: своя цепочка поправок
    let mut post_pause = defaults.post_pause;
    if momentum.abs() > 0.6 {
        post_pause *= 0.8;
    }
    if analysis.emphasis {
        post_pause *= 1.3;
    }
    if analysis.is_delayed_response {
        post_pause *= 1.4;
    }
    post_pause *= rng.gen_range(JITTER_MIN..JITTER_MAX);
    post_pause = post_pause.clamp(0.0, POST_PAUSE_CEILING);

    // Темп речи
    let mut pace = match turn.modifiers.pace {
        PaceTag::Slow => 0.9,
        PaceTag::Normal => 1.0,
        PaceTag::Fast => 1.1,
    };
    pace *= 1.0 + momentum * 0.2;
    if turns_before < 2 {
        pace *= 0.9;
    }
    if turn.text.chars().count() > 100 {
        pace *= 1.1;
    }
    pace = pace.clamp(PACE_MIN, PACE_MAX);

    TimingDecision {
        pre_pause,
        post_pause,
        pace,
        natural_breaks: natural_breaks(&turn.text),
    }
}

/// Найти дискреционные паузы внутри текста реплики
///
/// Независимо от явных тегов `<break/>`: многоточие дает длинную паузу,
/// тире — короткую.
fn natural_breaks(text: &str) -> Vec<f32> {
    let mut breaks = Vec::new();
    for _ in 0..text.matches("...").count() + text.matches('…').count() {
        breaks.push(1.0);
    }
    for _ in 0..text.matches('—').count() {
        breaks.push(0.5);
    }
    breaks
}
