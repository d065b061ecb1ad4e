//! Скользящее состояние диалога

use crate::script::Emotion;

/// Коэффициент затухания эмоционального момента между репликами
const MOMENTUM_DECAY: f32 = 0.7;

/// Скользящее состояние диалога, обновляемое один раз на реплику
///
/// Состояние принадлежит последовательной свертке анализа слева направо
/// и не должно читаться или изменяться из нескольких реплик одновременно.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    /// Количество обработанных реплик
    pub turn_count: usize,
    /// Эмоциональный момент диалога, в пределах [-1, 1]
    pub emotional_momentum: f32,
    /// Имена спикеров в порядке появления
    pub speaker_history: Vec<String>,
}

impl ConversationState {
    /// Создать новое состояние для одного прогона генерации
    pub fn new() -> Self {
        Self::default()
    }

    /// Зарегистрировать обработку реплики
    ///
    /// Порядок фиксирован: инкремент счетчика, запись спикера, затухание
    /// момента и вклад эмоции текущей реплики, ограничение в [-1, 1].
    pub fn register_turn(&mut self, speaker: &str, tone: Emotion) {
        self.turn_count += 1;
        self.speaker_history.push(speaker.to_string());
        self.emotional_momentum =
            (self.emotional_momentum * MOMENTUM_DECAY + tone.intensity()).clamp(-1.0, 1.0);
    }

    /// Сбросить состояние для нового прогона
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
