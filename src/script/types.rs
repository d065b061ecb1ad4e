//! Типы данных сценария диалога

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// Эмоциональный тон реплики
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    /// Воодушевление
    Excited,
    /// Гнев
    Angry,
    /// Грусть
    Sad,
    /// Задумчивость
    Contemplative,
    /// Нейтральный тон
    Neutral,
}

impl Emotion {
    /// Вклад эмоции в эмоциональный момент диалога
    pub fn intensity(&self) -> f32 {
        match self {
            Self::Excited => 0.8,
            Self::Angry => 0.7,
            Self::Sad => -0.3,
            Self::Contemplative => -0.2,
            Self::Neutral => 0.0,
        }
    }

    /// Получить строковое представление эмоции
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excited => "excited",
            Self::Angry => "angry",
            Self::Sad => "sad",
            Self::Contemplative => "contemplative",
            Self::Neutral => "neutral",
        }
    }

    /// Распознать токен эмоции; None для неизвестных токенов
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "excited" => Some(Self::Excited),
            "angry" => Some(Self::Angry),
            "sad" => Some(Self::Sad),
            "contemplative" => Some(Self::Contemplative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl Default for Emotion {
    fn default() -> Self {
        Self::Neutral
    }
}

/// Явный темп реплики
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaceTag {
    /// Медленный темп
    Slow,
    /// Обычный темп
    Normal,
    /// Быстрый темп
    Fast,
}

impl PaceTag {
    /// Получить строковое представление темпа
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Normal => "normal",
            Self::Fast => "fast",
        }
    }

    /// Распознать токен темпа; None для неизвестных токенов
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "slow" => Some(Self::Slow),
            "normal" => Some(Self::Normal),
            "fast" => Some(Self::Fast),
            _ => None,
        }
    }
}

impl Default for PaceTag {
    fn default() -> Self {
        Self::Normal
    }
}

/// Модификаторы реплики из тега сценария
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnModifiers {
    /// Эмоциональный тон
    pub emotion: Emotion,
    /// Явный темп
    pub pace: PaceTag,
    /// Явные паузы из тегов `<break time="Xs"/>`, в порядке появления (секунды)
    pub breaks: Vec<f32>,
}

/// Одна реплика сценария
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// Имя спикера (каноническое имя из реестра)
    pub speaker: String,
    /// Текст реплики без разметки
    pub text: String,
    /// Позиция реплики в диалоге (с нуля)
    pub order_index: usize,
    /// Индекс реплики, на которую отвечает эта (None для первой)
    pub reply_to: Option<usize>,
    /// Модификаторы реплики
    pub modifiers: TurnModifiers,
}

/// Числовые настройки голоса провайдера
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Стабильность голоса (0.0 - 1.0)
    pub stability: f32,
    /// Множитель скорости речи (около 1.0)
    pub speed: f32,
    /// Множитель высоты тона (около 1.0)
    pub pitch: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            speed: 1.0,
            pitch: 1.0,
        }
    }
}

/// Голосовая идентичность спикера
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    /// Уникальное имя спикера
    pub name: String,
    /// Идентификатор голоса у провайдера
    pub voice_id: String,
    /// Настройки голоса
    pub voice_settings: Option<VoiceSettings>,
}

impl Speaker {
    /// Создать нового спикера без настроек голоса
    pub fn new(name: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voice_id: voice_id.into(),
            voice_settings: None,
        }
    }
}

/// Реестр спикеров с поиском без учета регистра
#[derive(Debug, Clone, Default)]
pub struct SpeakerRegistry {
    /// Карта: имя в нижнем регистре -> спикер
    speakers: HashMap<String, Speaker>,
}

impl SpeakerRegistry {
    /// Создать пустой реестр
    pub fn new() -> Self {
        Self::default()
    }

    /// Создать реестр из списка спикеров
    pub fn from_speakers(speakers: impl IntoIterator<Item = Speaker>) -> Self {
        let mut registry = Self::new();
        for speaker in speakers {
            registry.register(speaker);
        }
        registry
    }

    /// Добавить спикера в реестр
    pub fn register(&mut self, speaker: Speaker) {
        self.speakers.insert(speaker.name.to_lowercase(), speaker);
    }

    /// Найти спикера по имени без учета регистра
    pub fn get(&self, name: &str) -> Option<&Speaker> {
        self.speakers.get(&name.to_lowercase())
    }

    /// Количество зарегистрированных спикеров
    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    /// Пуст ли реестр
    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_tokens() {
        assert_eq!(Emotion::from_token("excited"), Some(Emotion::Excited));
        assert_eq!(Emotion::from_token("unknown"), None);
        assert_eq!(Emotion::Excited.intensity(), 0.8);
        assert_eq!(Emotion::Sad.intensity(), -0.3);
    }

    #[test]
    fn test_registry_case_insensitive() {
        let registry =
            SpeakerRegistry::from_speakers(vec![Speaker::new("Adam", "voice-1")]);
        assert!(registry.get("adam").is_some());
        assert!(registry.get("ADAM").is_some());
        assert!(registry.get("sarah").is_none());
    }
}
