//! Модуль обработки ошибок библиотеки podcast-tts
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при работе библиотеки.

use thiserror::Error;

/// Класс причины сбоя синтеза речи
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisFailureReason {
    /// Превышена квота провайдера
    Quota,
    /// Ошибка авторизации
    Authorization,
    /// Голос не найден
    VoiceNotFound,
    /// Сетевая ошибка
    Network,
}

impl SynthesisFailureReason {
    /// Можно ли повторить запрос при этой причине сбоя
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Получить строковое представление причины
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quota => "quota",
            Self::Authorization => "authorization",
            Self::VoiceNotFound => "voice_not_found",
            Self::Network => "network",
        }
    }
}

impl std::fmt::Display for SynthesisFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ошибки библиотеки podcast-tts
#[derive(Debug, Error)]
pub enum PodcastTtsError {
    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка кодирования/декодирования WAV
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Неизвестный спикер в тексте сценария
    #[error("Unknown speaker in script: '{0}'")]
    UnknownSpeaker(String),

    /// Сценарий не содержит ни одной реплики
    #[error("Script contains no dialogue turns")]
    EmptyDialogue,

    /// Некорректный тег в тексте сценария
    #[error("Malformed tag in script: {0}")]
    MalformedTag(String),

    /// Сбой синтеза речи для реплики
    #[error("Speech synthesis failed for turn {turn} ({reason}): {message}")]
    Synthesis {
        /// Индекс реплики
        turn: usize,
        /// Причина сбоя
        reason: SynthesisFailureReason,
        /// Сообщение провайдера
        message: String,
    },

    /// Провайдер не вернул временные метки для реплики
    #[error("Synthesis returned no character timestamps for turn {turn}")]
    SynthesisTimingMissing {
        /// Индекс реплики
        turn: usize,
    },

    /// Сегменты не отсортированы по времени начала
    #[error("Segments are not ordered by start time at index {index}")]
    UnorderedSegments {
        /// Индекс нарушающего сегмента
        index: usize,
    },

    /// Сегменты перекрываются во времени
    #[error("Segments overlap at index {index} by {overlap:.3}s")]
    OverlappingSegments {
        /// Индекс нарушающего сегмента
        index: usize,
        /// Величина перекрытия в секундах
        overlap: f64,
    },

    /// Формат аудио сегмента не совпадает с форматом вывода
    #[error("Audio format mismatch for segment {index}: expected {expected}, got {actual}")]
    FormatMismatch {
        /// Индекс сегмента
        index: usize,
        /// Ожидаемый формат
        expected: String,
        /// Фактический формат
        actual: String,
    },

    /// Сбой загрузки байтов сегмента после всех попыток
    #[error("Failed to download segment bytes from '{url}' after {attempts} attempts: {message}")]
    Download {
        /// URL сегмента
        url: String,
        /// Количество сделанных попыток
        attempts: usize,
        /// Сообщение последней ошибки
        message: String,
    },

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl PodcastTtsError {
    /// Можно ли повторить операцию, завершившуюся этой ошибкой
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Synthesis { reason, .. } => reason.is_retryable(),
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

impl From<&str> for PodcastTtsError {
    fn from(s: &str) -> Self {
        PodcastTtsError::Other(s.to_string())
    }
}

impl From<String> for PodcastTtsError {
    fn from(s: String) -> Self {
        PodcastTtsError::Other(s)
    }
}

/// Тип Result для библиотеки podcast-tts
pub type Result<T> = std::result::Result<T, PodcastTtsError>;
