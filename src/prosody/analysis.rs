//! Модуль разговорного анализа
//!
//! Этот модуль определяет границу внешнего провайдера анализа диалога,
//! закрытую запись результата анализа с документированными значениями
//! по умолчанию и кэш результатов с ограниченным временем жизни.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::script::{DialogueTurn, Emotion};

/// Тип намерения реплики
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentType {
    /// Утверждение
    Statement,
    /// Вопрос
    Question,
    /// Восклицание
    Exclamation,
}

impl Default for IntentType {
    fn default() -> Self {
        Self::Statement
    }
}

/// Результат разговорного анализа одной реплики
///
/// Закрытая запись с полным набором полей: каждая эвристическая поправка
/// получает тотальный вход, без опциональных вложенных объектов.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationAnalysis {
    /// Итоговый эмоциональный тон реплики
    pub tone: Emotion,
    /// Тип намерения реплики
    pub intent: IntentType,
    /// Связность с предыдущей темой (0.0 - 1.0)
    pub topic_continuity: f32,
    /// Реплика — запоздалый ответ (после вопроса)
    pub is_delayed_response: bool,
    /// Реплика содержит эмфазу
    pub emphasis: bool,
}

impl Default for ConversationAnalysis {
    /// Значения по умолчанию, используемые при недоступности анализатора
    fn default() -> Self {
        Self {
            tone: Emotion::Neutral,
            intent: IntentType::Statement,
            topic_continuity: 0.5,
            is_delayed_response: false,
            emphasis: false,
        }
    }
}

/// Запрос анализа одной реплики с контекстом соседей
#[derive(Debug, Clone)]
pub struct AnalysisRequest<'a> {
    /// Текущая реплика
    pub turn: &'a DialogueTurn,
    /// Текст предыдущей реплики
    pub previous_text: Option<&'a str>,
    /// Текст следующей реплики
    pub next_text: Option<&'a str>,
    /// Сменился ли спикер относительно предыдущей реплики
    pub speaker_changed: bool,
}

/// Граница внешнего провайдера разговорного анализа
///
/// Сбой провайдера никогда не останавливает конвейер: вызывающая сторона
/// деградирует к [`ConversationAnalysis::default`].
#[async_trait]
pub trait ConversationAnalyzer: Send + Sync {
    /// Проанализировать одну реплику
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<ConversationAnalysis>;
}

/// Встроенный автономный анализатор
///
/// Выводит тон из модификаторов реплики и пунктуации, намерение из
/// завершающего знака, связность темы из пересечения слов с предыдущей
/// репликой. Используется как провайдер по умолчанию и как запасной
/// вариант в тестах.
#[derive(Debug, Default)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    /// Создать новый анализатор
    pub fn new() -> Self {
        Self
    }

    fn resolve_tone(turn: &DialogueTurn) -> Emotion {
        if turn.modifiers.emotion != Emotion::Neutral {
            return turn.modifiers.emotion;
        }
        // Подсказки из пунктуации, когда явного модификатора нет
        let exclamations = turn.text.matches('!').count();
        if exclamations >= 2 {
            Emotion::Excited
        } else if turn.text.contains("...") || turn.text.contains('…') {
            Emotion::Contemplative
        } else {
            Emotion::Neutral
        }
    }

    fn resolve_intent(text: &str) -> IntentType {
        let trimmed = text.trim_end();
        if trimmed.ends_with('?') {
            IntentType::Question
        } else if trimmed.ends_with('!') {
            IntentType::Exclamation
        } else {
            IntentType::Statement
        }
    }

    /// Доля слов текущей реплики, встречающихся в предыдущей
    fn topic_continuity(current: &str, previous: Option<&str>) -> f32 {
        let Some(previous) = previous else {
            return 0.5;
        };
        let prev_words: Vec<String> = previous
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.len() > 2)
            .collect();
        let cur_words: Vec<String> = current
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.len() > 2)
            .collect();
        if cur_words.is_empty() || prev_words.is_empty() {
            return 0.5;
        }
        let shared = cur_words.iter().filter(|w| prev_words.contains(w)).count();
        shared as f32 / cur_words.len() as f32
    }
}

#[async_trait]
impl ConversationAnalyzer for HeuristicAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<ConversationAnalysis> {
        let tone = Self::resolve_tone(request.turn);
        let intent = Self::resolve_intent(&request.turn.text);
        let topic_continuity =
            Self::topic_continuity(&request.turn.text, request.previous_text);
        // Ответ на вопрос другого спикера считаем запоздалым ответом
        let is_delayed_response = request.speaker_changed
            && request
                .previous_text
                .map(|p| p.trim_end().ends_with('?'))
                .unwrap_or(false);
        let emphasis = request.turn.text.contains('!')
            || request
                .turn
                .text
                .split_whitespace()
                .any(|w| w.len() > 3 && w.chars().all(|c| !c.is_lowercase()));

        Ok(ConversationAnalysis {
            tone,
            intent,
            topic_continuity,
            is_delayed_response,
            emphasis,
        })
    }
}

/// Кэш результатов разговорного анализа с ограниченным временем жизни
///
/// Кэш принадлежит вызывающей стороне и передается по ссылке, что делает
/// анализ тестируемым в изоляции и безопасным при конкурентных прогонах.
pub struct AnalysisCache {
    /// Карта: ключ -> (момент записи, результат)
    entries: RwLock<HashMap<String, (Instant, ConversationAnalysis)>>,
    /// Время жизни записи
    ttl: Duration,
}

impl AnalysisCache {
    /// Создать новый кэш с указанным временем жизни записей
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Ключ кэша: хэш от (текст, предыдущий, следующий, смена спикера)
    pub fn cache_key(request: &AnalysisRequest<'_>) -> String {
        let mut hasher = md5::Context::new();
        hasher.consume(request.turn.text.as_bytes());
        hasher.consume(b"\x1f");
        hasher.consume(request.previous_text.unwrap_or("").as_bytes());
        hasher.consume(b"\x1f");
        hasher.consume(request.next_text.unwrap_or("").as_bytes());
        hasher.consume(b"\x1f");
        hasher.consume(if request.speaker_changed { b"1" } else { b"0" });
        format!("{:x}", hasher.compute())
    }

    /// Получить результат из кэша, если он еще не истек
    pub fn get(&self, key: &str) -> Option<ConversationAnalysis> {
        let entries = self.entries.read();
        let (stored_at, analysis) = entries.get(key)?;
        if stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(analysis.clone())
    }

    /// Сохранить результат в кэш, удалив истекшие записи
    pub fn insert(&self, key: String, analysis: ConversationAnalysis) {
        let mut entries = self.entries.write();
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() <= self.ttl);
        entries.insert(key, (Instant::now(), analysis));
    }

    /// Количество записей в кэше
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Пуст ли кэш
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Выполнить анализ с кэшированием и деградацией к значениям по умолчанию
///
/// Сбой анализатора логируется как предупреждение и не прерывает конвейер.
pub async fn analyze_with_fallback(
    analyzer: &dyn ConversationAnalyzer,
    cache: Option<&AnalysisCache>,
    request: &AnalysisRequest<'_>,
) -> ConversationAnalysis {
    let key = cache.map(|_| AnalysisCache::cache_key(request));

    if let (Some(cache), Some(key)) = (cache, key.as_ref()) {
        if let Some(hit) = cache.get(key) {
            log::debug!("Analysis cache hit for turn {}", request.turn.order_index);
            return hit;
        }
    }

    match analyzer.analyze(request).await {
        Ok(analysis) => {
            if let (Some(cache), Some(key)) = (cache, key) {
                cache.insert(key, analysis.clone());
            }
            analysis
        }
        Err(e) => {
            log::warn!(
                "Conversation analysis failed for turn {}, falling back to defaults: {}",
                request.turn.order_index,
                e
            );
            ConversationAnalysis::default()
        }
    }
}
