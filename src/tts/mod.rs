//! Модуль границы синтеза речи
//!
//! Этот модуль определяет границу внешнего TTS провайдера, нормализованную
//! запись аудио сегмента с посимвольными временными метками и драйвер
//! синтеза реплик с ограниченным параллелизмом.

pub mod retry;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::config::PodcastConfig;
use crate::error::{PodcastTtsError, Result};
use crate::progress::ProgressTracker;
use crate::prosody::TimingDecision;
use crate::script::{DialogueTurn, Speaker, SpeakerRegistry};
use crate::utils::TempFileManager;

pub use retry::retry_with_backoff;

/// Посимвольные временные метки синтезированной речи
///
/// Три выровненные последовательности одинаковой длины: символы
/// произнесенного текста и времена начала/конца каждого символа
/// в секундах.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterAlignment {
    /// Символы произнесенного текста
    pub characters: Vec<char>,
    /// Времена начала символов (секунды)
    pub start_times: Vec<f64>,
    /// Времена конца символов (секунды)
    pub end_times: Vec<f64>,
}

impl CharacterAlignment {
    /// Количество символов
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// Пусты ли метки
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Длительность по последней метке конца (секунды)
    pub fn duration(&self) -> f64 {
        self.end_times.iter().cloned().fold(0.0, f64::max)
    }

    /// Восстановить произнесенный текст из потока символов
    pub fn narration(&self) -> String {
        self.characters.iter().collect()
    }

    /// Сдвинуть все метки на абсолютное смещение сегмента
    pub fn shift(&mut self, offset: f64) {
        for t in &mut self.start_times {
            *t += offset;
        }
        for t in &mut self.end_times {
            *t += offset;
        }
    }

    /// Проверить согласованность меток
    ///
    /// Последовательности должны быть одной длины, времена неотрицательны,
    /// конец не раньше начала, начала не убывают.
    pub fn validate(&self) -> Result<()> {
        if self.characters.len() != self.start_times.len()
            || self.characters.len() != self.end_times.len()
        {
            return Err(PodcastTtsError::Other(format!(
                "alignment length mismatch: {} characters, {} start times, {} end times",
                self.characters.len(),
                self.start_times.len(),
                self.end_times.len()
            )));
        }

        let mut prev_start = 0.0f64;
        for (i, (&start, &end)) in self.start_times.iter().zip(&self.end_times).enumerate() {
            if start < 0.0 || end < 0.0 {
                return Err(PodcastTtsError::Other(format!(
                    "negative timing at character {}: start={:.3}s, end={:.3}s",
                    i, start, end
                )));
            }
            if end < start {
                return Err(PodcastTtsError::Other(format!(
                    "invalid timing order at character {}: start={:.3}s > end={:.3}s",
                    i, start, end
                )));
            }
            if start < prev_start {
                return Err(PodcastTtsError::Other(format!(
                    "non-monotonic start times at character {}: {:.3}s < {:.3}s",
                    i, start, prev_start
                )));
            }
            prev_start = start;
        }

        Ok(())
    }
}

/// Результат синтеза одной реплики, времена относительно начала клипа
#[derive(Debug, Clone)]
pub struct SynthesizedClip {
    /// Байты аудио в формате провайдера (WAV)
    pub audio: Bytes,
    /// Посимвольные метки относительно начала клипа
    pub alignment: CharacterAlignment,
}

/// Граница внешнего TTS провайдера
///
/// Провайдер возвращает аудио клипа и посимвольные метки, выровненные
/// 1:1 с произнесенным текстом (без разметки).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Синтезировать одну реплику из размеченного текста
    async fn synthesize(&self, markup: &str, speaker: &Speaker) -> Result<SynthesizedClip>;
}

/// Источник байтов аудио сегмента
#[derive(Debug, Clone)]
pub enum SegmentSource {
    /// Байты в памяти
    Memory(Bytes),
    /// Файл на диске
    File(PathBuf),
    /// Удаленный URL
    Remote(String),
}

/// Один синтезированный сегмент диалога
///
/// Единица, которую потребляют сборщик таймлайна и генератор субтитров.
/// Времена абсолютные, в пределах таймлайна всего диалога; метки
/// символов уже сдвинуты на начало сегмента.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Имя спикера сегмента
    pub speaker: String,
    /// Источник байтов аудио
    pub source: SegmentSource,
    /// Абсолютное время начала (секунды)
    pub start_time: f64,
    /// Абсолютное время конца (секунды)
    pub end_time: f64,
    /// Посимвольные метки в абсолютном времени
    pub alignment: CharacterAlignment,
}

impl AudioSegment {
    /// Длительность сегмента (секунды)
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Реплика с готовым решением о тайминге и разметкой для синтеза
#[derive(Debug, Clone)]
pub struct PlannedTurn {
    /// Реплика сценария
    pub turn: DialogueTurn,
    /// Решение о тайминге
    pub decision: TimingDecision,
    /// Размеченный текст для провайдера
    pub markup: String,
}

/// Синтезировать все реплики и расставить сегменты по таймлайну
///
/// Синтез реплик не имеет взаимных зависимостей и выполняется параллельно
/// под семафором (лимит запросов в полете у провайдера). Смещения
/// назначаются после завершения всех клипов последовательной сверткой:
/// курсор += пауза до; начало = курсор; конец = начало + длительность
/// клипа; курсор = конец + пауза после. Байты клипов выгружаются во
/// временные WAV файлы менеджера.
pub async fn synthesize_dialogue(
    planned: &[PlannedTurn],
    registry: &SpeakerRegistry,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    config: &PodcastConfig,
    temp: &mut TempFileManager,
    tracker: Option<&ProgressTracker>,
) -> Result<Vec<AudioSegment>> {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));
    let total = planned.len();
    let mut tasks = Vec::with_capacity(total);

    log::info!(
        "Synthesizing {} turns with at most {} concurrent requests",
        total,
        config.max_concurrent_requests
    );

    for (i, plan) in planned.iter().enumerate() {
        let speaker = registry
            .get(&plan.turn.speaker)
            .ok_or_else(|| PodcastTtsError::UnknownSpeaker(plan.turn.speaker.clone()))?
            .clone();
        let markup = plan.markup.clone();
        let synthesizer = synthesizer.clone();
        let semaphore = semaphore.clone();
        let retry = config.retry;

        let task = tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| PodcastTtsError::Other(format!("semaphore closed: {}", e)))?;

            log::debug!("Synthesizing turn {} (speaker '{}')", i, speaker.name);
            let clip = retry_with_backoff(&retry, "speech synthesis", || {
                synthesizer.synthesize(&markup, &speaker)
            })
            .await
            .map_err(|e| attach_turn_index(e, i))?;

            Ok::<(usize, SynthesizedClip), PodcastTtsError>((i, clip))
        });
        tasks.push(task);
    }

    let mut clips: Vec<Option<SynthesizedClip>> = (0..total).map(|_| None).collect();
    for result in join_all(tasks).await {
        let (i, clip) = result
            .map_err(|e| PodcastTtsError::Other(format!("synthesis task panicked: {}", e)))??;
        clips[i] = Some(clip);

        if let Some(t) = tracker {
            let done = clips.iter().filter(|c| c.is_some()).count();
            t.update_step_progress(
                done as f32 / total as f32 * 90.0,
                Some(format!("Генерация речи: {}/{} реплик", done, total)),
            );
        }
    }

    // Барьер пройден: назначаем абсолютные смещения слева направо
    let mut segments = Vec::with_capacity(total);
    let mut cursor = 0.0f64;

    for (i, (plan, clip)) in planned.iter().zip(clips.into_iter()).enumerate() {
        let clip = clip
            .ok_or_else(|| PodcastTtsError::Other(format!("missing clip for turn {}", i)))?;

        clip.alignment.validate()?;
        if clip.alignment.is_empty() {
            // Без меток нельзя вывести длительность клипа
            return Err(PodcastTtsError::SynthesisTimingMissing { turn: i });
        }

        let path = temp.create_temp_file(&format!("segment_{}", i), "wav")?;
        tokio::fs::write(&path, &clip.audio).await?;
        log::debug!("Staged turn {} audio to {}", i, path.display());

        cursor += plan.decision.pre_pause as f64;
        let start_time = cursor;
        let end_time = start_time + clip.alignment.duration();
        cursor = end_time + plan.decision.post_pause as f64;

        let mut alignment = clip.alignment;
        alignment.shift(start_time);

        segments.push(AudioSegment {
            speaker: plan.turn.speaker.clone(),
            source: SegmentSource::File(path),
            start_time,
            end_time,
            alignment,
        });
    }

    if let Some(t) = tracker {
        t.update_step_progress(100.0, Some("Генерация речи завершена".to_string()));
    }

    log::info!(
        "Synthesized {} segments, total timeline {:.2}s",
        segments.len(),
        segments.last().map(|s| s.end_time).unwrap_or(0.0)
    );
    Ok(segments)
}

/// Подставить индекс реплики в ошибку синтеза
fn attach_turn_index(error: PodcastTtsError, turn: usize) -> PodcastTtsError {
    match error {
        PodcastTtsError::Synthesis {
            reason, message, ..
        } => PodcastTtsError::Synthesis {
            turn,
            reason,
            message,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynthesisFailureReason;

    fn alignment(chars: &str, step: f64) -> CharacterAlignment {
        let characters: Vec<char> = chars.chars().collect();
        let start_times: Vec<f64> = (0..characters.len()).map(|i| i as f64 * step).collect();
        let end_times: Vec<f64> = (0..characters.len())
            .map(|i| (i + 1) as f64 * step)
            .collect();
        CharacterAlignment {
            characters,
            start_times,
            end_times,
        }
    }

    /// Провайдер со сценарием: фиксированная длительность символа
    struct ScriptedSynthesizer {
        char_duration: f64,
    }

    #[async_trait]
    impl SpeechSynthesizer for ScriptedSynthesizer {
        async fn synthesize(&self, markup: &str, _speaker: &Speaker) -> Result<SynthesizedClip> {
            let narration = crate::markup::to_narration(markup);
            Ok(SynthesizedClip {
                audio: Bytes::from_static(b"RIFF"),
                alignment: alignment(&narration, self.char_duration),
            })
        }
    }

    /// Провайдер, не возвращающий меток
    struct SilentSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for SilentSynthesizer {
        async fn synthesize(&self, _markup: &str, _speaker: &Speaker) -> Result<SynthesizedClip> {
            Ok(SynthesizedClip {
                audio: Bytes::from_static(b"RIFF"),
                alignment: CharacterAlignment::default(),
            })
        }
    }

    fn planned(text: &str, pre: f32, post: f32) -> PlannedTurn {
        let registry = SpeakerRegistry::from_speakers(vec![Speaker::new("adam", "v")]);
        let turn = crate::script::parse(&format!("[adam] {}", text), &registry)
            .unwrap()
            .remove(0);
        PlannedTurn {
            markup: turn.text.clone(),
            decision: TimingDecision {
                pre_pause: pre,
                post_pause: post,
                pace: 1.0,
                natural_breaks: Vec::new(),
            },
            turn,
        }
    }

    fn registry() -> SpeakerRegistry {
        SpeakerRegistry::from_speakers(vec![Speaker::new("adam", "v")])
    }

    #[test]
    fn test_alignment_validation() {
        let good = alignment("Hi", 0.1);
        assert!(good.validate().is_ok());

        let mut bad = alignment("Hi", 0.1);
        bad.start_times.pop();
        assert!(bad.validate().is_err());

        let mut reversed = alignment("Hi", 0.1);
        reversed.start_times[1] = 0.0;
        reversed.start_times[0] = 0.05;
        assert!(reversed.validate().is_err());
    }

    #[test]
    fn test_alignment_shift_and_narration() {
        let mut a = alignment("Hi", 0.1);
        a.shift(2.0);
        assert!((a.start_times[0] - 2.0).abs() < 1e-9);
        assert!((a.end_times[1] - 2.2).abs() < 1e-9);
        assert_eq!(a.narration(), "Hi");
    }

    #[tokio::test]
    async fn test_offsets_accumulate_left_to_right() {
        let plans = vec![planned("Hello", 0.5, 0.3), planned("World", 0.5, 0.3)];
        let mut temp = TempFileManager::new(true).unwrap();
        let config = PodcastConfig::default();

        let segments = synthesize_dialogue(
            &plans,
            &registry(),
            Arc::new(ScriptedSynthesizer { char_duration: 0.2 }),
            &config,
            &mut temp,
            None,
        )
        .await
        .unwrap();

        assert_eq!(segments.len(), 2);
        // 5 символов по 0.2s = 1.0s длительность клипа
        assert!((segments[0].start_time - 0.5).abs() < 1e-9);
        assert!((segments[0].end_time - 1.5).abs() < 1e-9);
        // 0.5 (pre) + 1.0 + 0.3 (post) + 0.5 (pre) = 2.3
        assert!((segments[1].start_time - 2.3).abs() < 1e-9);
        assert!((segments[1].end_time - 3.3).abs() < 1e-9);
        // Метки сдвинуты в абсолютное время
        assert!((segments[1].alignment.start_times[0] - 2.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_timestamps_is_fatal() {
        let plans = vec![planned("Hello", 0.0, 0.0)];
        let mut temp = TempFileManager::new(true).unwrap();
        let config = PodcastConfig::default();

        let err = synthesize_dialogue(
            &plans,
            &registry(),
            Arc::new(SilentSynthesizer),
            &config,
            &mut temp,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PodcastTtsError::SynthesisTimingMissing { turn: 0 }
        ));
    }

    #[tokio::test]
    async fn test_provider_error_carries_turn_index() {
        struct FailingSynthesizer;

        #[async_trait]
        impl SpeechSynthesizer for FailingSynthesizer {
            async fn synthesize(
                &self,
                _markup: &str,
                _speaker: &Speaker,
            ) -> Result<SynthesizedClip> {
                Err(PodcastTtsError::Synthesis {
                    turn: 0,
                    reason: SynthesisFailureReason::VoiceNotFound,
                    message: "no such voice".to_string(),
                })
            }
        }

        let plans = vec![planned("A", 0.0, 0.0), planned("B", 0.0, 0.0)];
        let mut temp = TempFileManager::new(true).unwrap();
        let config = PodcastConfig::default();

        let err = synthesize_dialogue(
            &plans,
            &registry(),
            Arc::new(FailingSynthesizer),
            &config,
            &mut temp,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PodcastTtsError::Synthesis { .. }));
    }
}
