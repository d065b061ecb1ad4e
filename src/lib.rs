//! Основной файл библиотеки podcast-tts с поддержкой системы прогресса
//!
//! Эта библиотека собирает многоголосый синтетический подкаст из текстового
//! сценария: парсинг реплик, вывод естественного тайминга, параллельный
//! синтез речи, сборка таймлайна с точностью до сэмпла и генерация
//! синхронизированных субтитров с транскриптом.

pub mod captions;
pub mod config;
pub mod error;
pub mod markup;
pub mod progress;
pub mod prosody;
pub mod script;
pub mod timeline;
pub mod tts;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::captions::Transcript;
use crate::config::PodcastConfig;
use crate::error::Result;
use crate::progress::{ProcessStep, ProgressObserver, ProgressReporter, ProgressTracker};
use crate::prosody::analysis::analyze_with_fallback;
use crate::prosody::{
    analyze_turn, AnalysisCache, AnalysisRequest, ConversationAnalyzer, HeuristicAnalyzer,
    ConversationState,
};
use crate::script::SpeakerRegistry;
use crate::tts::{synthesize_dialogue, PlannedTurn, SpeechSynthesizer};
use crate::utils::TempFileManager;

/// Результат генерации подкаста
#[derive(Debug, Clone)]
pub struct PodcastOutput {
    /// Финальное аудио в формате WAV
    pub audio_wav: Vec<u8>,
    /// Субтитры SRT с пословным таймингом
    pub srt: String,
    /// Субтитры WebVTT с пословным таймингом
    pub vtt: String,
    /// Транскрипт в формате JSON
    pub transcript_json: String,
    /// Структурированный транскрипт
    pub transcript: Transcript,
}

/// Основная структура для работы с библиотекой
pub struct PodcastTts {
    /// Конфигурация библиотеки
    config: PodcastConfig,
    /// Анализатор диалога
    analyzer: Arc<dyn ConversationAnalyzer>,
    /// Трекер прогресса
    progress_tracker: Option<ProgressTracker>,
}

impl PodcastTts {
    /// Создать новый экземпляр PodcastTts с указанной конфигурацией
    pub fn new(config: PodcastConfig) -> Self {
        Self {
            config,
            analyzer: Arc::new(HeuristicAnalyzer::new()),
            progress_tracker: None,
        }
    }

    /// Создать экземпляр PodcastTts с настройками по умолчанию
    pub fn default() -> Self {
        Self::new(PodcastConfig::default())
    }

    /// Создать новый экземпляр с указанной конфигурацией и репортером прогресса
    pub fn with_progress_reporter(
        config: PodcastConfig,
        reporter: Box<dyn ProgressReporter>,
    ) -> Self {
        let mut tracker = ProgressTracker::new();
        tracker.set_reporter(reporter);

        Self {
            config,
            analyzer: Arc::new(HeuristicAnalyzer::new()),
            progress_tracker: Some(tracker),
        }
    }

    /// Заменить встроенный анализатор диалога внешним провайдером
    pub fn set_analyzer(&mut self, analyzer: Arc<dyn ConversationAnalyzer>) {
        self.analyzer = analyzer;
    }

    /// Установить репортер прогресса
    pub fn set_progress_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        if let Some(tracker) = &mut self.progress_tracker {
            tracker.set_reporter(reporter);
        } else {
            let mut tracker = ProgressTracker::new();
            tracker.set_reporter(reporter);
            self.progress_tracker = Some(tracker);
        }
    }

    /// Добавить наблюдателя прогресса
    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        if let Some(tracker) = &mut self.progress_tracker {
            tracker.add_observer(observer).unwrap_or(0)
        } else {
            let mut tracker = ProgressTracker::new();
            let id = tracker.add_observer(observer).unwrap_or(0);
            self.progress_tracker = Some(tracker);
            id
        }
    }

    /// Основной метод генерации подкаста из сценария
    pub async fn generate(
        &self,
        raw_script: &str,
        registry: &SpeakerRegistry,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Result<PodcastOutput> {
        log::info!("Starting podcast generation");

        let tracker_ref = self.progress_tracker.as_ref();

        // 1. Парсинг сценария
        if let Some(t) = tracker_ref {
            t.set_step(ProcessStep::ScriptParsing);
            t.update_step_progress(0.0, Some("Начало парсинга сценария".to_string()));
        }

        let turns = script::parse(raw_script, registry)?;

        if let Some(t) = tracker_ref {
            t.update_step_progress(100.0, Some("Парсинг сценария завершен".to_string()));
        }

        // 2. Анализ тайминга: строго последовательная свертка слева направо
        if let Some(t) = tracker_ref {
            t.set_step(ProcessStep::TimingAnalysis);
            t.update_step_progress(0.0, Some("Начало анализа тайминга".to_string()));
        }

        let cache = if self.config.use_analysis_cache {
            Some(AnalysisCache::new(Duration::from_secs(
                self.config.analysis_cache_ttl_secs,
            )))
        } else {
            None
        };
        let mut rng = match self.config.timing_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut state = ConversationState::new();
        let mut planned = Vec::with_capacity(turns.len());

        for (i, turn) in turns.iter().enumerate() {
            let speaker_changed = match i.checked_sub(1).and_then(|p| turns.get(p)) {
                Some(prev) => !prev.speaker.eq_ignore_ascii_case(&turn.speaker),
                None => true,
            };
            let request = AnalysisRequest {
                turn,
                previous_text: i.checked_sub(1).map(|p| turns[p].text.as_str()),
                next_text: turns.get(i + 1).map(|t| t.text.as_str()),
                speaker_changed,
            };

            let analysis =
                analyze_with_fallback(self.analyzer.as_ref(), cache.as_ref(), &request).await;
            let decision = analyze_turn(turn, &analysis, speaker_changed, &mut state, &mut rng);

            let mut markup = markup::to_synthesizable(&turn.text, &decision, &analysis);
            // Явные паузы из модификаторов и дискреционные паузы добавляются
            // в конец реплики, вставка не гарантирована
            let mut trailing = turn.modifiers.breaks.clone();
            trailing.extend_from_slice(&decision.natural_breaks);
            markup = markup::append_trailing_breaks(&markup, &trailing);

            planned.push(PlannedTurn {
                turn: turn.clone(),
                decision,
                markup,
            });

            if let Some(t) = tracker_ref {
                t.update_step_progress(
                    (i + 1) as f32 / turns.len() as f32 * 100.0,
                    Some(format!("Анализ тайминга: {}/{} реплик", i + 1, turns.len())),
                );
            }
        }

        // 3. Генерация речи
        if let Some(t) = tracker_ref {
            t.set_step(ProcessStep::SpeechGeneration);
            t.update_step_progress(0.0, Some("Начало генерации речи".to_string()));
        }

        let mut temp = TempFileManager::new(self.config.cleanup_temp_files)?;
        let segments = synthesize_dialogue(
            &planned,
            registry,
            synthesizer,
            &self.config,
            &mut temp,
            tracker_ref,
        )
        .await?;

        // 4. Сборка таймлайна
        if let Some(t) = tracker_ref {
            t.set_step(ProcessStep::TimelineAssembly);
            t.update_step_progress(0.0, Some("Начало сборки таймлайна".to_string()));
        }

        let audio_wav =
            timeline::assemble_to_wav(&segments, &self.config.audio_format, &self.config.retry)
                .await?;

        if let Some(t) = tracker_ref {
            t.update_step_progress(100.0, Some("Сборка таймлайна завершена".to_string()));
        }

        // 5. Генерация субтитров и транскрипта
        if let Some(t) = tracker_ref {
            t.set_step(ProcessStep::CaptionGeneration);
            t.update_step_progress(0.0, Some("Начало генерации субтитров".to_string()));
        }

        let captions = captions::generate(&segments)?;
        let transcript_json = captions.transcript.to_json()?;

        temp.cleanup()?;

        if let Some(t) = tracker_ref {
            t.update_step_progress(100.0, Some("Генерация субтитров завершена".to_string()));
            t.complete();
        }

        log::info!(
            "Podcast generation finished: {:.2}s of audio, {} segments",
            captions.transcript.duration,
            captions.transcript.segments.len()
        );

        Ok(PodcastOutput {
            audio_wav,
            srt: captions.srt,
            vtt: captions.vtt,
            transcript_json,
            transcript: captions.transcript,
        })
    }
}

/// Упрощенная функция для генерации подкаста с настройками по умолчанию
pub async fn generate_podcast(
    raw_script: &str,
    registry: &SpeakerRegistry,
    synthesizer: Arc<dyn SpeechSynthesizer>,
) -> Result<PodcastOutput> {
    let podcast = PodcastTts::default();
    podcast.generate(raw_script, registry, synthesizer).await
}
