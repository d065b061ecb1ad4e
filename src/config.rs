//! Модуль конфигурации библиотеки podcast-tts
//!
//! Этот модуль содержит структуры и перечисления для настройки библиотеки.

use serde::{Deserialize, Serialize};

/// Формат выходного аудио
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioFormat {
    /// Частота дискретизации (Hz)
    pub sample_rate: u32,
    /// Количество каналов
    pub channels: u16,
    /// Разрядность сэмпла (бит)
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// Количество байтов на один фрейм (сэмпл по всем каналам)
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Номер фрейма, соответствующий моменту времени в секундах
    pub fn frame_at(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate as f64).floor() as usize
    }

    /// Спецификация hound для этого формата
    pub fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz / {} ch / {} bit",
            self.sample_rate, self.channels, self.bits_per_sample
        )
    }
}

/// Политика повторных попыток для сетевых операций
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Максимальное количество попыток (включая первую)
    pub max_attempts: usize,
    /// Базовая задержка между попытками (мс), удваивается после каждой неудачи
    pub base_delay_ms: u64,
    /// Доля случайного разброса задержки (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            jitter: 0.2,
        }
    }
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastConfig {
    /// Формат выходного аудио
    pub audio_format: AudioFormat,
    /// Максимальное количество одновременных запросов к TTS провайдеру
    pub max_concurrent_requests: usize,
    /// Политика повторных попыток для синтеза и загрузки сегментов
    pub retry: RetryPolicy,
    /// Использовать кэширование результатов анализа диалога
    pub use_analysis_cache: bool,
    /// Время жизни записи в кэше анализа (секунды)
    pub analysis_cache_ttl_secs: u64,
    /// Зерно генератора случайных чисел для джиттера пауз.
    /// Если None, используется недетерминированное зерно.
    pub timing_seed: Option<u64>,
    /// Удалять временные файлы после завершения
    pub cleanup_temp_files: bool,
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self {
            audio_format: AudioFormat::default(),
            // Провайдеры тяжелых аудио задач ограничены двумя запросами в полете
            max_concurrent_requests: 2,
            retry: RetryPolicy::default(),
            use_analysis_cache: true,
            analysis_cache_ttl_secs: 600,
            timing_seed: None,
            cleanup_temp_files: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_math() {
        let format = AudioFormat::default();
        assert_eq!(format.bytes_per_frame(), 4); // stereo 16 bit
        assert_eq!(format.frame_at(0.0), 0);
        assert_eq!(format.frame_at(1.0), 44100);
        assert_eq!(format.frame_at(2.5), 110250);
    }

    #[test]
    fn test_default_concurrency_cap() {
        let config = PodcastConfig::default();
        assert_eq!(config.max_concurrent_requests, 2);
    }
}
