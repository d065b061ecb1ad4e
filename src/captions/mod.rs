//! Модуль генерации субтитров и транскрипта
//!
//! Этот модуль восстанавливает пословный тайминг из посимвольных меток
//! сегментов и порождает SRT, VTT и структурированный JSON транскрипт
//! с агрегатами по спикерам. Повторная генерация из того же списка
//! сегментов дает побайтово идентичный результат.

use serde::Serialize;

use crate::error::Result;
use crate::tts::{AudioSegment, CharacterAlignment};

/// Одно слово с абсолютным таймингом
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordTiming {
    /// Текст слова
    pub word: String,
    /// Абсолютное время начала (секунды)
    pub start: f64,
    /// Абсолютное время конца (секунды)
    pub end: f64,
}

/// Запись транскрипта для одного сегмента
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSegment {
    /// Имя спикера
    pub speaker: String,
    /// Произнесенный текст сегмента
    pub text: String,
    /// Слова с таймингом
    pub words: Vec<WordTiming>,
    /// Абсолютное время начала сегмента
    pub start: f64,
    /// Абсолютное время конца сегмента
    pub end: f64,
}

/// Агрегаты по одному спикеру
#[derive(Debug, Clone, Serialize)]
pub struct SpeakerStats {
    /// Имя спикера
    pub speaker: String,
    /// Суммарная длительность речи (секунды)
    pub speaking_time: f64,
    /// Количество слов
    pub word_count: usize,
    /// Средний темп (слов в минуту)
    pub avg_pace_wpm: f64,
    /// Средняя пауза перед репликами спикера (секунды)
    pub avg_pause_before: f64,
}

/// Транскрипт всего диалога — канонический машиночитаемый артефакт
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    /// Общая длительность (максимальное время конца сегмента)
    pub duration: f64,
    /// Спикеры в порядке первого появления, без дубликатов
    pub speakers: Vec<String>,
    /// Записи по сегментам
    pub segments: Vec<TranscriptSegment>,
    /// Агрегаты по спикерам
    pub speaker_stats: Vec<SpeakerStats>,
}

/// Синхронизированные артефакты субтитров
#[derive(Debug, Clone)]
pub struct Captions {
    /// SRT текст: пословные нумерованные реплики
    pub srt: String,
    /// VTT текст: заголовок WEBVTT, пословные реплики без номеров
    pub vtt: String,
    /// Структурированный транскрипт
    pub transcript: Transcript,
}

/// Сгенерировать субтитры и транскрипт из списка сегментов
pub fn generate(segments: &[AudioSegment]) -> Result<Captions> {
    let mut transcript_segments = Vec::with_capacity(segments.len());
    let mut speakers: Vec<String> = Vec::new();

    for segment in segments {
        if !speakers.contains(&segment.speaker) {
            speakers.push(segment.speaker.clone());
        }
        transcript_segments.push(TranscriptSegment {
            speaker: segment.speaker.clone(),
            text: segment.alignment.narration().trim().to_string(),
            words: collect_words(&segment.alignment),
            start: segment.start_time,
            end: segment.end_time,
        });
    }

    let duration = segments.iter().map(|s| s.end_time).fold(0.0f64, f64::max);
    let speaker_stats = compute_speaker_stats(&speakers, &transcript_segments);

    let transcript = Transcript {
        duration,
        speakers,
        segments: transcript_segments,
        speaker_stats,
    };

    let srt = render_srt(&transcript.segments);
    let vtt = render_vtt(&transcript.segments);

    log::info!(
        "Generated captions: {} segments, {} words, {:.2}s",
        transcript.segments.len(),
        transcript.segments.iter().map(|s| s.words.len()).sum::<usize>(),
        duration
    );

    Ok(Captions {
        srt,
        vtt,
        transcript,
    })
}

impl Transcript {
    /// Сериализовать транскрипт в JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Сгруппировать посимвольные метки в слова
///
/// Один проход по потоку символов строго вперед: непрерывные серии
/// непробельных символов становятся словами, начало слова — метка
/// первого символа, конец — метка последнего. Проход никогда не
/// возвращается назад, поэтому интервалы слов монотонны и не
/// перекрываются даже при повторяющихся подстроках.
pub fn collect_words(alignment: &CharacterAlignment) -> Vec<WordTiming> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut word_start = 0.0f64;
    let mut word_end = 0.0f64;

    for i in 0..alignment.len() {
        let c = alignment.characters[i];
        if c.is_whitespace() {
            if !current.is_empty() {
                words.push(WordTiming {
                    word: std::mem::take(&mut current),
                    start: word_start,
                    end: word_end,
                });
            }
        } else {
            if current.is_empty() {
                word_start = alignment.start_times[i];
            }
            current.push(c);
            word_end = alignment.end_times[i];
        }
    }

    if !current.is_empty() {
        words.push(WordTiming {
            word: current,
            start: word_start,
            end: word_end,
        });
    }

    words
}

/// Посчитать агрегаты по спикерам
fn compute_speaker_stats(
    speakers: &[String],
    segments: &[TranscriptSegment],
) -> Vec<SpeakerStats> {
    speakers
        .iter()
        .map(|name| {
            let mut speaking_time = 0.0f64;
            let mut word_count = 0usize;
            let mut pause_sum = 0.0f64;
            let mut pause_count = 0usize;
            let mut prev_end = 0.0f64;

            for segment in segments {
                if &segment.speaker == name {
                    speaking_time += segment.end - segment.start;
                    word_count += segment.words.len();
                    pause_sum += segment.start - prev_end;
                    pause_count += 1;
                }
                prev_end = segment.end;
            }

            let avg_pace_wpm = if speaking_time > 0.0 {
                word_count as f64 / speaking_time * 60.0
            } else {
                0.0
            };
            let avg_pause_before = if pause_count > 0 {
                pause_sum / pause_count as f64
            } else {
                0.0
            };

            SpeakerStats {
                speaker: name.clone(),
                speaking_time,
                word_count,
                avg_pace_wpm,
                avg_pause_before,
            }
        })
        .collect()
}

/// Отрендерить SRT: одна нумерованная реплика на слово
fn render_srt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    let mut cue = 1usize;

    for segment in segments {
        for word in &segment.words {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}: {}\n\n",
                cue,
                format_srt_time(word.start),
                format_srt_time(word.end),
                segment.speaker,
                word.word
            ));
            cue += 1;
        }
    }

    out
}

/// Отрендерить VTT: заголовок WEBVTT, реплики без номеров
fn render_vtt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::from("WEBVTT\n\n");

    for segment in segments {
        for word in &segment.words {
            out.push_str(&format!(
                "{} --> {}\n{}: {}\n\n",
                format_vtt_time(word.start),
                format_vtt_time(word.end),
                segment.speaker,
                word.word
            ));
        }
    }

    out
}

fn format_srt_time(seconds: f64) -> String {
    let (h, m, s, ms) = split_time(seconds);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

fn format_vtt_time(seconds: f64) -> String {
    let (h, m, s, ms) = split_time(seconds);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

fn split_time(seconds: f64) -> (u64, u64, u64, u64) {
    let total_ms = (seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    (h, m, s, ms)
}
