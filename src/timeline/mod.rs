//! Модуль сборки таймлайна
//!
//! Этот модуль расставляет синтезированные сегменты по общей аудио
//! дорожке с точностью до сэмпла, заполняет промежутки тихим комфортным
//! шумом с плавными краями и кодирует результат в WAV.

use std::f32::consts::PI;
use std::io::Cursor;

use bytes::Bytes;

use crate::config::{AudioFormat, RetryPolicy};
use crate::error::{PodcastTtsError, Result};
use crate::tts::{retry_with_backoff, AudioSegment, SegmentSource};

/// Длительность плавного края вставляемой тишины (секунды)
const SILENCE_FADE: f32 = 0.05;
/// Уровень комфортной тишины: 10% полной шкалы.
/// Абсолютный ноль дает слышимый цифровой провал.
const SILENCE_FLOOR: f32 = 0.1;
/// Допуск на ошибки округления времени при проверке перекрытия
const TIME_EPSILON: f64 = 1e-9;

/// Собрать сегменты в один буфер интерливленных 16-битных сэмплов
///
/// Предусловие: сегменты отсортированы по времени начала и не
/// перекрываются; нарушение — фатальная ошибка, исправлять порядок
/// или обрезать сегменты сборщик не имеет права. Каждый сегмент
/// пишется со своего фрейма `floor(start_time * sample_rate)`;
/// промежутки (включая ведущий перед первым сегментом) заполняются
/// комфортной тишиной ровно по границам фреймов.
pub async fn assemble(
    segments: &[AudioSegment],
    format: &AudioFormat,
    retry: &RetryPolicy,
) -> Result<Vec<i16>> {
    if segments.is_empty() {
        return Ok(Vec::new());
    }

    validate_ordering(segments)?;

    let duration = segments
        .iter()
        .map(|s| s.end_time)
        .fold(0.0f64, f64::max);
    let total_frames = format.frame_at(duration);
    let channels = format.channels as usize;
    let mut buffer = vec![0i16; total_frames * channels];

    log::info!(
        "Assembling {} segments into {:.2}s timeline ({} frames at {})",
        segments.len(),
        duration,
        total_frames,
        format
    );

    let mut prev_end = 0.0f64;
    for (index, segment) in segments.iter().enumerate() {
        // Промежуток до сегмента заполняем комфортной тишиной
        let gap_start = format.frame_at(prev_end);
        let gap_end = format.frame_at(segment.start_time);
        if gap_end > gap_start {
            log::debug!(
                "Inserting {:.3}s of faded silence before segment {}",
                segment.start_time - prev_end,
                index
            );
            write_comfort_silence(&mut buffer, gap_start, gap_end, format);
        }

        let bytes = load_segment_bytes(&segment.source, retry).await.map_err(|e| {
            log::error!("Failed to load audio for segment {}: {}", index, e);
            e
        })?;
        let samples = decode_clip(&bytes, index, format)?;

        // Пишем клип со своего фрейма, не заходя за конец сегмента
        let start_frame = format.frame_at(segment.start_time);
        let end_frame = format.frame_at(segment.end_time).min(total_frames);
        let max_frames = end_frame.saturating_sub(start_frame);
        let clip_frames = (samples.len() / channels).min(max_frames);

        let dst_start = start_frame * channels;
        buffer[dst_start..dst_start + clip_frames * channels]
            .copy_from_slice(&samples[..clip_frames * channels]);

        prev_end = segment.end_time;
    }

    Ok(buffer)
}

/// Собрать сегменты и закодировать результат в WAV
pub async fn assemble_to_wav(
    segments: &[AudioSegment],
    format: &AudioFormat,
    retry: &RetryPolicy,
) -> Result<Vec<u8>> {
    let samples = assemble(segments, format, retry).await?;
    encode_wav(&samples, format)
}

/// Проверить порядок и отсутствие перекрытий
fn validate_ordering(segments: &[AudioSegment]) -> Result<()> {
    let mut prev_start = f64::NEG_INFINITY;
    let mut prev_end = 0.0f64;

    for (index, segment) in segments.iter().enumerate() {
        if segment.start_time < prev_start {
            return Err(PodcastTtsError::UnorderedSegments { index });
        }
        if index > 0 && segment.start_time < prev_end - TIME_EPSILON {
            return Err(PodcastTtsError::OverlappingSegments {
                index,
                overlap: prev_end - segment.start_time,
            });
        }
        prev_start = segment.start_time;
        prev_end = segment.end_time;
    }

    Ok(())
}

/// Заполнить диапазон фреймов комфортной тишиной с плавными краями
///
/// Уровень — 10% полной шкалы под косинусной огибающей ~50мс с обеих
/// сторон; один и тот же сэмпл пишется во все каналы фрейма.
fn write_comfort_silence(
    buffer: &mut [i16],
    start_frame: usize,
    end_frame: usize,
    format: &AudioFormat,
) {
    let frames = end_frame - start_frame;
    let fade_frames = ((SILENCE_FADE * format.sample_rate as f32) as usize).min(frames / 2);
    let floor = SILENCE_FLOOR * i16::MAX as f32;
    let channels = format.channels as usize;

    for i in 0..frames {
        let envelope = if i < fade_frames {
            0.5 * (1.0 - (PI * i as f32 / fade_frames as f32).cos())
        } else if i >= frames - fade_frames {
            let j = frames - 1 - i;
            0.5 * (1.0 - (PI * j as f32 / fade_frames as f32).cos())
        } else {
            1.0
        };

        let value = (floor * envelope) as i16;
        let frame = (start_frame + i) * channels;
        for c in 0..channels {
            buffer[frame + c] = value;
        }
    }
}

/// Получить байты сегмента из его источника
///
/// Удаленные источники загружаются с повторными попытками и
/// экспоненциальной задержкой; исчерпание попыток фатально для сборки.
async fn load_segment_bytes(source: &SegmentSource, retry: &RetryPolicy) -> Result<Bytes> {
    match source {
        SegmentSource::Memory(bytes) => Ok(bytes.clone()),
        SegmentSource::File(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        SegmentSource::Remote(url) => {
            let bytes = retry_with_backoff(retry, "segment download", || async {
                let response = reqwest::get(url.as_str()).await?.error_for_status()?;
                Ok(response.bytes().await?)
            })
            .await
            .map_err(|e| PodcastTtsError::Download {
                url: url.clone(),
                attempts: retry.max_attempts,
                message: e.to_string(),
            })?;
            Ok(bytes)
        }
    }
}

/// Декодировать WAV клип и проверить совпадение формата
///
/// Ресемплинг не выполняется: формат каждого клипа обязан совпадать
/// с форматом вывода, иначе сборка фатально завершается.
fn decode_clip(bytes: &[u8], index: usize, format: &AudioFormat) -> Result<Vec<i16>> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let expected = format.wav_spec();
    if spec.sample_rate != expected.sample_rate
        || spec.channels != expected.channels
        || spec.bits_per_sample != expected.bits_per_sample
        || spec.sample_format != expected.sample_format
    {
        return Err(PodcastTtsError::FormatMismatch {
            index,
            expected: format.to_string(),
            actual: format!(
                "{} Hz / {} ch / {} bit",
                spec.sample_rate, spec.channels, spec.bits_per_sample
            ),
        });
    }

    let samples: std::result::Result<Vec<i16>, _> = reader.into_samples::<i16>().collect();
    Ok(samples?)
}

/// Закодировать интерливленные сэмплы в WAV контейнер
pub fn encode_wav(samples: &[i16], format: &AudioFormat) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, format.wav_spec())?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::CharacterAlignment;

    fn test_format() -> AudioFormat {
        AudioFormat {
            sample_rate: 8000,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    /// WAV клип заданной длительности с постоянным уровнем сэмплов
    fn wav_clip(duration: f64, value: i16, format: &AudioFormat) -> Bytes {
        let frames = format.frame_at(duration);
        let samples = vec![value; frames * format.channels as usize];
        Bytes::from(encode_wav(&samples, format).unwrap())
    }

    fn segment(start: f64, end: f64, value: i16, format: &AudioFormat) -> AudioSegment {
        AudioSegment {
            speaker: "adam".to_string(),
            source: SegmentSource::Memory(wav_clip(end - start, value, format)),
            start_time: start,
            end_time: end,
            alignment: CharacterAlignment::default(),
        }
    }

    #[tokio::test]
    async fn test_gap_filled_with_faded_silence() {
        // Сегмент A [0, 2], сегмент B [3, 5]: ровно 1.0s тишины с t=2
        let format = test_format();
        let segments = vec![
            segment(0.0, 2.0, 10000, &format),
            segment(3.0, 5.0, -10000, &format),
        ];

        let buffer = assemble(&segments, &format, &RetryPolicy::default())
            .await
            .unwrap();

        // Итоговая длительность 5.0s
        assert_eq!(buffer.len(), format.frame_at(5.0));

        // Внутри сегментов — их сэмплы
        assert_eq!(buffer[format.frame_at(1.0)], 10000);
        assert_eq!(buffer[format.frame_at(4.0)], -10000);

        // Середина промежутка — комфортная тишина на ~10% шкалы
        let mid_gap = buffer[format.frame_at(2.5)];
        assert!(mid_gap > 0 && mid_gap <= (0.1 * i16::MAX as f32) as i16 + 1);

        // Края тишины приглушены огибающей
        let gap_edge = buffer[format.frame_at(2.0)];
        assert!(gap_edge.abs() < mid_gap.abs());
    }

    #[tokio::test]
    async fn test_leading_gap_before_first_segment() {
        let format = test_format();
        let segments = vec![segment(0.5, 1.5, 5000, &format)];

        let buffer = assemble(&segments, &format, &RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(buffer.len(), format.frame_at(1.5));
        // Ведущий промежуток заполнен тишиной, не нулями
        assert!(buffer[format.frame_at(0.25)] > 0);
        assert_eq!(buffer[format.frame_at(1.0)], 5000);
    }

    #[tokio::test]
    async fn test_written_ranges_are_disjoint_and_cover_timeline() {
        let format = test_format();
        let segments = vec![
            segment(0.0, 1.0, 1000, &format),
            segment(1.25, 2.0, 2000, &format),
            segment(2.0, 3.0, 3000, &format),
        ];

        let buffer = assemble(&segments, &format, &RetryPolicy::default())
            .await
            .unwrap();

        // Каждый фрейм таймлайна записан ровно одним источником
        for (i, &s) in buffer.iter().enumerate() {
            let t = i as f64 / format.sample_rate as f64;
            if t < 1.0 {
                assert_eq!(s, 1000, "frame {} at {:.3}s", i, t);
            } else if t >= 1.25 && t < 2.0 {
                assert_eq!(s, 2000, "frame {} at {:.3}s", i, t);
            } else if t >= 2.0 {
                assert_eq!(s, 3000, "frame {} at {:.3}s", i, t);
            }
        }
    }

    #[tokio::test]
    async fn test_overlap_is_fatal() {
        let format = test_format();
        let segments = vec![
            segment(0.0, 2.0, 1000, &format),
            segment(1.5, 3.0, 2000, &format),
        ];

        let err = assemble(&segments, &format, &RetryPolicy::default())
            .await
            .unwrap_err();
        match err {
            PodcastTtsError::OverlappingSegments { index, overlap } => {
                assert_eq!(index, 1);
                assert!((overlap - 0.5).abs() < 1e-9);
            }
            other => panic!("expected OverlappingSegments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unordered_is_fatal() {
        let format = test_format();
        let segments = vec![
            segment(3.0, 4.0, 1000, &format),
            segment(0.0, 1.0, 2000, &format),
        ];

        let err = assemble(&segments, &format, &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PodcastTtsError::UnorderedSegments { index: 1 }
        ));
    }

    #[tokio::test]
    async fn test_format_mismatch_is_fatal() {
        let format = test_format();
        let other_format = AudioFormat {
            sample_rate: 16000,
            channels: 1,
            bits_per_sample: 16,
        };
        let segments = vec![AudioSegment {
            speaker: "adam".to_string(),
            source: SegmentSource::Memory(wav_clip(1.0, 100, &other_format)),
            start_time: 0.0,
            end_time: 1.0,
            alignment: CharacterAlignment::default(),
        }];

        let err = assemble(&segments, &format, &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PodcastTtsError::FormatMismatch { index: 0, .. }
        ));
    }

    #[test]
    fn test_wav_round_trip() {
        let format = test_format();
        let samples = vec![123i16; 800];
        let wav = encode_wav(&samples, &format).unwrap();
        let decoded = decode_clip(&wav, 0, &format).unwrap();
        assert_eq!(decoded, samples);
    }
}
