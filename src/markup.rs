//! Модуль разметки для синтеза речи
//!
//! Этот модуль преобразует чистый текст реплики и решение о тайминге
//! в размеченный текст для TTS провайдера (маркеры пауз и просодическая
//! обертка) и обратно в чистый текст для отображения и транскрипта.

use lazy_static::lazy_static;
use regex::Regex;

use crate::prosody::{ConversationAnalysis, IntentType, TimingDecision};
use crate::script::Emotion;

/// Максимум вставляемых пунктуационных пауз на реплику.
/// Паузы сверх лимита молча отбрасываются, не объединяются.
const MAX_PUNCTUATION_BREAKS: usize = 5;

/// Порог паузы, при котором вставляется маркер до/после реплики
const EDGE_BREAK_THRESHOLD: f32 = 0.3;

lazy_static! {
    static ref BREAK_TAG: Regex = Regex::new(r#"<break\s+time="[^"]*"\s*/>"#).unwrap();
    static ref PROSODY_TAG: Regex = Regex::new(r"</?prosody[^>]*>").unwrap();
    static ref EMPTY_PROSODY: Regex = Regex::new(r"<prosody[^>]*>\s*</prosody>").unwrap();
    static ref ADJACENT_BREAKS: Regex =
        Regex::new(r#"(<break\s+time="[^"]*"\s*/>)(\s*<break\s+time="[^"]*"\s*/>)+"#).unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Убрать всю разметку, оставив чистый произносимый текст
///
/// Операция без потерь для текста без разметки: никаких остатков тегов
/// и двойных пробелов.
pub fn to_narration(markup: &str) -> String {
    let text = BREAK_TAG.replace_all(markup, " ");
    let text = PROSODY_TAG.replace_all(&text, " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Собрать размеченный текст для TTS провайдера
///
/// Чистый текст оборачивается в одну просодическую обертку с подсказками
/// громкости/высоты/скорости, выведенными из тона и намерения; маркеры пауз
/// вставляются перед репликой, после пунктуации и после реплики.
pub fn to_synthesizable(
    text: &str,
    decision: &TimingDecision,
    analysis: &ConversationAnalysis,
) -> String {
    let (volume, pitch) = prosody_hints(analysis.tone, analysis.intent);
    let rate = (decision.pace * 100.0).round() as i32;

    // Маркеры краевых пауз живут внутри обертки, чтобы проход очистки
    // видел их соседство с пунктуационными маркерами
    let mut out = format!(
        r#"<prosody volume="{}" pitch="{}" rate="{}%">"#,
        volume, pitch, rate
    );
    if decision.pre_pause >= EDGE_BREAK_THRESHOLD {
        out.push_str(&break_tag(decision.pre_pause));
        out.push(' ');
    }
    out.push_str(&insert_punctuation_breaks(text));
    if decision.post_pause >= EDGE_BREAK_THRESHOLD {
        out.push(' ');
        out.push_str(&break_tag(decision.post_pause));
    }
    out.push_str("</prosody>");

    cleanup(&out)
}

/// Добавить к разметке паузы уровня реплики
///
/// Явные паузы из модификаторов и дискреционные паузы объединяются в один
/// маркер в конце реплики, внутри просодической обертки. Вставка не
/// гарантирована: если край реплики уже несет маркер, проход очистки
/// оставляет первый из соседних.
pub fn append_trailing_breaks(markup: &str, breaks: &[f32]) -> String {
    let total: f32 = breaks.iter().copied().filter(|b| *b > 0.0).sum();
    if total <= 0.0 {
        return markup.to_string();
    }

    let tag = break_tag(total);
    let with_break = match markup.rfind("</prosody>") {
        Some(pos) => format!("{} {}{}", &markup[..pos], tag, &markup[pos..]),
        None => format!("{} {}", markup, tag),
    };
    cleanup(&with_break)
}

/// Закрытое отображение тона и намерения в просодические подсказки
fn prosody_hints(tone: Emotion, intent: IntentType) -> (&'static str, &'static str) {
    let volume = match tone {
        Emotion::Excited | Emotion::Angry => "loud",
        Emotion::Sad | Emotion::Contemplative => "soft",
        Emotion::Neutral => "medium",
    };
    let pitch = match intent {
        // Вопросительная интонация поднимает тон независимо от эмоции
        IntentType::Question => "+15%",
        IntentType::Exclamation => "+20%",
        IntentType::Statement => match tone {
            Emotion::Excited | Emotion::Angry => "+10%",
            Emotion::Sad | Emotion::Contemplative => "-10%",
            Emotion::Neutral => "+0%",
        },
    };
    (volume, pitch)
}

/// Вставить маркеры пауз после пунктуации, не больше лимита на реплику
fn insert_punctuation_breaks(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut inserted = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];

        // Многоточие из трех точек обрабатываем как один знак
        let (pause, consumed) = if c == '.' && chars.get(i + 1) == Some(&'.') && chars.get(i + 2) == Some(&'.') {
            (Some(1.0), 3)
        } else {
            (
                match c {
                    ',' => Some(0.2),
                    '.' => Some(0.5),
                    '!' => Some(0.5),
                    '?' => Some(0.5),
                    '…' => Some(1.0),
                    _ => None,
                },
                1,
            )
        };

        for _ in 0..consumed {
            out.push(chars[i]);
            i += 1;
        }

        if let Some(pause) = pause {
            if inserted < MAX_PUNCTUATION_BREAKS {
                out.push(' ');
                out.push_str(&break_tag(pause));
                out.push(' ');
                inserted += 1;
            }
        }
    }

    out
}

fn break_tag(seconds: f32) -> String {
    format!(r#"<break time="{:.1}s"/>"#, seconds)
}

/// Завершающий проход очистки разметки
///
/// Схлопывает повторные пробелы, удаляет пустые просодические обертки,
/// объединяет соседние маркеры пауз (остается первый) и обрезает края.
fn cleanup(markup: &str) -> String {
    let text = WHITESPACE.replace_all(markup, " ");
    let text = EMPTY_PROSODY.replace_all(&text, " ");
    let text = ADJACENT_BREAKS.replace_all(&text, "$1");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
