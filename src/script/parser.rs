//! Парсер текста сценария
//!
//! Этот модуль содержит функции для разбора текста сценария с тегами
//! спикеров в упорядоченный список реплик.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{PodcastTtsError, Result};
use super::types::{DialogueTurn, Emotion, PaceTag, SpeakerRegistry, TurnModifiers};

lazy_static! {
    /// Тег спикера: `[name]` или `[name|mod,mod,...]`
    static ref SPEAKER_TAG: Regex =
        Regex::new(r"\[([^\]|]*)(?:\|([^\]]*))?\]").unwrap();
    /// Явная пауза: `<break time="0.3s"/>`
    static ref BREAK_TAG: Regex =
        Regex::new(r#"<break\s+time="([^"]*)s"\s*/>"#).unwrap();
}

/// Разобрать текст сценария в упорядоченный список реплик
///
/// Имена спикеров сверяются с реестром без учета регистра; незарегистрированный
/// спикер — фатальная ошибка. Теги `<break time="Xs"/>` извлекаются в список
/// явных пауз реплики в порядке появления.
pub fn parse(raw: &str, registry: &SpeakerRegistry) -> Result<Vec<DialogueTurn>> {
    let matches: Vec<_> = SPEAKER_TAG.captures_iter(raw).collect();

    if matches.is_empty() {
        log::error!("Script contains no speaker tags");
        return Err(PodcastTtsError::EmptyDialogue);
    }

    // Текст до первого тега не принадлежит никакой реплике
    let first_start = matches[0].get(0).unwrap().start();
    let prefix = &raw[..first_start];
    if !prefix.trim().is_empty() {
        return Err(PodcastTtsError::MalformedTag(format!(
            "text before first speaker tag: '{}'",
            prefix.trim()
        )));
    }

    let mut turns = Vec::with_capacity(matches.len());

    for (i, caps) in matches.iter().enumerate() {
        let tag = caps.get(0).unwrap();
        let name = caps.get(1).unwrap().as_str().trim();

        if name.is_empty() {
            return Err(PodcastTtsError::MalformedTag(format!(
                "empty speaker name in tag '{}'",
                tag.as_str()
            )));
        }

        let speaker = registry
            .get(name)
            .ok_or_else(|| PodcastTtsError::UnknownSpeaker(name.to_string()))?;

        // Модификаторы: закрытые наборы токенов, неизвестные токены игнорируются
        let mut modifiers = TurnModifiers::default();
        if let Some(mods) = caps.get(2) {
            collect_breaks(mods.as_str(), &mut modifiers.breaks)?;
            let cleaned = BREAK_TAG.replace_all(mods.as_str(), "");
            for token in cleaned.split(',') {
                let token = token.trim().to_lowercase();
                if let Some(emotion) = Emotion::from_token(&token) {
                    modifiers.emotion = emotion;
                } else if let Some(pace) = PaceTag::from_token(&token) {
                    modifiers.pace = pace;
                } else if !token.is_empty() {
                    log::debug!("Ignoring unrecognized modifier token '{}'", token);
                }
            }
        }

        // Тело реплики: от конца тега до начала следующего тега или конца текста
        let body_start = tag.end();
        let body_end = matches
            .get(i + 1)
            .map(|next| next.get(0).unwrap().start())
            .unwrap_or(raw.len());
        let body = &raw[body_start..body_end];

        collect_breaks(body, &mut modifiers.breaks)?;
        let text = BREAK_TAG.replace_all(body, " ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        turns.push(DialogueTurn {
            speaker: speaker.name.clone(),
            text,
            order_index: i,
            reply_to: if i == 0 { None } else { Some(i - 1) },
            modifiers,
        });
    }

    log::info!("Parsed {} dialogue turns", turns.len());
    Ok(turns)
}

/// Извлечь длительности пауз из тегов `<break time="Xs"/>` в порядке появления
fn collect_breaks(text: &str, breaks: &mut Vec<f32>) -> Result<()> {
    for caps in BREAK_TAG.captures_iter(text) {
        let value = caps.get(1).unwrap().as_str();
        let seconds: f32 = value.parse().map_err(|_| {
            PodcastTtsError::MalformedTag(format!("invalid break duration '{}s'", value))
        })?;
        breaks.push(seconds);
    }
    Ok(())
}

/// Сериализовать реплики обратно в текст сценария
///
/// Обратная операция к [`parse`]: повторный разбор результата дает
/// тот же список реплик.
pub fn to_script(turns: &[DialogueTurn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let mut mods = Vec::new();
        if turn.modifiers.emotion != Emotion::Neutral {
            mods.push(turn.modifiers.emotion.as_str().to_string());
        }
        if turn.modifiers.pace != PaceTag::Normal {
            mods.push(turn.modifiers.pace.as_str().to_string());
        }

        if mods.is_empty() {
            out.push_str(&format!("[{}] {}", turn.speaker, turn.text));
        } else {
            out.push_str(&format!("[{}|{}] {}", turn.speaker, mods.join(","), turn.text));
        }

        for pause in &turn.modifiers.breaks {
            out.push_str(&format!(" <break time=\"{}s\"/>", pause));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::types::Speaker;

    fn registry() -> SpeakerRegistry {
        SpeakerRegistry::from_speakers(vec![
            Speaker::new("adam", "voice-adam"),
            Speaker::new("sarah", "voice-sarah"),
        ])
    }

    #[test]
    fn test_two_turns_with_break() {
        let script = r#"[adam] Hello there! <break time="0.3s"/> [sarah] Hi!"#;
        let turns = parse(script, &registry()).unwrap();

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, "adam");
        assert_eq!(turns[0].text, "Hello there!");
        assert_eq!(turns[0].modifiers.breaks, vec![0.3]);
        assert_eq!(turns[0].reply_to, None);
        assert_eq!(turns[1].speaker, "sarah");
        assert_eq!(turns[1].text, "Hi!");
        assert!(turns[1].modifiers.breaks.is_empty());
        assert_eq!(turns[1].reply_to, Some(0));
    }

    #[test]
    fn test_unknown_speaker_is_fatal() {
        let err = parse("[bob] hi", &registry()).unwrap_err();
        match err {
            PodcastTtsError::UnknownSpeaker(name) => assert_eq!(name, "bob"),
            other => panic!("expected UnknownSpeaker, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_script_is_fatal() {
        let err = parse("just text, no tags", &registry()).unwrap_err();
        assert!(matches!(err, PodcastTtsError::EmptyDialogue));
    }

    #[test]
    fn test_text_before_first_tag_is_malformed() {
        let err = parse("hello [adam] hi", &registry()).unwrap_err();
        assert!(matches!(err, PodcastTtsError::MalformedTag(_)));
    }

    #[test]
    fn test_empty_speaker_name_is_malformed() {
        let err = parse("[ ] hi", &registry()).unwrap_err();
        assert!(matches!(err, PodcastTtsError::MalformedTag(_)));
    }

    #[test]
    fn test_modifiers_parsed_and_unknown_ignored() {
        let turns = parse("[adam|excited,fast,wobbly] Great news!", &registry()).unwrap();
        assert_eq!(turns[0].modifiers.emotion, Emotion::Excited);
        assert_eq!(turns[0].modifiers.pace, PaceTag::Fast);
    }

    #[test]
    fn test_case_insensitive_speaker_match() {
        let turns = parse("[Adam] Hi [SARAH] Hello", &registry()).unwrap();
        assert_eq!(turns[0].speaker, "adam");
        assert_eq!(turns[1].speaker, "sarah");
    }

    #[test]
    fn test_round_trip() {
        let script = "[adam|excited] Hello there! <break time=\"0.3s\"/>\n[sarah|sad,slow] Oh no...\n[adam] Bye";
        let turns = parse(script, &registry()).unwrap();
        let reparsed = parse(&to_script(&turns), &registry()).unwrap();
        assert_eq!(turns, reparsed);
    }
}
