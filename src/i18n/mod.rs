use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANGUAGE: &str = "bg";

static TRANSLATIONS: OnceLock<HashMap<String, Value>> = OnceLock::new();

fn load_translations() -> HashMap<String, Value> {
    let mut translations = HashMap::new();

    let bg_json = include_str!("bg.json");
    if let Ok(bg_value) = serde_json::from_str(bg_json) {
        translations.insert("bg".to_string(), bg_value);
    } else {
        tracing::error!("Failed to parse bg.json");
    }

    let en_json = include_str!("en.json");
    if let Ok(en_value) = serde_json::from_str(en_json) {
        translations.insert("en".to_string(), en_value);
    } else {
        tracing::error!("Failed to parse en.json");
    }

    translations
}

fn get_nested_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in key.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

fn lookup(language: &str, path: &str) -> Option<&'static Value> {
    let translations = TRANSLATIONS.get_or_init(load_translations);

    translations
        .get(language)
        .and_then(|value| get_nested_value(value, path))
        .or_else(|| {
            translations
                .get(DEFAULT_LANGUAGE)
                .and_then(|value| get_nested_value(value, path))
        })
}

pub fn t(language: &str, path: &str) -> String {
    match lookup(language, path).and_then(|value| value.as_str()) {
        Some(translation) => translation.to_string(),
        None => format!("Message not found: {}", path),
    }
}

/// Fills the `{}` placeholders of the template in order. Arguments are never
/// scanned for placeholders themselves, and a placeholder without an
/// argument is left as is.
pub fn t_with_args(language: &str, path: &str, args: &[&str]) -> String {
    let template = t(language, path);
    let mut message = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut pieces = template.split("{}").peekable();

    while let Some(piece) = pieces.next() {
        message.push_str(piece);
        if pieces.peek().is_some() {
            message.push_str(args.next().copied().unwrap_or("{}"));
        }
    }

    message
}

/// Human form of an appointment date, e.g. `Събота, 1 юни`.
pub fn format_date(language: &str, date: NaiveDate) -> String {
    let pick = |path: &str, index: usize| {
        lookup(language, path)
            .and_then(|value| value.as_array())
            .and_then(|items| items.get(index))
            .and_then(|item| item.as_str())
            .map(str::to_string)
    };

    let weekday = pick("date.days", date.weekday().num_days_from_sunday() as usize);
    let month = pick("date.months", date.month0() as usize);

    match (weekday, month) {
        (Some(weekday), Some(month)) => format!("{}, {} {}", weekday, date.day(), month),
        _ => date.format("%Y-%m-%d").to_string(),
    }
}
