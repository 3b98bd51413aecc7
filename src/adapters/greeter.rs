use crate::config::toml_config::GreetingsConfig;
use crate::core::composer::TextFormat;
use crate::domain::ports::{Clock, Greeter};
use chrono::Datelike;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const DEFAULT_PERSONAL: &[&str] = &[
    "Happy birthday, {name}! Wishing you a year full of good health, bright ideas and people who make you smile.",
    "{name}, congratulations! May every day of the coming year bring something to be proud of.",
    "Dear {name}, happy birthday! Let the new year of your life be calm, warm and generous.",
];

const DEFAULT_COLLECTIVE: &[&str] = &[
    "Happy birthday to {names}! Wishing each of you health, luck and plenty of reasons to celebrate.",
    "{names}, congratulations! May the year ahead be kind to all of you.",
];

const DEFAULT_CLOSING: &[&str] = &[
    "🎉 Happy birthday to everyone celebrating!",
    "🥳 Don't forget to congratulate them today!",
];

/// Always unavailable, so the composer uses bare headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGreeter;

impl Greeter for NoopGreeter {
    fn personal_greeting(&self, _name: &str) -> Option<String> {
        None
    }

    fn collective_greeting(&self, _names: &[String]) -> Option<String> {
        None
    }

    fn closing_phrase(&self) -> Option<String> {
        None
    }
}

/// Phrase-bank greeter. Picks are stable for the same names on the same day.
pub struct TemplateGreeter {
    personal: Vec<String>,
    collective: Vec<String>,
    closing: Vec<String>,
    clock: Arc<dyn Clock>,
    format: TextFormat,
}

impl TemplateGreeter {
    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        Self::from_config(&GreetingsConfig::default(), clock)
    }

    pub fn from_config(config: &GreetingsConfig, clock: Arc<dyn Clock>) -> Self {
        let bank = |custom: &Option<Vec<String>>, defaults: &[&str]| -> Vec<String> {
            match custom {
                Some(list) => list.iter().filter(|t| !t.trim().is_empty()).cloned().collect(),
                None => defaults.iter().map(|t| t.to_string()).collect(),
            }
        };

        Self {
            personal: bank(&config.personal, DEFAULT_PERSONAL),
            collective: bank(&config.collective, DEFAULT_COLLECTIVE),
            closing: bank(&config.closing, DEFAULT_CLOSING),
            clock,
            format: TextFormat::default(),
        }
    }

    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }

    fn pick<'a>(&self, bank: &'a [String], key: &[&str]) -> Option<&'a String> {
        if bank.is_empty() {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        self.clock.now().ordinal().hash(&mut hasher);
        let index = (hasher.finish() % bank.len() as u64) as usize;
        bank.get(index)
    }
}

impl Greeter for TemplateGreeter {
    fn personal_greeting(&self, name: &str) -> Option<String> {
        let template = self.pick(&self.personal, &[name])?;
        Some(template.replace("{name}", &self.format.escape(extract_first_name(name))))
    }

    fn collective_greeting(&self, names: &[String]) -> Option<String> {
        let key: Vec<&str> = names.iter().map(String::as_str).collect();
        let template = self.pick(&self.collective, &key)?;
        let first_names: Vec<String> = names
            .iter()
            .map(|n| self.format.escape(extract_first_name(n)))
            .collect();
        Some(template.replace("{names}", &join_names(&first_names)))
    }

    fn closing_phrase(&self) -> Option<String> {
        self.pick(&self.closing, &["closing"]).cloned()
    }
}

/// Picks the given name out of "Surname Name [Patronymic]"; a single word is
/// returned as is.
pub fn extract_first_name(full_name: &str) -> &str {
    let mut parts = full_name.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(_), Some(given)) => given,
        (Some(only), None) => only,
        _ => full_name.trim(),
    }
}

fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

pub fn build_greeter(config: &GreetingsConfig, clock: Arc<dyn Clock>, format: TextFormat) -> Box<dyn Greeter> {
    if config.enabled {
        Box::new(TemplateGreeter::from_config(config, clock).with_format(format))
    } else {
        tracing::info!("Greeting generator disabled, using plain headers");
        Box::new(NoopGreeter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 7, 5, 6, 0, 0).unwrap()))
    }

    #[test]
    fn test_extract_first_name() {
        assert_eq!(extract_first_name("Petrova Anna Sergeevna"), "Anna");
        assert_eq!(extract_first_name("Ivanov Ivan"), "Ivan");
        assert_eq!(extract_first_name("Madonna"), "Madonna");
        assert_eq!(extract_first_name("   "), "");
    }

    #[test]
    fn test_personal_greeting_addresses_first_name() {
        let greeter = TemplateGreeter::with_defaults(clock());
        let text = greeter.personal_greeting("Petrova Anna").unwrap();
        assert!(text.contains("Anna"));
        assert!(!text.contains("Petrova"));
        assert!(!text.contains("{name}"));
    }

    #[test]
    fn test_collective_greeting_lists_everyone() {
        let greeter = TemplateGreeter::with_defaults(clock());
        let names = vec!["Ivanov Ivan".to_string(), "Olga".to_string(), "Sidorov Petr".to_string()];
        let text = greeter.collective_greeting(&names).unwrap();
        assert!(text.contains("Ivan, Olga and Petr"));
    }

    #[test]
    fn test_pick_is_stable_for_same_day() {
        let greeter = TemplateGreeter::with_defaults(clock());
        assert_eq!(greeter.personal_greeting("Anna"), greeter.personal_greeting("Anna"));
        assert_eq!(greeter.closing_phrase(), greeter.closing_phrase());
    }

    #[test]
    fn test_custom_banks_and_empty_bank_is_unavailable() {
        let config = GreetingsConfig {
            enabled: true,
            personal: Some(vec!["Hi {name}!".to_string()]),
            collective: Some(vec![]),
            closing: None,
        };
        let greeter = TemplateGreeter::from_config(&config, clock());

        assert_eq!(greeter.personal_greeting("Ivanov Ivan").as_deref(), Some("Hi Ivan!"));
        assert_eq!(greeter.collective_greeting(&["A".to_string(), "B".to_string()]), None);
        assert!(greeter.closing_phrase().is_some());
    }

    #[test]
    fn test_disabled_config_builds_noop() {
        let config = GreetingsConfig {
            enabled: false,
            ..GreetingsConfig::default()
        };
        let greeter = build_greeter(&config, clock(), TextFormat::Html);
        assert_eq!(greeter.personal_greeting("Anna"), None);
        assert_eq!(greeter.closing_phrase(), None);
    }

    #[test]
    fn test_first_name_escaping_follows_format() {
        let config = GreetingsConfig {
            enabled: true,
            personal: Some(vec!["Hi {name}!".to_string()]),
            collective: Some(vec!["Hi {names}!".to_string()]),
            closing: None,
        };
        let html = build_greeter(&config, clock(), TextFormat::Html);
        let plain = build_greeter(&config, clock(), TextFormat::Plain);

        assert_eq!(html.personal_greeting("Cat <Tom>").as_deref(), Some("Hi &lt;Tom&gt;!"));
        assert_eq!(plain.personal_greeting("Cat <Tom>").as_deref(), Some("Hi <Tom>!"));
        assert_eq!(
            plain.collective_greeting(&["R&D Ann".to_string(), "Bo".to_string()]).as_deref(),
            Some("Hi Ann and Bo!")
        );
    }
}
