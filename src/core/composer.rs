use crate::domain::model::MatchSet;
use crate::domain::ports::Greeter;

pub const FALLBACK_CLOSING: &str = "🎉 Happy birthday to everyone celebrating!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Day {
    Today,
    Tomorrow,
}

/// How the outgoing text is interpreted by the Bot API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextFormat {
    /// `parse_mode = "HTML"`; names must be escaped.
    #[default]
    Html,
    /// No parse mode; text is shown verbatim.
    Plain,
}

impl TextFormat {
    pub fn escape(self, text: &str) -> String {
        match self {
            Self::Html => escape_html(text),
            Self::Plain => text.to_string(),
        }
    }
}

/// Builds the daily digest. Flavor text comes from the injected [`Greeter`].
pub struct MessageComposer {
    greeter: Box<dyn Greeter>,
    format: TextFormat,
}

impl MessageComposer {
    pub fn new(greeter: Box<dyn Greeter>) -> Self {
        Self {
            greeter,
            format: TextFormat::default(),
        }
    }

    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }

    /// `None` when nobody has a birthday today or tomorrow.
    pub fn compose(&self, matches: &MatchSet) -> Option<String> {
        let sections: Vec<String> = [
            self.section(&matches.today, Day::Today),
            self.section(&matches.tomorrow, Day::Tomorrow),
        ]
        .into_iter()
        .flatten()
        .collect();

        if sections.is_empty() {
            return None;
        }

        let closing = self
            .greeter
            .closing_phrase()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_CLOSING.to_string());

        let mut message = sections.join("\n\n");
        message.push_str("\n\n");
        message.push_str(&closing);
        Some(message)
    }

    fn section(&self, names: &[String], day: Day) -> Option<String> {
        let header = header(names, day, self.format)?;

        let greeting = match names {
            [single] => self.greeter.personal_greeting(single),
            _ => self.greeter.collective_greeting(names),
        }
        .filter(|text| !text.trim().is_empty());

        Some(match greeting {
            Some(text) => format!("{}\n\n{}", header, text),
            None => header,
        })
    }
}

fn header(names: &[String], day: Day, format: TextFormat) -> Option<String> {
    let escaped: Vec<String> = names.iter().map(|n| format.escape(n)).collect();
    match (escaped.as_slice(), day) {
        ([], _) => None,
        ([name], Day::Today) => Some(format!("🎂 Today is {}'s birthday!", name)),
        ([name], Day::Tomorrow) => Some(format!("📅 Tomorrow is {}'s birthday!", name)),
        (all, Day::Today) => Some(format!("🎉 Today are the birthdays of: {}!", all.join(", "))),
        (all, Day::Tomorrow) => Some(format!("📅 Tomorrow are the birthdays of: {}!", all.join(", "))),
    }
}

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
