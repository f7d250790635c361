//! Generated reply and language handling.

use serde::{Deserialize, Serialize};

/// The two reply languages the loop distinguishes.
///
/// `Primary` is CJK text (no word separators), `Secondary` is Latin-script
/// text (space separated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Primary,
    Secondary,
}

impl Language {
    /// String placed between segments when they are joined back together.
    pub fn joiner(self) -> &'static str {
        match self {
            Self::Primary => "",
            Self::Secondary => " ",
        }
    }

    /// Short code used in logs and prompts.
    pub fn code(self) -> &'static str {
        match self {
            Self::Primary => "zh",
            Self::Secondary => "en",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Decide the language of `text` by counting CJK and Latin letters.
///
/// More CJK than Latin wins Primary; otherwise any Latin letter means
/// Secondary; text with neither (emoji, digits) falls back to Primary.
pub fn detect_language(text: &str) -> Language {
    let (cjk, latin) = text.chars().fold((0usize, 0usize), |(cjk, latin), c| {
        if is_cjk(c) {
            (cjk + 1, latin)
        } else if c.is_ascii_alphabetic() {
            (cjk, latin + 1)
        } else {
            (cjk, latin)
        }
    });

    if cjk > latin {
        Language::Primary
    } else if latin > 0 {
        Language::Secondary
    } else {
        Language::Primary
    }
}

/// A finished reply, ready for segmentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyResult {
    pub text: String,
    pub language: Language,
}

impl ReplyResult {
    /// Normalize raw generator output into a reply.
    ///
    /// Surrounding whitespace is trimmed and the language detected on the
    /// reply itself. Secondary-language text has its internal whitespace
    /// collapsed to single spaces, so word segments join back exactly.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        let language = detect_language(trimmed);
        let text = match language {
            Language::Primary => trimmed.to_string(),
            Language::Secondary => trimmed.split_whitespace().collect::<Vec<_>>().join(" "),
        };
        Self { text, language }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cjk_majority() {
        assert_eq!(detect_language("你好"), Language::Primary);
        assert_eq!(detect_language("你好 ok"), Language::Secondary);
        assert_eq!(detect_language("今天天气 nice"), Language::Primary);
    }

    #[test]
    fn detects_latin() {
        assert_eq!(detect_language("How are you?"), Language::Secondary);
    }

    #[test]
    fn neither_falls_back_to_primary() {
        assert_eq!(detect_language("👍 123"), Language::Primary);
        assert_eq!(detect_language(""), Language::Primary);
    }

    #[test]
    fn reply_normalization() {
        let r = ReplyResult::from_raw("  Sounds   good,\n see you  soon! ");
        assert_eq!(r.language, Language::Secondary);
        assert_eq!(r.text, "Sounds good, see you soon!");

        let r = ReplyResult::from_raw("\n你好！最近怎么样？ ");
        assert_eq!(r.language, Language::Primary);
        assert_eq!(r.text, "你好！最近怎么样？");
    }

    #[test]
    fn joiners() {
        assert_eq!(Language::Primary.joiner(), "");
        assert_eq!(Language::Secondary.joiner(), " ");
    }
}
