//! Splits a finished reply into the pieces that are typed into the feed one
//! after another.

use feedreply_core::reply::Language;

/// Running length at which a primary-language segment is cut.
const PRIMARY_MAX_CHARS: usize = 5;
/// Words per secondary-language segment.
const SECONDARY_MAX_WORDS: usize = 3;

const PRIMARY_BREAKS: &str = "，。！？、；：!?,.;";
const SECONDARY_BREAKS: [char; 6] = ['.', '!', '?', ',', ';', ':'];

fn is_primary_break(c: char) -> bool {
    PRIMARY_BREAKS.contains(c)
}

/// Split `text` into delivery segments.
///
/// Joining the result with `language.joiner()` gives back `text` (with
/// whitespace already collapsed for the secondary language). Non-empty text
/// always yields at least one segment.
pub fn segment(text: &str, language: Language) -> Vec<String> {
    match language {
        Language::Primary => segment_primary(text),
        Language::Secondary => segment_secondary(text),
    }
}

fn segment_primary(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        count += 1;

        // Punctuation stays attached to the text before it
        let next_is_break = chars.get(i + 1).is_some_and(|&n| is_primary_break(n));
        if (is_primary_break(c) || count >= PRIMARY_MAX_CHARS) && !next_is_break {
            segments.push(std::mem::take(&mut current));
            count = 0;
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn segment_secondary(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut words: Vec<&str> = Vec::with_capacity(SECONDARY_MAX_WORDS);

    for word in text.split_whitespace() {
        words.push(word);
        if words.len() >= SECONDARY_MAX_WORDS || word.ends_with(SECONDARY_BREAKS) {
            segments.push(words.join(" "));
            words.clear();
        }
    }

    if !words.is_empty() {
        segments.push(words.join(" "));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str, language: Language) {
        let segs = segment(text, language);
        assert!(!segs.is_empty());
        assert_eq!(segs.join(language.joiner()), text);
    }

    #[test]
    fn greeting_splits_at_punctuation() {
        assert_eq!(
            segment("你好！最近怎么样？", Language::Primary),
            vec!["你好！", "最近怎么样？"]
        );
    }

    #[test]
    fn long_primary_run_cuts_every_five() {
        assert_eq!(
            segment("今天天气非常好我们去公园", Language::Primary),
            vec!["今天天气非", "常好我们去", "公园"]
        );
    }

    #[test]
    fn consecutive_punctuation_stays_together() {
        assert_eq!(
            segment("真的吗？！太好了。", Language::Primary),
            vec!["真的吗？！", "太好了。"]
        );
    }

    #[test]
    fn secondary_cuts_on_words_and_punctuation() {
        assert_eq!(
            segment("Sounds good, see you there tomorrow!", Language::Secondary),
            vec!["Sounds good,", "see you there", "tomorrow!"]
        );
    }

    #[test]
    fn single_word() {
        assert_eq!(segment("Hi", Language::Secondary), vec!["Hi"]);
        assert_eq!(segment("好", Language::Primary), vec!["好"]);
    }

    #[test]
    fn empty_text_has_no_segments() {
        assert!(segment("", Language::Primary).is_empty());
        assert!(segment("", Language::Secondary).is_empty());
    }

    #[test]
    fn segments_rejoin_to_the_reply() {
        roundtrip("你好！最近怎么样？", Language::Primary);
        roundtrip("哈哈，是的，我也觉得这部电影特别好看！你呢？", Language::Primary);
        roundtrip("好的 明天见", Language::Primary);
        roundtrip("I totally agree. Let's catch up this weekend, okay?", Language::Secondary);
        roundtrip("one two three four five six seven", Language::Secondary);
    }

    #[test]
    fn mixed_primary_text_rejoins_without_empty_segments() {
        const PIECES: [&str; 12] = [
            "你好", "今天天气", "！！", "？！", "，", "。", " ", "ok", "hello world", "...", "好", "3点",
        ];
        let mut seed: u32 = 7;
        for _ in 0..500 {
            let mut text = String::new();
            for _ in 0..(seed % 9 + 1) {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                text.push_str(PIECES[(seed >> 16) as usize % PIECES.len()]);
            }
            let segs = segment(&text, Language::Primary);
            assert_eq!(segs.concat(), text);
            assert!(segs.iter().all(|s| !s.is_empty()), "empty segment in {segs:?}");
            for pair in segs.windows(2) {
                let next = pair[1].chars().next().unwrap_or_default();
                assert!(!is_primary_break(next), "{segs:?} starts a segment with punctuation");
            }
        }
    }
}
