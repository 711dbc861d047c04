//! Tome-number extraction from free-text catalog titles.
//!
//! A single ordered battery of patterns, tried from most to least specific;
//! the first matching rule wins and later rules are never consulted. The
//! ordering is a precision/recall trade-off: explicit volume markers first,
//! bare-digit guessing last and bounded so that years, prices, and catalog
//! codes are never mistaken for tome numbers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Character class covering hiragana, katakana, kanji, the long-vowel mark,
/// and iteration marks. Used to anchor digits against Japanese script.
const JP: &str = "[ぁ-んァ-ヿ一-龯ー々〆]";

/// Largest value the permissive fallback rules will accept as a tome number.
const FALLBACK_MAX: u32 = 50;

/// A tome marker extracted from a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tome {
    /// An explicit volume number.
    Number(u32),
    /// The "concluding volume" marker (完結編), which carries no number.
    Final,
}

impl Tome {
    /// The numeric value, if this marker carries one.
    #[must_use]
    pub fn number(self) -> Option<u32> {
        match self {
            Self::Number(n) => Some(n),
            Self::Final => None,
        }
    }
}

/// Roman numerals in match-priority order: longer forms before their
/// prefixes (`XV` before `X`, `VIII` before `V`), as an unordered scan
/// would return `X` for a title containing `XV`.
const ROMAN_NUMERALS: &[(&str, u32)] = &[
    ("XV", 15),
    ("XIV", 14),
    ("XIII", 13),
    ("XII", 12),
    ("XI", 11),
    ("VIII", 8),
    ("VII", 7),
    ("IX", 9),
    ("X", 10),
    ("IV", 4),
    ("VI", 6),
    ("V", 5),
    ("III", 3),
    ("II", 2),
    ("I", 1),
];

/// Kanji numerals, longest spelling first: a two-character numeral must be
/// tried before its one-character prefix (十五 before 十).
const KANJI_NUMERALS: &[(&str, u32)] = &[
    ("二十", 20),
    ("十九", 19),
    ("十八", 18),
    ("十七", 17),
    ("十六", 16),
    ("十五", 15),
    ("十四", 14),
    ("十三", 13),
    ("十二", 12),
    ("十一", 11),
    ("十", 10),
    ("九", 9),
    ("八", 8),
    ("七", 7),
    ("六", 6),
    ("五", 5),
    ("四", 4),
    ("三", 3),
    ("二", 2),
    ("一", 1),
];

static FORMAL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"第\s*(\d+)\s*[巻集]").expect("valid regex"));
static SIMPLE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0*(\d+)\s*巻").expect("valid regex"));
static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[（(]\s*0*(\d+)\s*[)）]").expect("valid regex"));
static FINAL_NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s　](\d{1,2})[（(]完[)）]").expect("valid regex"));
static WESTERN_VOLUME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)vol(?:ume)?\.?\s*0*(\d+)").expect("valid regex"));
static ROMAN_PATTERNS: Lazy<Vec<(Regex, u32)>> = Lazy::new(|| {
    ROMAN_NUMERALS
        .iter()
        .map(|&(roman, value)| {
            let pattern = format!(r"\s{roman}(\s|$|[)）]|巻)");
            (Regex::new(&pattern).expect("valid regex"), value)
        })
        .collect()
});
static KANJI_PATTERNS: Lazy<Vec<(Regex, u32)>> = Lazy::new(|| {
    KANJI_NUMERALS
        .iter()
        .map(|&(kanji, value)| {
            let pattern = format!(r"[\s　]{kanji}(\s|　|$|[)）(（]|巻)");
            (Regex::new(&pattern).expect("valid regex"), value)
        })
        .collect()
});
static SPECIAL_MARKERS: Lazy<Vec<(Regex, Tome)>> = Lazy::new(|| {
    [
        (r"[（(]上[)）]", Tome::Number(1)),
        (r"[（(]下[)）]", Tome::Number(2)),
        (r"上巻", Tome::Number(1)),
        (r"下巻", Tome::Number(2)),
        (r"前編", Tome::Number(1)),
        (r"後編", Tome::Number(2)),
        (r"完結編", Tome::Final),
    ]
    .into_iter()
    .map(|(pattern, tome)| (Regex::new(pattern).expect("valid regex"), tome))
    .collect()
});
static BEFORE_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s(\d+)\s+[（(]").expect("valid regex"));
static AFTER_DASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s　]?[-−]\s*(\d{1,2})(\s|$|[（(])").expect("valid regex"));
static FUSED_TO_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"{JP}(\d{{1,2}})\s+\S")).expect("valid regex"));
static BETWEEN_JP: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"{JP}\s+(\d{{1,2}})\s+{JP}")).expect("valid regex"));
static AT_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s　](\d{1,2})\s*$").expect("valid regex"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

fn captured_number(re: &Regex, title: &str) -> Option<u32> {
    re.captures(title)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Fold full-width digits to ASCII so every pattern sees one digit form.
/// One-to-one on characters, so the 10-character fallback guard is
/// unaffected.
fn fold_digits(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(u32::from(c) - u32::from('０') + u32::from('0'))
                .expect("ASCII digit"),
            other => other,
        })
        .collect()
}

/// Extract the tome number from a catalog title.
///
/// This is the single tome parser used by detail-page extraction, search
/// snippet extraction, and the missing-tome correction pass. Patterns are
/// tried in strict priority order:
///
/// 1.  `第X巻` / `第X集` — formal volume marker
/// 2.  `X巻` — simple marker (skipped for bundle listings)
/// 3.  `(X)` / `（X）` — parenthesized, the most common
/// 4.  `X(完)` — numbered final volume
/// 5.  `Vol.X` / `Volume X` — Western marker
/// 6.  Roman numerals, word-boundary delimited
/// 7.  Kanji numerals, longest spelling first
/// 8.  上/下/前編/後編/完結編 — two-part and concluding markers
/// 9.  ` X (` — bare digit before a parenthesis
/// 10. `-X` — digit after a dash
/// 11. Digit fused to the end of a Japanese word
/// 12. Digit sandwiched between Japanese characters (≤50)
/// 13. Digit at the very end of the title
/// 14. Last resort: an isolated 1-2 digit number ≤50, only past the first
///     10 characters (catalog codes and ISBN fragments live at the front)
#[must_use]
pub fn extract_tome(title: &str) -> Option<Tome> {
    if title.is_empty() {
        return None;
    }

    let title = &fold_digits(title);

    // --- Precise patterns ---

    if let Some(n) = captured_number(&FORMAL_MARKER, title) {
        return Some(Tome::Number(n));
    }

    if !title.contains("巻セット") {
        if let Some(n) = captured_number(&SIMPLE_MARKER, title) {
            return Some(Tome::Number(n));
        }
    }

    if let Some(n) = captured_number(&PARENTHESIZED, title) {
        return Some(Tome::Number(n));
    }

    if let Some(n) = captured_number(&FINAL_NUMBERED, title) {
        return Some(Tome::Number(n));
    }

    if let Some(n) = captured_number(&WESTERN_VOLUME, title) {
        return Some(Tome::Number(n));
    }

    for (re, value) in ROMAN_PATTERNS.iter() {
        if re.is_match(title) {
            return Some(Tome::Number(*value));
        }
    }

    for (re, value) in KANJI_PATTERNS.iter() {
        if re.is_match(title) {
            return Some(Tome::Number(*value));
        }
    }

    for (re, tome) in SPECIAL_MARKERS.iter() {
        if re.is_match(title) {
            return Some(*tome);
        }
    }

    // --- Permissive fallbacks ---

    if let Some(n) = captured_number(&BEFORE_PAREN, title) {
        return Some(Tome::Number(n));
    }

    if let Some(n) = captured_number(&AFTER_DASH, title) {
        return Some(Tome::Number(n));
    }

    if let Some(n) = captured_number(&FUSED_TO_WORD, title) {
        return Some(Tome::Number(n));
    }

    if let Some(n) = captured_number(&BETWEEN_JP, title) {
        if n <= FALLBACK_MAX {
            return Some(Tome::Number(n));
        }
    }

    if let Some(n) = captured_number(&AT_END, title) {
        return Some(Tome::Number(n));
    }

    // Last resort: first isolated short digit run past the 10th character.
    if title.chars().count() > 10 {
        let tail: String = title.chars().skip(10).collect();
        if let Some(run) = DIGIT_RUN.find(&tail) {
            if run.as_str().len() <= 2 {
                if let Ok(n) = run.as_str().parse::<u32>() {
                    if n <= FALLBACK_MAX {
                        return Some(Tome::Number(n));
                    }
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formal_marker() {
        assert_eq!(extract_tome("泥の国 第3巻"), Some(Tome::Number(3)));
        assert_eq!(extract_tome("音盤紀行 第12集"), Some(Tome::Number(12)));
    }

    #[test]
    fn test_simple_marker() {
        assert_eq!(extract_tome("峠鬼 8巻"), Some(Tome::Number(8)));
        // Bundle listings must not match the simple marker
        assert_eq!(extract_tome("峠鬼 1-8巻セット"), None);
    }

    #[test]
    fn test_parenthesized() {
        assert_eq!(extract_tome("ギフテッド (7)"), Some(Tome::Number(7)));
        // Full-width digits are folded before matching
        assert_eq!(extract_tome("ギフテッド （０５）"), Some(Tome::Number(5)));
        assert_eq!(extract_tome("ギフテッド (05)"), Some(Tome::Number(5)));
    }

    #[test]
    fn test_western_volume() {
        assert_eq!(extract_tome("Love Bullet Vol. 3"), Some(Tome::Number(3)));
        assert_eq!(extract_tome("Love Bullet volume 03"), Some(Tome::Number(3)));
    }

    #[test]
    fn test_roman_numerals_longest_first() {
        assert_eq!(extract_tome("リビルドワールド XV"), Some(Tome::Number(15)));
        assert_eq!(extract_tome("リビルドワールド VIII巻"), Some(Tome::Number(8)));
        // No word boundary, no match from the roman rule
        assert_eq!(extract_tome("TAXI"), None);
    }

    #[test]
    fn test_kanji_numerals_longest_first() {
        assert_eq!(extract_tome("イクサガミ 十五 (文庫)"), Some(Tome::Number(15)));
        assert_eq!(extract_tome("イクサガミ 十 (文庫)"), Some(Tome::Number(10)));
    }

    #[test]
    fn test_special_markers() {
        assert_eq!(extract_tome("氷菓 (上)"), Some(Tome::Number(1)));
        assert_eq!(extract_tome("氷菓 下巻"), Some(Tome::Number(2)));
        assert_eq!(extract_tome("石神戦記 後編"), Some(Tome::Number(2)));
        assert_eq!(extract_tome("石神戦記 完結編"), Some(Tome::Final));
    }

    #[test]
    fn test_priority_explicit_beats_trailing_digit() {
        // Both a formal marker and a trailing bare digit: the formal marker wins.
        assert_eq!(
            extract_tome("マグメル深海水族館 第3巻 限定版 7"),
            Some(Tome::Number(3))
        );
    }

    #[test]
    fn test_dash_number() {
        assert_eq!(extract_tome("ヒモクズ花くんは死にたがり -4"), Some(Tome::Number(4)));
        assert_eq!(extract_tome("ダンジョンバンド −2 (comics)"), Some(Tome::Number(2)));
    }

    #[test]
    fn test_fused_and_sandwiched_digits() {
        assert_eq!(
            extract_tome("ヤクザにお風呂で働かされてます。1 MFC"),
            Some(Tome::Number(1))
        );
        assert_eq!(extract_tome("死亡遊戯で飯を食う。 1 懲"), Some(Tome::Number(1)));
    }

    #[test]
    fn test_trailing_digit() {
        assert_eq!(extract_tome("矢野くんの普通の日々 7"), Some(Tome::Number(7)));
        // Four digits at the end are not a tome number
        assert_eq!(extract_tome("アンダーク 9004"), None);
    }

    #[test]
    fn test_catalog_code_bounds() {
        // A 4-digit code in the first 10 characters is never a tome number
        assert_eq!(extract_tome("CODE 9004 novel"), None);
        // Past the 10-char guard, short numbers over 50 are still rejected
        assert_eq!(extract_tome("ウィキッドスポットseptante 99 extra"), None);
        // ...but plausible ones are accepted
        assert_eq!(extract_tome("となりの席のヤツがそういう目で見てくる appendix 12 extra"), Some(Tome::Number(12)));
    }

    #[test]
    fn test_empty_and_unnumbered() {
        assert_eq!(extract_tome(""), None);
        assert_eq!(extract_tome("本なら売るほど"), None);
    }
}
