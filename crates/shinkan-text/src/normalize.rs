//! Title normalization for cross-listing comparison.
//!
//! The catalog spells the same title many ways: full-width vs. half-width
//! digits and punctuation, Greek letters standing in for Latin look-alikes,
//! half a dozen dash codepoints, and hiragana vs. kanji spellings of common
//! words. `normalize_title` folds all of these so that containment checks
//! between a search key and a listing title are reliable.

use unicode_normalization::UnicodeNormalization;

/// Greek letters that are visually indistinguishable from Latin ones in
/// catalog titles (e.g. `Ζガンダム` uses U+0396, not `Z`).
const GREEK_TO_LATIN: &[(char, char)] = &[
    ('Α', 'A'),
    ('Β', 'B'),
    ('Ε', 'E'),
    ('Ζ', 'Z'),
    ('Η', 'H'),
    ('Ι', 'I'),
    ('Κ', 'K'),
    ('Μ', 'M'),
    ('Ν', 'N'),
    ('Ο', 'O'),
    ('Ρ', 'P'),
    ('Τ', 'T'),
    ('Υ', 'Y'),
    ('Χ', 'X'),
    ('α', 'a'),
    ('β', 'b'),
    ('ε', 'e'),
    ('ζ', 'z'),
    ('η', 'h'),
    ('ι', 'i'),
    ('κ', 'k'),
    ('μ', 'm'),
    ('ν', 'n'),
    ('ο', 'o'),
    ('ρ', 'p'),
    ('τ', 't'),
    ('υ', 'y'),
    ('χ', 'x'),
];

/// Dash variants folded to an ASCII hyphen. The katakana long-vowel mark
/// `ー` (U+30FC) is deliberately absent: it looks like a dash but is part
/// of the word it follows.
const DASH_VARIANTS: &[char] = &['―', '─', '—', '–', '−', '〜', '～'];

/// Full-width punctuation folded to ASCII. Some of these survive NFKC.
const PUNCTUATION_FOLDS: &[(char, char)] = &[
    ('！', '!'),
    ('？', '?'),
    ('（', '('),
    ('）', ')'),
    ('：', ':'),
    ('；', ';'),
    ('，', ','),
    ('。', '.'),
];

/// Hiragana spellings equivalent to their kanji forms in titles.
const SPELLING_EQUIVALENCES: &[(&str, &str)] = &[
    ("わたし", "私"),
    ("ぼく", "僕"),
    ("おれ", "俺"),
    ("かれ", "彼"),
    ("かのじょ", "彼女"),
];

/// Normalize character variations for title comparison.
///
/// Applies, in order: NFKC compatibility decomposition (full-width to
/// half-width, ligatures), Greek-to-Latin confusable folding, dash
/// unification, full-width punctuation folding, hiragana/kanji spelling
/// equivalences, and whitespace-run collapse.
///
/// Does NOT lowercase; callers decide case sensitivity. Idempotent:
/// `normalize_title(normalize_title(s)) == normalize_title(s)`.
#[must_use]
pub fn normalize_title(text: &str) -> String {
    let text: String = text.nfkc().collect();

    let text: String = text
        .chars()
        .map(|c| {
            if let Some(&(_, latin)) = GREEK_TO_LATIN.iter().find(|&&(greek, _)| greek == c) {
                latin
            } else if DASH_VARIANTS.contains(&c) {
                '-'
            } else if let Some(&(_, ascii)) = PUNCTUATION_FOLDS.iter().find(|&&(full, _)| full == c)
            {
                ascii
            } else {
                c
            }
        })
        .collect();

    let mut text = text;
    for &(variant, canonical) in SPELLING_EQUIVALENCES {
        if text.contains(variant) {
            text = text.replace(variant, canonical);
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive the containment key used to match listing titles against a
/// series' search key: the first 8 characters, normalized.
///
/// Eight characters is enough to be distinctive for the titles tracked
/// here while tolerating subtitle and edition-label suffixes.
#[must_use]
pub fn title_key(search_key: &str) -> String {
    let head: String = search_key.chars().take(8).collect();
    normalize_title(&head)
}
