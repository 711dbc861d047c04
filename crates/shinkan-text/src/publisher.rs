//! Publisher name canonicalization and matching.
//!
//! The catalog labels volumes with imprints and magazine lines rather than
//! the umbrella publisher, so "少年マガジンKC" and "Kodansha" must compare
//! equal. Canonicalization strips spacing and punctuation, lowercases, and
//! resolves the imprint through a static label table; matching is
//! bidirectional substring containment on the canonical forms.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Imprint / magazine-line label to umbrella publisher, keyed by the
/// cleaned (spaceless, punctuation-free, lowercase) label form.
static LABEL_TO_PARENT: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Kodansha
        ("shonenmagazine", "kodansha"),
        ("shonenmagazinekc", "kodansha"),
        ("magazinekc", "kodansha"),
        ("kcdeluxe", "kodansha"),
        ("kc", "kodansha"),
        ("youngmagazine", "kodansha"),
        ("youngmagazinekc", "kodansha"),
        ("morning", "kodansha"),
        ("morningkc", "kodansha"),
        ("afternoon", "kodansha"),
        ("afternoonkc", "kodansha"),
        ("eveningkc", "kodansha"),
        ("kodansha", "kodansha"),
        ("kodanshacomics", "kodansha"),
        ("kcmanga", "kodansha"),
        ("sirius", "kodansha"),
        ("siriuskc", "kodansha"),
        ("rivierekc", "kodansha"),
        ("palcykc", "kodansha"),
        ("dayscomics", "kodansha"),
        // Kadokawa
        ("kadokawa", "kadokawa"),
        ("kadokawacomics", "kadokawa"),
        ("kadokawacomicsace", "kadokawa"),
        ("kadokawasneakerbunko", "kadokawa"),
        ("dengeki", "kadokawa"),
        ("dengekicomics", "kadokawa"),
        ("dengekibunko", "kadokawa"),
        ("dengekidaioh", "kadokawa"),
        ("asciimediaworks", "kadokawa"),
        ("mediaworks", "kadokawa"),
        ("enterbrain", "kadokawa"),
        ("mfbunko", "kadokawa"),
        ("mfbunkoj", "kadokawa"),
        ("mfc", "kadokawa"),
        ("dragoncomicsage", "kadokawa"),
        ("dragoncomics", "kadokawa"),
        ("compace", "kadokawa"),
        ("comptiq", "kadokawa"),
        ("flos", "kadokawa"),
        ("floscomics", "kadokawa"),
        // Harta is a Kadokawa label (via Enterbrain)
        ("harta", "kadokawa"),
        ("hartacomics", "kadokawa"),
        ("hue", "kadokawa"),
        // Shueisha
        ("shueisha", "shueisha"),
        ("jumpcomics", "shueisha"),
        ("youngjump", "shueisha"),
        ("youngjumpcomics", "shueisha"),
        ("grandjump", "shueisha"),
        ("ultrajump", "shueisha"),
        ("margaretcomics", "shueisha"),
        ("ribon", "shueisha"),
        ("ribbon", "shueisha"),
        ("dashxbunko", "shueisha"),
        // Shogakukan
        ("shogakukan", "shogakukan"),
        ("sunday", "shogakukan"),
        ("sundaycomics", "shogakukan"),
        ("bigcomics", "shogakukan"),
        ("bigcomic", "shogakukan"),
        ("bigcomicsspirits", "shogakukan"),
        ("flowercomics", "shogakukan"),
        ("uracomics", "shogakukan"),
        // Square Enix
        ("squareenix", "squareenix"),
        ("gangancomics", "squareenix"),
        ("gangancomicsonline", "squareenix"),
        ("gangancomicsjoker", "squareenix"),
        ("gfantasy", "squareenix"),
        ("younggangan", "squareenix"),
        ("biggangancomics", "squareenix"),
        // Hakusensha
        ("hakusensha", "hakusensha"),
        ("younganimal", "hakusensha"),
        ("younganimalcomics", "hakusensha"),
        ("hanatoname", "hakusensha"),
        ("hanatoamecomics", "hakusensha"),
        ("lala", "hakusensha"),
        ("melody", "hakusensha"),
        ("jets", "hakusensha"),
        ("jetscomics", "hakusensha"),
        // Akita Shoten
        ("akitashoten", "akitashoten"),
        ("champion", "akitashoten"),
        ("championcomics", "akitashoten"),
        ("shonenchampion", "akitashoten"),
        // Others
        ("ichijinsha", "ichijinsha"),
        ("gene", "ichijinsha"),
        ("rexcomics", "ichijinsha"),
        ("futabasha", "futabasha"),
        ("action", "futabasha"),
        ("actioncomics", "futabasha"),
        ("houbunsha", "houbunsha"),
        ("bunch", "coamix"),
        ("bunchcomics", "coamix"),
        ("coamix", "coamix"),
        ("overlap", "overlap"),
        ("overlapbunko", "overlap"),
        ("hobbyjapan", "hobbyjapan"),
        ("hjbunko", "hobbyjapan"),
        ("sbcreative", "sbcreative"),
        ("gabunko", "sbcreative"),
        ("heroes", "heroes"),
        ("heroescomics", "heroes"),
        ("flexcomics", "flexcomics"),
        ("maggarden", "maggarden"),
        ("bladecomics", "maggarden"),
        ("leed", "leed"),
        ("ran", "leed"),
        ("northstarspictures", "northstarspictures"),
        ("shinchosha", "shinchosha"),
        ("bungeishunju", "bungeishunju"),
        ("kobunsha", "kobunsha"),
        ("gentosha", "gentosha"),
        ("shonengazosha", "shonengazosha"),
        ("pixiv", "pixiv"),
    ])
});

/// Native-script publisher names and labels to their romanized display
/// form. Longest keys are matched first on the substring pass.
static ROMANIZED_NAMES: &[(&str, &str)] = &[
    ("KADOKAWA", "Kadokawa"),
    ("角川書店", "Kadokawa"),
    ("カドカワ", "Kadokawa"),
    ("角川", "Kadokawa"),
    ("講談社", "Kodansha"),
    ("小学館", "Shogakukan"),
    ("集英社", "Shueisha"),
    ("スクウェア・エニックス", "Square Enix"),
    ("スクエニ", "Square Enix"),
    ("白泉社", "Hakusensha"),
    ("秋田書店", "Akita Shoten"),
    ("双葉社", "Futabasha"),
    ("芳文社", "Houbunsha"),
    ("一迅社", "Ichijinsha"),
    ("アスキー・メディアワークス", "ASCII Media Works"),
    ("メディアワークス", "Media Works"),
    ("電撃", "Dengeki"),
    ("マッグガーデン", "Mag Garden"),
    ("エンターブレイン", "Enterbrain"),
    ("ホビージャパン", "Hobby Japan"),
    ("オーバーラップ", "Overlap"),
    ("アース・スター", "Earth Star"),
    ("SBクリエイティブ", "SB Creative"),
    ("ソフトバンク", "SoftBank"),
    ("新潮社", "Shinchosha"),
    ("文藝春秋", "Bungeishunju"),
    ("光文社", "Kobunsha"),
    ("幻冬舎", "Gentosha"),
    ("リイド社", "Leed"),
    ("少年画報社", "Shonen Gahosha"),
    ("コアミックス", "Coamix"),
    ("ノース・スターズ・ピクチャーズ", "North Stars Pictures"),
    // Labels and collections
    ("角川コミックス", "Kadokawa Comics"),
    ("角川スニーカー文庫", "Kadokawa Sneaker Bunko"),
    ("電撃コミックス", "Dengeki Comics"),
    ("電撃文庫", "Dengeki Bunko"),
    ("少年マガジン", "Shonen Magazine"),
    ("マガジンKC", "Magazine KC"),
    ("ヤングマガジン", "Young Magazine"),
    ("ジャンプコミックス", "Jump Comics"),
    ("サンデー", "Sunday"),
    ("ガンガン", "Gangan"),
    ("ビッグコミックス", "Big Comics"),
    ("ビッグコミック", "Big Comics"),
    ("モーニング", "Morning"),
    ("アフタヌーン", "Afternoon"),
    ("ハルタ", "Harta"),
    ("ハルタコミックス", "Harta Comics"),
    ("MFC", "MFC"),
    ("MF文庫", "MF Bunko"),
    ("フレックスコミックス", "Flex Comics"),
    ("ヒーローズ", "Heroes"),
    ("バンチ", "Bunch"),
    ("BUNCH", "Bunch"),
    ("アクション", "Action"),
    ("ヤングアニマル", "Young Animal"),
    ("チャンピオン", "Champion"),
    ("ジーン", "Gene"),
    ("ピクシブ", "Pixiv"),
    ("フロース", "Flos"),
    ("ヒュー", "Hue"),
    ("乱", "Ran"),
    ("KC", "KC"),
    ("KCデラックス", "KC Deluxe"),
];

static ASCII_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z\s\-\.]+$").expect("valid regex"));
static PAREN_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]+)\)").expect("valid regex"));
static WIDE_PAREN_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"（([^（）]+)）").expect("valid regex"));
static ALL_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("valid regex"));
static COLLECTED_VOLUME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^第\d+集$").expect("valid regex"));

/// Canonicalize a publisher name for comparison.
///
/// Strips whitespace (including ideographic space) and separator
/// punctuation, lowercases, then resolves the label through the
/// imprint-to-parent table so that a magazine line and its umbrella
/// publisher compare equal.
#[must_use]
pub fn canonical_publisher(publisher: &str) -> String {
    if publisher.is_empty() {
        return String::new();
    }

    let cleaned: String = publisher
        .chars()
        .filter(|c| !matches!(c, ' ' | '　' | '・' | '-' | '−'))
        .collect();
    let cleaned = cleaned.to_lowercase();

    match LABEL_TO_PARENT.get(cleaned.as_str()) {
        Some(parent) => (*parent).to_string(),
        None => cleaned,
    }
}

/// Whether a volume's publisher matches a series' publisher-of-record.
///
/// Vacuously true when either side is missing (no filter without
/// information). Otherwise canonical forms must contain one another in
/// either direction, so "kadokawacomics" matches "kadokawa" and vice versa.
#[must_use]
pub fn publishers_match(volume_publisher: &str, publisher_of_record: &str) -> bool {
    if volume_publisher.is_empty() || publisher_of_record.is_empty() {
        return true;
    }
    let a = canonical_publisher(volume_publisher);
    let b = canonical_publisher(publisher_of_record);
    a.contains(&b) || b.contains(&a)
}

/// Convert a native-script publisher name to its romanized display form.
///
/// Exact match first, then longest-substring match (longest keys first to
/// avoid false positives), then ASCII names pass through unchanged.
#[must_use]
pub fn romanize_publisher(publisher: &str) -> String {
    if publisher.is_empty() {
        return String::new();
    }

    if let Some(&(_, romaji)) = ROMANIZED_NAMES.iter().find(|&&(name, _)| name == publisher) {
        return romaji.to_string();
    }

    let mut by_length: Vec<&(&str, &str)> = ROMANIZED_NAMES.iter().collect();
    by_length.sort_by_key(|(name, _)| std::cmp::Reverse(name.chars().count()));
    for (name, romaji) in by_length {
        if publisher.contains(name) {
            return (*romaji).to_string();
        }
    }

    if ASCII_NAME.is_match(publisher) {
        return publisher.to_string();
    }

    publisher.to_string()
}

/// Extract the publisher from a listing title.
///
/// Titles typically end with the imprint in parentheses:
/// `タイトル (3) (コミックス)`. The publisher is the last parenthesized
/// group that is not a bare number, a volume indicator, or a `第N集`
/// collected-volume marker.
#[must_use]
pub fn publisher_from_title(title: &str) -> Option<String> {
    if title.is_empty() {
        return None;
    }

    let mut groups: Vec<String> = PAREN_GROUP
        .captures_iter(title)
        .map(|c| c[1].to_string())
        .collect();
    if groups.is_empty() {
        groups = WIDE_PAREN_GROUP
            .captures_iter(title)
            .map(|c| c[1].to_string())
            .collect();
    }

    for group in groups.into_iter().rev() {
        if ALL_DIGITS.is_match(&group) {
            continue;
        }
        if matches!(group.as_str(), "完" | "上" | "下" | "前編" | "後編") {
            continue;
        }
        if COLLECTED_VOLUME.is_match(&group) {
            continue;
        }
        return Some(group);
    }

    None
}
