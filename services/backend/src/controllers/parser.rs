use std::ops::RangeInclusive;
use unicode_normalization::UnicodeNormalization;

/// Combining Diacritical Marks block. Marks from other scripts (Thai vowels
/// and tone marks included) are not dropped and end up as `_`.
const COMBINING_DIACRITICS: RangeInclusive<char> = '\u{0300}'..='\u{036f}';

/// User-facing category tokens and the stored category they stand for.
const CATEGORY_ALIASES: &[(&str, &str)] = &[
    ("ผู้สูงวัย", "เพลงสำหรับผู้สูงวัย"),
    ("เปียโน", "ดนตรีเปียโน"),
];

/// Makes an uploaded file name safe to use as a storage key.
///
/// Decomposes to NFD, drops Latin combining diacritics, then replaces anything outside
/// `[A-Za-z0-9_.-]` with `_`. Applying it twice changes nothing.
pub fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .nfd()
        .filter(|c| !COMBINING_DIACRITICS.contains(c))
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `{millis}_{sanitized name}`
pub fn storage_key(upload_millis: i64, file_name: &str) -> String {
    format!("{}_{}", upload_millis, sanitize_file_name(file_name))
}

pub fn normalize_category(category: &str) -> &str {
    CATEGORY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == category)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(category)
}
