// 🔤 Name Normalizer - canonical comparison keys for cross-catalog matching
//
// Problem solved:
// - "ВАЗ (Lada)", "VAZ (Lada)", "LADA" → all the same brand
// - Source catalog labels brands in Cyrillic, target catalog in Latin script
// - A handful of brands have irregular canonical names ("Volkswagen" → "VW")
//
// normalize() is deterministic, idempotent and total: transliterate non-Latin
// characters to a Latin equivalent, then apply a static alias table for the
// known irregular names. The alias table is immutable configuration injected
// at construction - never a mutable global.

use std::collections::HashMap;

/// Alias overrides applied after transliteration.
///
/// Keys are transliterated spellings as they come out of `transliterate`,
/// values are the canonical target-catalog names. Values must never appear
/// as keys, otherwise idempotency would break.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("VAZ (Lada)", "LADA"),
    ("Volkswagen", "VW"),
];

// ============================================================================
// NAME NORMALIZER
// ============================================================================

#[derive(Debug, Clone)]
pub struct NameNormalizer {
    aliases: HashMap<String, String>,
}

impl NameNormalizer {
    /// Build a normalizer with an explicit alias table.
    pub fn new(aliases: impl IntoIterator<Item = (String, String)>) -> Self {
        NameNormalizer {
            aliases: aliases.into_iter().collect(),
        }
    }

    /// Build a normalizer with the built-in brand alias table.
    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_ALIASES
                .iter()
                .map(|(raw, canonical)| (raw.to_string(), canonical.to_string())),
        )
    }

    /// Map a raw source name to its canonical comparison key.
    pub fn normalize(&self, raw: &str) -> String {
        let transliterated = transliterate(raw);
        match self.aliases.get(&transliterated) {
            Some(canonical) => canonical.clone(),
            None => transliterated,
        }
    }
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// TRANSLITERATION
// ============================================================================

/// Transliterate Cyrillic characters to their Latin equivalents.
///
/// Latin input passes through unchanged, so the function is idempotent.
/// Characters outside the table are kept as-is rather than dropped - a name
/// must never normalize to an empty string because of an exotic character.
pub fn transliterate(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match cyrillic_to_latin(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

fn cyrillic_to_latin(c: char) -> Option<&'static str> {
    let latin = match c {
        'А' => "A",
        'Б' => "B",
        'В' => "V",
        'Г' => "G",
        'Д' => "D",
        'Е' => "E",
        'Ё' => "E",
        'Ж' => "Zh",
        'З' => "Z",
        'И' => "I",
        'Й' => "Y",
        'К' => "K",
        'Л' => "L",
        'М' => "M",
        'Н' => "N",
        'О' => "O",
        'П' => "P",
        'Р' => "R",
        'С' => "S",
        'Т' => "T",
        'У' => "U",
        'Ф' => "F",
        'Х' => "Kh",
        'Ц' => "Ts",
        'Ч' => "Ch",
        'Ш' => "Sh",
        'Щ' => "Shch",
        'Ъ' => "",
        'Ы' => "Y",
        'Ь' => "",
        'Э' => "E",
        'Ю' => "Yu",
        'Я' => "Ya",
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };

    Some(latin)
}
