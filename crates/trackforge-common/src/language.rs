//! ISO 639 language code normalization.
//!
//! Tracks arrive tagged with a mix of ISO 639-1 (`en`), ISO 639-2/B (`ger`) and
//! ISO 639-2/T (`deu`) codes. Everything is compared in the bibliographic
//! 639-2/B form, which is what Matroska and FFmpeg write.

use phf::phf_map;

/// Codes that are identical in every standard.
const SPECIAL_CODES: [&str; 4] = ["und", "mis", "mul", "zxx"];

static ISO_639_1_TO_639_2B: phf::Map<&'static str, &'static str> = phf_map! {
    "aa" => "aar",
    "ab" => "abk",
    "af" => "afr",
    "am" => "amh",
    "ar" => "ara",
    "as" => "asm",
    "ay" => "aym",
    "az" => "aze",
    "ba" => "bak",
    "be" => "bel",
    "bg" => "bul",
    "bh" => "bih",
    "bi" => "bis",
    "bn" => "ben",
    "bo" => "tib",
    "br" => "bre",
    "ca" => "cat",
    "co" => "cos",
    "cs" => "cze",
    "cy" => "wel",
    "da" => "dan",
    "de" => "ger",
    "dz" => "dzo",
    "el" => "gre",
    "en" => "eng",
    "eo" => "epo",
    "es" => "spa",
    "et" => "est",
    "eu" => "baq",
    "fa" => "per",
    "fi" => "fin",
    "fj" => "fij",
    "fo" => "fao",
    "fr" => "fre",
    "fy" => "fry",
    "ga" => "gle",
    "gd" => "gla",
    "gl" => "glg",
    "gn" => "grn",
    "gu" => "guj",
    "ha" => "hau",
    "he" => "heb",
    "hi" => "hin",
    "hr" => "hrv",
    "hu" => "hun",
    "hy" => "arm",
    "ia" => "ina",
    "id" => "ind",
    "ie" => "ile",
    "ik" => "ipk",
    "is" => "ice",
    "it" => "ita",
    "iu" => "iku",
    "ja" => "jpn",
    "jv" => "jav",
    "ka" => "geo",
    "kk" => "kaz",
    "kl" => "kal",
    "km" => "khm",
    "kn" => "kan",
    "ko" => "kor",
    "ks" => "kas",
    "ku" => "kur",
    "ky" => "kir",
    "la" => "lat",
    "ln" => "lin",
    "lo" => "lao",
    "lt" => "lit",
    "lv" => "lav",
    "mg" => "mlg",
    "mi" => "mao",
    "mk" => "mac",
    "ml" => "mal",
    "mn" => "mon",
    "mr" => "mar",
    "ms" => "may",
    "mt" => "mlt",
    "my" => "bur",
    "na" => "nau",
    "ne" => "nep",
    "nl" => "dut",
    "no" => "nor",
    "oc" => "oci",
    "om" => "orm",
    "or" => "ori",
    "pa" => "pan",
    "pl" => "pol",
    "ps" => "pus",
    "pt" => "por",
    "qu" => "que",
    "rm" => "roh",
    "rn" => "run",
    "ro" => "rum",
    "ru" => "rus",
    "rw" => "kin",
    "sa" => "san",
    "sd" => "snd",
    "se" => "sme",
    "sg" => "sag",
    "si" => "sin",
    "sk" => "slo",
    "sl" => "slv",
    "sm" => "smo",
    "sn" => "sna",
    "so" => "som",
    "sq" => "alb",
    "sr" => "srp",
    "ss" => "ssw",
    "st" => "sot",
    "su" => "sun",
    "sv" => "swe",
    "sw" => "swa",
    "ta" => "tam",
    "te" => "tel",
    "tg" => "tgk",
    "th" => "tha",
    "ti" => "tir",
    "tk" => "tuk",
    "tl" => "tgl",
    "tn" => "tsn",
    "to" => "ton",
    "tr" => "tur",
    "ts" => "tso",
    "tt" => "tat",
    "tw" => "twi",
    "ug" => "uig",
    "uk" => "ukr",
    "ur" => "urd",
    "uz" => "uzb",
    "vi" => "vie",
    "vo" => "vol",
    "wo" => "wol",
    "xh" => "xho",
    "yi" => "yid",
    "yo" => "yor",
    "za" => "zha",
    "zh" => "chi",
    "zu" => "zul",
};

static ISO_639_2T_TO_639_2B: phf::Map<&'static str, &'static str> = phf_map! {
    "bod" => "tib",
    "ces" => "cze",
    "cym" => "wel",
    "deu" => "ger",
    "ell" => "gre",
    "eus" => "baq",
    "fas" => "per",
    "fra" => "fre",
    "hye" => "arm",
    "isl" => "ice",
    "kat" => "geo",
    "mkd" => "mac",
    "mri" => "mao",
    "msa" => "may",
    "mya" => "bur",
    "nld" => "dut",
    "ron" => "rum",
    "slk" => "slo",
    "sqi" => "alb",
    "zho" => "chi",
};

/// Normalize a language code to ISO 639-2/B.
///
/// Missing, empty, and unrecognized two-letter codes become `und`. Unknown
/// three-letter codes are kept as-is since they may be valid codes outside the
/// lookup tables.
///
/// # Examples
///
/// ```
/// use trackforge_common::normalize_language;
///
/// assert_eq!(normalize_language(Some("de")), "ger");
/// assert_eq!(normalize_language(Some("deu")), "ger");
/// assert_eq!(normalize_language(Some("ger")), "ger");
/// assert_eq!(normalize_language(None), "und");
/// ```
pub fn normalize_language(code: Option<&str>) -> String {
    let code = match code.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_ascii_lowercase(),
        _ => return "und".to_string(),
    };

    if SPECIAL_CODES.contains(&code.as_str()) {
        return code;
    }

    match code.len() {
        2 => match ISO_639_1_TO_639_2B.get(code.as_str()) {
            Some(bibliographic) => (*bibliographic).to_string(),
            None => {
                tracing::debug!("Unknown ISO 639-1 code '{}', using 'und'", code);
                "und".to_string()
            }
        },
        3 => ISO_639_2T_TO_639_2B
            .get(code.as_str())
            .map(|b| (*b).to_string())
            .unwrap_or(code),
        _ => {
            tracing::debug!("Unrecognized language code format '{}', using 'und'", code);
            "und".to_string()
        }
    }
}

/// Whether two codes name the same language, regardless of ISO standard.
pub fn languages_match(a: Option<&str>, b: Option<&str>) -> bool {
    normalize_language(a) == normalize_language(b)
}

/// Whether a string looks like an ISO 639 code (2-3 lowercase ASCII letters).
pub fn is_language_code(code: &str) -> bool {
    (2..=3).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_lowercase())
}
