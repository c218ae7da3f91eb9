//! Collation name to identifier lookup.
//!
//! Mirrors the server's `SHOW COLLATION` table for the names a client is
//! likely to request. Identifiers above 255 exist (MySQL 8.0 added them);
//! the handshake response only carries the low 8 bits.

use phf::phf_map;

/// Collation sent when the client configuration names none.
pub const DEFAULT_COLLATION_NAME: &str = "utf8_general_ci";

static COLLATIONS: phf::Map<&'static str, u16> = phf_map! {
    "big5_chinese_ci" => 1,
    "latin2_czech_cs" => 2,
    "dec8_swedish_ci" => 3,
    "cp850_general_ci" => 4,
    "latin1_german1_ci" => 5,
    "hp8_english_ci" => 6,
    "koi8r_general_ci" => 7,
    "latin1_swedish_ci" => 8,
    "latin2_general_ci" => 9,
    "swe7_swedish_ci" => 10,
    "ascii_general_ci" => 11,
    "ujis_japanese_ci" => 12,
    "sjis_japanese_ci" => 13,
    "hebrew_general_ci" => 16,
    "tis620_thai_ci" => 18,
    "euckr_korean_ci" => 19,
    "koi8u_general_ci" => 22,
    "gb2312_chinese_ci" => 24,
    "greek_general_ci" => 25,
    "cp1250_general_ci" => 26,
    "gbk_chinese_ci" => 28,
    "latin5_turkish_ci" => 30,
    "armscii8_general_ci" => 32,
    "utf8_general_ci" => 33,
    "ucs2_general_ci" => 35,
    "cp866_general_ci" => 36,
    "keybcs2_general_ci" => 37,
    "macce_general_ci" => 38,
    "macroman_general_ci" => 39,
    "cp852_general_ci" => 40,
    "latin7_general_ci" => 41,
    "utf8mb4_general_ci" => 45,
    "utf8mb4_bin" => 46,
    "latin1_bin" => 47,
    "cp1251_general_ci" => 51,
    "utf16_general_ci" => 54,
    "utf16_bin" => 55,
    "utf16le_general_ci" => 56,
    "cp1256_general_ci" => 57,
    "cp1257_general_ci" => 59,
    "utf32_general_ci" => 60,
    "utf32_bin" => 61,
    "binary" => 63,
    "geostd8_general_ci" => 92,
    "cp932_japanese_ci" => 95,
    "eucjpms_japanese_ci" => 97,
    "utf8_unicode_ci" => 192,
    "utf8_bin" => 83,
    "gb18030_chinese_ci" => 248,
    "utf8mb4_unicode_ci" => 224,
    "utf8mb4_icelandic_ci" => 225,
    "utf8mb4_latvian_ci" => 226,
    "utf8mb4_romanian_ci" => 227,
    "utf8mb4_slovenian_ci" => 228,
    "utf8mb4_polish_ci" => 229,
    "utf8mb4_estonian_ci" => 230,
    "utf8mb4_spanish_ci" => 231,
    "utf8mb4_swedish_ci" => 232,
    "utf8mb4_turkish_ci" => 233,
    "utf8mb4_czech_ci" => 234,
    "utf8mb4_danish_ci" => 235,
    "utf8mb4_unicode_520_ci" => 246,
    "utf8mb4_0900_ai_ci" => 255,
    "utf8mb4_0900_as_cs" => 278,
    "utf8mb4_0900_bin" => 309,
};

/// Look up a collation identifier by name.
pub fn collation_id(name: &str) -> Option<u16> {
    COLLATIONS.get(name).copied()
}
