//! User-visible messages in English and Simplified Chinese.
//!
//! Catalogs are embedded `key=value` files. `t!("key")` looks the key up in the
//! active language, falls back to English, and finally to the key itself.

use std::collections::HashMap;
use std::sync::Mutex;

static I18N: Mutex<Option<I18nState>> = Mutex::new(None);

struct I18nState {
    current_lang: String,
    /// lang_code → (key → message)
    catalogs: HashMap<&'static str, HashMap<String, String>>,
}

/// Supported languages: (code, native_name)
pub const LANGUAGES: &[(&str, &str)] = &[("en", "English"), ("zh-CN", "中文(简体)")];

const CATALOGS: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en.txt")),
    ("zh-CN", include_str!("../locales/zh-CN.txt")),
];

/// Load the embedded catalogs and pick the starting language. Call once at startup.
pub fn init(language_setting: &str) {
    let catalogs = CATALOGS
        .iter()
        .map(|&(code, data)| (code, parse_catalog(data)))
        .collect();
    let state = I18nState {
        current_lang: resolve_language(language_setting),
        catalogs,
    };
    *I18N.lock().unwrap_or_else(|e| e.into_inner()) = Some(state);
}

/// `"auto"` follows the system locale; anything unknown becomes English.
pub fn resolve_language(setting: &str) -> String {
    if setting.eq_ignore_ascii_case("auto") {
        return detect_system_language();
    }
    LANGUAGES
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(setting))
        .map_or_else(|| "en".to_string(), |(code, _)| code.to_string())
}

pub fn set_language(code: &str) {
    if let Ok(mut guard) = I18N.lock()
        && let Some(ref mut state) = *guard
    {
        state.current_lang = resolve_language(code);
    }
}

pub fn current_language() -> String {
    if let Ok(guard) = I18N.lock()
        && let Some(ref state) = *guard
    {
        return state.current_lang.clone();
    }
    "en".to_string()
}

pub fn translate(key: &str) -> String {
    if let Ok(guard) = I18N.lock()
        && let Some(ref state) = *guard
    {
        for lang in [state.current_lang.as_str(), "en"] {
            if let Some(val) = state.catalogs.get(lang).and_then(|m| m.get(key)) {
                return val.clone();
            }
        }
    }
    key.to_string()
}

/// Best supported match for `LANG` / `LC_ALL` / `LC_MESSAGES` / `LANGUAGE`.
pub fn detect_system_language() -> String {
    for var in ["LANG", "LC_ALL", "LC_MESSAGES", "LANGUAGE"] {
        if let Ok(val) = std::env::var(var)
            && let Some(lang) = match_system_locale(&val)
        {
            return lang;
        }
    }
    "en".to_string()
}

/// Match a locale string ("zh_CN.UTF-8", "en-US", "zh") to a supported code.
fn match_system_locale(locale: &str) -> Option<String> {
    let normalized = locale.to_lowercase().replace('_', "-");
    let lang_part = normalized.split(['.', '@']).next().unwrap_or(&normalized);

    if let Some((code, _)) = LANGUAGES.iter().find(|(c, _)| c.to_lowercase() == lang_part) {
        return Some(code.to_string());
    }

    let primary = lang_part.split('-').next().unwrap_or(lang_part);
    LANGUAGES
        .iter()
        .find(|(c, _)| c.split('-').next().is_some_and(|p| p.eq_ignore_ascii_case(primary)))
        .map(|(c, _)| c.to_string())
}

/// One `key=value` per line; `#` starts a comment line.
fn parse_catalog(data: &str) -> HashMap<String, String> {
    data.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Translation macro. Usage: `t!("alert.invalid_file_type")` or
/// `t!("status.loading", name = "cat.png")`
#[macro_export]
macro_rules! t {
    ($key:expr) => {
        $crate::i18n::translate($key)
    };
    ($key:expr, $($name:ident = $val:expr),+ $(,)?) => {{
        let mut s = $crate::i18n::translate($key);
        $(
            s = s.replace(concat!("{", stringify!($name), "}"), &format!("{}", $val));
        )+
        s
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_parser_skips_comments_and_blanks() {
        let map = parse_catalog("# header\n\nbutton.open = Open image\nbad line\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map["button.open"], "Open image");
    }

    #[test]
    fn locale_strings_match_supported_codes() {
        assert_eq!(match_system_locale("zh_CN.UTF-8").as_deref(), Some("zh-CN"));
        assert_eq!(match_system_locale("zh_TW").as_deref(), Some("zh-CN"));
        assert_eq!(match_system_locale("en_GB.UTF-8").as_deref(), Some("en"));
        assert_eq!(match_system_locale("fr_FR"), None);
    }

    #[test]
    fn explicit_setting_resolves_without_the_environment() {
        assert_eq!(resolve_language("zh-cn"), "zh-CN");
        assert_eq!(resolve_language("klingon"), "en");
    }

    #[test]
    fn every_english_key_has_a_chinese_message() {
        let en = parse_catalog(CATALOGS[0].1);
        let zh = parse_catalog(CATALOGS[1].1);
        for key in en.keys() {
            assert!(zh.contains_key(key), "zh-CN catalog is missing '{key}'");
        }
    }

    #[test]
    fn translate_falls_back_to_english_then_key() {
        init("zh-CN");
        assert_eq!(translate("alert.invalid_file_type"), "请上传图片文件");
        assert_eq!(translate("no.such.key"), "no.such.key");
        let msg = t!("status.loading", name = "cat.png");
        assert!(msg.contains("cat.png"), "placeholder not filled: {msg}");
        set_language("en");
        assert_eq!(translate("alert.invalid_file_type"), "Please upload an image file");
    }
}
