//! Locale and workflow-step name normalization
//!
//! Maps XTM locale codes to display language names for grouping, and
//! strips attempt numbers from workflow step names so `translate1` and
//! `translate2` land in the same column.

use std::collections::BTreeMap;

use tracing::warn;

/// Locale codes known to the XTM account, with their report names.
pub const DEFAULT_LOCALES: &[(&str, &str)] = &[
    ("ar_AE", "Arabic (UAE)"),
    ("ar_EG", "Arabic (Egypt)"),
    ("ar_SA", "Arabic (Saudi Arabia)"),
    ("bg_BG", "Bulgarian"),
    ("ceb", "Cebuano"),
    ("cs_CZ", "Czech"),
    ("da_DK", "Danish"),
    ("de_DE", "German"),
    ("el_CY", "Greek (Cyprus)"),
    ("el_GR", "Greek"),
    ("en_US", "English (US)"),
    ("en_GB", "English (UK)"),
    ("es_ES", "Spanish"),
    ("es_MX", "Spanish (Mexico)"),
    ("et_EE", "Estonian"),
    ("fa_IR", "Persian"),
    ("fi_FI", "Finnish"),
    ("fj_FJ", "Fijian"),
    ("fr_FR", "French"),
    ("hr_BA", "Croatian (Bosnia)"),
    ("hr_HR", "Croatian"),
    ("ht_HT", "Haitian Creole"),
    ("hu_HU", "Hungarian"),
    ("hy_AM", "Armenian"),
    ("id_ID", "Indonesian"),
    ("is_IS", "Icelandic"),
    ("it_IT", "Italian"),
    ("ja_JP", "Japanese"),
    ("ka_GE", "Georgian"),
    ("kk_KZ", "Kazakh"),
    ("km_KH", "Khmer"),
    ("ko_KR", "Korean"),
    ("lo_LA", "Lao"),
    ("lt_LT", "Lithuanian"),
    ("lv_LV", "Latvian"),
    ("mg_MG", "Malagasy"),
    ("mk_MK", "Macedonian"),
    ("mn_MN", "Mongolian"),
    ("ms_MY", "Malay"),
    ("nl_NL", "Dutch"),
    ("no_NO", "Norwegian"),
    ("pl_PL", "Polish"),
    ("pt_BR", "Portuguese (Brazil)"),
    ("pt_PT", "Portuguese (Portugal)"),
    ("ro_RO", "Romanian"),
    ("ru_RU", "Russian"),
    ("sk_SK", "Slovak"),
    ("sl_SI", "Slovenian"),
    ("sm_WS", "Samoan"),
    ("sq_AL", "Albanian"),
    ("sr_RS", "Serbian"),
    ("sv_SE", "Swedish"),
    ("sw_KE", "Swahili (Kenya)"),
    ("sw_TZ", "Swahili (Tanzania)"),
    ("th_TH", "Thai"),
    ("tl_PH", "Tagalog"),
    ("to_TO", "Tongan"),
    ("tr_TR", "Turkish"),
    ("ty", "Tahitian"),
    ("uk_UA", "Ukrainian"),
    ("ur_IN", "Urdu"),
    ("vi_VN", "Vietnamese"),
    ("zh_CN", "Chinese (Simplified)"),
    ("zh_HK", "Chinese (Hong Kong)"),
    ("zh_TW", "Chinese (Traditional)"),
];

/// Immutable locale code → display name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleTable {
    names: BTreeMap<String, String>,
}

impl Default for LocaleTable {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALES.iter().copied())
    }
}

impl LocaleTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table = Self {
            names: entries
                .into_iter()
                .map(|(code, name)| (code.into(), name.into()))
                .collect(),
        };
        for (name, codes) in table.collisions() {
            warn!(%name, codes = ?codes, "locale codes share a display name; their counts will be summed");
        }
        table
    }

    /// Default table with `overrides` replacing or adding entries.
    pub fn with_overrides<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut names: BTreeMap<String, String> = DEFAULT_LOCALES
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();
        names.extend(
            overrides
                .into_iter()
                .map(|(code, name)| (code.into(), name.into())),
        );
        Self::new(names)
    }

    /// Display name for `code`; unknown codes pass through unchanged.
    pub fn normalize<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Display names mapped from more than one code.
    pub fn collisions(&self) -> BTreeMap<String, Vec<String>> {
        let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (code, name) in &self.names {
            by_name.entry(name.clone()).or_default().push(code.clone());
        }
        by_name.retain(|_, codes| codes.len() > 1);
        by_name
    }
}

/// Strip digits and surrounding whitespace: `"final review2"` → `"final review"`.
pub fn clean_step_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== LocaleTable ==========

    #[test]
    fn test_default_table_size() {
        assert_eq!(LocaleTable::default().len(), 65);
    }

    #[test]
    fn test_known_codes() {
        let table = LocaleTable::default();
        assert_eq!(table.normalize("es_ES"), "Spanish");
        assert_eq!(table.normalize("ceb"), "Cebuano");
        assert_eq!(table.normalize("pt_BR"), "Portuguese (Brazil)");
    }

    #[test]
    fn test_regional_variants_stay_distinct() {
        let table = LocaleTable::default();
        assert_eq!(table.normalize("zh_CN"), "Chinese (Simplified)");
        assert_eq!(table.normalize("zh_TW"), "Chinese (Traditional)");
        assert_ne!(table.normalize("zh_CN"), table.normalize("zh_TW"));
    }

    #[test]
    fn test_unknown_code_passes_through() {
        let table = LocaleTable::default();
        assert_eq!(table.normalize("xx_YY"), "xx_YY");
        assert_eq!(table.normalize(""), "");
    }

    #[test]
    fn test_default_table_has_no_collisions() {
        assert!(LocaleTable::default().collisions().is_empty());
    }

    #[test]
    fn test_custom_table_reports_collisions() {
        let table = LocaleTable::new([("es_ES", "Spanish"), ("es_419", "Spanish"), ("fr_FR", "French")]);
        let collisions = table.collisions();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions["Spanish"], vec!["es_419", "es_ES"]);
    }

    #[test]
    fn test_overrides_replace_and_add() {
        let table = LocaleTable::with_overrides([("es_ES", "Spanish (Spain)"), ("qu_PE", "Quechua")]);
        assert_eq!(table.normalize("es_ES"), "Spanish (Spain)");
        assert_eq!(table.normalize("qu_PE"), "Quechua");
        assert_eq!(table.len(), 66);
    }

    // ========== clean_step_name ==========

    #[test]
    fn test_clean_step_strips_digits() {
        assert_eq!(clean_step_name("translate1"), "translate");
        assert_eq!(clean_step_name("correct2"), "correct");
    }

    #[test]
    fn test_clean_step_trims() {
        assert_eq!(clean_step_name("final review 2"), "final review");
        assert_eq!(clean_step_name("  translate "), "translate");
    }

    #[test]
    fn test_clean_step_only_digits_is_empty() {
        assert_eq!(clean_step_name("123"), "");
    }
}
