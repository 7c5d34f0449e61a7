use baodao_common::{ChatMessage, Language, Role};

/// Script-based language detection for the first user message.
///
/// The test order below is the tie-break contract: a message mixing scripts
/// resolves to whichever class is checked first. CJK ideographs win over
/// kana, kana over hangul, and the Spanish diacritic set over the French one
/// (they overlap on `ü`/`é`).
#[derive(Debug, Clone, Copy)]
pub struct LanguageDetector {
    default: Language,
}

const SPANISH_MARKERS: &[char] = &[
    'á', 'é', 'í', 'ó', 'ú', 'ü', 'ñ', '¿', '¡', 'Á', 'É', 'Í', 'Ó', 'Ú', 'Ü', 'Ñ',
];

const FRENCH_MARKERS: &[char] = &[
    'à', 'â', 'ç', 'è', 'ê', 'ë', 'î', 'ï', 'ô', 'û', 'ù', 'ÿ', 'œ', 'æ', 'À', 'Â', 'Ç', 'È',
    'Ê', 'Ë', 'Î', 'Ï', 'Ô', 'Û', 'Ù', 'Ÿ', 'Œ', 'Æ', 'é', 'É', 'ü', 'Ü',
];

impl LanguageDetector {
    pub fn new(default: Language) -> Self {
        Self { default }
    }

    pub fn default_language(&self) -> Language {
        self.default
    }

    /// Classify `text`. Pure and total: unknown scripts and empty input fall
    /// back to the configured default.
    pub fn detect(&self, text: &str) -> Language {
        if text.is_empty() {
            return self.default;
        }
        if text.chars().any(is_cjk_ideograph) {
            return Language::Zh;
        }
        if text.chars().any(is_kana) {
            return Language::Ja;
        }
        if text.chars().any(is_hangul) {
            return Language::Ko;
        }
        if text.chars().any(|c| SPANISH_MARKERS.contains(&c)) {
            return Language::Es;
        }
        if text.chars().any(|c| FRENCH_MARKERS.contains(&c)) {
            return Language::Fr;
        }
        if is_plain_ascii(text) {
            return Language::En;
        }
        self.default
    }

    /// The language pinned for a conversation: derived from the first
    /// user-authored message and never re-derived from later turns.
    pub fn pinned_language(&self, messages: &[ChatMessage]) -> Language {
        let first_user = messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        self.detect(first_user)
    }
}

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{309f}').contains(&c) || ('\u{30a0}'..='\u{30ff}').contains(&c)
}

fn is_hangul(c: char) -> bool {
    ('\u{ac00}'..='\u{d7af}').contains(&c)
}

fn is_plain_ascii(text: &str) -> bool {
    text.chars().all(|c| {
        c.is_ascii_alphanumeric() || c.is_ascii_whitespace() || ".,!?'\"()-".contains(c)
    })
}
