//! Voice languages offered for narration.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// A narration language supported by the text-to-speech service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Language {
    #[default]
    EnglishUs,
    Spanish,
    French,
    German,
    Italian,
    Portuguese,
}

impl Language {
    /// All languages in the order they are offered to the user.
    pub const ALL: [Language; 6] = [
        Language::EnglishUs,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Italian,
        Language::Portuguese,
    ];

    /// Human-readable name shown in the language selector.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::EnglishUs => "English (US)",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Italian => "Italian",
            Language::Portuguese => "Portuguese",
        }
    }

    /// Language code passed to the text-to-speech service.
    pub fn code(self) -> &'static str {
        match self {
            Language::EnglishUs => "en",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Italian => "it",
            Language::Portuguese => "pt",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Error returned when a language name or code is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown language '{0}'")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    /// Accepts a display name (case-insensitive) or a language code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VOICE_SELECTION
            .lookup(s)
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

/// Ordered mapping from language names to TTS language codes.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug)]
pub struct VoiceSelection {
    options: Vec<Language>,
}

/// The voice selection shared by every presentation layer.
pub static VOICE_SELECTION: LazyLock<VoiceSelection> = LazyLock::new(|| VoiceSelection {
    options: Language::ALL.to_vec(),
});

impl VoiceSelection {
    /// Languages in selector order.
    pub fn options(&self) -> &[Language] {
        &self.options
    }

    /// `(display name, code)` pairs in selector order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.options.iter().map(|l| (l.display_name(), l.code()))
    }

    /// Find a language by display name (case-insensitive) or code.
    pub fn lookup(&self, key: &str) -> Option<Language> {
        let key = key.trim();
        self.options.iter().copied().find(|l| {
            l.display_name().eq_ignore_ascii_case(key) || l.code().eq_ignore_ascii_case(key)
        })
    }

    /// TTS code for a display name.
    pub fn code_for(&self, display_name: &str) -> Option<&'static str> {
        self.lookup(display_name).map(Language::code)
    }
}
