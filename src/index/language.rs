//! Language codes and stemmer selection.

use tantivy::tokenizer::Language as StemLanguage;

/// English language names and their ISO 639-1 codes.
const LANGUAGES: &[(&str, &str)] = &[
    ("arabic", "ar"),
    ("armenian", "hy"),
    ("basque", "eu"),
    ("belarusian", "be"),
    ("bulgarian", "bg"),
    ("catalan", "ca"),
    ("chinese", "zh"),
    ("croatian", "hr"),
    ("czech", "cs"),
    ("danish", "da"),
    ("dutch", "nl"),
    ("english", "en"),
    ("esperanto", "eo"),
    ("finnish", "fi"),
    ("french", "fr"),
    ("galician", "gl"),
    ("german", "de"),
    ("greek", "el"),
    ("hungarian", "hu"),
    ("indonesian", "id"),
    ("italian", "it"),
    ("japanese", "ja"),
    ("kannada", "kn"),
    ("korean", "ko"),
    ("lithuanian", "lt"),
    ("malayalam", "ml"),
    ("norwegian", "no"),
    ("persian", "fa"),
    ("polish", "pl"),
    ("portuguese", "pt"),
    ("romanian", "ro"),
    ("russian", "ru"),
    ("slovak", "sk"),
    ("slovene", "sl"),
    ("spanish", "es"),
    ("swedish", "sv"),
    ("tamil", "ta"),
    ("turkish", "tr"),
    ("ukrainian", "uk"),
    ("vietnamese", "vi"),
];

/// Indexing language of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLanguage {
    /// Code stored in the `L` term.
    pub code: String,
    /// English name of the stemmer, stored in the `XSL` term.
    pub stemmer_name: Option<String>,
    stemmer: Option<StemLanguage>,
}

impl IndexLanguage {
    /// Resolve a user-supplied language, given as an ISO code (`de`) or an
    /// English name (`german`). List configurations write things like
    /// `German (Deutsch)` or `pt_BR`: parenthesized text and everything from
    /// the first character outside `a-z` are ignored, and nothing left means
    /// English. Unknown values are kept as the code and get no stemmer.
    pub fn resolve(input: &str) -> Self {
        let wanted = normalize_label(input);
        let entry = LANGUAGES
            .iter()
            .find(|(name, code)| *name == wanted || *code == wanted);

        let (code, name) = match entry {
            Some((name, code)) => (code.to_string(), Some(*name)),
            None => (wanted, None),
        };
        let stemmer = name.and_then(stemmer_for);
        Self {
            code,
            stemmer_name: stemmer.and(name).map(str::to_string),
            stemmer,
        }
    }

    /// Stemming algorithm for the analyzers, if one exists for this language.
    pub fn stemmer(&self) -> Option<StemLanguage> {
        self.stemmer
    }
}

impl Default for IndexLanguage {
    fn default() -> Self {
        Self::resolve("en")
    }
}

fn normalize_label(input: &str) -> String {
    let lower = input.trim().to_ascii_lowercase();
    let mut stripped = String::with_capacity(lower.len());
    let mut depth = 0usize;
    for c in lower.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }
    let label: String = stripped
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_lowercase())
        .collect();
    if label.is_empty() {
        "en".to_string()
    } else {
        label
    }
}

fn stemmer_for(name: &str) -> Option<StemLanguage> {
    Some(match name {
        "arabic" => StemLanguage::Arabic,
        "danish" => StemLanguage::Danish,
        "dutch" => StemLanguage::Dutch,
        "english" => StemLanguage::English,
        "finnish" => StemLanguage::Finnish,
        "french" => StemLanguage::French,
        "german" => StemLanguage::German,
        "greek" => StemLanguage::Greek,
        "hungarian" => StemLanguage::Hungarian,
        "italian" => StemLanguage::Italian,
        "norwegian" => StemLanguage::Norwegian,
        "portuguese" => StemLanguage::Portuguese,
        "romanian" => StemLanguage::Romanian,
        "russian" => StemLanguage::Russian,
        "spanish" => StemLanguage::Spanish,
        "swedish" => StemLanguage::Swedish,
        "tamil" => StemLanguage::Tamil,
        "turkish" => StemLanguage::Turkish,
        _ => return None,
    })
}
