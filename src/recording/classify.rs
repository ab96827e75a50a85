use regex::Regex;

use crate::models::{meaningful, ElementDescriptor};

/// Default submit vocabulary (Portuguese/English, as used by the login and CRUD
/// screens this recorder was first built for). Replaceable through config.
pub const DEFAULT_SUBMIT_KEYWORDS: &[&str] =
    &["entrar", "login", "submit", "enviar", "salvar", "confirmar"];

/// Words that mark a search text as a form-field name rather than a button
pub const DEFAULT_FIELD_KEYWORDS: &[&str] = &[
    "email", "e-mail", "senha", "password", "usuario", "usuário", "username",
];

/// Builds a case-insensitive whole-word matcher for a keyword list.
/// `None` when the list is empty (nothing matches).
pub fn keyword_regex(keywords: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    let pattern = format!(
        r"(?i)(?:^|[^\p{{L}}\p{{N}}])(?:{})(?:$|[^\p{{L}}\p{{N}}])",
        alternatives.join("|")
    );
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Ignoring keyword list, pattern rejected: {}", e);
            None
        }
    }
}

/// Decides whether an element is a submit control
#[derive(Debug, Clone)]
pub struct SubmitClassifier {
    keywords: Option<Regex>,
}

impl SubmitClassifier {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keyword_regex(keywords),
        }
    }

    pub fn matches_keyword(&self, text: &str) -> bool {
        self.keywords.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// `type=submit`, or a button-like control whose text or value is a submit keyword
    pub fn is_submit(&self, element: &ElementDescriptor) -> bool {
        if element.input_type_lower().as_deref() == Some("submit") {
            return true;
        }
        if !element.is_interactive() || element.tag() == "a" {
            return false;
        }
        [&element.text, &element.aria_label]
            .into_iter()
            .filter_map(meaningful)
            .any(|t| self.matches_keyword(t))
    }

    /// First submit control among `candidates` (DOM order)
    pub fn find_submit<'a>(&self, candidates: &'a [ElementDescriptor]) -> Option<&'a ElementDescriptor> {
        candidates.iter().find(|c| self.is_submit(c))
    }
}

impl Default for SubmitClassifier {
    fn default() -> Self {
        let keywords: Vec<String> = DEFAULT_SUBMIT_KEYWORDS.iter().map(|k| k.to_string()).collect();
        Self::new(&keywords)
    }
}
