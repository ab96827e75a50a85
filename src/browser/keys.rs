/// CDP parameters for a named key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDefinition {
    pub key: &'static str,
    pub code: &'static str,
    pub key_code: i64,
    /// Text the key inserts, if any
    pub text: Option<&'static str>,
}

const fn def(key: &'static str, code: &'static str, key_code: i64, text: Option<&'static str>) -> KeyDefinition {
    KeyDefinition {
        key,
        code,
        key_code,
        text,
    }
}

const KEYS: &[KeyDefinition] = &[
    def("Enter", "Enter", 13, Some("\r")),
    def("Tab", "Tab", 9, None),
    def("Escape", "Escape", 27, None),
    def("Backspace", "Backspace", 8, None),
    def("Delete", "Delete", 46, None),
    def("ArrowLeft", "ArrowLeft", 37, None),
    def("ArrowUp", "ArrowUp", 38, None),
    def("ArrowRight", "ArrowRight", 39, None),
    def("ArrowDown", "ArrowDown", 40, None),
    def("Home", "Home", 36, None),
    def("End", "End", 35, None),
    def("PageUp", "PageUp", 33, None),
    def("PageDown", "PageDown", 34, None),
    def(" ", "Space", 32, Some(" ")),
];

/// Looks up a key by its DOM name (case-insensitive, with a few aliases)
pub fn key_definition(name: &str) -> Option<KeyDefinition> {
    let name = match name.trim().to_lowercase().as_str() {
        "return" => "enter".to_string(),
        "esc" => "escape".to_string(),
        "space" | "spacebar" => " ".to_string(),
        "del" => "delete".to_string(),
        "up" => "arrowup".to_string(),
        "down" => "arrowdown".to_string(),
        "left" => "arrowleft".to_string(),
        "right" => "arrowright".to_string(),
        other => other.to_string(),
    };
    if name.is_empty() {
        // " ".trim() is empty; only reachable for a literal space
        return KEYS.iter().copied().find(|k| k.key == " ");
    }
    KEYS.iter().copied().find(|k| k.key.to_lowercase() == name)
}
