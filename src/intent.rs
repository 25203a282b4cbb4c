/// What a raw input turned out to be once trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Starts with the command prefix; carries the whole normalized token.
    Command(String),
    /// Free text to be scanned for keywords.
    Keyword(String),
    Empty,
}

impl Intent {
    pub fn is_empty(&self) -> bool {
        matches!(self, Intent::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentMatcher {
    prefix: char,
}

impl Default for IntentMatcher {
    fn default() -> Self {
        Self { prefix: '/' }
    }
}

impl IntentMatcher {
    pub fn new(prefix: char) -> Self {
        Self { prefix }
    }

    pub fn prefix(&self) -> char {
        self.prefix
    }

    pub fn classify(&self, input: &str) -> Intent {
        let normalized = input.trim().to_lowercase();
        if normalized.is_empty() {
            Intent::Empty
        } else if normalized.starts_with(self.prefix) {
            Intent::Command(normalized)
        } else {
            Intent::Keyword(normalized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_is_empty() {
        let matcher = IntentMatcher::default();
        assert_eq!(matcher.classify(""), Intent::Empty);
        assert!(matcher.classify(" \t\n ").is_empty());
    }

    #[test]
    fn prefix_makes_a_command() {
        let matcher = IntentMatcher::default();
        assert_eq!(matcher.classify("  /Помощь "), Intent::Command("/помощь".to_string()));
        assert_eq!(
            matcher.classify("Что делать /помощь"),
            Intent::Keyword("что делать /помощь".to_string())
        );
    }

    #[test]
    fn custom_prefix() {
        let matcher = IntentMatcher::new('!');
        assert_eq!(matcher.classify("!help"), Intent::Command("!help".to_string()));
        assert_eq!(matcher.classify("/help"), Intent::Keyword("/help".to_string()));
    }
}
