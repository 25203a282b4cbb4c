//! The topic table behind the assistant.
//!
//! A knowledge base is plain JSON so that content can be edited or localized
//! without a rebuild. Two variants ship inside the binary; any other file with
//! the same shape can be loaded at startup or swapped in at runtime.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::Path;
use std::sync::Arc;

use crate::error::KnowledgeError;
use crate::intent::{Intent, IntentMatcher};
use crate::topic::Topic;

const BASIC_JSON: &str = include_str!("../assets/knowledge/basic.json");
const ADVANCED_JSON: &str = include_str!("../assets/knowledge/advanced.json");

/// Built-in content sets.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Basic,
    #[default]
    Advanced,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Salutations {
    pub morning: String,
    pub afternoon: String,
    pub evening: String,
}

impl Default for Salutations {
    fn default() -> Self {
        Self {
            morning: "Доброе утро".to_string(),
            afternoon: "Добрый день".to_string(),
            evening: "Добрый вечер".to_string(),
        }
    }
}

impl Salutations {
    pub fn for_hour(&self, hour: u32) -> &str {
        if hour < 12 {
            &self.morning
        } else if hour < 18 {
            &self.afternoon
        } else {
            &self.evening
        }
    }
}

fn default_prefix() -> char {
    '/'
}

// On-disk shape of a knowledge base.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct KnowledgeFile {
    name: String,
    #[serde(default = "default_prefix")]
    command_prefix: char,
    default_display_name: String,
    #[serde(default)]
    salutations: Salutations,
    greeting_topic: String,
    fallback_topic: String,
    unknown_command_topic: String,
    topics: Vec<Topic>,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    file: KnowledgeFile,
    matcher: IntentMatcher,
    index: HashMap<String, usize>,
    commands: HashMap<String, usize>,
    // Free-text topics, by category rank then declaration order.
    scan_order: Vec<usize>,
    greeting: usize,
    fallback: usize,
    unknown_command: usize,
    // Leading glyphs on suggestion labels, anything but letters, digits and the prefix.
    decoration: Regex,
}

static BASIC: OnceCell<Arc<KnowledgeBase>> = OnceCell::new();
static ADVANCED: OnceCell<Arc<KnowledgeBase>> = OnceCell::new();

impl KnowledgeBase {
    pub fn builtin(variant: Variant) -> Result<Self, KnowledgeError> {
        match variant {
            Variant::Basic => Self::from_json_str(BASIC_JSON),
            Variant::Advanced => Self::from_json_str(ADVANCED_JSON),
        }
    }

    /// A built-in variant parsed once per process.
    pub fn shared(variant: Variant) -> Result<Arc<Self>, KnowledgeError> {
        let cell = match variant {
            Variant::Basic => &BASIC,
            Variant::Advanced => &ADVANCED,
        };
        cell.get_or_try_init(|| Self::builtin(variant).map(Arc::new))
            .cloned()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KnowledgeError> {
        let content = read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, KnowledgeError> {
        let file: KnowledgeFile = serde_json::from_str(json)?;
        Self::build(file)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.file)
    }

    fn build(mut file: KnowledgeFile) -> Result<Self, KnowledgeError> {
        let prefix = file.command_prefix;
        let mut index = HashMap::new();
        let mut commands = HashMap::new();

        for (i, topic) in file.topics.iter_mut().enumerate() {
            for keyword in topic.trigger_keywords.iter_mut() {
                *keyword = keyword.trim().to_lowercase();
            }
            topic.trigger_keywords.retain(|k| !k.is_empty());

            if index.insert(topic.id.clone(), i).is_some() {
                return Err(KnowledgeError::DuplicateTopic(topic.id.clone()));
            }

            if topic.is_command {
                match topic.trigger_keywords.as_slice() {
                    [trigger] if trigger.starts_with(prefix) && trigger.len() > prefix.len_utf8() => {
                        if commands.insert(trigger.clone(), i).is_some() {
                            return Err(KnowledgeError::DuplicateTopic(trigger.clone()));
                        }
                    }
                    _ => {
                        return Err(KnowledgeError::InvalidCommandTrigger {
                            id: topic.id.clone(),
                            prefix,
                        })
                    }
                }
            } else if let Some(keyword) = topic.trigger_keywords.iter().find(|k| k.starts_with(prefix)) {
                return Err(KnowledgeError::PrefixedKeyword {
                    id: topic.id.clone(),
                    keyword: keyword.clone(),
                });
            }
        }

        for topic in &file.topics {
            if let Some(target) = &topic.same_as {
                let Some(&t) = index.get(target) else {
                    return Err(KnowledgeError::DanglingAlias {
                        id: topic.id.clone(),
                        target: target.clone(),
                    });
                };
                if file.topics[t].same_as.is_some() {
                    return Err(KnowledgeError::ChainedAlias {
                        id: topic.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        let required = |role: &'static str, id: &str| {
            index.get(id).copied().ok_or_else(|| KnowledgeError::MissingTopic {
                role,
                id: id.to_string(),
            })
        };
        let greeting = required("greeting", &file.greeting_topic)?;
        let fallback = required("fallback", &file.fallback_topic)?;
        let unknown_command = required("unknown command", &file.unknown_command_topic)?;

        let mut scan_order: Vec<usize> = file
            .topics
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_command && !t.trigger_keywords.is_empty())
            .map(|(i, _)| i)
            .collect();
        // Stable, so declaration order is kept inside a category.
        scan_order.sort_by_key(|&i| file.topics[i].category.rank());

        log::debug!(
            "Knowledge base '{}': {} topics, {} commands",
            file.name,
            file.topics.len(),
            commands.len()
        );

        let decoration = Regex::new(&format!(
            r"^[^\p{{L}}\p{{N}}{}]+",
            regex::escape(&prefix.to_string())
        ))?;

        Ok(Self {
            decoration,
            matcher: IntentMatcher::new(prefix),
            file,
            index,
            commands,
            scan_order,
            greeting,
            fallback,
            unknown_command,
        })
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn len(&self) -> usize {
        self.file.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.topics.is_empty()
    }

    pub fn matcher(&self) -> IntentMatcher {
        self.matcher
    }

    pub fn default_display_name(&self) -> &str {
        &self.file.default_display_name
    }

    pub fn salutations(&self) -> &Salutations {
        &self.file.salutations
    }

    pub fn topics(&self) -> &[Topic] {
        &self.file.topics
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.index.get(id).map(|&i| &self.file.topics[i])
    }

    pub fn greeting(&self) -> &Topic {
        self.resolve(self.greeting)
    }

    /// Turns a suggestion label such as "🚨 Экстренная ситуация" into the
    /// text it stands for.
    pub fn strip_decoration<'a>(&self, label: &'a str) -> &'a str {
        let label = label.trim();
        match self.decoration.find(label) {
            Some(m) => label[m.end()..].trim(),
            None => label,
        }
    }

    /// Maps any input to the topic that answers it. Never fails: unknown
    /// commands and unmatched text get their designated topics.
    pub fn lookup(&self, input: &str) -> &Topic {
        let found = match self.matcher.classify(input) {
            Intent::Command(command) => self
                .commands
                .get(&command)
                .copied()
                .unwrap_or(self.unknown_command),
            Intent::Keyword(text) => self
                .scan_order
                .iter()
                .copied()
                .find(|&i| self.file.topics[i].matches(&text))
                .unwrap_or(self.fallback),
            Intent::Empty => self.fallback,
        };
        self.resolve(found)
    }

    fn resolve(&self, i: usize) -> &Topic {
        let topic = &self.file.topics[i];
        topic
            .same_as
            .as_deref()
            .and_then(|target| self.topic(target))
            .unwrap_or(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::Category;

    fn advanced() -> KnowledgeBase {
        KnowledgeBase::builtin(Variant::Advanced).unwrap()
    }

    #[test]
    fn builtin_variants_load() {
        let basic = KnowledgeBase::builtin(Variant::Basic).unwrap();
        assert_eq!(basic.name(), "basic");
        assert_eq!(advanced().name(), "advanced");
        assert!(basic.len() > 10);
    }

    #[test]
    fn help_command() {
        let kb = advanced();
        let topic = kb.lookup("/помощь");
        assert_eq!(topic.id, "help");
        assert_eq!(topic.category, Category::General);
        assert!(topic.suggestions.iter().any(|s| s == "/права"));
    }

    #[test]
    fn commands_are_case_insensitive_and_trimmed() {
        assert_eq!(advanced().lookup("   /ПОМОЩЬ  ").id, "help");
    }

    #[test]
    fn unknown_command_has_its_own_topic() {
        let kb = advanced();
        assert_eq!(kb.lookup("/несуществующая").id, "unknown_command");
        // Command match is exact, trailing words make it unknown.
        assert_eq!(kb.lookup("/помощь сейчас").id, "unknown_command");
    }

    #[test]
    fn english_aliases_render_their_targets() {
        let kb = advanced();
        assert_eq!(kb.lookup("/legal").id, "rights");
        assert_eq!(kb.lookup("/emergency").id, "emergency_services");
        assert_eq!(kb.lookup("/help").id, "help");
    }

    #[test]
    fn emergency_preempts_routing_and_legal() {
        let kb = advanced();
        for input in [
            "у меня пожар",
            "авария на дороге",
            "пожар, а как же мои права по закону",
            "газ, вода, дорога и пожар",
        ] {
            let topic = kb.lookup(input);
            assert_eq!(topic.category, Category::Emergency, "input: {input}");
        }
    }

    #[test]
    fn emergency_offers_a_112_call() {
        let kb = advanced();
        let topic = kb.lookup("у меня пожар");
        assert!(topic.suggestions.iter().any(|s| s.contains("112")));
    }

    #[test]
    fn road_problems_are_routed_to_the_district() {
        let kb = advanced();
        let topic = kb.lookup("проблема с дорогами");
        assert_eq!(topic.category, Category::Routing);
        assert!(topic.response_template.contains("Хокимият района"));
    }

    #[test]
    fn free_text_help_and_timing_questions() {
        let kb = advanced();
        assert_eq!(kb.lookup("мне нужна помощь").id, "help");
        assert_eq!(kb.lookup("какие команды есть?").id, "help");
        assert_eq!(kb.lookup("сколько времени рассматривают").id, "timing");
        // More specific topics still win over the help alias.
        assert_eq!(kb.lookup("помощь с дорогами").id, "roads");
    }

    #[test]
    fn utility_suggestions_stay_out_of_emergency() {
        let kb = advanced();
        let utilities = kb.topic("utilities").unwrap();
        for label in &utilities.suggestions {
            let topic = kb.lookup(kb.strip_decoration(label));
            assert_ne!(topic.category, Category::Emergency, "label: {label}");
        }
        assert_eq!(kb.lookup("Служба ЖКХ").id, "utilities");
    }

    #[test]
    fn every_non_empty_input_resolves() {
        let kb = advanced();
        for input in ["a", "?", "🙂", "/", "///", "привет", "1234", "\u{200b}"] {
            assert!(!kb.lookup(input).id.is_empty());
        }
        assert_eq!(kb.lookup("что-то совсем другое").id, "fallback");
    }

    #[test]
    fn basic_variant_falls_back_with_variants() {
        let kb = KnowledgeBase::builtin(Variant::Basic).unwrap();
        let topic = kb.lookup("расскажите анекдот");
        assert_eq!(topic.id, "fallback");
        assert_eq!(topic.template_count(), 4);
        assert_eq!(kb.lookup("/что-нибудь").id, "unknown_command");
    }

    #[test]
    fn decoration_is_stripped_from_labels() {
        let kb = advanced();
        assert_eq!(kb.strip_decoration("🚨 Экстренная ситуация"), "Экстренная ситуация");
        assert_eq!(kb.strip_decoration("⚖️ Мои права"), "Мои права");
        assert_eq!(kb.strip_decoration("  📞 Вызвать 112 "), "Вызвать 112");
        assert_eq!(kb.strip_decoration("/помощь"), "/помощь");
        assert_eq!(kb.strip_decoration("Подать жалобу"), "Подать жалобу");
        assert_eq!(kb.strip_decoration("🙂"), "");
    }

    #[test]
    fn shared_tables_are_parsed_once() {
        let a = KnowledgeBase::shared(Variant::Basic).unwrap();
        let b = KnowledgeBase::shared(Variant::Basic).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn export_round_trips() {
        let kb = advanced();
        let json = kb.to_json_pretty().unwrap();
        let again = KnowledgeBase::from_json_str(&json).unwrap();
        assert_eq!(again.topics(), kb.topics());
    }

    fn minimal(topics: &str) -> String {
        format!(
            r#"{{"name":"t","default_display_name":"гость","greeting_topic":"hi",
                "fallback_topic":"fb","unknown_command_topic":"uc","topics":[
                {{"id":"hi","response_template":"Привет","category":"general"}},
                {{"id":"fb","response_template":"?","category":"general"}},
                {{"id":"uc","response_template":"??","category":"general"}}{topics}]}}"#
        )
    }

    #[test]
    fn minimal_file_loads() {
        let kb = KnowledgeBase::from_json_str(&minimal("")).unwrap();
        assert_eq!(kb.greeting().id, "hi");
        assert_eq!(kb.salutations(), &Salutations::default());
        assert_eq!(kb.matcher().prefix(), '/');
    }

    #[test]
    fn keywords_are_lowercased_on_load() {
        let kb = KnowledgeBase::from_json_str(&minimal(
            r#",{"id":"roads","trigger_keywords":["ДОРОГ"],"response_template":"r","category":"routing"}"#,
        ))
        .unwrap();
        assert_eq!(kb.lookup("Дороги разбиты").id, "roads");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = KnowledgeBase::from_json_str(&minimal(
            r#",{"id":"fb","response_template":"x","category":"general"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, KnowledgeError::DuplicateTopic(id) if id == "fb"));
    }

    #[test]
    fn rejects_bad_command_triggers() {
        for topic in [
            r#",{"id":"c","is_command":true,"trigger_keywords":["help"],"response_template":"x","category":"general"}"#,
            r#",{"id":"c","is_command":true,"trigger_keywords":["/a","/b"],"response_template":"x","category":"general"}"#,
            r#",{"id":"c","is_command":true,"trigger_keywords":["/"],"response_template":"x","category":"general"}"#,
        ] {
            let err = KnowledgeBase::from_json_str(&minimal(topic)).unwrap_err();
            assert!(matches!(err, KnowledgeError::InvalidCommandTrigger { .. }));
        }
    }

    #[test]
    fn rejects_prefixed_free_text_keywords() {
        let err = KnowledgeBase::from_json_str(&minimal(
            r#",{"id":"k","trigger_keywords":["/legal"],"response_template":"x","category":"legal"}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, KnowledgeError::PrefixedKeyword { .. }));
    }

    #[test]
    fn rejects_missing_designated_topics() {
        let json = minimal("").replace(r#""fallback_topic":"fb""#, r#""fallback_topic":"nope""#);
        let err = KnowledgeBase::from_json_str(&json).unwrap_err();
        assert!(matches!(err, KnowledgeError::MissingTopic { role: "fallback", .. }));
    }

    #[test]
    fn rejects_broken_aliases() {
        let dangling = minimal(
            r#",{"id":"a","response_template":"x","category":"general","same_as":"zzz"}"#,
        );
        assert!(matches!(
            KnowledgeBase::from_json_str(&dangling).unwrap_err(),
            KnowledgeError::DanglingAlias { .. }
        ));

        let chained = minimal(
            r#",{"id":"a","response_template":"x","category":"general","same_as":"b"},
               {"id":"b","response_template":"x","category":"general","same_as":"fb"}"#,
        );
        assert!(matches!(
            KnowledgeBase::from_json_str(&chained).unwrap_err(),
            KnowledgeError::ChainedAlias { .. }
        ));
    }
}
