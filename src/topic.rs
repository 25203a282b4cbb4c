use serde::{Deserialize, Serialize};

use crate::selection::ResponseSelector;

/// Broad class of a topic. The declaration order is also the scan priority
/// for free-text lookups: emergencies are checked before anything else.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Emergency,
    Routing,
    Legal,
    General,
}

impl Category {
    pub fn rank(self) -> u8 {
        match self {
            Category::Emergency => 0,
            Category::Routing => 1,
            Category::Legal => 2,
            Category::General => 3,
        }
    }
}

// One entry of the knowledge base, as stored in the JSON files.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Topic {
    pub id: String,
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    #[serde(default)]
    pub is_command: bool,
    pub response_template: String,
    /// Alternative templates; one of `response_template` and these is picked per reply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub related_commands: Vec<String>,
    pub category: Category,
    /// Renders another topic instead of this one (one hop only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_as: Option<String>,
}

/// Values a template may interpolate.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub name: &'a str,
    pub input: &'a str,
    pub salutation: &'a str,
}

/// A rendered bot answer. Everything is copied out of the topic so that a
/// message never points back into a knowledge base that may be swapped.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Reply {
    pub topic_id: String,
    pub text: String,
    pub suggestions: Vec<String>,
    pub commands: Vec<String>,
    pub category: Category,
}

impl Topic {
    pub fn matches(&self, lowered_input: &str) -> bool {
        self.trigger_keywords
            .iter()
            .any(|keyword| lowered_input.contains(keyword.as_str()))
    }

    pub fn template_count(&self) -> usize {
        1 + self.variants.len()
    }

    pub fn render(&self, ctx: &RenderContext<'_>, selector: &mut dyn ResponseSelector) -> Reply {
        let choice = match self.template_count() {
            1 => 0,
            n => selector.choose(n).min(n - 1),
        };
        let template = if choice == 0 {
            &self.response_template
        } else {
            &self.variants[choice - 1]
        };

        Reply {
            topic_id: self.id.clone(),
            text: interpolate(template, ctx),
            suggestions: self.suggestions.clone(),
            commands: self.related_commands.clone(),
            category: self.category,
        }
    }
}

fn interpolate(template: &str, ctx: &RenderContext<'_>) -> String {
    template
        .replace("{name}", ctx.name)
        .replace("{salutation}", ctx.salutation)
        // Last, so user text containing a placeholder is left as typed.
        .replace("{input}", ctx.input)
}
