use std::fmt;

use crate::utils::{Error, Result};

pub const DEFAULT_TOPIC_TEMPLATE: &str = "client/{client_id}/session/{session_id}/";

const CLIENT_ID: &str = "{client_id}";
const SESSION_ID: &str = "{session_id}";

/// Topic pattern with `{client_id}` and `{session_id}` placeholders.
///
/// Rendered topics always end with exactly one `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTemplate(String);

impl TopicTemplate {
    pub fn new(template: &str) -> Result<Self> {
        let template = template.trim();

        for placeholder in [CLIENT_ID, SESSION_ID] {
            if !template.contains(placeholder) {
                return Err(Error::invalid(
                    "publisher.topic_template",
                    format!("`{template}` is missing {placeholder}"),
                ));
            }
        }
        if template.contains(['+', '#']) {
            return Err(Error::invalid(
                "publisher.topic_template",
                "wildcards are not allowed in publish topics",
            ));
        }

        Ok(Self(with_trailing_slash(template)))
    }

    pub fn render(&self, client_id: &str, session_id: &str) -> String {
        let topic = self
            .0
            .replace(CLIENT_ID, client_id)
            .replace(SESSION_ID, session_id);
        with_trailing_slash(&topic)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TopicTemplate {
    fn default() -> Self {
        Self(DEFAULT_TOPIC_TEMPLATE.to_string())
    }
}

impl fmt::Display for TopicTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn with_trailing_slash(topic: &str) -> String {
    format!("{}/", topic.trim_end_matches('/'))
}
