use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use taskfleet_core::{FleetError, FleetResult, RoleOutput};

/// The structured envelope an agent reply is expected to carry.
///
/// Every field is optional. A reply that does not contain a well-formed
/// JSON block at all degrades to an envelope whose `output` is the raw
/// text — that is normal operation, not a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentReply {
    /// Internal note, surfaced as a "thought" event.
    pub thinking: Option<String>,
    /// A short utterance (clipped to ~15 words when broadcast).
    pub saying: Option<String>,
    /// Current action label.
    pub doing: Option<String>,
    /// Addressee of `saying`, by role name.
    pub to_agent: Option<String>,
    /// Role-specific result.
    #[serde(deserialize_with = "deserialize_output")]
    pub output: Option<RoleOutput>,
    /// Role name of another agent whose input is needed.
    pub needs_help: Option<String>,
    /// What the help is about.
    pub help_topic: Option<String>,
}

/// Accept either a typed `{"kind": ...}` object or a bare string for the
/// `output` field; anything else is treated as absent.
fn deserialize_output<'de, D>(deserializer: D) -> Result<Option<RoleOutput>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OutputField {
        Typed(RoleOutput),
        Raw(String),
    }

    Ok(match Option::<OutputField>::deserialize(deserializer)? {
        Some(OutputField::Typed(output)) => Some(output),
        Some(OutputField::Raw(content)) => Some(RoleOutput::Text { content }),
        None => None,
    })
}

/// One entry of a decomposition plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Role name, resolved against the roster downstream.
    pub role: String,
    /// What the step asks the role to do.
    pub description: String,
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("static regex")
    })
}

/// Extract the first balanced `open`..`close` block from `text`,
/// skipping delimiters inside JSON string literals.
fn balanced_block(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Find the first well-formed block of the given shape, preferring a
/// fenced ```json``` section when the reply wraps it in prose.
fn extract_block(text: &str, open: char, close: char) -> Option<&str> {
    if let Some(caps) = fenced_block_re().captures(text) {
        if let Some(inner) = caps.get(1) {
            if let Some(block) = balanced_block(inner.as_str(), open, close) {
                return Some(block);
            }
        }
    }
    balanced_block(text, open, close)
}

/// Parse a reply into its structured envelope.
///
/// Graceful degradation: if no parseable JSON object is present, the
/// whole raw text becomes the output and every other field is `None`.
pub fn parse_reply(text: &str) -> AgentReply {
    if let Some(block) = extract_block(text, '{', '}') {
        if let Ok(reply) = serde_json::from_str::<AgentReply>(block) {
            return reply;
        }
        tracing::debug!("reply JSON block did not match the envelope; using raw text");
    }
    AgentReply {
        output: Some(RoleOutput::Text {
            content: text.to_string(),
        }),
        ..AgentReply::default()
    }
}

/// Parse a decomposition reply into an ordered plan.
///
/// Unlike [`parse_reply`], failure here is terminal for the task: a plan
/// that cannot be parsed fails decomposition with a descriptive error.
pub fn parse_plan(text: &str) -> FleetResult<Vec<PlanStep>> {
    let block = extract_block(text, '[', ']').ok_or_else(|| {
        FleetError::Reason(format!(
            "decomposition reply contains no plan list: {}",
            taskfleet_core::model::truncate_chars(text, 120)
        ))
    })?;

    let steps: Vec<PlanStep> = serde_json::from_str(block)
        .map_err(|e| FleetError::Reason(format!("malformed plan list: {e}")))?;

    if steps.is_empty() {
        return Err(FleetError::Reason("decomposition produced an empty plan".into()));
    }
    Ok(steps)
}

/// Clip an utterance to at most `max_words` words.
pub fn clip_words(s: &str, max_words: usize) -> String {
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= max_words {
        s.trim().to_string()
    } else {
        words[..max_words].join(" ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_envelope() {
        let text = r#"Sure, here is my progress:
```json
{
  "thinking": "the palette needs contrast",
  "saying": "design is ready",
  "doing": "finalizing the layout",
  "toAgent": "coder",
  "output": {"kind": "design", "spec": "two-column layout, dark header"},
  "needsHelp": null,
  "helpTopic": null
}
```"#;
        let reply = parse_reply(text);
        assert_eq!(reply.saying.as_deref(), Some("design is ready"));
        assert_eq!(reply.to_agent.as_deref(), Some("coder"));
        assert_eq!(
            reply.output,
            Some(RoleOutput::Design {
                spec: "two-column layout, dark header".into()
            })
        );
        assert!(reply.needs_help.is_none());
    }

    #[test]
    fn test_parse_unfenced_object_in_prose() {
        let text = r#"Here you go: {"saying": "done", "output": "the code"} hope it helps"#;
        let reply = parse_reply(text);
        assert_eq!(reply.saying.as_deref(), Some("done"));
        assert_eq!(
            reply.output,
            Some(RoleOutput::Text { content: "the code".into() })
        );
    }

    #[test]
    fn test_unparsable_reply_degrades_to_raw_text() {
        let text = "I did it, no JSON here";
        let reply = parse_reply(text);
        assert_eq!(
            reply.output,
            Some(RoleOutput::Text { content: text.into() })
        );
        assert!(reply.thinking.is_none());
        assert!(reply.saying.is_none());
        assert!(reply.doing.is_none());
        assert!(reply.to_agent.is_none());
        assert!(reply.needs_help.is_none());
        assert!(reply.help_topic.is_none());
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_extraction() {
        let text = r#"{"saying": "use {} for blocks", "output": "ok"}"#;
        let reply = parse_reply(text);
        assert_eq!(reply.saying.as_deref(), Some("use {} for blocks"));
    }

    #[test]
    fn test_needs_help_fields() {
        let text = r#"{"output": "partial", "needsHelp": "designer", "helpTopic": "color palette"}"#;
        let reply = parse_reply(text);
        assert_eq!(reply.needs_help.as_deref(), Some("designer"));
        assert_eq!(reply.help_topic.as_deref(), Some("color palette"));
    }

    #[test]
    fn test_parse_plan() {
        let text = r#"Plan:
```json
[
  {"role": "designer", "description": "design the page"},
  {"role": "coder", "description": "implement it"},
  {"role": "reviewer", "description": "review the result"}
]
```"#;
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].role, "designer");
        assert_eq!(plan[2].description, "review the result");
    }

    #[test]
    fn test_parse_plan_failures_are_terminal_errors() {
        assert!(parse_plan("no list in sight").is_err());
        assert!(parse_plan("[]").is_err());
        assert!(parse_plan(r#"[{"job": "wrong shape"}]"#).is_err());
    }

    #[test]
    fn test_clip_words() {
        assert_eq!(clip_words("short one", 15), "short one");
        let long = "a b c d e f g h i j k l m n o p q r";
        assert_eq!(clip_words(long, 15).split_whitespace().count(), 15);
    }
}
