//! Helpers for massaging model output.

use serde_json::Value;

/// Chatty openers models put in front of a JSON answer
const CHATTY_PREFIXES: [&str; 7] = [
    "Here is a",
    "Here's a",
    "Based on",
    "I'll create",
    "Creating a",
    "Let me create",
    "The following is",
];

/// Extract the JSON object from a model reply.
///
/// Drops chatty prefixes and markdown fences, then keeps the first `{`
/// through the last `}`. Text without a brace pair is returned trimmed.
pub fn clean_json_response(raw: &str) -> String {
    let mut text = raw.trim();

    if CHATTY_PREFIXES.iter().any(|p| text.starts_with(p)) {
        if let Some(start) = text.find('{') {
            text = &text[start..];
        }
    }

    let unfenced: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");
    let unfenced = unfenced.replace("```json", "").replace("```", "");
    let unfenced = unfenced.trim();

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(first), Some(last)) if last > first => unfenced[first..=last].to_string(),
        _ => unfenced.to_string(),
    }
}

/// Rough token estimate: one token per four characters
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

pub fn exceeds_token_limit(text: &str, max_tokens: usize) -> bool {
    estimate_tokens(text) > max_tokens
}

/// Cut to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn item_text(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_section(out: &mut String, value: &Value, key: &str, heading: &str) {
    let Some(items) = value.get(key).and_then(Value::as_array) else {
        return;
    };
    out.push_str(heading);
    out.push('\n');
    for item in items {
        out.push_str("- ");
        out.push_str(&item_text(item));
        out.push('\n');
    }
    out.push('\n');
}

fn push_paragraph(out: &mut String, value: &Value, key: &str) {
    if let Some(text) = value.get(key) {
        out.push_str(&item_text(text));
        out.push_str("\n\n");
    }
}

/// Render a structured coach reply as markdown sections
pub fn json_to_text(value: &Value) -> String {
    let mut out = String::new();

    push_paragraph(&mut out, value, "message");
    push_paragraph(&mut out, value, "content");
    push_section(&mut out, value, "currentIndustryTrends", "**🔥 Current Industry Trends:**");
    push_section(&mut out, value, "keySkills", "**💻 Key Skills to Focus On:**");
    push_section(
        &mut out,
        value,
        "careerAdvancementStrategies",
        "**🚀 Career Advancement Strategies:**",
    );
    push_section(
        &mut out,
        value,
        "interviewPreparationTips",
        "**📝 Interview Preparation Tips:**",
    );
    push_section(&mut out, value, "nextSteps", "**⏭️ Next Steps:**");
    push_paragraph(&mut out, value, "encouragement");

    if let Some(sources) = value.get("sources").and_then(Value::as_array) {
        out.push_str("**Sources:** ");
        for (i, source) in sources.iter().take(5).enumerate() {
            out.push_str(&format!("[{}] {} ", i + 1, item_text(source)));
        }
    }

    out.trim().to_string()
}

/// Parse a reply that might be a JSON object wrapped in prose
pub fn parse_json_reply(raw: &str) -> Option<Value> {
    let cleaned = clean_json_response(raw);
    if !cleaned.starts_with('{') {
        return None;
    }
    serde_json::from_str::<Value>(&cleaned)
        .ok()
        .filter(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_json_strips_prefix_and_fences() {
        let raw = "Here is a roadmap for you:\n```json\n{\"phases\": []}\n```\nHope it helps!";
        assert_eq!(clean_json_response(raw), "{\"phases\": []}");
    }

    #[test]
    fn test_clean_json_keeps_outer_braces() {
        let raw = "noise {\"a\": {\"b\": 1}} trailing";
        assert_eq!(clean_json_response(raw), "{\"a\": {\"b\": 1}}");
        assert_eq!(clean_json_response("  no json here "), "no json here");
    }

    #[test]
    fn test_token_estimates() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert!(exceeds_token_limit(&"x".repeat(24_004), 6000));
        assert!(!exceeds_token_limit(&"x".repeat(24_000), 6000));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_json_to_text_sections() {
        let reply = json!({
            "message": "Hey!",
            "keySkills": ["Rust", "SQL"],
            "nextSteps": ["Build a project"],
            "encouragement": "You got this.",
            "sources": ["https://a.dev", "https://b.dev"]
        });
        let text = json_to_text(&reply);
        assert!(text.starts_with("Hey!\n\n**💻 Key Skills to Focus On:**\n- Rust\n- SQL\n"));
        assert!(text.contains("**⏭️ Next Steps:**\n- Build a project"));
        assert!(text.contains("You got this."));
        assert!(text.ends_with("**Sources:** [1] https://a.dev [2] https://b.dev"));
    }

    #[test]
    fn test_parse_json_reply() {
        assert!(parse_json_reply("Sure! {\"message\": \"hi\"}").is_some());
        assert!(parse_json_reply("plain text answer").is_none());
        assert!(parse_json_reply("{broken").is_none());
    }
}
