use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{lookup, ArgShape};

/// One line of studio input, classified.
///
/// Slash commands drive the session; any other text is an AI edit instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub instruction: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            instruction: None,
            command_args: BTreeMap::new(),
        }
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn arg_list(&self, key: &str) -> Vec<String> {
        self.command_args
            .get(key)
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Splits on shell rules, falling back to whitespace when quotes don't balance.
fn words(arg: &str) -> Vec<String> {
    let split = shell_words::split(arg)
        .unwrap_or_else(|_| arg.split_whitespace().map(str::to_string).collect());
    split.into_iter().filter(|word| !word.is_empty()).collect()
}

fn command_args(shape: ArgShape, arg: &str) -> BTreeMap<String, Value> {
    let mut args = BTreeMap::new();
    match shape {
        ArgShape::Whole => {
            args.insert("value".to_string(), Value::from(arg));
        }
        ArgShape::Words => {
            let values = words(arg).into_iter().map(Value::String).collect();
            args.insert("values".to_string(), Value::Array(values));
        }
        ArgShape::Path => {
            args.insert("path".to_string(), Value::String(words(arg).join(" ")));
        }
        ArgShape::Bare => {}
    }
    args
}

/// Splits `/name rest` into a lowercase command name and the trimmed rest.
/// Names are ASCII letters, digits and underscores.
fn split_command(line: &str) -> Option<(String, &str)> {
    let tail = line.strip_prefix('/')?;
    let end = tail
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .unwrap_or(tail.len());
    if end == 0 {
        return None;
    }
    Some((tail[..end].to_ascii_lowercase(), tail[end..].trim()))
}

pub fn parse_intent(text: &str) -> Intent {
    let line = text.trim();
    if line.is_empty() {
        return Intent::new("noop", text);
    }

    let Some((name, arg)) = split_command(line) else {
        let mut intent = Intent::new("refine", text);
        intent.instruction = Some(line.to_string());
        return intent;
    };

    match lookup(&name) {
        Some(entry) => {
            let mut intent = Intent::new(entry.action, text);
            intent.command_args = command_args(entry.shape, arg);
            intent
        }
        None => {
            let mut intent = Intent::new("unknown", text);
            intent.command_args.insert("arg".to_string(), Value::from(arg));
            intent.command_args.insert("command".to_string(), Value::String(name));
            intent
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn plain_text_is_an_edit_instruction() {
        let intent = parse_intent("  make it an evening scene  ");
        assert_eq!(intent.action, "refine");
        assert_eq!(intent.instruction.as_deref(), Some("make it an evening scene"));
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn parse_raw_arg_commands() {
        let select = parse_intent("/select lr-im");
        assert_eq!(select.action, "select_material");
        assert_eq!(select.arg_str("value"), Some("lr-im"));

        let restore = parse_intent("/restore 2");
        assert_eq!(restore.action, "restore_history");
        assert_eq!(restore.arg_str("value"), Some("2"));

        let combo = parse_intent("/COMBO on");
        assert_eq!(combo.action, "set_combination_mode");
        assert_eq!(combo.arg_str("value"), Some("on"));
    }

    #[test]
    fn parse_multi_arg_commands_with_quotes() {
        let filter = parse_intent("/filter Marble \"Onyx Series\"");
        assert_eq!(filter.action, "set_filter");
        assert_eq!(filter.command_args["values"], json!(["Marble", "Onyx Series"]));

        let slide = parse_intent("/slide 240 40 400");
        assert_eq!(slide.arg_list("values"), vec!["240", "40", "400"]);
    }

    #[test]
    fn parse_export_path() {
        let export = parse_intent("/export \"/tmp/my designs\"");
        assert_eq!(export.action, "export");
        assert_eq!(export.command_args["path"], json!("/tmp/my designs"));
    }

    #[test]
    fn parse_no_arg_commands() {
        for (line, action) in [
            ("/generate", "generate"),
            ("/history", "list_history"),
            ("/reset", "reset"),
            ("/compare", "toggle_compare"),
            ("/save", "save_design"),
            ("/exit", "quit"),
        ] {
            assert_eq!(parse_intent(line).action, action, "{line}");
        }
    }

    #[test]
    fn slash_without_a_name_is_an_instruction() {
        let intent = parse_intent("/ more light");
        assert_eq!(intent.action, "refine");
        assert_eq!(intent.instruction.as_deref(), Some("/ more light"));
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
