//! Purpose: Render pretty JSON with optional ANSI colorization for CLI output.
//! Exports: colorize_json.
//! Role: Small, pure formatter used by CLI emission paths.
//! Invariants: When color is disabled, output equals serde_json::to_string_pretty.
//! Invariants: ANSI escapes appear only when explicitly enabled.
use serde_json::Value;

const INDENT: &str = "  ";

// Conservative 8/16-color palette for broad terminal compatibility.
const KEY: &str = "36";
const STRING: &str = "32";
const NUMBER: &str = "33";
const LITERAL: &str = "35";
const PUNCT: &str = "39";

pub fn colorize_json(value: &Value, use_color: bool) -> String {
    let mut painter = Painter {
        use_color,
        out: String::new(),
    };
    painter.value(value, 0);
    painter.out
}

struct Painter {
    use_color: bool,
    out: String,
}

impl Painter {
    fn value(&mut self, value: &Value, depth: usize) {
        match value {
            Value::Null => self.colored("null", PUNCT),
            Value::Bool(true) => self.colored("true", LITERAL),
            Value::Bool(false) => self.colored("false", LITERAL),
            Value::Number(num) => self.colored(&num.to_string(), NUMBER),
            Value::String(text) => self.colored(&encode(text), STRING),
            Value::Array(items) => self.array(items, depth),
            Value::Object(map) => self.object(map, depth),
        }
    }

    fn array(&mut self, items: &[Value], depth: usize) {
        if items.is_empty() {
            self.colored("[]", PUNCT);
            return;
        }
        self.colored("[", PUNCT);
        self.out.push('\n');
        for (idx, item) in items.iter().enumerate() {
            self.indent(depth + 1);
            self.value(item, depth + 1);
            self.separator(idx + 1 < items.len());
        }
        self.indent(depth);
        self.colored("]", PUNCT);
    }

    fn object(&mut self, map: &serde_json::Map<String, Value>, depth: usize) {
        if map.is_empty() {
            self.colored("{}", PUNCT);
            return;
        }
        self.colored("{", PUNCT);
        self.out.push('\n');
        for (idx, (key, value)) in map.iter().enumerate() {
            self.indent(depth + 1);
            self.colored(&encode(key), KEY);
            self.colored(":", PUNCT);
            self.out.push(' ');
            self.value(value, depth + 1);
            self.separator(idx + 1 < map.len());
        }
        self.indent(depth);
        self.colored("}", PUNCT);
    }

    fn separator(&mut self, more: bool) {
        if more {
            self.colored(",", PUNCT);
        }
        self.out.push('\n');
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
    }

    fn colored(&mut self, text: &str, color: &str) {
        if !self.use_color {
            self.out.push_str(text);
            return;
        }
        self.out.push_str("\u{1b}[");
        self.out.push_str(color);
        self.out.push('m');
        self.out.push_str(text);
        self.out.push_str("\u{1b}[0m");
    }
}

fn encode(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::colorize_json;
    use serde_json::json;

    #[test]
    fn colorize_json_matches_pretty_when_disabled() {
        let value = json!({
            "type": "interchange",
            "control_number": "000000001",
            "groups": [{ "transaction_sets": [], "n": 2, "ok": true, "z": null }]
        });
        let plain = colorize_json(&value, false);
        let pretty = serde_json::to_string_pretty(&value).expect("pretty");
        assert_eq!(plain, pretty);
    }

    #[test]
    fn colorize_json_emits_ansi_when_enabled() {
        let value = json!({"k":"v","n":1,"b":true});
        let colored = colorize_json(&value, true);
        assert!(colored.contains("\u{1b}[36m\"k\"\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[32m\"v\"\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[33m1\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[35mtrue\u{1b}[0m"));
    }
}
