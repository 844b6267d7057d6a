//! `{{key}}` placeholder substitution.

use serde_json::{Map, Value};

/// Replace every `{{key}}` occurrence in `template` with the recipient's value.
///
/// Keys are matched literally. Null values render as an empty string and
/// placeholders with no matching key are left as they are.
pub fn render(template: &str, data: &Map<String, Value>) -> String {
    let mut rendered = template.to_string();

    for (key, value) in data {
        let placeholder = format!("{{{{{key}}}}}");
        if rendered.contains(&placeholder) {
            rendered = rendered.replace(&placeholder, &display_value(value));
        }
    }

    rendered
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_replaces_every_occurrence() {
        let out = render("Hi {{name}}, {{name}}!", &data(json!({"name": "Ana"})));
        assert_eq!(out, "Hi Ana, Ana!");
    }

    #[test]
    fn test_unknown_placeholder_left_verbatim() {
        let out = render("Hi {{name}} from {{city}}", &data(json!({"name": "Ana"})));
        assert_eq!(out, "Hi Ana from {{city}}");
    }

    #[test]
    fn test_null_renders_empty() {
        let out = render("[{{nick}}]", &data(json!({"nick": null})));
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_non_string_values_use_display_form() {
        let out = render("{{n}} / {{ok}}", &data(json!({"n": 3, "ok": true})));
        assert_eq!(out, "3 / true");
    }

    #[test]
    fn test_metacharacter_keys_match_literally() {
        let out = render("{{a.b}} {{axb}} {{(x)}}", &data(json!({"a.b": "dot", "(x)": "paren"})));
        assert_eq!(out, "dot {{axb}} paren");
    }

    #[test]
    fn test_dollar_in_value_is_not_expanded() {
        let out = render("Price: {{price}}", &data(json!({"price": "$1 $name"})));
        assert_eq!(out, "Price: $1 $name");
    }

    #[test]
    fn test_very_long_key_is_rendered() {
        let key = "k".repeat(100_000);
        let template = format!("<{{{{{key}}}}}>");
        let mut values = Map::new();
        values.insert(key, json!("v"));
        assert_eq!(render(&template, &values), "<v>");
    }

    #[test]
    fn test_no_data_returns_template() {
        assert_eq!(render("plain {{x}}", &Map::new()), "plain {{x}}");
    }
}
