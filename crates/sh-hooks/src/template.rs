//! Hook templates
//!
//! URL and body templates are rendered with the triggering entity bound as
//! `item`, e.g. `https://crm.example.com/customers/{{ item.entity_id }}`.
//! Missing fields render as empty strings. Besides the builtin filters the
//! renderer registers a few store oriented ones:
//!
//! | Filter | Example | Result |
//! |--------|---------|--------|
//! | `upcase` / `downcase` | `{{ item.email \| downcase }}` | case folded text |
//! | `if_empty` | `{{ item.telephone \| if_empty("n/a") }}` | fallback for empty values |
//! | `count` | `{{ item.items \| count }}` | length of a list or map |
//! | `json` | `{{ item \| json }}` | JSON encoding of the value |
//! | `price` | `{{ item.grand_total \| price }}` | number with two decimals |
//! | `strip_html` | `{{ item.comment \| strip_html }}` | text without tags |

use std::sync::OnceLock;

use minijinja::{context, Environment, Error, ErrorKind, UndefinedBehavior, Value};
use regex::Regex;
use sh_common::StoreHooksError;
use tracing::error;

pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Missing objects along a path render empty instead of failing
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.add_filter("upcase", upcase);
        env.add_filter("downcase", downcase);
        env.add_filter("if_empty", if_empty);
        env.add_filter("count", count);
        env.add_filter("json", json);
        env.add_filter("price", price);
        env.add_filter("strip_html", strip_html);
        Self { env }
    }

    /// Render `template` against `item`, returning the error on failure
    pub fn try_render(&self, item: &serde_json::Value, template: &str) -> Result<String, StoreHooksError> {
        self.env
            .render_str(template, context! { item => item })
            .map_err(|e| StoreHooksError::Template(e.to_string()))
    }

    /// Render `template` against `item`. Failures are logged and yield an
    /// empty string.
    pub fn render(&self, item: &serde_json::Value, template: &str) -> String {
        match self.try_render(item, template) {
            Ok(rendered) => rendered,
            Err(e) => {
                error!(error = %e, "Failed to render hook template");
                String::new()
            }
        }
    }
}

fn upcase(value: String) -> String {
    value.to_uppercase()
}

fn downcase(value: String) -> String {
    value.to_lowercase()
}

fn if_empty(value: Value, default: Value) -> Value {
    if value.is_undefined() || value.is_none() || value.as_str() == Some("") {
        default
    } else {
        value
    }
}

fn count(value: Value) -> Result<usize, Error> {
    if value.is_undefined() || value.is_none() {
        return Ok(0);
    }
    value.len().ok_or_else(|| {
        Error::new(ErrorKind::InvalidOperation, format!("cannot count value of type {}", value.kind()))
    })
}

fn json(value: Value) -> Result<String, Error> {
    serde_json::to_string(&value).map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

fn price(value: Value) -> Result<String, Error> {
    let amount = match value.as_str() {
        Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
            Error::new(ErrorKind::InvalidOperation, format!("not a number: {}", raw))
        })?,
        None => f64::try_from(value)?,
    };
    Ok(format!("{:.2}", amount))
}

fn strip_html(value: String) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
    tags.replace_all(&value, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer() -> serde_json::Value {
        json!({
            "entity_id": 42,
            "email": "Jane.Doe@Example.com",
            "firstname": "Jane",
            "telephone": "",
            "grand_total": "99.5",
            "items": [{"sku": "A"}, {"sku": "B"}],
            "comment": "<p>Leave at <b>door</b></p>"
        })
    }

    #[test]
    fn test_render_fields() {
        let renderer = TemplateRenderer::new();
        let url = renderer.render(&customer(), "https://crm.example.com/customers/{{ item.entity_id }}");
        assert_eq!(url, "https://crm.example.com/customers/42");
    }

    #[test]
    fn test_missing_field_renders_empty() {
        let renderer = TemplateRenderer::new();
        assert_eq!(renderer.render(&customer(), "[{{ item.lastname }}]"), "[]");
    }

    #[test]
    fn test_missing_nested_path_renders_empty() {
        let renderer = TemplateRenderer::new();
        assert_eq!(
            renderer.try_render(&json!({"entity_id": 1}), "city={{ item.billing_address.city }}").unwrap(),
            "city="
        );
        assert_eq!(
            renderer.render(&json!({}), "{{ item.billing_address.street[0] | if_empty('none') }}"),
            "none"
        );
    }

    #[test]
    fn test_filters() {
        let renderer = TemplateRenderer::new();
        let item = customer();

        assert_eq!(renderer.render(&item, "{{ item.email | downcase }}"), "jane.doe@example.com");
        assert_eq!(renderer.render(&item, "{{ item.firstname | upcase }}"), "JANE");
        assert_eq!(renderer.render(&item, "{{ item.telephone | if_empty('n/a') }}"), "n/a");
        assert_eq!(renderer.render(&item, "{{ item.firstname | if_empty('n/a') }}"), "Jane");
        assert_eq!(renderer.render(&item, "{{ item.items | count }}"), "2");
        assert_eq!(renderer.render(&item, "{{ item.grand_total | price }}"), "99.50");
        assert_eq!(renderer.render(&item, "{{ item.comment | strip_html }}"), "Leave at door");
        assert_eq!(renderer.render(&item, "{{ item.items[0] | json }}"), r#"{"sku":"A"}"#);
    }

    #[test]
    fn test_control_flow() {
        let renderer = TemplateRenderer::new();
        let body = renderer.render(
            &customer(),
            "{% for line in item.items %}{{ line.sku }}{% if not loop.last %},{% endif %}{% endfor %}",
        );
        assert_eq!(body, "A,B");
    }

    #[test]
    fn test_syntax_error_renders_empty() {
        let renderer = TemplateRenderer::new();
        assert_eq!(renderer.render(&customer(), "{{ item.email "), "");
        assert!(matches!(
            renderer.try_render(&customer(), "{% if %}"),
            Err(StoreHooksError::Template(_))
        ));
    }
}
