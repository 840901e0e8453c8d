//! Pure helper filters available to every template

use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToTitleCase, ToUpperCamelCase,
};
use std::collections::HashMap;
use tera::{Tera, Value};

/// Register the helper library and disable impure built-ins
pub fn register(tera: &mut Tera) {
    tera.register_filter("snake_case", casing(|s| s.to_snake_case()));
    tera.register_filter("camel_case", casing(|s| s.to_lower_camel_case()));
    tera.register_filter("pascal_case", casing(|s| s.to_upper_camel_case()));
    tera.register_filter("kebab_case", casing(|s| s.to_kebab_case()));
    tera.register_filter("screaming_snake_case", casing(|s| s.to_shouty_snake_case()));
    tera.register_filter("title_case", casing(|s| s.to_title_case()));
    tera.register_filter("plural", casing(pluralize));
    tera.register_filter("singular", casing(singularize));
    tera.register_filter("default_if_empty", default_if_empty_filter);

    // Templates may not read the environment, the clock or a random source
    for name in ["get_env", "now", "get_random"] {
        tera.register_function(
            name,
            move |_args: &HashMap<String, Value>| -> tera::Result<Value> {
                Err(tera::Error::msg(format!(
                    "function '{}' is not available in blueprint templates",
                    name
                )))
            },
        );
    }
}

fn casing(
    convert: fn(&str) -> String,
) -> impl Fn(&Value, &HashMap<String, Value>) -> tera::Result<Value> + Send + Sync {
    move |value, _args| {
        let s = value
            .as_str()
            .ok_or_else(|| tera::Error::msg(format!("expected a string, got {}", value)))?;
        Ok(Value::String(convert(s)))
    }
}

/// `{{ Description | default_if_empty(value="none") }}`
fn default_if_empty_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let fallback = args
        .get("value")
        .ok_or_else(|| tera::Error::msg("default_if_empty requires a `value` argument"))?;

    let empty = match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    };

    Ok(if empty { fallback.clone() } else { value.clone() })
}

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
];

const UNCOUNTABLE: &[&str] = &[
    "data", "info", "information", "metadata", "series", "species", "news", "equipment", "sheep",
    "fish",
];

/// Replace a lowercase suffix, keeping the capitalization of its first letter
fn replace_tail(word: &str, tail_len: usize, replacement: &str) -> String {
    let split = word.len() - tail_len;
    let (head, tail) = word.split_at(split);
    let capitalized = tail.chars().next().is_some_and(char::is_uppercase);
    let mut out = String::with_capacity(head.len() + replacement.len());
    out.push_str(head);
    if capitalized {
        let mut chars = replacement.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    } else {
        out.push_str(replacement);
    }
    out
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// English plural of the last word, for identifiers like `user` or `UserProfile`
pub fn pluralize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if lower.is_empty() || UNCOUNTABLE.iter().any(|u| lower.ends_with(u)) {
        return word.to_string();
    }
    for (singular, plural) in IRREGULAR {
        if lower.ends_with(singular) {
            return replace_tail(word, singular.len(), plural);
        }
    }

    let mut rev = lower.chars().rev();
    let last = rev.next().unwrap_or_default();
    let before = rev.next();

    if lower.ends_with("ss")
        || lower.ends_with("sh")
        || lower.ends_with("ch")
        || last == 'x'
        || last == 'z'
        || (last == 's' && !lower.ends_with("us"))
    {
        if last == 's' && !lower.ends_with("ss") {
            return word.to_string();
        }
        return format!("{}es", word);
    }
    if lower.ends_with("us") {
        return format!("{}es", word);
    }
    if last == 'y' && before.is_some_and(|c| !is_vowel(c)) {
        return replace_tail(word, 1, "ies");
    }
    format!("{}s", word)
}

/// English singular of the last word
pub fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if lower.is_empty() || UNCOUNTABLE.iter().any(|u| lower.ends_with(u)) {
        return word.to_string();
    }
    for (singular, plural) in IRREGULAR {
        if lower.ends_with(plural) {
            return replace_tail(word, plural.len(), singular);
        }
    }

    if lower.ends_with("ies") && lower.len() > 3 {
        return replace_tail(word, 3, "y");
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes", "tuses"] {
        if lower.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tera::Context;

    fn render(template: &str, name: &str) -> String {
        let mut tera = Tera::default();
        register(&mut tera);
        let mut context = Context::new();
        context.insert("Name", name);
        tera.render_str(template, &context).unwrap()
    }

    #[test]
    fn test_casing_filters() {
        assert_eq!(render("{{ Name | snake_case }}", "UserProfile"), "user_profile");
        assert_eq!(render("{{ Name | camel_case }}", "user_profile"), "userProfile");
        assert_eq!(render("{{ Name | pascal_case }}", "user-profile"), "UserProfile");
        assert_eq!(render("{{ Name | kebab_case }}", "UserProfile"), "user-profile");
        assert_eq!(
            render("{{ Name | screaming_snake_case }}", "userProfile"),
            "USER_PROFILE"
        );
        assert_eq!(render("{{ Name | title_case }}", "user_profile"), "User Profile");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("Category"), "Categories");
        assert_eq!(pluralize("key"), "keys");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("branch"), "branches");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("Person"), "People");
        assert_eq!(pluralize("data"), "data");
        assert_eq!(pluralize("users"), "users");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("Categories"), "Category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("statuses"), "status");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("user"), "user");
    }

    #[test]
    fn test_default_if_empty() {
        assert_eq!(render(r#"{{ Name | default_if_empty(value="anon") }}"#, ""), "anon");
        assert_eq!(render(r#"{{ Name | default_if_empty(value="anon") }}"#, "bob"), "bob");
    }

    #[test]
    fn test_environment_is_not_reachable() {
        let mut tera = Tera::default();
        register(&mut tera);
        let result = tera.render_str(r#"{{ get_env(name="HOME") }}"#, &Context::new());
        assert!(result.is_err());
        let result = tera.render_str(r#"{{ now() }}"#, &Context::new());
        assert!(result.is_err());
    }
}
