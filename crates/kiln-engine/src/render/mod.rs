//! Template rendering
//!
//! Templates are rendered with Tera against the resolved configuration. One
//! base instance carries the helper library and is cloned for every job, so
//! jobs share nothing mutable and can run on any worker.
//!
//! Go-style field references (`{{.Name}}`, `{% if .Metrics %}`) are accepted
//! by stripping the leading dot before compilation. `{% raw %}` regions are
//! left untouched so generated projects can carry their own Go templates.

mod helpers;
mod paths;

pub use helpers::{pluralize, singularize};
pub use paths::normalize_destination;

use camino::Utf8PathBuf;
use kiln_core::types::ResolvedConfig;
use kiln_core::{Error, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::error::Error as _;
use std::sync::LazyLock;
use tera::{Context, Tera};

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(\{\{-?|\{%-?)(.*?)(-?\}\}|-?%\})").expect("tag regex is valid")
});

static DOT_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[^A-Za-z0-9_\)\]"'.])\.([A-Za-z_][A-Za-z0-9_]*)"#)
        .expect("dot reference regex is valid")
});

static RAW_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{%-?\s*raw\s*-?%\}.*?\{%-?\s*endraw\s*-?%\}")
        .expect("raw block regex is valid")
});

/// Rewrite Go-style `.Name` references inside template tags to `Name`,
/// outside of `{% raw %}` regions
pub fn rewrite_dot_references(template: &str) -> String {
    if !template.contains('.') {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for raw in RAW_BLOCK.find_iter(template) {
        out.push_str(&rewrite_tags(&template[last..raw.start()]));
        out.push_str(raw.as_str());
        last = raw.end();
    }
    out.push_str(&rewrite_tags(&template[last..]));
    out
}

fn rewrite_tags(text: &str) -> String {
    TAG.replace_all(text, |caps: &Captures| {
        let inner = DOT_REFERENCE.replace_all(&caps[2], "${1}${2}");
        format!("{}{}{}", &caps[1], inner, &caps[3])
    })
    .into_owned()
}

fn is_template(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Tera error causes, without Tera's own "Failed to render 'x'" wrapper
fn describe(err: &tera::Error) -> String {
    let mut causes = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    if causes.is_empty() {
        err.to_string()
    } else {
        causes.join(": ")
    }
}

/// Renders template text against a [`ResolvedConfig`]
#[derive(Clone)]
pub struct TemplateRenderer {
    base: Tera,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut base = Tera::default();
        // Generated sources are not HTML
        base.autoescape_on(vec![]);
        helpers::register(&mut base);
        Self { base }
    }

    /// Template context: one top-level variable per set configuration value
    pub fn context(config: &ResolvedConfig) -> Context {
        let mut context = Context::new();
        for (name, value) in config.to_json() {
            context.insert(name, &value);
        }
        context
    }

    /// Render template text; `label` names the template in errors
    pub fn render_text(&self, label: &str, template: &str, context: &Context) -> Result<String> {
        if !is_template(template) {
            return Ok(template.to_string());
        }

        let mut tera = self.base.clone();
        let source = rewrite_dot_references(template);
        tera.add_raw_template(label, &source)
            .map_err(|e| Error::render(label, describe(&e)))?;
        tera.render(label, context)
            .map_err(|e| Error::render(label, describe(&e)))
    }

    /// Render and normalize a destination path
    pub fn render_path(
        &self,
        label: &str,
        template: &str,
        context: &Context,
    ) -> Result<Utf8PathBuf> {
        let rendered = self.render_text(label, template, context)?;
        normalize_destination(&rendered).map_err(|msg| Error::render(label, msg))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fail on the first pair of owners producing the same destination.
///
/// Owners are checked in the given order, so the reported pair does not
/// depend on the order in which paths were rendered.
pub fn ensure_unique_destinations<'a, I>(destinations: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a Utf8PathBuf, &'a str)>,
{
    let mut seen: HashMap<&Utf8PathBuf, &str> = HashMap::new();
    for (path, owner) in destinations {
        if let Some(first) = seen.insert(path, owner) {
            return Err(Error::destination_collision(path.as_str(), first, owner));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::types::{Value, VariableKind};
    use std::collections::BTreeMap;

    fn config() -> ResolvedConfig {
        let declared = BTreeMap::from([
            ("Name".to_string(), VariableKind::String),
            ("Metrics".to_string(), VariableKind::Bool),
            ("Port".to_string(), VariableKind::Int),
        ]);
        let values = BTreeMap::from([
            ("Name".to_string(), Value::String("x".into())),
            ("Metrics".to_string(), Value::Bool(true)),
            ("Port".to_string(), Value::Int(8080)),
        ]);
        ResolvedConfig::new("bp", declared, values)
    }

    fn render(template: &str) -> Result<String> {
        let renderer = TemplateRenderer::new();
        renderer.render_text("test", template, &TemplateRenderer::context(&config()))
    }

    #[test]
    fn test_go_style_round_trip() {
        assert_eq!(render("{{.Name}}").unwrap(), "x");
        assert_eq!(render("{{ .Name | pascal_case }}").unwrap(), "X");
        assert_eq!(render("{% if .Metrics %}on{% endif %}").unwrap(), "on");
        assert_eq!(render("{{ Name }}:{{ Port }}").unwrap(), "x:8080");
    }

    #[test]
    fn test_rewrite_leaves_literals_alone() {
        assert_eq!(rewrite_dot_references("a.b {{ .Name }} c.d"), "a.b {{ Name }} c.d");
        assert_eq!(
            rewrite_dot_references(r#"{{ Name ~ ".go" }}"#),
            r#"{{ Name ~ ".go" }}"#
        );
        assert_eq!(rewrite_dot_references("{{ 1.5 }}"), "{{ 1.5 }}");
    }

    #[test]
    fn test_no_autoescape() {
        let renderer = TemplateRenderer::new();
        let mut context = Context::new();
        context.insert("Html", "<b>&</b>");
        assert_eq!(
            renderer.render_text("page.html", "{{ Html }}", &context).unwrap(),
            "<b>&</b>"
        );
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render("no tags here").unwrap(), "no tags here");
    }

    #[test]
    fn test_render_errors() {
        let err = render("{{ Missing }}").unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
        assert!(err.to_string().contains("Missing"));

        assert_eq!(err.to_string().matches("Failed to render").count(), 1);

        assert!(matches!(render("{% if %}").unwrap_err(), Error::Render { .. }));
        assert!(matches!(render("{{ Port | snake_case }}").unwrap_err(), Error::Render { .. }));
    }

    #[test]
    fn test_raw_regions_keep_go_templates() {
        assert_eq!(
            render("{% raw %}<h1>{{ .Title }}</h1>{% endraw %}").unwrap(),
            "<h1>{{ .Title }}</h1>"
        );
        assert_eq!(
            rewrite_dot_references("{{ .Name }} {%- raw -%} {{ .Title }} {%- endraw -%} {{.Name}}"),
            "{{ Name }} {%- raw -%} {{ .Title }} {%- endraw -%} {{Name}}"
        );
        assert_eq!(
            rewrite_dot_references("{{.Name}}{% raw %}{{.A}}{% endraw %}{{.Port}}{% raw %}{{.B}}{% endraw %}"),
            "{{Name}}{% raw %}{{.A}}{% endraw %}{{Port}}{% raw %}{{.B}}{% endraw %}"
        );
    }

    #[test]
    fn test_render_path() {
        let renderer = TemplateRenderer::new();
        let context = TemplateRenderer::context(&config());
        assert_eq!(
            renderer.render_path("d", "/cmd/{{.Name}}/main.go", &context).unwrap(),
            "cmd/x/main.go"
        );
        assert!(renderer.render_path("d", "../{{ Name }}", &context).is_err());
    }

    #[test]
    fn test_collision_reports_first_owner() {
        let a = Utf8PathBuf::from("README.md");
        let b = Utf8PathBuf::from("docs/x.md");
        let c = Utf8PathBuf::from("README.md");
        let err = ensure_unique_destinations([
            (&a, "files[0]"),
            (&b, "files[1]"),
            (&c, "files[2]"),
        ])
        .unwrap_err();
        match err {
            Error::DestinationCollision { path, first, second } => {
                assert_eq!(path, "README.md");
                assert_eq!(first, "files[0]");
                assert_eq!(second, "files[2]");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
