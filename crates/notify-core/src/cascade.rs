//! Administration → department → section dependent selects.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{CascadeLevel, SelectOption};

/// Label of the single empty option every reset field shows.
pub const PLACEHOLDER_LABEL: &str = "---------";

static OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<option\b([^>]*)>(.*?)</option\s*>").expect("option pattern is valid")
});
static VALUE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bvalue\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("value attribute pattern is valid")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Dependent-data fetch produced by a parent change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsRequest {
    /// Level whose options will be replaced.
    pub child: CascadeLevel,
    /// Query parameter naming the parent (`administracao`, `departamento`).
    pub param: &'static str,
    pub parent_value: String,
}

/// Effects of one select change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeStep {
    /// Levels reset to the placeholder option, top-down.
    pub reset: Vec<CascadeLevel>,
    pub fetch: Option<OptionsRequest>,
}

#[derive(Debug, Clone, Default)]
struct SelectField {
    value: Option<String>,
    options: Vec<SelectOption>,
}

impl SelectField {
    fn reset(&mut self) {
        self.value = None;
        self.options = placeholder_options();
    }
}

#[derive(Debug, Clone, Default)]
pub struct CascadeForm {
    administration: SelectField,
    department: SelectField,
    section: SelectField,
}

impl CascadeLevel {
    /// Next level down, if any.
    pub fn child(self) -> Option<CascadeLevel> {
        match self {
            CascadeLevel::Administration => Some(CascadeLevel::Department),
            CascadeLevel::Department => Some(CascadeLevel::Section),
            CascadeLevel::Section => None,
        }
    }

    /// Query parameter the options endpoint expects for this level as parent.
    pub fn query_param(self) -> &'static str {
        match self {
            CascadeLevel::Administration => "administracao",
            CascadeLevel::Department => "departamento",
            CascadeLevel::Section => "seccao",
        }
    }

    fn descendants(self) -> Vec<CascadeLevel> {
        let mut out = Vec::new();
        let mut next = self.child();
        while let Some(level) = next {
            out.push(level);
            next = level.child();
        }
        out
    }
}

impl CascadeForm {
    pub fn value(&self, level: CascadeLevel) -> Option<&str> {
        self.field(level).value.as_deref()
    }

    pub fn options(&self, level: CascadeLevel) -> &[SelectOption] {
        &self.field(level).options
    }

    /// Record a value change and compute resets plus the dependent fetch.
    ///
    /// Clearing a parent resets every descendant and never fetches.
    pub fn on_change(&mut self, level: CascadeLevel, value: Option<String>) -> CascadeStep {
        let value = value
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        self.field_mut(level).value = value.clone();

        let reset = level.descendants();
        for descendant in &reset {
            self.field_mut(*descendant).reset();
        }

        let fetch = match (level.child(), value) {
            (Some(child), Some(parent_value)) => Some(OptionsRequest {
                child,
                param: level.query_param(),
                parent_value,
            }),
            _ => None,
        };

        CascadeStep { reset, fetch }
    }

    /// Install fetched options unless the parent moved on meanwhile.
    pub fn apply_options(&mut self, request: &OptionsRequest, options: Vec<SelectOption>) -> bool {
        let Some(parent) = parent_of(request.child) else {
            return false;
        };
        if self.value(parent) != Some(request.parent_value.as_str()) {
            return false;
        }

        let field = self.field_mut(request.child);
        field.value = None;
        field.options = options;
        true
    }

    fn field(&self, level: CascadeLevel) -> &SelectField {
        match level {
            CascadeLevel::Administration => &self.administration,
            CascadeLevel::Department => &self.department,
            CascadeLevel::Section => &self.section,
        }
    }

    fn field_mut(&mut self, level: CascadeLevel) -> &mut SelectField {
        match level {
            CascadeLevel::Administration => &mut self.administration,
            CascadeLevel::Department => &mut self.department,
            CascadeLevel::Section => &mut self.section,
        }
    }
}

/// The single empty option a reset field shows.
pub fn placeholder_options() -> Vec<SelectOption> {
    vec![SelectOption {
        value: String::new(),
        label: PLACEHOLDER_LABEL.to_owned(),
    }]
}

/// Parse an HTML fragment of `<option>` elements.
pub fn parse_options_fragment(html: &str) -> Vec<SelectOption> {
    OPTION_RE
        .captures_iter(html)
        .map(|caps| {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let inner = caps.get(2).map_or("", |m| m.as_str());
            let label = decode_entities(TAG_RE.replace_all(inner, "").trim());
            let value = VALUE_ATTR_RE
                .captures(attrs)
                .and_then(|v| v.get(1).or_else(|| v.get(2)).or_else(|| v.get(3)))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_else(|| label.clone());
            SelectOption { value, label }
        })
        .collect()
}

fn parent_of(level: CascadeLevel) -> Option<CascadeLevel> {
    match level {
        CascadeLevel::Administration => None,
        CascadeLevel::Department => Some(CascadeLevel::Administration),
        CascadeLevel::Section => Some(CascadeLevel::Department),
    }
}

fn decode_entities(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clearing_administration_resets_both_levels_without_fetch() {
        let mut form = CascadeForm::default();
        form.on_change(CascadeLevel::Administration, Some("1".into()));
        form.on_change(CascadeLevel::Department, Some("4".into()));

        let step = form.on_change(CascadeLevel::Administration, Some("   ".into()));
        assert_eq!(
            step.reset,
            vec![CascadeLevel::Department, CascadeLevel::Section]
        );
        assert_eq!(step.fetch, None);
        assert_eq!(form.options(CascadeLevel::Department), placeholder_options());
        assert_eq!(form.options(CascadeLevel::Section), placeholder_options());
        assert_eq!(form.value(CascadeLevel::Department), None);
    }

    #[test]
    fn changing_department_resets_only_sections() {
        let mut form = CascadeForm::default();
        form.on_change(CascadeLevel::Administration, Some("1".into()));

        let step = form.on_change(CascadeLevel::Department, Some("9".into()));
        assert_eq!(step.reset, vec![CascadeLevel::Section]);
        assert_eq!(
            step.fetch,
            Some(OptionsRequest {
                child: CascadeLevel::Section,
                param: "departamento",
                parent_value: "9".into(),
            })
        );
        assert_eq!(form.value(CascadeLevel::Administration), Some("1"));
    }

    #[test]
    fn section_changes_have_no_effects() {
        let mut form = CascadeForm::default();
        assert_eq!(
            form.on_change(CascadeLevel::Section, Some("3".into())),
            CascadeStep::default()
        );
    }

    #[test]
    fn stale_responses_are_discarded() {
        let mut form = CascadeForm::default();
        let first = form
            .on_change(CascadeLevel::Administration, Some("1".into()))
            .fetch
            .expect("fetch for adm 1");
        let second = form
            .on_change(CascadeLevel::Administration, Some("2".into()))
            .fetch
            .expect("fetch for adm 2");

        let options = parse_options_fragment(r#"<option value="10">Finance</option>"#);
        assert!(!form.apply_options(&first, options.clone()));
        assert!(form.apply_options(&second, options.clone()));
        assert_eq!(form.options(CascadeLevel::Department), options.as_slice());
    }

    #[test]
    fn parses_django_option_fragments() {
        let html = r#"
            <option value="">---------</option>
            <option value="3">Recursos &amp; Humanos</option>
            <option value='7' selected>Finanças</option>
            <option>Sem valor</option>
        "#;

        let options = parse_options_fragment(html);
        assert_eq!(options.len(), 4);
        assert_eq!(options[0].value, "");
        assert_eq!(options[0].label, PLACEHOLDER_LABEL);
        assert_eq!(options[1].value, "3");
        assert_eq!(options[1].label, "Recursos & Humanos");
        assert_eq!(options[2].value, "7");
        assert_eq!(options[2].label, "Finanças");
        assert_eq!(options[3].value, "Sem valor");
    }
}
