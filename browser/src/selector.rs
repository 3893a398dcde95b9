//! Text selectors as XPath.
//!
//! CDP only queries by CSS or XPath, so `text=<label>` becomes an XPath that
//! matches any element with a direct text node containing the label. Text
//! inside `<head>`, `<script>`, `<style>`, `<noscript>` or `<template>` is
//! never rendered and never matches.

/// Ancestors whose text is not part of the rendered page.
const UNRENDERED: &str = "ancestor-or-self::head or ancestor-or-self::script \
     or ancestor-or-self::style or ancestor-or-self::noscript or ancestor-or-self::template";

/// XPath matching rendered elements whose own text contains `label`.
pub fn text_xpath(label: &str) -> String {
    format!(
        "//*[not({UNRENDERED})][text()[contains(normalize-space(.), {})]]",
        xpath_literal(&normalize_space(label))
    )
}

/// Collapse whitespace runs the way XPath `normalize-space()` does.
pub fn normalize_space(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Quote `value` as an XPath 1.0 string literal.
///
/// XPath 1.0 has no escape sequences, so a value holding both quote kinds is
/// assembled with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }

    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_label() {
        assert_eq!(
            text_xpath("Resubir"),
            "//*[not(ancestor-or-self::head or ancestor-or-self::script \
             or ancestor-or-self::style or ancestor-or-self::noscript \
             or ancestor-or-self::template)][text()[contains(normalize-space(.), 'Resubir')]]"
        );
    }

    #[test]
    fn script_and_head_text_is_excluded() {
        let xpath = text_xpath("Resubir");
        let (guard, _) = xpath.split_once("[text()").expect("text predicate");
        for tag in ["head", "script", "style", "noscript", "template"] {
            assert!(
                guard.contains(&format!("ancestor-or-self::{tag}")),
                "{tag} text must not match: {xpath}"
            );
        }
        assert!(guard.starts_with("//*[not("));
    }

    #[test]
    fn label_whitespace_is_collapsed_like_page_text() {
        assert_eq!(normalize_space("  Guardar \t\n cambios "), "Guardar cambios");
        assert!(text_xpath("Guardar   cambios").contains("'Guardar cambios'"));
    }

    #[test]
    fn label_with_apostrophe_uses_double_quotes() {
        assert_eq!(xpath_literal("l'acte"), "\"l'acte\"");
    }

    #[test]
    fn label_with_both_quotes_uses_concat() {
        assert_eq!(
            xpath_literal(r#"say "l'acte""#),
            r#"concat('say "l', "'", 'acte"')"#
        );
    }
}
