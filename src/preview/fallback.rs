//! Minimal stylesheet used when generation fails.
//!
//! Only color fields survive: each becomes a custom property on `:root`.
//! Values that could break out of the declaration are skipped.

use std::fmt::Write as _;

use crate::settings::Settings;

pub const FALLBACK_HEADER: &str = "/* live preview: fallback */";

#[must_use]
pub fn fallback_stylesheet(settings: &Settings) -> String {
    let mut css = String::from(FALLBACK_HEADER);
    css.push_str("\n:root {\n");
    for (key, value) in settings.color_fields() {
        if !is_safe_value(value) {
            continue;
        }
        let _ = writeln!(css, "  --las-{}: {};", key.replace('_', "-"), value.trim());
    }
    css.push_str("}\n");
    css
}

fn is_safe_value(value: &str) -> bool {
    !value.trim().is_empty() && !value.contains([';', '{', '}', '<', '>', '\\'])
}
