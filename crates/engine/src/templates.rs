//! Message templates for success and failure messages.
//!
//! Templates reference context values with `${{ name }}`. Values are supplied
//! by the workflow definition as an ordered name/value table, so templates
//! never reach into the typed context directly.

use indexmap::IndexMap;

/// Interpolates every `${{ name }}` reference found in `values`.
///
/// Unknown references are left in place so a broken template stays visible in
/// the rendered message instead of silently losing text.
pub fn render_message(template: &str, values: &IndexMap<String, String>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut remainder = template;

    while let Some(start) = remainder.find("${{") {
        rendered.push_str(&remainder[..start]);
        let after_start = &remainder[start + 3..];
        let Some(end) = after_start.find("}}") else {
            rendered.push_str(&remainder[start..]);
            return rendered;
        };

        let expression = after_start[..end].trim();
        match values.get(expression) {
            Some(value) => rendered.push_str(value),
            None => rendered.push_str(&remainder[start..start + 3 + end + 2]),
        }
        remainder = &after_start[end + 2..];
    }

    rendered.push_str(remainder);
    rendered
}
