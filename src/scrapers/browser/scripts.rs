//! In-page JavaScript snippets used to drive expansion controls.
//!
//! Selectors are embedded as JSON string literals so quoting inside CSS
//! attribute selectors survives.

fn quote(selector: &str) -> String {
    serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
}

/// Evaluates to true once `selector` matches.
pub fn exists(selector: &str) -> String {
    format!("document.querySelector({}) !== null", quote(selector))
}

/// Evaluates to the number of elements matching `selector`.
pub fn count(selector: &str) -> String {
    format!("document.querySelectorAll({}).length", quote(selector))
}

/// Clicks the first match if it is visible and enabled; evaluates to whether it did.
pub fn click_if_actionable(selector: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) return false;
    if (el.disabled || el.getAttribute('aria-disabled') === 'true') return false;
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    if (el.getClientRects().length === 0) return false;
    el.scrollIntoView({{ block: 'center' }});
    el.click();
    return true;
}})()"#,
        sel = quote(selector)
    )
}

/// Scrolls the first match into view; evaluates to whether it exists.
pub fn scroll_to(selector: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) return false;
    el.scrollIntoView({{ block: 'end' }});
    window.scrollBy(0, Math.max(200, window.innerHeight / 2));
    return true;
}})()"#,
        sel = quote(selector)
    )
}

/// Clicks the first match only if it reports an "on" state.
pub fn switch_off(selector: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) return false;
    const on = el.checked === true
        || el.getAttribute('aria-checked') === 'true'
        || el.getAttribute('aria-pressed') === 'true'
        || el.getAttribute('data-state') === 'checked';
    if (!on) return false;
    el.click();
    return true;
}})()"#,
        sel = quote(selector)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_json_quoted() {
        let js = exists("div[data-testid='x'] a[href*=\"/p/\"]");
        assert_eq!(
            js,
            r#"document.querySelector("div[data-testid='x'] a[href*=\"/p/\"]") !== null"#
        );
    }

    #[test]
    fn click_script_checks_disabled_state() {
        let js = click_if_actionable("button.more");
        assert!(js.contains(r#"document.querySelector("button.more")"#));
        assert!(js.contains("el.disabled"));
        assert!(js.contains("el.click()"));
    }
}
