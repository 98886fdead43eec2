//! DOM selectors and evaluation snippets used to read evidence from the page.
//!
//! Every snippet catches its own exceptions and returns an empty value, so a
//! hostile page can at worst hide evidence, never fail the scan.

/// Interactive elements that may be consent controls.
pub const CONTROL_SELECTOR: &str = "button, a, input[type='button'], input[type='submit']";

/// Containers that usually hold a consent banner.
pub const DIALOG_SELECTOR: &str = "[role='dialog'], .cookie, .cc-window, .cookie-consent";

pub const ANCHOR_SELECTOR: &str = "a";

/// `src` of every external script element.
pub const SCRIPT_SOURCES: &str = r#"(() => {
    try {
        return Array.from(document.scripts).map(s => s.src).filter(Boolean);
    } catch (e) { return []; }
})()"#;

/// First 2000 characters of each inline script under 50 000 characters.
pub const INLINE_SCRIPTS: &str = r#"(() => {
    try {
        return Array.from(document.scripts)
            .filter(s => !s.src)
            .map(s => s.textContent || "")
            .filter(t => t.length > 0 && t.length < 50000)
            .map(t => t.slice(0, 2000));
    } catch (e) { return []; }
})()"#;

/// Keys present in local and session storage.
pub const STORAGE_KEYS: &str = r#"(() => {
    const keys = (store) => { try { return Object.keys(store || {}); } catch (e) { return []; } };
    return { localStorage: keys(window.localStorage), sessionStorage: keys(window.sessionStorage) };
})()"#;

/// Whether inline scripts read canvas pixels or open a WebGL context.
pub const FINGERPRINT_RUNTIME: &str = r#"(() => {
    try {
        const text = Array.from(document.scripts).map(s => s.textContent || "").join(" ");
        return /toDataURL\(|getContext\(['"]webgl/i.test(text);
    } catch (e) { return false; }
})()"#;
