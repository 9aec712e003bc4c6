use super::{shim, RewriteContext};
use crate::InjectionBundle;
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn csp_meta_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<meta[^>]+http-equiv=['"]Content-Security-Policy['"][^>]*>"#)
            .expect("csp meta regex")
    })
}

// Values stay on one line, as a quoted attribute normally does.
fn url_attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(src|href|action|poster|data)=(?:"([^"\n]*)"|'([^'\n]*)')"#)
            .expect("url attribute regex")
    })
}

fn base_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<base\b").expect("base regex"))
}

fn head_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<head\b[^>]*>").expect("head regex"))
}

/// Rewrite an HTML document for the proxy and inject the page scripts.
pub fn rewrite(text: &str, context: &RewriteContext, bundle: &InjectionBundle) -> String {
    let text = csp_meta_regex().replace_all(text, "");
    let text = url_attribute_regex().replace_all(&text, |caps: &Captures| {
        let (quote, value) = match (caps.get(2), caps.get(3)) {
            (Some(value), _) => ('"', value.as_str()),
            (None, Some(value)) => ('\'', value.as_str()),
            (None, None) => ('"', ""),
        };
        format!(
            "{}={quote}{}{quote}",
            &caps[1],
            context.rewrite_url(value)
        )
    });

    let injection = injection(&text, context, bundle);
    match head_regex().find(&text) {
        Some(head) => {
            let mut out = String::with_capacity(text.len() + injection.len() + 1);
            out.push_str(&text[..head.end()]);
            out.push('\n');
            out.push_str(&injection);
            out.push_str(&text[head.end()..]);
            out
        }
        None => format!("{injection}{text}"),
    }
}

// <base> (when missing), the rewrite shim, then user scripts in order.
fn injection(text: &str, context: &RewriteContext, bundle: &InjectionBundle) -> String {
    let mut parts = Vec::with_capacity(bundle.sources().len() + 2);
    if !base_regex().is_match(text) {
        parts.push(format!(r#"<base href="{}/">"#, context.prefix()));
    }
    parts.push(shim::render(context));
    for source in bundle.sources() {
        parts.push(format!("<script>\n{source}\n</script>"));
    }
    let mut injection = parts.join("\n");
    injection.push('\n');
    injection
}
