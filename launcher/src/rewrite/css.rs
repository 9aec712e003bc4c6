use super::{is_root_relative, RewriteContext};
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn url_function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)url\(\s*['"]?/([^)'"\s]+)['"]?\s*\)"#).expect("css url regex")
    })
}

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)@import\s+['"]/([^'"]+)['"]"#).expect("css import regex"))
}

// The captured path follows the leading slash.
fn needs_prefix(path: &str) -> bool {
    is_root_relative(&format!("/{path}"))
}

/// Rewrite a stylesheet for the proxy.
pub fn rewrite(text: &str, context: &RewriteContext) -> String {
    let prefix = context.prefix();
    let text = url_function_regex().replace_all(text, |caps: &Captures| {
        if needs_prefix(&caps[1]) {
            format!("url({prefix}/{})", &caps[1])
        } else {
            caps[0].to_string()
        }
    });
    let text = import_regex().replace_all(&text, |caps: &Captures| {
        if needs_prefix(&caps[1]) {
            format!(r#"@import "{prefix}/{}""#, &caps[1])
        } else {
            caps[0].to_string()
        }
    });
    text.replace(&format!("{}/", context.origin()), &format!("{prefix}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RewriteContext {
        RewriteContext::new("dG9r", "https://games.example.com")
    }

    #[test]
    fn test_rewrites_root_relative_urls() {
        let css = r#".a{background:url(/img/a.png)} .b{background:URL( "/img/b.png" )} .c{background:url('/img/c.png')}"#;
        assert_eq!(
            rewrite(css, &context()),
            ".a{background:url(/p/dG9r/img/a.png)} .b{background:url(/p/dG9r/img/b.png)} .c{background:url(/p/dG9r/img/c.png)}"
        );
    }

    #[test]
    fn test_rewrites_imports() {
        let css = "@import '/fonts.css';\n@import \"/p/dG9r/done.css\";";
        assert_eq!(
            rewrite(css, &context()),
            "@import \"/p/dG9r/fonts.css\";\n@import \"/p/dG9r/done.css\";"
        );
    }

    #[test]
    fn test_rewrites_absolute_origin_references() {
        let css = "@font-face{src:url(https://games.example.com/f.woff2)} .x{background:url(https://cdn.example.net/y.png)}";
        assert_eq!(
            rewrite(css, &context()),
            "@font-face{src:url(/p/dG9r/f.woff2)} .x{background:url(https://cdn.example.net/y.png)}"
        );
    }

    #[test]
    fn test_leaves_relative_and_proxied_urls() {
        let css = "a{background:url(img/rel.png)} b{background:url(/p/dG9r/x.png)} c{background:url(//cdn.example.net/z.png)} d{background:url(data:image/png;base64,AA==)} e{background:url(/api/x)}";
        assert_eq!(rewrite(css, &context()), css);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let css = "a{background:url(/x.png)} @import '/y.css';";
        let once = rewrite(css, &context());
        assert_eq!(rewrite(&once, &context()), once);
    }
}
