//! Browser-side counterpart of [`RewriteContext::rewrite_url`].
//!
//! Scripts build URLs at runtime, long after the page was rewritten, so the
//! proxied page patches `fetch` and `XMLHttpRequest.open` to apply the same
//! rule before each request leaves the browser.

use super::RewriteContext;
use crate::page::js_string;
use bonanza_types::token::{API_ROOT, PROXY_ROOT};

const SHIM_TEMPLATE: &str = r#"<script>(function () {
  var prefix = __PREFIX__;
  var upstream = __ORIGIN__;
  window.__BONANZA_PROXY_PREFIX = prefix;
  window.__BONANZA_UPSTREAM_ORIGIN = upstream;
  var inert = /^(data:|blob:|mailto:|javascript:|#)/i;
  function routable(path) {
    return path.charAt(0) === "/" && path.charAt(1) !== "/" &&
      path.indexOf(__PROXY_ROOT__) !== 0 && path.indexOf(__API_ROOT__) !== 0;
  }
  function rewrite(u) {
    if (typeof u !== "string" || inert.test(u)) return u;
    try {
      var url = new URL(u, window.location.href);
      var local = url.host === window.location.host;
      var remote = url.origin === upstream;
      if ((local || remote) && routable(url.pathname)) return prefix + url.pathname + url.search + url.hash;
    } catch (e) {}
    return routable(u) ? prefix + u : u;
  }
  var nativeFetch = window.fetch;
  if (nativeFetch) {
    window.fetch = function (input, init) {
      try {
        if (typeof input === "string") {
          input = rewrite(input);
        } else if (input && typeof input.url === "string") {
          var next = rewrite(input.url);
          if (next !== input.url) input = new Request(next, input);
        }
      } catch (e) {}
      return nativeFetch.call(this, input, init);
    };
  }
  var nativeOpen = XMLHttpRequest.prototype.open;
  XMLHttpRequest.prototype.open = function (method, url) {
    var args = Array.prototype.slice.call(arguments);
    try { args[1] = rewrite(url); } catch (e) {}
    return nativeOpen.apply(this, args);
  };
})();</script>"#;

/// The `<script>` element carrying the shim for one origin.
pub fn render(context: &RewriteContext) -> String {
    SHIM_TEMPLATE
        .replace("__PREFIX__", &js_string(context.prefix()))
        .replace("__ORIGIN__", &js_string(context.origin()))
        .replace("__PROXY_ROOT__", &js_string(PROXY_ROOT))
        .replace("__API_ROOT__", &js_string(API_ROOT))
}
