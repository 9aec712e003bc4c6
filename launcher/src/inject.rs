use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// User scripts injected into every proxied HTML page, in order.
///
/// Read once at startup and never reloaded.
#[derive(Clone, Debug, Default)]
pub struct InjectionBundle {
    sources: Vec<String>,
}

impl InjectionBundle {
    pub fn from_sources(sources: Vec<String>) -> Self {
        Self { sources }
    }

    /// Read every script.
    ///
    /// A relative path is tried against each of `roots` in order and the
    /// first existing file wins. When none exists the error names the path
    /// under the first root.
    pub fn load<P: AsRef<Path>>(paths: &[P], roots: &[PathBuf]) -> Result<Self> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let path = resolve(path.as_ref(), roots);
            let source = std::fs::read_to_string(&path)
                .map_err(|source| Error::InjectScriptMissing { path, source })?;
            sources.push(source);
        }
        Ok(Self { sources })
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

/// Where relative script paths are looked up: the working directory, the
/// executable's directory and its ancestors, then the source checkout.
pub fn search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe) = std::env::current_exe() {
        // target/<profile>/<binary> sits three levels below the checkout.
        roots.extend(exe.ancestors().skip(1).take(3).map(Path::to_path_buf));
    }
    if let Some(workspace) = Path::new(env!("CARGO_MANIFEST_DIR")).parent() {
        roots.push(workspace.to_path_buf());
    }
    roots.dedup();
    roots
}

fn resolve(path: &Path, roots: &[PathBuf]) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    roots
        .iter()
        .map(|root| root.join(path))
        .find(|candidate| candidate.is_file())
        .or_else(|| roots.first().map(|root| root.join(path)))
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "bonanza-inject-{name}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_keeps_order() {
        let dir = scratch_dir("order");
        let first = dir.join("first.js");
        let second = dir.join("second.js");
        std::fs::write(&first, "window.first = 1;").unwrap();
        std::fs::write(&second, "window.second = 2;").unwrap();

        let bundle = InjectionBundle::load(&[&second, &first], &[]).unwrap();
        assert_eq!(bundle.sources(), ["window.second = 2;", "window.first = 1;"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_relative_path_falls_back_to_later_roots() {
        let empty = scratch_dir("empty-root");
        let install = scratch_dir("install-root");
        std::fs::create_dir_all(install.join("injectors")).unwrap();
        std::fs::write(install.join("injectors/game.js"), "window.game = 1;").unwrap();

        let bundle =
            InjectionBundle::load(&["injectors/game.js"], &[empty.clone(), install.clone()])
                .unwrap();
        assert_eq!(bundle.sources(), ["window.game = 1;"]);

        std::fs::remove_dir_all(&empty).unwrap();
        std::fs::remove_dir_all(&install).unwrap();
    }

    #[test]
    fn test_missing_script_names_the_path() {
        let root = scratch_dir("missing");
        let err = InjectionBundle::load(&["definitely/not/here.js"], &[root.clone()]).unwrap_err();
        let Error::InjectScriptMissing { path, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(path, &root.join("definitely/not/here.js"));
        assert!(err.to_string().contains("definitely/not/here.js"));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_default_script_found_from_search_roots() {
        let roots = search_roots();
        assert!(!roots.is_empty());
        let bundle = InjectionBundle::load(&[crate::config::DEFAULT_INJECT_SCRIPT], &roots)
            .unwrap();
        assert!(bundle.sources()[0].contains("WALLET_BALANCE_UPDATE"));
    }

    #[test]
    fn test_empty_bundle() {
        let bundle = InjectionBundle::load::<&str>(&[], &search_roots()).unwrap();
        assert!(bundle.sources().is_empty());
    }

    // A game frame before the game loads: canvas classes, a message listener
    // and timers that only record their callbacks.
    const GAME_FRAME: &str = r#"
var window = globalThis;
var listeners = [];
window.addEventListener = function (type, fn) {
  if (type === "message") listeners.push(fn);
};
var ticks = [];
function setInterval(fn) { ticks.push(fn); }
var drawn = [];
function CanvasRenderingContext2D() {}
CanvasRenderingContext2D.prototype.fillText = function (text) { drawn.push(text); };
CanvasRenderingContext2D.prototype.strokeText = function (text) { drawn.push("stroke:" + text); };
function HTMLCanvasElement() {}
HTMLCanvasElement.prototype.getContext = function (type) {
  if (type !== "2d") return null;
  return {
    fillText: function (text) { drawn.push("own:" + text); },
    strokeText: function (text) { drawn.push("own-stroke:" + text); }
  };
};
var ctx2d = new CanvasRenderingContext2D();
function post(data) {
  listeners.forEach(function (fn) { fn({ data: data }); });
}
"#;

    /// Run the default injector in a bare frame, then evaluate `check`.
    fn in_game_frame(check: &str) -> String {
        let roots = search_roots();
        let bundle =
            InjectionBundle::load(&[crate::config::DEFAULT_INJECT_SCRIPT], &roots).unwrap();
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            ctx.eval::<(), _>(format!("{GAME_FRAME}\n{}\n;undefined", bundle.sources()[0]))
                .unwrap_or_else(|err| panic!("injector failed: {err}"));
            ctx.eval::<String, _>(check)
                .unwrap_or_else(|err| panic!("check failed: {err}"))
        })
    }

    #[test]
    fn test_injector_replaces_large_amounts_only() {
        let drawn = in_game_frame(
            r#"
ctx2d.fillText("$1,000,000.00");
ctx2d.fillText("BET 2,000");
ctx2d.fillText("WIN 12.50 CREDIT 100,000");
ctx2d.strokeText("399,998.50");
ctx2d.fillText(42);
drawn.join("|")
"#,
        );
        assert_eq!(
            drawn,
            "$500.00|BET 2,000|WIN 12.50 CREDIT 500|stroke:500.00|42"
        );
    }

    #[test]
    fn test_injector_follows_wallet_broadcasts() {
        let drawn = in_game_frame(
            r#"
post({ type: "WALLET_BALANCE_UPDATE", balance: 1234567.891 });
ctx2d.fillText("CREDIT $1,000,000.00");
ctx2d.fillText("1,000,000");
post({ type: "other", balance: 7 });
ctx2d.fillText("$250,000.00");
post({ type: "WALLET_BALANCE_UPDATE", balance: "not a number" });
ctx2d.fillText("$250,000.00");
drawn.join("|")
"#,
        );
        assert_eq!(
            drawn,
            "CREDIT $1,234,567.89|1,234,568|$1,234,567.89|$500.00"
        );
    }

    #[test]
    fn test_injector_wraps_new_contexts() {
        let drawn = in_game_frame(
            r#"
var own = new HTMLCanvasElement().getContext("2d");
own.fillText("$150,000.00");
own.strokeText("150,000");
var again = new HTMLCanvasElement().getContext("webgl");
drawn.join("|") + "|" + again
"#,
        );
        assert_eq!(drawn, "own:$500.00|own-stroke:500|null");
    }

    #[test]
    fn test_injector_patches_pixi_text_once_loaded() {
        let texts = in_game_frame(
            r#"
function Text() { this._text = ""; }
Object.defineProperty(Text.prototype, "text", {
  configurable: true,
  get: function () { return this._text; },
  set: function (value) { this._text = value; }
});
Text.prototype.setText = function (value) { this._text = value; };
function BitmapText() { this._text = ""; }
Object.defineProperty(BitmapText.prototype, "text", {
  configurable: true,
  set: function (value) { this._text = value; }
});
BitmapText.prototype.updateText = function () { this.rendered = this._text; };
window.PIXI = { Text: Text, BitmapText: BitmapText };
ticks.forEach(function (fn) { fn(); });
ticks.forEach(function (fn) { fn(); });

var label = new Text();
label.text = "$1,000,000.00";
var credit = new Text();
credit.setText("CREDIT 250,000");
var bitmap = new BitmapText();
bitmap.text = "$1,000,000.00";
var stored = bitmap._text;
bitmap.updateText();
[label.text, credit.text, stored, bitmap.rendered].join("|")
"#,
        );
        assert_eq!(
            texts,
            "$500.00|CREDIT 500|$1,000,000.00|$500.00"
        );
    }
}
