//! Import specifier normalization for the execution target.
//!
//! | specifier            | becomes                               |
//! |----------------------|---------------------------------------|
//! | `lodash`             | `<cdn>lodash`                         |
//! | `npm:lodash@4`       | `<cdn>lodash@4`                       |
//! | `./util.ts`          | resolved against the importing module |
//! | `/owner/app/src/x.ts`| `https://<platform host>/owner/...`   |
//! | anything with a scheme (`https:`, `node:`, `jsr:`, ...) | unchanged |

use applet_schema::{replace_specifiers, scan_imports, ParseError};
use reqwest::Url;

use crate::config::BuildConfig;

#[derive(Debug, Clone)]
pub struct ImportRewriter {
    cdn_url: String,
    platform_host: String,
}

pub(crate) fn has_scheme(specifier: &str) -> bool {
    match specifier.split_once(':') {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

impl ImportRewriter {
    pub fn new(cdn_url: impl Into<String>, platform_host: impl Into<String>) -> Self {
        ImportRewriter {
            cdn_url: cdn_url.into(),
            platform_host: platform_host.into(),
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(config.cdn_url.clone(), config.platform_host.clone())
    }

    /// Rewritten form of `specifier` imported from `referrer`, or `None` if it
    /// stays as written.
    pub fn rewrite_specifier(&self, specifier: &str, referrer: &Url) -> Option<String> {
        if let Some(package) = specifier.strip_prefix("npm:") {
            return Some(format!("{}{}", self.cdn_url, package.trim_start_matches('/')));
        }
        if has_scheme(specifier) {
            return None;
        }
        if specifier.starts_with("./") || specifier.starts_with("../") {
            return referrer.join(specifier).ok().map(String::from);
        }
        if specifier.starts_with('/') {
            return Some(format!("https://{}{}", self.platform_host, specifier));
        }
        Some(format!("{}{}", self.cdn_url, specifier))
    }

    /// Source with every import specifier normalized.
    pub fn rewrite_source(&self, source: &str, referrer: &Url) -> Result<String, ParseError> {
        let imports = scan_imports(source)?;
        Ok(replace_specifiers(source, &imports, |import| {
            self.rewrite_specifier(&import.specifier, referrer)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter() -> ImportRewriter {
        ImportRewriter::new("https://esm.sh/", "applet.run")
    }

    fn src_url() -> Url {
        Url::parse("file:///src/main.tsx").unwrap()
    }

    #[test]
    fn test_bare_and_npm_map_to_cdn() {
        let r = rewriter();
        assert_eq!(
            r.rewrite_specifier("lodash", &src_url()).as_deref(),
            Some("https://esm.sh/lodash")
        );
        assert_eq!(
            r.rewrite_specifier("npm:@scope/pkg@1.2.0/sub", &src_url())
                .as_deref(),
            Some("https://esm.sh/@scope/pkg@1.2.0/sub")
        );
    }

    #[test]
    fn test_relative_resolves_against_referrer() {
        let r = rewriter();
        assert_eq!(
            r.rewrite_specifier("./util.ts", &src_url()).as_deref(),
            Some("file:///src/util.ts")
        );
        let remote = Url::parse("https://applet.run/acme/tools/src/a/b.ts").unwrap();
        assert_eq!(
            r.rewrite_specifier("../c.ts", &remote).as_deref(),
            Some("https://applet.run/acme/tools/src/c.ts")
        );
    }

    #[test]
    fn test_platform_paths_become_https() {
        assert_eq!(
            rewriter()
                .rewrite_specifier("/acme/tools/src/lib.ts", &src_url())
                .as_deref(),
            Some("https://applet.run/acme/tools/src/lib.ts")
        );
    }

    #[test]
    fn test_urls_and_runtime_schemes_unchanged() {
        let r = rewriter();
        for s in [
            "https://deno.land/std/path/mod.ts",
            "node:fs",
            "jsr:@std/assert",
            "data:text/javascript,export{}",
        ] {
            assert_eq!(r.rewrite_specifier(s, &src_url()), None, "{s}");
        }
    }

    #[test]
    fn test_rewrite_source_preserves_everything_else() {
        let source = r#"import React from "react";
import { helper } from './util.ts';
// import nope from "commented";
export * from "npm:zod";
const s = "lodash";
const lazy = await import("/acme/tools/src/lib.ts");
"#;
        let out = rewriter().rewrite_source(source, &src_url()).unwrap();
        assert_eq!(
            out,
            r#"import React from "https://esm.sh/react";
import { helper } from 'file:///src/util.ts';
// import nope from "commented";
export * from "https://esm.sh/zod";
const s = "lodash";
const lazy = await import("https://applet.run/acme/tools/src/lib.ts");
"#
        );
    }
}
