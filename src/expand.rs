//! Expansion of user-supplied values such as branch names.
//!
//! Values are first run through a [`ValueResolver`] (token macros like
//! `${ENV,var="GIT_BRANCH"}`), then through plain environment substitution
//! of `${NAME}` and `$NAME`. When macro expansion fails, the raw value goes
//! straight to environment substitution.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

/// `${NAME}` or `${NAME,arg="value",...}`.
static MACRO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)((?:,[^}]*)?)\}").expect("valid macro regex")
});

/// `var="NAME"` argument of the ENV macro.
static VAR_ARG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*var\s*=\s*"([^"]*)"\s*$"#).expect("valid argument regex"));

/// `${NAME}` or `$NAME`.
static ENV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid env regex")
});

/// Errors raised by macro expansion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpandError {
    #[error("unknown macro {0}")]
    UnknownMacro(String),
    #[error("malformed macro {0}")]
    Malformed(String),
}

/// Snapshot of environment variables used for expansion.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A macro expansion service.
pub trait ValueResolver: Send + Sync {
    fn resolve(&self, raw: &str) -> Result<String, ExpandError>;
}

/// Token-macro expansion supporting `${ENV,var="NAME"}`.
///
/// Any other macro is an error, which makes the caller fall back to plain
/// environment substitution.
#[derive(Debug, Clone, Default)]
pub struct MacroResolver {
    env: Environment,
}

impl MacroResolver {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }
}

impl ValueResolver for MacroResolver {
    fn resolve(&self, raw: &str) -> Result<String, ExpandError> {
        let mut error = None;

        let expanded = MACRO_RE.replace_all(raw, |caps: &Captures| {
            let whole = caps[0].to_string();
            let name = &caps[1];
            let args = caps.get(2).map(|m| m.as_str()).unwrap_or("");

            if name != "ENV" {
                error.get_or_insert(ExpandError::UnknownMacro(whole));
                return String::new();
            }

            match VAR_ARG_RE.captures(args.trim_start_matches(',')) {
                Some(var) => self.env.get(&var[1]).unwrap_or_default().to_string(),
                None => {
                    error.get_or_insert(ExpandError::Malformed(whole));
                    String::new()
                }
            }
        });

        match error {
            Some(err) => Err(err),
            None => Ok(expanded.into_owned()),
        }
    }
}

/// Replace `${NAME}` and `$NAME` with environment values.
///
/// Unknown variables are left untouched.
pub fn substitute_env(raw: &str, env: &Environment) -> String {
    ENV_RE
        .replace_all(raw, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match env.get(name) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Macro expansion with environment fallback.
pub struct ValueExpander {
    resolver: Box<dyn ValueResolver>,
    env: Environment,
}

impl ValueExpander {
    pub fn new(resolver: Box<dyn ValueResolver>, env: Environment) -> Self {
        Self { resolver, env }
    }

    /// The default expander over the given environment.
    pub fn with_env(env: Environment) -> Self {
        Self::new(Box::new(MacroResolver::new(env.clone())), env)
    }

    pub fn expand(&self, raw: &str) -> String {
        match self.resolver.resolve(raw) {
            Ok(value) => substitute_env(&value, &self.env),
            Err(err) => {
                tracing::debug!(value = raw, error = %err, "macro expansion failed, using environment substitution");
                substitute_env(raw, &self.env)
            }
        }
    }
}
