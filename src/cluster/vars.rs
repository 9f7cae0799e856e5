//! Variable namespace and template instantiation
//!
//! The namespace is built once at load time: environment-derived entries
//! first, then user-declared entries evaluated in order so that each value
//! may reference everything defined before it. It is immutable afterwards;
//! per-task entries (`HOST`, `NAME`, `COMMAND`) are layered on via
//! [`VarNamespace::with`].

use super::config::VariableConfig;
use crate::error::{FlotillaError, Result};
use regex::{Captures, Regex};
use std::collections::BTreeMap;

/// Placeholder syntax accepted in templates
const PLACEHOLDER_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Immutable name -> value map for template instantiation
#[derive(Debug, Clone, Default)]
pub struct VarNamespace {
    values: BTreeMap<String, String>,
}

impl VarNamespace {
    /// Build the environment-derived base namespace
    pub fn from_environment() -> Self {
        let mut values: BTreeMap<String, String> = std::env::vars().collect();

        if let Ok(hostname) = gethostname::gethostname().into_string() {
            values.insert("HOSTNAME".to_string(), hostname);
        }

        Self { values }
    }

    /// Build the full namespace: environment entries plus user declarations
    /// evaluated in order
    pub fn load(declarations: &[VariableConfig]) -> Result<Self> {
        let mut namespace = Self::from_environment();

        for decl in declarations {
            let value = instantiate(&decl.value, &namespace)?;
            namespace.values.insert(decl.name.clone(), value);
        }

        Ok(namespace)
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Derive a namespace extended with additional entries
    pub fn with<I, K, V>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = self.values.clone();
        for (k, v) in entries {
            values.insert(k.into(), v.into());
        }
        Self { values }
    }
}

/// Substitute every `${NAME}` placeholder in a template
///
/// An unresolved placeholder is a configuration error naming the
/// placeholder and the template it appears in.
pub fn instantiate(template: &str, vars: &VarNamespace) -> Result<String> {
    let re = Regex::new(PLACEHOLDER_PATTERN).unwrap();

    let mut missing: Option<String> = None;
    let rendered = re.replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
        Some(value) => value.to_string(),
        None => {
            missing.get_or_insert_with(|| caps[1].to_string());
            String::new()
        }
    });

    if let Some(name) = missing {
        return Err(FlotillaError::Config(format!(
            "Undefined variable '{}' in template '{}'",
            name, template
        )));
    }

    Ok(rendered.into_owned())
}
