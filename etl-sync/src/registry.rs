//! Name based lookup of definitions.

use std::collections::BTreeMap;

use etl_config::shared::normalize_definition_name;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Converts a definition name to kebab case (`MerchantSeoData` becomes `merchant-seo-data`).
pub fn kebab_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let mut previous_lowercase = false;

    for c in name.chars() {
        if c == '-' || c == '_' || c.is_whitespace() {
            if !result.is_empty() && !result.ends_with('-') {
                result.push('-');
            }
            previous_lowercase = false;
            continue;
        }

        if c.is_uppercase() && previous_lowercase && !result.ends_with('-') {
            result.push('-');
        }

        previous_lowercase = c.is_lowercase() || c.is_ascii_digit();
        result.extend(c.to_lowercase());
    }

    while result.ends_with('-') {
        result.pop();
    }

    result
}

#[derive(Debug)]
struct Entry<T> {
    name: String,
    value: T,
}

/// Definitions keyed by their normalized name.
///
/// Names match regardless of case, dashes and underscores.
#[derive(Debug)]
pub struct DefinitionRegistry<T> {
    entries: BTreeMap<String, Entry<T>>,
}

impl<T> DefinitionRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registers `value` under `name`, failing when an equivalent name is already taken.
    pub fn register(&mut self, name: impl Into<String>, value: T) -> EtlResult<()> {
        let name = name.into();
        let key = normalize_definition_name(&name);

        if key.is_empty() {
            bail!(ErrorKind::ConfigError, "Definition name is empty");
        }

        if let Some(existing) = self.entries.get(&key) {
            bail!(
                ErrorKind::ConfigError,
                "Definition is registered twice",
                format!("{name} conflicts with {}", existing.name)
            );
        }

        self.entries.insert(key, Entry { name, value });

        Ok(())
    }

    pub fn get(&self, name: &str) -> EtlResult<&T> {
        match self.entries.get(&normalize_definition_name(name)) {
            Some(entry) => Ok(&entry.value),
            None => bail!(
                ErrorKind::DefinitionNotFound,
                "Definition not found",
                name.to_string()
            ),
        }
    }

    pub fn get_mut(&mut self, name: &str) -> EtlResult<&mut T> {
        match self.entries.get_mut(&normalize_definition_name(name)) {
            Some(entry) => Ok(&mut entry.value),
            None => bail!(
                ErrorKind::DefinitionNotFound,
                "Definition not found",
                name.to_string()
            ),
        }
    }

    /// Returns the kebab case names of all definitions, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names = self
            .entries
            .values()
            .map(|entry| kebab_case(&entry.name))
            .collect::<Vec<_>>();
        names.sort();

        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for DefinitionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_handles_common_spellings() {
        assert_eq!(kebab_case("MerchantSeoData"), "merchant-seo-data");
        assert_eq!(kebab_case("merchant_seo_data"), "merchant-seo-data");
        assert_eq!(kebab_case("merchant-seo-data"), "merchant-seo-data");
        assert_eq!(kebab_case("orders2Archive"), "orders2-archive");
    }

    #[test]
    fn lookup_ignores_case_and_separators() {
        let mut registry = DefinitionRegistry::new();
        registry.register("merchant_seo_data", 1).unwrap();

        assert_eq!(registry.get("merchant-seo-data").unwrap(), &1);
        assert_eq!(registry.get("MerchantSeoData").unwrap(), &1);
        *registry.get_mut("MERCHANT_SEO_DATA").unwrap() = 2;
        assert_eq!(registry.get("merchantseodata").unwrap(), &2);
    }

    #[test]
    fn unknown_name_is_reported() {
        let registry = DefinitionRegistry::<()>::new();
        let err = registry.get("orders").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DefinitionNotFound);
        assert_eq!(err.detail(), Some("orders"));
    }

    #[test]
    fn equivalent_names_conflict() {
        let mut registry = DefinitionRegistry::new();
        registry.register("OrderItems", ()).unwrap();
        let err = registry.register("order_items", ()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert_eq!(registry.names(), vec!["order-items".to_string()]);
    }
}
