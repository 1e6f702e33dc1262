use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::{AliasTable, CanonicalField};

/// Extra header aliases, keyed by canonical field name:
///
/// ```json
/// { "aliases": { "Videos Created": ["clips delivered"] } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasOverrides {
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

impl AliasOverrides {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Built-in aliases extended with these overrides.
    pub fn apply(&self, mut table: AliasTable) -> Result<AliasTable> {
        for (name, extra) in &self.aliases {
            let field = CanonicalField::from_canonical_name(name)
                .ok_or_else(|| Error::Config(format!("unknown canonical field '{}'", name)))?;
            debug!(field = name.as_str(), count = extra.len(), "extending aliases");
            table.extend(field, extra.iter().cloned());
        }
        Ok(table)
    }
}

/// The alias table to resolve with: built-ins, plus overrides when a file
/// is given.
pub fn alias_table(overrides: Option<&Path>) -> Result<AliasTable> {
    match overrides {
        Some(path) => AliasOverrides::load(path)?.apply(AliasTable::default()),
        None => Ok(AliasTable::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::resolve;

    #[test]
    fn overrides_extend_builtin_aliases() {
        let overrides =
            AliasOverrides::from_json(r#"{ "aliases": { "Videos Created": ["clips delivered"] } }"#)
                .unwrap();
        let table = overrides.apply(AliasTable::default()).unwrap();
        let map = resolve(&["Clips delivered"], &table);
        assert_eq!(map.field_for("Clips delivered"), Some(CanonicalField::VideosCreated));
    }

    #[test]
    fn unknown_field_is_a_config_error() {
        let overrides =
            AliasOverrides::from_json(r#"{ "aliases": { "Bananas": ["yellow"] } }"#).unwrap();
        let err = overrides.apply(AliasTable::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            AliasOverrides::from_json("{ not json"),
            Err(Error::Json(_))
        ));
        assert!(AliasOverrides::from_json(r#"{ "extra": 1 }"#).is_err());
    }

    #[test]
    fn no_file_means_builtin_table() {
        let table = alias_table(None).unwrap();
        assert_eq!(table.aliases(CanonicalField::Name).len(), 4);
    }
}
