//! The device definition catalog.
//!
//! [`DeviceCatalog`] is the in-memory table of [`DeviceTypeDefinition`]s the
//! matcher resolves against. It is built once at startup, from definition
//! files or programmatically, and is read-only afterwards.
//!
//! Catalog order is significant: [`Manager::bind_first_available`] tries types
//! in this order. Re-declaring a type name replaces the old definition but keeps
//! its position.
//!
//! [`Manager::bind_first_available`]: crate::manager::Manager::bind_first_available

use crate::definition::DeviceTypeDefinition;
use crate::error::DefinitionError;
use crate::records::{self, ParsedDocument};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default)]
pub struct DeviceCatalog {
    definitions: Vec<DeviceTypeDefinition>,
}

impl DeviceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition, replacing any existing one with the same name.
    pub fn insert(&mut self, definition: DeviceTypeDefinition) {
        match self.definitions.iter_mut().find(|d| d.name == definition.name) {
            Some(existing) => {
                debug!(device_type = %definition.name, "replacing device definition");
                *existing = definition;
            }
            None => self.definitions.push(definition),
        }
    }

    pub fn with(mut self, definition: DeviceTypeDefinition) -> Self {
        self.insert(definition);
        self
    }

    /// Look up a type by exact name, falling back to a case-insensitive match.
    pub fn get(&self, name: &str) -> Option<&DeviceTypeDefinition> {
        self.definitions
            .iter()
            .find(|d| d.name == name)
            .or_else(|| self.definitions.iter().find(|d| d.name.eq_ignore_ascii_case(name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The keyboard definition, if one was declared.
    pub fn keyboard(&self) -> Option<&DeviceTypeDefinition> {
        self.definitions.iter().find(|d| d.is_keyboard())
    }

    /// Definitions in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceTypeDefinition> {
        self.definitions.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Merge a parsed document; returns the number of skipped entries.
    pub fn extend_from(&mut self, doc: ParsedDocument) -> usize {
        for definition in doc.definitions {
            self.insert(definition);
        }
        doc.skipped.len()
    }

    /// Build a catalog from one TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, DefinitionError> {
        let mut catalog = Self::new();
        catalog.extend_from(records::parse_toml(text)?);
        Ok(catalog)
    }

    /// Load one definition file; `.json` files are read as JSON, anything else as TOML.
    ///
    /// Returns the number of skipped entries.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, DefinitionError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let doc = if is_json(path) {
            records::parse_json(&text)?
        } else {
            records::parse_toml(&text)?
        };
        let found = doc.definitions.len();
        let skipped = self.extend_from(doc);
        info!(
            file = %path.display(),
            definitions = found,
            skipped,
            "loaded device definitions"
        );
        Ok(skipped)
    }

    /// Load every `.toml` / `.json` file in a directory, in file-name order.
    ///
    /// A file that fails to parse is logged and skipped; the rest still load.
    /// Only failing to read the directory itself is an error.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, DefinitionError> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_definition_file(p))
            .collect();
        files.sort();

        let mut skipped = 0;
        for file in files {
            match self.load_file(&file) {
                Ok(n) => skipped += n,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "skipping definition file");
                    skipped += 1;
                }
            }
        }
        Ok(skipped)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn is_definition_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml") || e.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::LogicalValueDefinition;
    use std::io::Write;

    #[test]
    fn redeclaring_keeps_catalog_position() {
        let mut catalog = DeviceCatalog::new()
            .with(DeviceTypeDefinition::new("A"))
            .with(DeviceTypeDefinition::new("B"));
        catalog.insert(DeviceTypeDefinition::new("A").with_value(LogicalValueDefinition::new("x")));

        assert_eq!(catalog.names().collect::<Vec<_>>(), ["A", "B"]);
        assert!(catalog.get("A").and_then(|a| a.value("x")).is_some());
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive() {
        let catalog = DeviceCatalog::new().with(DeviceTypeDefinition::new("Keyboard"));
        assert!(catalog.contains("keyboard"));
        assert!(catalog.keyboard().is_some());
        assert!(!catalog.contains("mouse"));
    }

    #[test]
    fn loads_directory_in_name_order_and_survives_bad_files() {
        let dir = tempfile::tempdir().expect("tempdir");

        let write = |name: &str, body: &str| {
            let mut f = fs::File::create(dir.path().join(name)).expect("create");
            f.write_all(body.as_bytes()).expect("write");
        };
        write("b_stick.toml", "[[device]]\nname = \"Stick\"\n");
        write("a_pad.json", r#"{ "device": [ { "name": "Pad" } ] }"#);
        write("c_broken.toml", "[[device]\n");
        write("notes.txt", "not a definition");

        let mut catalog = DeviceCatalog::new();
        let skipped = catalog.load_dir(dir.path()).expect("dir readable");

        assert_eq!(skipped, 1);
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["Pad", "Stick"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let mut catalog = DeviceCatalog::new();
        assert!(matches!(
            catalog.load_dir("/definitely/not/here"),
            Err(DefinitionError::Io(_))
        ));
    }
}
