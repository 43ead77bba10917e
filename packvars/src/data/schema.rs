use serde_json::Value;

use crate::data::descriptor::Descriptor;

/// Page name used when the schema does not name one.
pub const DEFAULT_PAGE_NAME: &str = "Global Variables";

const PAGE_NAME_KEY: &str = "pageName";
const VARIABLES_KEY: &str = "variables";

/// Parsed variable schema.
///
/// Entries keep the order of the source document; that order is the
/// display and serialization order.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Title of the editor page.
    pub page_name: String,
    entries: Vec<(String, Descriptor)>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::empty()
    }
}

impl Schema {
    /// Schema with no variables and the default page name.
    pub fn empty() -> Self {
        Self {
            page_name: DEFAULT_PAGE_NAME.to_string(),
            entries: Vec::new(),
        }
    }

    /// Build a schema from already parsed entries.
    pub fn from_entries(
        page_name: impl Into<String>,
        entries: impl IntoIterator<Item = (String, Descriptor)>,
    ) -> Self {
        let mut schema = Self {
            page_name: page_name.into(),
            entries: Vec::new(),
        };
        for (key, descriptor) in entries {
            schema.insert(key, descriptor);
        }
        schema
    }

    /// Parse a schema document.
    ///
    /// Accepts `{ pageName?, variables: {...} }` as well as the legacy flat
    /// shape where every top-level key other than `pageName` is a variable.
    /// Anything that is not an object yields an empty schema.
    pub fn from_value(value: &Value) -> Self {
        let Some(root) = value.as_object() else {
            return Self::empty();
        };

        let page_name = root
            .get(PAGE_NAME_KEY)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PAGE_NAME)
            .to_string();

        let entries: Vec<(String, Descriptor)> = match root.get(VARIABLES_KEY) {
            Some(Value::Object(vars)) => parse_entries(vars.iter()),
            Some(_) => Vec::new(),
            None => parse_entries(root.iter().filter(|(key, _)| key.as_str() != PAGE_NAME_KEY)),
        };

        Self::from_entries(page_name, entries)
    }

    /// Parse a schema from JSON text.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(s)?;
        Ok(Self::from_value(&value))
    }

    fn insert(&mut self, key: String, descriptor: Descriptor) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = descriptor,
            None => self.entries.push((key, descriptor)),
        }
    }

    /// Descriptor for `key`, including section markers.
    pub fn get(&self, key: &str) -> Option<&Descriptor> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, descriptor)| descriptor)
    }

    /// Descriptor for `key` when it names a variable, never a section.
    pub fn variable(&self, key: &str) -> Option<&Descriptor> {
        self.get(key).filter(|descriptor| !descriptor.is_section())
    }

    /// Whether `key` is described as a section marker.
    pub fn is_section(&self, key: &str) -> bool {
        self.get(key).is_some_and(Descriptor::is_section)
    }

    /// All entries in schema order, sections included.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        self.entries.iter().map(|(k, d)| (k.as_str(), d))
    }

    /// Variable entries in schema order, sections skipped.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        self.entries().filter(|(_, d)| !d.is_section())
    }

    /// Variable keys in schema order.
    pub fn variable_keys(&self) -> impl Iterator<Item = &str> {
        self.variables().map(|(k, _)| k)
    }

    /// Number of entries, sections included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the schema has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entries<'a>(
    iter: impl Iterator<Item = (&'a String, &'a Value)>,
) -> Vec<(String, Descriptor)> {
    iter.map(|(key, value)| (key.clone(), Descriptor::from_value(value)))
        .collect()
}
