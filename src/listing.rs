use indexmap::IndexMap;

use crate::{
    CamResult,
    consts::PATH_SEPARATOR,
    driver::{Driver, NativeList},
    result::Translate,
};

/// Decoded folder or file listing.
///
/// Entries keep the order in which the driver first reported them. A name
/// reported twice keeps its first position and takes the later value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    entries: IndexMap<String, String>,
}

impl Listing {
    /// Decodes a native list. Missing values decode as empty strings.
    ///
    /// * `driver` - Translates failures of the list accessors.
    pub fn decode(list: &NativeList, driver: &dyn Driver) -> CamResult<Self> {
        let mut entries = IndexMap::with_capacity(list.count());

        for index in 0..list.count() {
            let name = list.name(index).translate(driver)?;
            let value = list.value(index).translate(driver)?.unwrap_or_default();

            entries.insert(name.to_owned(), value.to_owned());
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entry names in first-seen order.
    pub fn into_names(self) -> Vec<String> {
        self.entries.into_keys().collect()
    }
}

/// Ensures `path` ends with exactly one separator. Empty paths become the root.
pub(crate) fn with_trailing_separator(path: &str) -> String {
    let trimmed = path.trim_end_matches(PATH_SEPARATOR);
    let mut out = String::with_capacity(trimmed.len() + 1);
    out.push_str(trimmed);
    out.push(PATH_SEPARATOR);
    out
}

/// Joins a folder and an entry name with a single separator.
pub(crate) fn join(folder: &str, name: &str) -> String {
    let mut out = with_trailing_separator(folder);
    out.push_str(name.trim_start_matches(PATH_SEPARATOR));
    out
}
