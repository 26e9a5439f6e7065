use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sink::{RATIO_SUFFIX, SUMMARY_FIXED_COLUMNS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabel {
    pub id: u16,
    pub name: String,
}

/// Ordered mapping from label value to class name.
///
/// Insertion order is the column order of the summary table and is kept
/// through serialization, which is why this is a validated list and not a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ClassLabel>", into = "Vec<ClassLabel>")]
pub struct ClassLabelMap {
    entries: Vec<ClassLabel>,
}

impl ClassLabelMap {
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = (u16, S)>) -> Result<Self> {
        let entries = entries
            .into_iter()
            .map(|(id, name)| ClassLabel {
                id,
                name: name.into(),
            })
            .collect::<Vec<_>>();

        Self::try_from(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassLabel> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: u16) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn name(&self, id: u16) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.name.as_str())
    }
}

impl Default for ClassLabelMap {
    fn default() -> Self {
        Self {
            entries: vec![
                ClassLabel {
                    id: 1,
                    name: "Empty".to_string(),
                },
                ClassLabel {
                    id: 2,
                    name: "Loaded".to_string(),
                },
            ],
        }
    }
}

impl TryFrom<Vec<ClassLabel>> for ClassLabelMap {
    type Error = Error;

    fn try_from(entries: Vec<ClassLabel>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::Config("class map must not be empty".to_string()));
        }

        for (idx, entry) in entries.iter().enumerate() {
            if entry.id == 0 {
                return Err(Error::Config(format!(
                    "class {:?} uses the background value 0",
                    entry.name
                )));
            }
            if entries[..idx].iter().any(|prev| prev.id == entry.id) {
                return Err(Error::Config(format!("duplicate class id {}", entry.id)));
            }
            check_name(&entries, idx)?;
        }

        Ok(Self { entries })
    }
}

/// Class names become summary columns and must stay distinct from every
/// fixed column and ratio column.
fn check_name(entries: &[ClassLabel], idx: usize) -> Result<()> {
    let name = entries[idx].name.as_str();
    if name.trim().is_empty() {
        return Err(Error::Config(format!(
            "class {} needs a name",
            entries[idx].id
        )));
    }
    if SUMMARY_FIXED_COLUMNS.contains(&name) {
        return Err(Error::Config(format!(
            "class name {:?} is a reserved summary column",
            name
        )));
    }
    if entries[..idx].iter().any(|prev| prev.name == name) {
        return Err(Error::Config(format!("duplicate class name {:?}", name)));
    }
    let ratio_clash = entries.iter().enumerate().any(|(other, entry)| {
        other != idx
            && name
                .strip_suffix(RATIO_SUFFIX)
                .is_some_and(|stem| stem == entry.name)
    });
    if ratio_clash {
        return Err(Error::Config(format!(
            "class name {:?} collides with a ratio column",
            name
        )));
    }
    Ok(())
}

impl From<ClassLabelMap> for Vec<ClassLabel> {
    fn from(map: ClassLabelMap) -> Self {
        map.entries
    }
}
