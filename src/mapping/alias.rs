//! Symbolic input names
//!
//! Every alias is bound to an `InputId` when the table is built. The input
//! kind comes from the name prefix, so `BUTTON_A` can never be used where
//! an axis is expected.

use crate::mapping::error::LoadError;
use crate::mapping::input::InputKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const BUTTON_PREFIX: &str = "BUTTON_";
pub const AXIS_PREFIX: &str = "AXIS_";
pub const HAT_PREFIX: &str = "HAT_";

/// Aliases used when the configuration carries no `constants` section
pub const DEFAULT_CONSTANTS: &[(&str, u32)] = &[
    ("BUTTON_A", 0),
    ("BUTTON_B", 1),
    ("BUTTON_X", 2),
    ("BUTTON_Y", 3),
    ("BUTTON_LB", 4),
    ("BUTTON_RB", 5),
    ("BUTTON_BACK", 6),
    ("BUTTON_START", 7),
    ("BUTTON_XBOX", 8),
    ("BUTTON_LTHUMB", 9),
    ("BUTTON_RTHUMB", 10),
    ("HAT_DPAD", 0),
    ("AXIS_LTHUMBX", 0),
    ("AXIS_LTHUMBY", 1),
    ("AXIS_RTHUMBX", 2),
    ("AXIS_RTHUMBY", 3),
    ("AXIS_RTRIGGER", 4),
    ("AXIS_LTRIGGER", 5),
];

/// A resolved logical input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputId {
    pub kind: InputKind,
    pub index: u32,
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.index)
    }
}

/// Reference to an input as written in configuration: an alias or a raw index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputRef {
    Index(u32),
    Alias(String),
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRef::Index(index) => write!(f, "{}", index),
            InputRef::Alias(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for InputRef {
    fn from(name: &str) -> Self {
        InputRef::Alias(name.to_string())
    }
}

impl From<u32> for InputRef {
    fn from(index: u32) -> Self {
        InputRef::Index(index)
    }
}

/// Infers the input kind from an alias prefix
pub fn kind_of_alias(name: &str) -> Result<InputKind, LoadError> {
    if name.starts_with(BUTTON_PREFIX) {
        Ok(InputKind::Button)
    } else if name.starts_with(AXIS_PREFIX) {
        Ok(InputKind::Axis)
    } else if name.starts_with(HAT_PREFIX) {
        Ok(InputKind::Hat)
    } else {
        Err(LoadError::UnknownAliasKind(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasTable {
    entries: BTreeMap<String, InputId>,
}

impl AliasTable {
    /// Builds a table from (name, index) pairs, rejecting duplicate names
    pub fn from_entries<I, S>(entries: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut table = BTreeMap::new();
        for (name, index) in entries {
            let name = name.into();
            let kind = kind_of_alias(&name)?;
            if table.contains_key(&name) {
                return Err(LoadError::DuplicateAlias(name));
            }
            table.insert(name, InputId { kind, index });
        }
        Ok(Self { entries: table })
    }

    pub fn with_defaults() -> Self {
        let entries = DEFAULT_CONSTANTS
            .iter()
            .map(|(name, index)| {
                (
                    name.to_string(),
                    InputId {
                        kind: kind_of_alias(name).unwrap_or(InputKind::Button),
                        index: *index,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, name: &str) -> Option<InputId> {
        self.entries.get(name).copied()
    }

    /// Resolves a reference to an index of the expected kind
    pub fn resolve(&self, reference: &InputRef, expected: InputKind) -> Result<u32, LoadError> {
        match reference {
            InputRef::Index(index) => Ok(*index),
            InputRef::Alias(name) => {
                let id = self
                    .lookup(name)
                    .ok_or_else(|| LoadError::UndefinedAlias(name.clone()))?;
                if id.kind != expected {
                    return Err(LoadError::AliasKindMismatch {
                        alias: name.clone(),
                        expected,
                        found: id.kind,
                    });
                }
                Ok(id.index)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, InputId)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
