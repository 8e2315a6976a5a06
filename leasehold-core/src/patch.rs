//! Tri-state field for partial updates.
//!
//! JSON bodies distinguish three cases per field:
//! - absent: `Patch::Missing` (leave the stored value untouched)
//! - `null`: `Patch::Null` (clear the value, or reject for required fields)
//! - a value: `Patch::Value(v)` (overwrite)
//!
//! Fields must be annotated with `#[serde(default)]` so absence maps to `Missing`.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Missing,
    Null,
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
        match self {
            Self::Missing => Patch::Missing,
            Self::Null => Patch::Null,
            Self::Value(v) => Patch::Value(f(v)),
        }
    }

    /// Apply to a required field. `Null` leaves it untouched; callers reject
    /// `Null` for required fields before getting here.
    pub fn apply_to(self, target: &mut T) {
        if let Self::Value(v) = self {
            *target = v;
        }
    }

    /// Apply to an optional field: `Null` clears it.
    pub fn apply_to_option(self, target: &mut Option<T>) {
        match self {
            Self::Missing => {}
            Self::Null => *target = None,
            Self::Value(v) => *target = Some(v),
        }
    }

    /// Value the field would have after applying this patch to `current`.
    pub fn resolve(&self, current: Option<T>) -> Option<T>
    where
        T: Clone,
    {
        match self {
            Self::Missing => current,
            Self::Null => None,
            Self::Value(v) => Some(v.clone()),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Null,
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}
