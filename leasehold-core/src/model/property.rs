//! Properties

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Variant;
use crate::pagination::PageRequest;
use crate::patch::Patch;
use crate::validation::{Validate, ValidationErrors};

const MAX_NAME_LEN: usize = 200;
const MAX_ADDRESS_LEN: usize = 500;
const MAX_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Apartment,
    House,
    Condo,
    Commercial,
}

impl Variant for PropertyKind {
    const ALL: &'static [Self] = &[Self::Apartment, Self::House, Self::Condo, Self::Commercial];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Apartment => "apartment",
            Self::House => "house",
            Self::Condo => "condo",
            Self::Commercial => "commercial",
        }
    }
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub address: String,
    pub kind: PropertyKind,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn apply(&mut self, update: PropertyUpdate) {
        update.owner_id.apply_to_option(&mut self.owner_id);
        update.name.apply_to(&mut self.name);
        update.address.apply_to(&mut self.address);
        update.kind.apply_to(&mut self.kind);
        update.description.apply_to_option(&mut self.description);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProperty {
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub address: String,
    pub kind: PropertyKind,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyUpdate {
    pub owner_id: Patch<Uuid>,
    pub name: Patch<String>,
    pub address: Patch<String>,
    pub kind: Patch<PropertyKind>,
    pub description: Patch<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFilter {
    pub owner_id: Option<Uuid>,
    pub kind: Option<PropertyKind>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePropertyRequest {
    pub owner_id: Option<Uuid>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
}

impl Validate for CreatePropertyRequest {
    type Valid = NewProperty;

    fn validate(self) -> Result<NewProperty, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = errors.text("name", self.name, 1, MAX_NAME_LEN);
        let address = errors.text("address", self.address, 1, MAX_ADDRESS_LEN);
        let kind = errors.variant::<PropertyKind>("kind", self.kind);
        let description = errors.optional_text("description", self.description, MAX_DESCRIPTION_LEN);

        match (name, address, kind, description) {
            (Some(name), Some(address), Some(kind), Some(description)) => Ok(NewProperty {
                owner_id: self.owner_id,
                name,
                address,
                kind,
                description,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePropertyRequest {
    #[serde(default)]
    pub owner_id: Patch<Uuid>,
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub address: Patch<String>,
    #[serde(default)]
    pub kind: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
}

impl Validate for UpdatePropertyRequest {
    type Valid = PropertyUpdate;

    fn validate(self) -> Result<PropertyUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = errors.patch_text("name", self.name, 1, MAX_NAME_LEN);
        let address = errors.patch_text("address", self.address, 1, MAX_ADDRESS_LEN);
        let kind = errors.patch_variant::<PropertyKind>("kind", self.kind);
        let description =
            errors.nullable_patch_text("description", self.description, MAX_DESCRIPTION_LEN);

        match (name, address, kind, description) {
            (Some(name), Some(address), Some(kind), Some(description)) => Ok(PropertyUpdate {
                owner_id: self.owner_id,
                name,
                address,
                kind,
                description,
            }),
            _ => Err(errors),
        }
    }
}

/// Query string for `GET /properties`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyListQuery {
    pub owner_id: Option<Uuid>,
    pub kind: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

impl Validate for PropertyListQuery {
    type Valid = (PropertyFilter, PageRequest);

    fn validate(self) -> Result<Self::Valid, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let kind = errors.optional_variant::<PropertyKind>("kind", self.kind);
        let page = PageRequest::from_query(self.limit, self.offset);

        match kind {
            Some(kind) => Ok((
                PropertyFilter {
                    owner_id: self.owner_id,
                    kind,
                },
                page,
            )),
            None => Err(errors),
        }
    }
}
