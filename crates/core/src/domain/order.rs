use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl Address {
    /// Comma-joined single line, skipping blank parts.
    pub fn single_line(&self) -> String {
        [
            Some(self.street.as_str()),
            self.street2.as_deref(),
            Some(self.city.as_str()),
            Some(self.state.as_str()),
            Some(self.zip_code.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }

    fn set(&mut self, field: AddressField, value: String) {
        match field {
            AddressField::Street => self.street = value,
            AddressField::Street2 => {
                self.street2 = if value.trim().is_empty() { None } else { Some(value) };
            }
            AddressField::City => self.city = value,
            AddressField::State => self.state = value,
            AddressField::ZipCode => self.zip_code = value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    Street,
    Street2,
    City,
    State,
    ZipCode,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccupancyStatus {
    #[default]
    Vacant,
    Occupied,
    #[serde(rename = "Tenant Occupied")]
    TenantOccupied,
}

impl OccupancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vacant => "Vacant",
            Self::Occupied => "Occupied",
            Self::TenantOccupied => "Tenant Occupied",
        }
    }
}

impl fmt::Display for OccupancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OccupancyStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "vacant" => Ok(Self::Vacant),
            "occupied" => Ok(Self::Occupied),
            "tenant occupied" => Ok(Self::TenantOccupied),
            other => Err(DomainError::InvalidInput(format!(
                "unknown occupancy status `{other}` (expected vacant|occupied|tenant-occupied)"
            ))),
        }
    }
}

/// Non-address form edits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    OccupancyStatus(OccupancyStatus),
    PreferredDate(Option<NaiveDate>),
    Notes(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFormData {
    pub address: Address,
    pub occupancy_status: OccupancyStatus,
    pub preferred_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl OrderFormData {
    pub fn set_address_field(&mut self, field: AddressField, value: impl Into<String>) {
        self.address.set(field, value.into());
    }

    pub fn set_field(&mut self, field: FormField) {
        match field {
            FormField::OccupancyStatus(status) => self.occupancy_status = status,
            FormField::PreferredDate(date) => self.preferred_date = date,
            FormField::Notes(notes) => {
                self.notes = if notes.trim().is_empty() { None } else { Some(notes) };
            }
        }
    }

    /// Notes to submit, falling back to `placeholder` when nothing was entered.
    pub fn notes_or<'a>(&'a self, placeholder: &'a str) -> &'a str {
        self.notes.as_deref().map(str::trim).filter(|notes| !notes.is_empty()).unwrap_or(placeholder)
    }
}
