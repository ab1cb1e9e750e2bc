use crate::error::{PaymentError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A meal exactly as it is stored on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(default)]
    pub chef_note: String,
}

/// Loosely-typed meal fields as they arrive from the client.
///
/// Only string identifiers are kept; any other JSON type for `id` is treated
/// as missing so validation can reject it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MealRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub ingredients: Vec<String>,
    pub allergens: Vec<String>,
    pub chef_note: Option<String>,
}

impl MealRecord {
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            id: map.get("id").and_then(Value::as_str).map(str::to_owned),
            name: text(map, "name"),
            description: text(map, "description"),
            image: text(map, "image"),
            ingredients: list(map, "ingredients"),
            allergens: list(map, "allergens"),
            chef_note: text(map, "chefNote"),
        }
    }
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}

/// One entry of a checkout's meal selection.
///
/// Carts produce either `{ "meal": { .. }, .. }` wrappers or bare meal
/// records; both are decoded here so nothing downstream has to probe shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum MealSelection {
    Nested(MealRecord),
    Flat(MealRecord),
    Invalid(Value),
}

impl MealSelection {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => match map.get("meal") {
                Some(Value::Object(inner)) => MealSelection::Nested(MealRecord::from_map(inner)),
                _ => MealSelection::Flat(MealRecord::from_map(&map)),
            },
            other => MealSelection::Invalid(other),
        }
    }

    fn record(&self) -> Option<&MealRecord> {
        match self {
            MealSelection::Nested(record) | MealSelection::Flat(record) => Some(record),
            MealSelection::Invalid(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for MealSelection {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(MealSelection::from_value)
    }
}

/// Normalizes a meal selection into the canonical shape stored on orders.
///
/// Fails on the first entry without a usable identifier; nothing is returned
/// for a partially valid list.
pub fn prepare_meals(selections: &[MealSelection]) -> Result<Vec<Meal>> {
    let mut meals = Vec::with_capacity(selections.len());

    for (position, selection) in selections.iter().enumerate() {
        let record = selection.record().ok_or_else(|| {
            tracing::error!(position, "meal entry is not an object");
            PaymentError::ValidationError(format!(
                "meal at position {position} is not a valid object"
            ))
        })?;

        let id = record
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                tracing::error!(position, ?record, "meal entry has no valid id");
                let label = match &record.name {
                    Some(name) => format!("meal \"{name}\""),
                    None => format!("meal at position {position}"),
                };
                PaymentError::ValidationError(format!("{label} has no valid id"))
            })?;

        meals.push(Meal {
            id: id.to_owned(),
            name: record
                .name
                .clone()
                .unwrap_or_else(|| format!("Meal {}", position + 1)),
            description: record.description.clone().unwrap_or_default(),
            image: record.image.clone().unwrap_or_default(),
            ingredients: record.ingredients.clone(),
            allergens: record.allergens.clone(),
            chef_note: record.chef_note.clone().unwrap_or_default(),
        });
    }

    tracing::debug!(count = meals.len(), "validated meal selection");
    Ok(meals)
}
