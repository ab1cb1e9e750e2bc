#![allow(dead_code)]

use mealpay::domain::auth::{User, UserMetadata};
use mealpay::domain::order::{DeliveryAddress, OrderDraft, Package};
use mealpay::domain::payment::CardDetails;
use mealpay::domain::meal::Meal;
use rust_decimal::Decimal;
use serde_json::{Map, Value, json};
use std::io::Write;
use tempfile::NamedTempFile;

pub fn user() -> User {
    User {
        id: "user-1".into(),
        email: Some("ana@example.com".into()),
        confirmed_at: None,
        user_metadata: UserMetadata {
            display_name: Some("Ana Pérez".into()),
            phone: None,
        },
    }
}

pub fn card() -> CardDetails {
    CardDetails {
        card_number: "4111111111111111".into(),
        expiry_date: "12/30".into(),
        cvv: "123".into(),
    }
}

pub fn draft(amount: Decimal) -> OrderDraft {
    OrderDraft {
        user_id: "user-1".into(),
        package: Package {
            id: "pkg-week".into(),
            name: "Semanal".into(),
            price: Some(amount),
            extra: Map::new(),
        },
        meals: vec![Meal {
            id: "m1".into(),
            name: "Ropa vieja".into(),
            description: String::new(),
            image: String::new(),
            ingredients: Vec::new(),
            allergens: Vec::new(),
            chef_note: String::new(),
        }],
        delivery_address: DeliveryAddress {
            id: "addr-1".into(),
            ..Default::default()
        },
        personal_note: String::new(),
        amount,
        currency: "EUR".into(),
    }
}

pub fn summary_with_meals(meals: Value) -> Value {
    json!({
        "package": { "id": "pkg-week", "name": "Semanal", "price": 49.5 },
        "selectedMeals": meals,
        "deliveryAddress": { "id": "addr-1", "address": "Calle 23" }
    })
}

pub fn json_file(value: &Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{value}").unwrap();
    file
}
