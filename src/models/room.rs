use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::AppResult;

/// Amenities a listing can advertise, keyed by their catalogue id.
pub const FEATURES: &[(i32, &str)] = &[
    (3, "WiFi incluido"),
    (4, "Agua"),
    (5, "Gas"),
    (6, "Calentador solar"),
    (7, "Aire acondicionado"),
    (8, "Sala de estar"),
    (9, "Comedor"),
    (10, "Cocina compartida"),
    (11, "Jardín"),
    (12, "Cámaras de seguridad"),
    (13, "Acceso controlado"),
    (14, "Portero"),
    (15, "Baño privado"),
    (16, "Baño compartido"),
    (17, "Escritorio para estudiar"),
    (18, "Armario"),
    (19, "Acceso a lavadora/secadora"),
    (20, "Disponibilidad de estacionamiento"),
];

/// House rules a listing can impose, keyed by their catalogue id.
pub const RULES: &[(i32, &str)] = &[
    (1, "No se permiten fiestas"),
    (2, "Silencio después de las 10 pm"),
    (3, "No se permiten visitas nocturnas"),
    (4, "No fumar dentro de la propiedad"),
    (5, "Mantener la limpieza en áreas comunes"),
    (6, "Respetar las pertenencias ajenas"),
    (7, "No se permiten mascotas sin autorización"),
    (8, "Respetar el horario de llegada establecido"),
    (9, "Informar al propietario sobre cualquier daño en la propiedad"),
    (10, "Prohibido mover muebles sin autorización"),
    (11, "No bloquear salidas de emergencia"),
    (12, "Lavar los utensilios de cocina después de usarlos"),
    (13, "Prohibido alterar el WiFi o la electricidad"),
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub max_people: i32,
    pub min_time: i32,
    pub max_time: i32,
    pub shared: bool,
    pub allow_pets: bool,
    pub feature_ids: Vec<i32>,
    pub rule_ids: Vec<i32>,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "room_status")]
pub enum RoomStatus {
    #[sqlx(rename = "Publicada")]
    #[serde(rename = "Publicada")]
    Published,
    #[sqlx(rename = "Pausada")]
    #[serde(rename = "Pausada")]
    Paused,
    #[sqlx(rename = "Ocupada")]
    #[serde(rename = "Ocupada")]
    Occupied,
}

impl Default for RoomStatus {
    fn default() -> Self {
        Self::Published
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "media_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoomMedia {
    pub id: Uuid,
    pub room_id: Uuid,
    pub url: String,
    pub kind: MediaKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomWithMedia {
    #[serde(flatten)]
    pub room: Room,
    pub media: Vec<RoomMedia>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Location {
    pub address: String,
    #[validate(range(min = -90.0, max = 90.0, message = "Coordenadas inválidas"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Coordenadas inválidas"))]
    pub longitude: f64,
}

/// Listing fields as submitted by the create and edit forms.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "check_stay", skip_on_field_errors = false))]
pub struct RoomInput {
    #[validate(length(min = 1, message = "El título es obligatorio"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(exclusive_min = 0.0, message = "El precio debe ser mayor a 0"))]
    pub price: f64,
    #[validate(nested)]
    pub location: Location,
    #[validate(range(min = 1, message = "La capacidad debe ser al menos 1"))]
    pub max_people: i32,
    pub min_time: i32,
    pub max_time: i32,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub allow_pets: bool,
    #[serde(default)]
    #[validate(custom(function = "known_features"))]
    pub feature_ids: Vec<i32>,
    #[serde(default)]
    #[validate(custom(function = "known_rules"))]
    pub rule_ids: Vec<i32>,
}

impl RoomInput {
    /// Trims the text fields, checks the form rules and sorts and
    /// deduplicates the catalogue ids.
    pub fn into_validated(mut self) -> AppResult<Self> {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        self.location.address = self.location.address.trim().to_string();

        self.validate()?;

        self.feature_ids = dedup(self.feature_ids);
        self.rule_ids = dedup(self.rule_ids);
        Ok(self)
    }
}

fn check_stay(input: &RoomInput) -> Result<(), ValidationError> {
    if input.min_time < 1 || input.min_time > input.max_time {
        return Err(ValidationError::new("stay").with_message(
            "El tiempo mínimo debe ser al menos 1 y no superar el máximo".into(),
        ));
    }
    Ok(())
}

fn unknown_id(ids: &[i32], catalogue: &[(i32, &str)], label: &str) -> Result<(), ValidationError> {
    match ids
        .iter()
        .find(|id| !catalogue.iter().any(|(known, _)| known == *id))
    {
        Some(unknown) => Err(ValidationError::new("catalogue")
            .with_message(format!("{} {} no existe", label, unknown).into())),
        None => Ok(()),
    }
}

fn known_features(ids: &[i32]) -> Result<(), ValidationError> {
    unknown_id(ids, FEATURES, "El servicio")
}

fn known_rules(ids: &[i32]) -> Result<(), ValidationError> {
    unknown_id(ids, RULES, "La regla")
}

fn dedup(ids: Vec<i32>) -> Vec<i32> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub id: i32,
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomCatalog {
    pub features: Vec<CatalogEntry>,
    pub rules: Vec<CatalogEntry>,
}

impl RoomCatalog {
    pub fn load() -> Self {
        let entries = |list: &[(i32, &'static str)]| -> Vec<CatalogEntry> {
            list.iter()
                .map(|&(id, label)| CatalogEntry { id, label })
                .collect()
        };
        Self {
            features: entries(FEATURES),
            rules: entries(RULES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn input() -> RoomInput {
        RoomInput {
            title: "  Cuarto cerca de la UNI ".to_string(),
            description: "Luminoso".to_string(),
            price: 3200.0,
            location: Location {
                address: "Av. Universidad 100".to_string(),
                latitude: 19.33,
                longitude: -99.18,
            },
            max_people: 2,
            min_time: 3,
            max_time: 12,
            shared: false,
            allow_pets: true,
            feature_ids: vec![7, 3, 3],
            rule_ids: vec![4],
        }
    }

    #[test]
    fn valid_listing_is_normalised() {
        let room = input().into_validated().unwrap();
        assert_eq!(room.title, "Cuarto cerca de la UNI");
        assert_eq!(room.feature_ids, vec![3, 7]);
    }

    #[test]
    fn min_time_above_max_time_is_rejected() {
        let mut room = input();
        room.min_time = 13;
        assert!(matches!(room.into_validated(), Err(AppError::Validation(_))));
    }

    #[test]
    fn unknown_feature_is_rejected() {
        let mut room = input();
        room.feature_ids = vec![3, 99];
        let err = room.into_validated().unwrap_err();
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let mut room = input();
        room.price = 0.0;
        assert!(room.into_validated().is_err());
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let mut room = input();
        room.location.latitude = 120.0;
        assert!(room.into_validated().is_err());
    }

    #[test]
    fn status_uses_dashboard_labels() {
        assert_eq!(
            serde_json::to_string(&RoomStatus::Occupied).unwrap(),
            "\"Ocupada\""
        );
        let parsed: RoomStatus = serde_json::from_str("\"Pausada\"").unwrap();
        assert_eq!(parsed, RoomStatus::Paused);
    }

    #[test]
    fn catalogue_lists_every_entry() {
        let catalog = RoomCatalog::load();
        assert_eq!(catalog.features.len(), FEATURES.len());
        assert_eq!(catalog.rules.len(), RULES.len());
    }

    #[test]
    fn rule_messages_come_through_as_validation_errors() {
        let mut room = input();
        room.title = "   ".to_string();
        assert_eq!(
            room.into_validated().unwrap_err().to_string(),
            "Validation error: El título es obligatorio"
        );

        let mut room = input();
        room.rule_ids = vec![14];
        assert_eq!(
            room.into_validated().unwrap_err().to_string(),
            "Validation error: La regla 14 no existe"
        );

        let mut room = input();
        room.max_people = 0;
        assert!(matches!(room.into_validated(), Err(AppError::Validation(_))));
    }
}
