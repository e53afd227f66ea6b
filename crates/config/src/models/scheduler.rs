use crate::validation::{ConfigValidator, ValidationUtils};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use taskgate_domain::{GeoPoint, NamedAreas};

/// Which scheduling policy this deployment runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Tasks stay scheduled and are re-checked on every tick.
    Periodic,
    /// Tasks run once on arrival and are then forgotten.
    Immediate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub policy: PolicyKind,
    pub task_check_interval_seconds: u64,
    pub default_geofence_radius_km: f64,
    /// `lat,lng` used as the current position during ticks.
    #[serde(default)]
    pub reference_position: Option<String>,
    #[serde(default)]
    pub areas: Vec<AreaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AreaConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Periodic,
            task_check_interval_seconds: 60,
            default_geofence_radius_km: 10.0,
            reference_position: None,
            areas: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn reference_point(&self) -> ConfigResult<Option<GeoPoint>> {
        self.reference_position
            .as_deref()
            .map(|value| {
                value.parse::<GeoPoint>().map_err(|e| {
                    ConfigError::Validation(format!("scheduler.reference_position: {e}"))
                })
            })
            .transpose()
    }

    pub fn named_areas(&self) -> NamedAreas {
        let mut areas = NamedAreas::new();
        for area in &self.areas {
            areas.insert(
                area.name.clone(),
                GeoPoint::new(area.latitude, area.longitude),
                area.radius_km,
            );
        }
        areas
    }
}

impl ConfigValidator for SchedulerConfig {
    fn validate(&self) -> ConfigResult<()> {
        ValidationUtils::validate_timeout(
            self.task_check_interval_seconds,
            "scheduler.task_check_interval_seconds",
        )?;
        ValidationUtils::validate_positive(
            self.default_geofence_radius_km,
            "scheduler.default_geofence_radius_km",
        )?;
        self.reference_point()?;

        for area in &self.areas {
            ValidationUtils::validate_not_empty(&area.name, "scheduler.areas.name")?;
            ValidationUtils::validate_positive(
                area.radius_km,
                &format!("scheduler.areas.{}.radius_km", area.name),
            )?;
        }
        Ok(())
    }
}
