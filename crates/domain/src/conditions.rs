//! 将任务的原始触发条件转换为 [`Trigger`]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use taskgate_errors::{SchedulerError, SchedulerResult};
use tracing::debug;

use crate::entities::Condition;
use crate::geo::GeoPoint;
use crate::triggers::{AreaResolver, GeoFence, Interval, Trigger, TriggerSet, ValidFromTo};

pub const CONDITION_KEY_TIME_INTERVAL: &str = "time/interval";
pub const CONDITION_KEY_TIME_PERIOD: &str = "time/validFromToRange";
pub const CONDITION_KEY_LOCATION_POINT: &str = "location/point";
pub const CONDITION_KEY_LOCATION_AREA: &str = "location/area";

const PERIOD_SEPARATOR: char = '/';

/// 基于映射表的区域目录，例如从配置加载
#[derive(Debug, Clone, Default)]
pub struct NamedAreas {
    areas: HashMap<String, GeoFence>,
}

impl NamedAreas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, center: GeoPoint, radius_km: f64) {
        let name = name.into();
        self.areas
            .insert(name.clone(), GeoFence::named(name, center, radius_km));
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

impl AreaResolver for NamedAreas {
    fn resolve(&self, name: &str) -> Option<GeoFence> {
        self.areas.get(name).cloned()
    }
}

#[derive(Clone)]
pub struct ConditionParser {
    default_radius_km: f64,
    areas: Option<Arc<dyn AreaResolver>>,
}

impl ConditionParser {
    pub fn new(default_radius_km: f64) -> Self {
        Self {
            default_radius_km,
            areas: None,
        }
    }

    pub fn with_areas(mut self, areas: Arc<dyn AreaResolver>) -> Self {
        self.areas = Some(areas);
        self
    }

    pub fn parse_all(&self, conditions: &[Condition]) -> SchedulerResult<TriggerSet> {
        conditions
            .iter()
            .map(|condition| self.parse(condition))
            .collect::<SchedulerResult<Vec<_>>>()
            .map(TriggerSet::new)
    }

    /// 同时带有 `location/point` 和 `location/area` 时以前者为准
    pub fn parse(&self, condition: &Condition) -> SchedulerResult<Trigger> {
        let mut trigger = Trigger::new();
        let mut point_fence = None;
        let mut named_fence = None;

        for (key, value) in &condition.entries {
            match key.as_str() {
                CONDITION_KEY_TIME_INTERVAL => {
                    trigger.interval = Some(parse_interval(value)?);
                }
                CONDITION_KEY_TIME_PERIOD => {
                    trigger.valid_from_to = Some(parse_period(value)?);
                }
                CONDITION_KEY_LOCATION_POINT => {
                    point_fence = Some(self.parse_point(value)?);
                }
                CONDITION_KEY_LOCATION_AREA => {
                    named_fence = Some(self.resolve_area(value)?);
                }
                _ => debug!("忽略未知的触发条件: {}", key),
            }
        }

        trigger.area = point_fence.or(named_fence);
        Ok(trigger)
    }

    fn parse_point(&self, value: &str) -> SchedulerResult<GeoFence> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [_, _] => Ok(GeoFence::new(value.parse()?, self.default_radius_km)),
            [lat, lon, radius] => {
                let center: GeoPoint = format!("{lat},{lon}").parse()?;
                let radius_km = radius
                    .parse::<f64>()
                    .ok()
                    .filter(|r| r.is_finite() && *r > 0.0)
                    .ok_or_else(|| {
                        SchedulerError::invalid_condition(
                            CONDITION_KEY_LOCATION_POINT,
                            value,
                            "半径必须是正数",
                        )
                    })?;
                Ok(GeoFence::new(center, radius_km))
            }
            _ => Err(SchedulerError::invalid_condition(
                CONDITION_KEY_LOCATION_POINT,
                value,
                "坐标格式应为 lat,lng[,radius_km]",
            )),
        }
    }

    fn resolve_area(&self, value: &str) -> SchedulerResult<GeoFence> {
        let name = value.trim();
        self.areas
            .as_ref()
            .and_then(|areas| areas.resolve(name))
            .ok_or_else(|| {
                SchedulerError::invalid_condition(CONDITION_KEY_LOCATION_AREA, value, "未知的区域")
            })
    }
}

fn parse_interval(value: &str) -> SchedulerResult<Interval> {
    value
        .trim()
        .parse::<u64>()
        .map(Interval::new)
        .map_err(|e| SchedulerError::invalid_condition(CONDITION_KEY_TIME_INTERVAL, value, e.to_string()))
}

fn parse_period(value: &str) -> SchedulerResult<ValidFromTo> {
    let parts: Vec<&str> = value.split(PERIOD_SEPARATOR).map(str::trim).collect();
    let [from, to] = parts.as_slice() else {
        return Err(SchedulerError::invalid_condition(
            CONDITION_KEY_TIME_PERIOD,
            value,
            "时间段格式应为 from/to",
        ));
    };
    Ok(ValidFromTo::new(parse_instant(from, value)?, parse_instant(to, value)?))
}

fn parse_instant(part: &str, value: &str) -> SchedulerResult<Option<DateTime<Utc>>> {
    if part.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(part)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| SchedulerError::invalid_condition(CONDITION_KEY_TIME_PERIOD, value, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parser() -> ConditionParser {
        let mut areas = NamedAreas::new();
        areas.insert("pori", GeoPoint::new(61.4851, 21.7974), 15.0);
        ConditionParser::new(5.0).with_areas(Arc::new(areas))
    }

    #[test]
    fn test_parse_full_condition() {
        let condition = Condition::new()
            .with_entry(CONDITION_KEY_TIME_INTERVAL, "60")
            .with_entry(
                CONDITION_KEY_TIME_PERIOD,
                "2024-01-01T00:00:00Z/2024-12-31T23:59:59+02:00",
            )
            .with_entry(CONDITION_KEY_LOCATION_POINT, "61.4927406,21.8008332");

        let trigger = parser().parse(&condition).unwrap();
        assert_eq!(trigger.interval, Some(Interval::new(60)));

        let window = trigger.valid_from_to.unwrap();
        assert_eq!(window.from, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(window.to, Some(Utc.with_ymd_and_hms(2024, 12, 31, 21, 59, 59).unwrap()));

        let area = trigger.area.unwrap();
        assert_eq!(area.center, GeoPoint::new(61.4927406, 21.8008332));
        assert_eq!(area.radius_km, 5.0);
    }

    #[test]
    fn test_parse_point_with_radius() {
        let condition = Condition::new().with_entry(CONDITION_KEY_LOCATION_POINT, "61.49, 21.80, 2.5");
        let area = parser().parse(&condition).unwrap().area.unwrap();
        assert_eq!(area.radius_km, 2.5);

        let bad = Condition::new().with_entry(CONDITION_KEY_LOCATION_POINT, "61.49,21.80,-1");
        assert!(parser().parse(&bad).is_err());
    }

    #[test]
    fn test_parse_named_area() {
        let condition = Condition::new().with_entry(CONDITION_KEY_LOCATION_AREA, "pori");
        let area = parser().parse(&condition).unwrap().area.unwrap();
        assert_eq!(area.name.as_deref(), Some("pori"));
        assert_eq!(area.radius_km, 15.0);

        let unknown = Condition::new().with_entry(CONDITION_KEY_LOCATION_AREA, "sodankyla");
        assert!(matches!(
            parser().parse(&unknown),
            Err(SchedulerError::InvalidCondition { .. })
        ));

        let no_catalog = ConditionParser::new(1.0);
        assert!(no_catalog.parse(&condition).is_err());
    }

    #[test]
    fn test_open_period_bounds() {
        let condition = Condition::new().with_entry(CONDITION_KEY_TIME_PERIOD, "2024-01-01T00:00:00Z/");
        let window = parser().parse(&condition).unwrap().valid_from_to.unwrap();
        assert!(window.from.is_some());
        assert!(window.to.is_none());
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            (CONDITION_KEY_TIME_INTERVAL, "soon"),
            (CONDITION_KEY_TIME_INTERVAL, "-5"),
            (CONDITION_KEY_TIME_PERIOD, "2024-01-01T00:00:00Z"),
            (CONDITION_KEY_TIME_PERIOD, "yesterday/tomorrow"),
            (CONDITION_KEY_LOCATION_POINT, "61.49"),
        ] {
            let condition = Condition::new().with_entry(key, value);
            assert!(
                matches!(parser().parse(&condition), Err(SchedulerError::InvalidCondition { .. })),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let condition = Condition::new().with_entry("sensor/humidity", "high");
        assert_eq!(parser().parse(&condition).unwrap(), Trigger::new());
    }

    #[test]
    fn test_parse_all() {
        let conditions = vec![
            Condition::new().with_entry(CONDITION_KEY_TIME_INTERVAL, "10"),
            Condition::new().with_entry(CONDITION_KEY_LOCATION_AREA, "pori"),
        ];
        let set = parser().parse_all(&conditions).unwrap();
        assert_eq!(set.len(), 2);
        assert!(parser().parse_all(&[]).unwrap().is_empty());
    }
}
