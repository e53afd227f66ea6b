use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// 触发器的重复触发间隔
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Interval {
    /// 两次触发之间的秒数，`None` 表示不做间隔限制
    pub interval_seconds: Option<u64>,
    pub last_triggered: Option<DateTime<Utc>>,
}

impl Interval {
    pub fn new(interval_seconds: u64) -> Self {
        Self {
            interval_seconds: Some(interval_seconds),
            last_triggered: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let Some(seconds) = self.interval_seconds else {
            return true;
        };
        match self.last_triggered {
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(last).num_seconds();
                elapsed >= i64::try_from(seconds).unwrap_or(i64::MAX)
            }
        }
    }

    fn mark_triggered(&mut self, now: DateTime<Utc>) {
        self.last_triggered = Some(now);
    }
}

/// 有效时间窗口（闭区间），缺少的一端视为不限
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidFromTo {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ValidFromTo {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| from <= now) && self.to.map_or(true, |to| now <= to)
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.to.is_some_and(|to| to < now)
    }
}

/// 已解析的地理围栏：中心点和半径
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoFence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl GeoFence {
    pub fn new(center: GeoPoint, radius_km: f64) -> Self {
        Self {
            name: None,
            center,
            radius_km,
        }
    }

    pub fn named<S: Into<String>>(name: S, center: GeoPoint, radius_km: f64) -> Self {
        Self {
            name: Some(name.into()),
            center,
            radius_km,
        }
    }

    pub fn contains(&self, position: &GeoPoint) -> bool {
        self.center.distance_km(position) <= self.radius_km
    }
}

/// 将命名区域解析为几何范围，区域目录由外部提供
pub trait AreaResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<GeoFence>;
}

/// 单个任务在单个后端上的触发条件组合，各子条件均可选，缺少的子条件不做限制
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Trigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<GeoFence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from_to: Option<ValidFromTo>,
}

impl Trigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_area(mut self, area: GeoFence) -> Self {
        self.area = Some(area);
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_valid_from_to(mut self, valid_from_to: ValidFromTo) -> Self {
        self.valid_from_to = Some(valid_from_to);
        self
    }

    /// 只读检查，不修改 `last_triggered`
    pub fn check(&self, now: DateTime<Utc>, position: Option<&GeoPoint>) -> bool {
        if let Some(window) = &self.valid_from_to {
            if !window.contains(now) {
                return false;
            }
        }
        if let (Some(area), Some(position)) = (&self.area, position) {
            if !area.contains(position) {
                return false;
            }
        }
        match &self.interval {
            Some(interval) => interval.is_due(now),
            None => true,
        }
    }

    /// 检查触发条件，满足时将 `now` 记为最近一次触发时间
    pub fn is_satisfied(&mut self, now: DateTime<Utc>, position: Option<&GeoPoint>) -> bool {
        if !self.check(now, position) {
            return false;
        }
        self.commit(now);
        true
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_from_to.is_some_and(|window| window.has_ended(now))
    }

    fn commit(&mut self, now: DateTime<Utc>) {
        if let Some(interval) = &mut self.interval {
            interval.mark_triggered(now);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    Fire,
    Wait,
    /// 有效期已结束，任务不会再触发
    Expired,
}

/// 任务的全部触发器，所有触发器都满足时才触发，空集合总是触发
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TriggerSet {
    pub triggers: Vec<Trigger>,
}

impl TriggerSet {
    pub fn new(triggers: Vec<Trigger>) -> Self {
        Self { triggers }
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// 至少一个触发器设置了间隔时才会重复触发，否则首次触发后即完成
    pub fn is_recurring(&self) -> bool {
        self.triggers
            .iter()
            .any(|t| t.interval.as_ref().is_some_and(|i| i.interval_seconds.is_some()))
    }

    pub fn peek(&self, now: DateTime<Utc>, position: Option<&GeoPoint>) -> TriggerDecision {
        if self.triggers.iter().any(|t| t.has_expired(now)) {
            return TriggerDecision::Expired;
        }
        if self.triggers.iter().all(|t| t.check(now, position)) {
            TriggerDecision::Fire
        } else {
            TriggerDecision::Wait
        }
    }

    /// 与 [`peek`](Self::peek) 相同，但在 `Fire` 时提交所有触发器的间隔时钟，
    /// 未触发时不做修改
    pub fn evaluate(&mut self, now: DateTime<Utc>, position: Option<&GeoPoint>) -> TriggerDecision {
        let decision = self.peek(now, position);
        if decision == TriggerDecision::Fire {
            for trigger in &mut self.triggers {
                trigger.commit(now);
            }
        }
        decision
    }
}
