use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::{GoalOverride, Month, MonthlyReport, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not reach the data store: {0}")]
    Connection(String),
    #[error("the data store rejected the request: {0}")]
    Rejected(String),
    #[error("unexpected response from the data store: {0}")]
    Decode(String),
}

/// Persistence collaborator holding values, goals and users.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn fetch_unit_data(&self, unit_id: &str) -> Result<UnitData, StoreError>;

    /// One request for every user and every value/goal row.
    async fn fetch_all(&self) -> Result<AdminPayload, StoreError>;

    /// Upserts by (unit, indicator, month).
    async fn save_value(
        &self,
        unit_id: &str,
        indicator_id: &str,
        month: Month,
        value: f64,
    ) -> Result<(), StoreError>;

    async fn save_goals(
        &self,
        unit_id: &str,
        goals: &HashMap<String, f64>,
    ) -> Result<(), StoreError>;

    async fn register_user(
        &self,
        phone: &str,
        unit_id: &str,
        name: &str,
    ) -> Result<User, StoreError>;

    async fn fetch_user(&self, phone: &str) -> Result<Option<User>, StoreError>;

    async fn delete_user(&self, phone: &str) -> Result<(), StoreError>;

    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
}

/// A spreadsheet cell read as a number. Text is parsed; anything that is not a
/// finite non-negative number reads as 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Amount(pub f64);

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Amount(coerce_number(&value)))
    }
}

pub fn coerce_number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => parse_amount(text),
        _ => 0.0,
    };
    sanitize(parsed)
}

/// Parses user input the way the entry forms do: non-numeric input is 0.
pub fn parse_amount(input: &str) -> f64 {
    sanitize(input.trim().parse::<f64>().unwrap_or(0.0))
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(int), _) => int.to_string(),
            (None, Some(float)) if float.fract() == 0.0 && float.abs() < 1e15 => {
                format!("{}", float as i64)
            }
            _ => number.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Phones come back from the sheet as numbers as often as strings.
pub fn phone_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_text(&value))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub id: String,
    pub month: String,
    pub value: Amount,
}

/// Response of fetch-unit-data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitData {
    #[serde(default)]
    pub values: Vec<ValueEntry>,
    #[serde(default)]
    pub goals: HashMap<String, Amount>,
}

impl UnitData {
    pub fn into_rows(self, unit_id: &str) -> (Vec<MonthlyReport>, Vec<GoalOverride>) {
        let reports = self
            .values
            .into_iter()
            .filter_map(|entry| match Month::from_label(&entry.month) {
                Some(month) => Some(MonthlyReport {
                    unit_id: unit_id.to_string(),
                    indicator_id: entry.id,
                    month,
                    value: entry.value.0,
                }),
                None => {
                    debug!(month = %entry.month, indicator = %entry.id, "skipping value with unknown month");
                    None
                }
            })
            .collect();

        let goals = self
            .goals
            .into_iter()
            .map(|(indicator_id, goal)| GoalOverride {
                unit_id: unit_id.to_string(),
                indicator_id,
                goal: goal.0,
            })
            .collect();

        (reports, goals)
    }
}

/// Response of fetch-all: users plus raw sheet rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPayload {
    #[serde(default)]
    pub users: Option<Vec<User>>,
    /// `[unitId, indicatorId, month, value]`
    #[serde(default)]
    pub raw_data: Option<Vec<Vec<Value>>>,
    /// `[unitId, indicatorId, goal]`
    #[serde(default)]
    pub raw_goals: Option<Vec<Vec<Value>>>,
}

/// Fully loaded input of the consolidation engine.
#[derive(Debug, Clone, Default)]
pub struct AdminSnapshot {
    pub users: Vec<User>,
    pub reports: Vec<MonthlyReport>,
    pub goals: Vec<GoalOverride>,
}

impl AdminPayload {
    /// `None` while the user list is missing; the dashboard is not ready then.
    pub fn into_snapshot(self) -> Option<AdminSnapshot> {
        let users = self.users?;

        let reports = self
            .raw_data
            .unwrap_or_default()
            .iter()
            .filter_map(|row| {
                if row.len() < 4 {
                    debug!(?row, "skipping short value row");
                    return None;
                }
                let month = Month::from_label(&coerce_text(&row[2]))?;
                Some(MonthlyReport {
                    unit_id: coerce_text(&row[0]),
                    indicator_id: coerce_text(&row[1]),
                    month,
                    value: coerce_number(&row[3]),
                })
            })
            .collect();

        let goals = self
            .raw_goals
            .unwrap_or_default()
            .iter()
            .filter_map(|row| {
                if row.len() < 3 {
                    debug!(?row, "skipping short goal row");
                    return None;
                }
                Some(GoalOverride {
                    unit_id: coerce_text(&row[0]),
                    indicator_id: coerce_text(&row[1]),
                    goal: coerce_number(&row[2]),
                })
            })
            .collect();

        Some(AdminSnapshot {
            users,
            reports,
            goals,
        })
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::models::Role;

    #[derive(Default)]
    struct State {
        values: BTreeMap<(String, String, Month), f64>,
        goals: BTreeMap<(String, String), f64>,
        users: Vec<User>,
    }

    /// In-memory store with switches for the failure modes of the remote sheet.
    #[derive(Default)]
    pub struct MemoryStore {
        state: Mutex<State>,
        pub offline: AtomicBool,
        pub reject_writes: AtomicBool,
        pub omit_users: AtomicBool,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_value(self, unit: &str, indicator: &str, month: Month, value: f64) -> Self {
            self.state.lock().unwrap().values.insert(
                (unit.to_string(), indicator.to_string(), month),
                value,
            );
            self
        }

        pub fn with_goal(self, unit: &str, indicator: &str, goal: f64) -> Self {
            self.state
                .lock()
                .unwrap()
                .goals
                .insert((unit.to_string(), indicator.to_string()), goal);
            self
        }

        pub fn with_user(self, user: User) -> Self {
            self.state.lock().unwrap().users.push(user);
            self
        }

        pub fn value(&self, unit: &str, indicator: &str, month: Month) -> Option<f64> {
            self.state
                .lock()
                .unwrap()
                .values
                .get(&(unit.to_string(), indicator.to_string(), month))
                .copied()
        }

        pub fn user_count(&self) -> usize {
            self.state.lock().unwrap().users.len()
        }

        pub fn set(flag: &AtomicBool, on: bool) {
            flag.store(on, Ordering::SeqCst);
        }

        fn check_online(&self) -> Result<(), StoreError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(StoreError::Connection("offline".to_string()));
            }
            Ok(())
        }

        fn check_write(&self) -> Result<(), StoreError> {
            self.check_online()?;
            if self.reject_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Rejected("write refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DataStore for MemoryStore {
        async fn fetch_unit_data(&self, unit_id: &str) -> Result<UnitData, StoreError> {
            self.check_online()?;
            let state = self.state.lock().unwrap();
            let values = state
                .values
                .iter()
                .filter(|((unit, _, _), _)| unit == unit_id)
                .map(|((_, indicator, month), value)| ValueEntry {
                    id: indicator.clone(),
                    month: month.label().to_string(),
                    value: Amount(*value),
                })
                .collect();
            let goals = state
                .goals
                .iter()
                .filter(|((unit, _), _)| unit == unit_id)
                .map(|((_, indicator), goal)| (indicator.clone(), Amount(*goal)))
                .collect();
            Ok(UnitData { values, goals })
        }

        async fn fetch_all(&self) -> Result<AdminPayload, StoreError> {
            self.check_online()?;
            let state = self.state.lock().unwrap();
            let raw_data = state
                .values
                .iter()
                .map(|((unit, indicator, month), value)| {
                    vec![json!(unit), json!(indicator), json!(month.label()), json!(value)]
                })
                .collect();
            let raw_goals = state
                .goals
                .iter()
                .map(|((unit, indicator), goal)| vec![json!(unit), json!(indicator), json!(goal)])
                .collect();
            let users = if self.omit_users.load(Ordering::SeqCst) {
                None
            } else {
                Some(state.users.clone())
            };
            Ok(AdminPayload {
                users,
                raw_data: Some(raw_data),
                raw_goals: Some(raw_goals),
            })
        }

        async fn save_value(
            &self,
            unit_id: &str,
            indicator_id: &str,
            month: Month,
            value: f64,
        ) -> Result<(), StoreError> {
            self.check_write()?;
            self.state.lock().unwrap().values.insert(
                (unit_id.to_string(), indicator_id.to_string(), month),
                value,
            );
            Ok(())
        }

        async fn save_goals(
            &self,
            unit_id: &str,
            goals: &HashMap<String, f64>,
        ) -> Result<(), StoreError> {
            self.check_write()?;
            let mut state = self.state.lock().unwrap();
            for (indicator, goal) in goals {
                state
                    .goals
                    .insert((unit_id.to_string(), indicator.clone()), *goal);
            }
            Ok(())
        }

        async fn register_user(
            &self,
            phone: &str,
            unit_id: &str,
            name: &str,
        ) -> Result<User, StoreError> {
            self.check_write()?;
            let user = User {
                id: format!("user-{phone}"),
                phone: phone.to_string(),
                unit_id: Some(unit_id.to_string()),
                name: name.to_string(),
                role: Role::StakeLeader,
                profile_image: None,
            };
            self.state.lock().unwrap().users.push(user.clone());
            Ok(user)
        }

        async fn fetch_user(&self, phone: &str) -> Result<Option<User>, StoreError> {
            self.check_online()?;
            let state = self.state.lock().unwrap();
            Ok(state.users.iter().find(|u| u.phone == phone).cloned())
        }

        async fn delete_user(&self, phone: &str) -> Result<(), StoreError> {
            self.check_write()?;
            self.state.lock().unwrap().users.retain(|u| u.phone != phone);
            Ok(())
        }

        async fn update_user(&self, user: &User) -> Result<(), StoreError> {
            self.check_write()?;
            let mut state = self.state.lock().unwrap();
            match state.users.iter_mut().find(|u| u.phone == user.phone) {
                Some(existing) => {
                    *existing = user.clone();
                    Ok(())
                }
                None => Err(StoreError::Rejected(format!("unknown user {}", user.phone))),
            }
        }
    }
}
