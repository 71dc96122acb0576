use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog;
use crate::models::{Month, Role, User};
use crate::store::{parse_amount, AdminPayload, Amount, DataStore, StoreError, UnitData, ValueEntry};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// PostgreSQL rendition of the values/goals/users sheets.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::Rejected("record not found".to_string()),
        sqlx::Error::Database(db) => StoreError::Rejected(db.message().to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Decode(err.to_string())
        }
        _ => StoreError::Connection(err.to_string()),
    }
}

fn parse_role(value: &str) -> Role {
    match value {
        "AreaSeventy" => Role::AreaSeventy,
        _ => Role::StakeLeader,
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::StakeLeader => "StakeLeader",
        Role::AreaSeventy => "AreaSeventy",
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
    let id: Uuid = row.get("id");
    let role: String = row.get("role");
    User {
        id: id.to_string(),
        phone: row.get("phone"),
        unit_id: row.get("unit_id"),
        name: row.get("name"),
        role: parse_role(&role),
        profile_image: row.get("profile_image"),
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn fetch_unit_data(&self, unit_id: &str) -> Result<UnitData, StoreError> {
        let values = sqlx::query(
            "SELECT indicator_id, month, value FROM council_indicators.monthly_values WHERE unit_id = $1",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?
        .iter()
        .map(|row| ValueEntry {
            id: row.get("indicator_id"),
            month: row.get("month"),
            value: Amount(row.get("value")),
        })
        .collect();

        let goals = sqlx::query(
            "SELECT indicator_id, goal FROM council_indicators.goals WHERE unit_id = $1",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?
        .iter()
        .map(|row| (row.get("indicator_id"), Amount(row.get("goal"))))
        .collect();

        Ok(UnitData { values, goals })
    }

    async fn fetch_all(&self) -> Result<AdminPayload, StoreError> {
        let users = sqlx::query(
            "SELECT id, phone, unit_id, name, role, profile_image \
             FROM council_indicators.users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?
        .iter()
        .map(user_from_row)
        .collect();

        let raw_data: Vec<Vec<Value>> = sqlx::query(
            "SELECT unit_id, indicator_id, month, value FROM council_indicators.monthly_values",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?
        .iter()
        .map(|row| {
            let unit_id: String = row.get("unit_id");
            let indicator_id: String = row.get("indicator_id");
            let month: String = row.get("month");
            let value: f64 = row.get("value");
            vec![json!(unit_id), json!(indicator_id), json!(month), json!(value)]
        })
        .collect();

        let raw_goals: Vec<Vec<Value>> =
            sqlx::query("SELECT unit_id, indicator_id, goal FROM council_indicators.goals")
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?
                .iter()
                .map(|row| {
                    let unit_id: String = row.get("unit_id");
                    let indicator_id: String = row.get("indicator_id");
                    let goal: f64 = row.get("goal");
                    vec![json!(unit_id), json!(indicator_id), json!(goal)]
                })
                .collect();

        Ok(AdminPayload {
            users: Some(users),
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
        sqlx::query(
            r#"
            INSERT INTO council_indicators.monthly_values (unit_id, indicator_id, month, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (unit_id, indicator_id, month) DO UPDATE
            SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(unit_id)
        .bind(indicator_id)
        .bind(month.label())
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn save_goals(
        &self,
        unit_id: &str,
        goals: &HashMap<String, f64>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        for (indicator_id, goal) in goals {
            sqlx::query(
                r#"
                INSERT INTO council_indicators.goals (unit_id, indicator_id, goal)
                VALUES ($1, $2, $3)
                ON CONFLICT (unit_id, indicator_id) DO UPDATE
                SET goal = EXCLUDED.goal, updated_at = now()
                "#,
            )
            .bind(unit_id)
            .bind(indicator_id)
            .bind(*goal)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }
        tx.commit().await.map_err(store_error)?;
        Ok(())
    }

    async fn register_user(
        &self,
        phone: &str,
        unit_id: &str,
        name: &str,
    ) -> Result<User, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO council_indicators.users (id, phone, unit_id, name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, phone, unit_id, name, role, profile_image
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(phone)
        .bind(unit_id)
        .bind(name)
        .bind(role_name(Role::StakeLeader))
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(user_from_row(&row))
    }

    async fn fetch_user(&self, phone: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, phone, unit_id, name, role, profile_image \
             FROM council_indicators.users WHERE phone = $1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn delete_user(&self, phone: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM council_indicators.users WHERE phone = $1")
            .bind(phone)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Rejected(format!("no user with phone {phone}")));
        }
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE council_indicators.users SET name = $2, profile_image = $3 WHERE phone = $1",
        )
        .bind(&user.phone)
        .bind(&user.name)
        .bind(&user.profile_image)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Rejected(format!("no user with phone {}", user.phone)));
        }
        Ok(())
    }
}

/// Demo leaders as (phone, unit, name). Ids are generated on first insert.
const SEED_LEADERS: [(&str, &str, &str); 3] = [
    ("31112222", "danli", "Ana Mejía"),
    ("97653344", "country", "Luis Zelaya"),
    ("88451290", "uyuca", "Carla Paz"),
];

pub async fn seed(store: &PgStore) -> anyhow::Result<()> {
    for (phone, unit_id, name) in SEED_LEADERS {
        sqlx::query(
            r#"
            INSERT INTO council_indicators.users (id, phone, unit_id, name, role)
            VALUES ($1, $2, $3, $4, 'StakeLeader')
            ON CONFLICT (phone) DO UPDATE
            SET unit_id = EXCLUDED.unit_id, name = EXCLUDED.name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(phone)
        .bind(unit_id)
        .bind(name)
        .execute(store.pool())
        .await?;
    }

    let values = vec![
        ("danli", "mision", Month::January, 18.0),
        ("danli", "mision", Month::March, 21.0),
        ("danli", "bautismos", Month::January, 9.0),
        ("danli", "bautismos", Month::February, 14.0),
        ("danli", "sacramental", Month::January, 540.0),
        ("danli", "sacramental", Month::February, 575.0),
        ("danli", "ministracion", Month::February, 62.0),
        ("country", "bautismos", Month::February, 22.0),
        ("country", "templo", Month::March, 410.0),
        ("country", "ministracion", Month::March, 71.0),
        ("uyuca", "diezmo", Month::January, 380.0),
        ("uyuca", "ofrendas", Month::February, 295.0),
        ("uyuca", "sacerdocio", Month::March, 4.0),
    ];

    for (unit_id, indicator_id, month, value) in values {
        store
            .save_value(unit_id, indicator_id, month, value)
            .await
            .with_context(|| format!("failed to seed {unit_id}/{indicator_id}"))?;
    }

    let goals = HashMap::from([
        ("ministracion".to_string(), 80.0),
        ("bautismos".to_string(), 120.0),
    ]);
    store.save_goals("country", &goals).await?;

    info!("seed data inserted");
    Ok(())
}

/// Loads monthly values from a CSV with `unit_id,indicator_id,month,value`.
/// Rows naming an unknown unit, indicator or month are skipped.
pub async fn import_csv(store: &PgStore, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        unit_id: String,
        indicator_id: String,
        month: String,
        value: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut written = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let unit_id = row.unit_id.trim();
        let indicator_id = row.indicator_id.trim();

        if catalog::unit_by_id(unit_id).is_none() || catalog::template(indicator_id).is_none() {
            warn!(line = line + 2, unit_id, indicator_id, "skipping row with unknown unit or indicator");
            continue;
        }
        let Some(month) = Month::from_label(&row.month) else {
            warn!(line = line + 2, month = %row.month, "skipping row with unknown month");
            continue;
        };

        store
            .save_value(unit_id, indicator_id, month, parse_amount(&row.value))
            .await?;
        written += 1;
    }

    Ok(written)
}
