use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{self, TEMPLATES, UNITS};
use crate::consolidation;
use crate::models::{
    AnalysisPeriod, ComparisonRow, Council, CouncilFilter, CouncilRollup, IndicatorTemplate,
    Month, Unit, UnitStanding, User,
};
use crate::optimistic::apply_optimistically;
use crate::session::SessionStore;
use crate::store::{AdminSnapshot, DataStore, StoreError};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("dashboard data is not loaded yet")]
    NotReady,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Ready,
    /// The store answered without a user list; previous data is kept.
    NotReady,
}

#[derive(Debug, Clone)]
pub struct Reminder {
    pub unit: Unit,
    pub user: User,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub user: User,
    pub unit_name: String,
    pub council: Option<Council>,
}

/// Cross-unit state of the council administrator.
///
/// Fetching and computing are separate: `load` is the only method that talks
/// to the store, everything else recomputes from the last good snapshot.
pub struct AdminDashboard {
    templates: &'static [IndicatorTemplate],
    units: &'static [Unit],
    period: AnalysisPeriod,
    today: Month,
    snapshot: Option<AdminSnapshot>,
    standings: Vec<UnitStanding>,
}

impl AdminDashboard {
    pub fn new(period: AnalysisPeriod, today: Month) -> Self {
        Self::with_catalog(&TEMPLATES, &UNITS, period, today)
    }

    pub fn with_catalog(
        templates: &'static [IndicatorTemplate],
        units: &'static [Unit],
        period: AnalysisPeriod,
        today: Month,
    ) -> Self {
        Self {
            templates,
            units,
            period,
            today,
            snapshot: None,
            standings: Vec::new(),
        }
    }

    /// Fetches everything in one request. A failed fetch leaves the current
    /// aggregates as they were.
    pub async fn load(&mut self, store: &dyn DataStore) -> Result<LoadOutcome, StoreError> {
        let payload = store.fetch_all().await.map_err(|err| {
            warn!(error = %err, "admin data fetch failed");
            err
        })?;

        match payload.into_snapshot() {
            Some(snapshot) => {
                info!(
                    users = snapshot.users.len(),
                    reports = snapshot.reports.len(),
                    goals = snapshot.goals.len(),
                    "admin data loaded"
                );
                self.snapshot = Some(snapshot);
                self.recompute();
                Ok(LoadOutcome::Ready)
            }
            None => {
                warn!("admin data arrived without users, keeping previous state");
                Ok(LoadOutcome::NotReady)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn period(&self) -> AnalysisPeriod {
        self.period
    }

    pub fn today(&self) -> Month {
        self.today
    }

    pub fn set_period(&mut self, period: AnalysisPeriod) {
        self.period = period;
        self.recompute();
    }

    fn recompute(&mut self) {
        if let Some(snapshot) = &self.snapshot {
            self.standings = consolidation::standings(
                self.templates,
                self.units,
                snapshot,
                self.period,
                self.today,
            );
        }
    }

    pub fn standings(&self) -> &[UnitStanding] {
        &self.standings
    }

    pub fn standing(&self, unit_id: &str) -> Option<&UnitStanding> {
        self.standings.iter().find(|s| s.unit.id == unit_id)
    }

    pub fn overview(&self, filter: CouncilFilter) -> Vec<&UnitStanding> {
        consolidation::filter_standings(&self.standings, filter)
    }

    pub fn councils(&self) -> Vec<CouncilRollup> {
        consolidation::council_rollups(self.templates, &self.standings)
    }

    pub fn compare(&self, indicator_id: &str, filter: CouncilFilter) -> Vec<ComparisonRow> {
        consolidation::compare(&self.standings, indicator_id, filter)
    }

    /// One reminder per registered leader of every unit that has not reported
    /// in the current calendar month.
    pub fn pending_reminders(&self) -> Vec<Reminder> {
        self.standings
            .iter()
            .filter(|standing| !standing.has_reported)
            .flat_map(|standing| {
                standing.users.iter().map(move |user| Reminder {
                    unit: standing.unit,
                    user: user.clone(),
                    message: reminder_message(&user.name, standing.unit.name, self.today),
                })
            })
            .collect()
    }

    /// Removes a user locally at once and restores them if the store refuses.
    pub async fn remove_user(&mut self, store: &dyn DataStore, phone: &str) -> Result<(), AdminError> {
        let snapshot = self.snapshot.as_mut().ok_or(AdminError::NotReady)?;

        let outcome = apply_optimistically(
            &mut snapshot.users,
            |users| users.retain(|u| u.phone != phone),
            store.delete_user(phone),
        )
        .await;

        self.recompute();
        outcome?;
        info!(phone, "user removed");
        Ok(())
    }

    pub fn roster(&self, search: &str, filter: CouncilFilter) -> Vec<RosterEntry> {
        let needle = search.trim().to_lowercase();
        let users = self.snapshot.as_ref().map(|s| s.users.as_slice()).unwrap_or(&[]);

        users
            .iter()
            .map(|user| {
                let unit = user.unit_id.as_deref().and_then(catalog::unit_by_id);
                RosterEntry {
                    user: user.clone(),
                    unit_name: unit.map(|u| u.name.to_string()).unwrap_or_else(|| "Desconocido".to_string()),
                    council: unit.map(|u| u.council),
                }
            })
            .filter(|entry| {
                entry.user.name.to_lowercase().contains(&needle)
                    || entry.unit_name.to_lowercase().contains(&needle)
            })
            .filter(|entry| match filter {
                CouncilFilter::All => true,
                CouncilFilter::Only(council) => entry.council == Some(council),
            })
            .collect()
    }
}

pub fn reminder_message(user_name: &str, unit_name: &str, month: Month) -> String {
    format!(
        "Estimado(a) {user_name}, le saludamos de los Consejos. Notamos que la {unit_name} aún no ha \
         reportado los indicadores de {month}. ¿Podría apoyarnos con la actualización de los datos? \
         Muchas gracias."
    )
}

/// Effective access key per unit, grouped by council.
pub fn access_keys(session: &SessionStore) -> Vec<(Unit, String)> {
    let mut keys: Vec<(Unit, String)> = UNITS
        .iter()
        .map(|unit| {
            let key = session
                .access_key_for(unit.id)
                .unwrap_or_else(|| unit.access_key.to_string());
            (*unit, key)
        })
        .collect();
    keys.sort_by(|a, b| a.0.council.label().cmp(b.0.council.label()));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::testing::MemoryStore;

    fn leader(unit: &str, phone: &str, name: &str) -> User {
        User {
            id: format!("u-{phone}"),
            phone: phone.to_string(),
            unit_id: Some(unit.to_string()),
            name: name.to_string(),
            role: Role::StakeLeader,
            profile_image: None,
        }
    }

    fn populated_store() -> MemoryStore {
        MemoryStore::new()
            .with_user(leader("danli", "31110001", "Ana"))
            .with_user(leader("danli", "31110002", "Beto"))
            .with_user(leader("country", "31110003", "Carla"))
            .with_value("danli", "bautismos", Month::June, 10.0)
            .with_value("country", "bautismos", Month::July, 30.0)
            .with_goal("country", "bautismos", 20.0)
    }

    #[tokio::test]
    async fn load_then_compare() {
        let store = populated_store();
        let mut dashboard = AdminDashboard::new(AnalysisPeriod::Annual, Month::July);
        assert_eq!(dashboard.load(&store).await.unwrap(), LoadOutcome::Ready);

        let rows = dashboard.compare("bautismos", CouncilFilter::All);
        assert_eq!(rows[0].unit.id, "country");
        assert_eq!(rows[0].progress, 150.0);
        assert_eq!(dashboard.standing("danli").unwrap().users.len(), 2);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_aggregates() {
        let store = populated_store();
        let mut dashboard = AdminDashboard::new(AnalysisPeriod::Annual, Month::July);
        dashboard.load(&store).await.unwrap();

        MemoryStore::set(&store.offline, true);
        assert!(dashboard.load(&store).await.is_err());
        assert_eq!(dashboard.standing("country").unwrap().indicators[1].current, 30.0);

        MemoryStore::set(&store.offline, false);
        MemoryStore::set(&store.omit_users, true);
        assert_eq!(dashboard.load(&store).await.unwrap(), LoadOutcome::NotReady);
        assert!(dashboard.is_ready());
        assert_eq!(dashboard.standings().len(), UNITS.len());
    }

    #[tokio::test]
    async fn missing_users_is_not_ready() {
        let store = populated_store();
        MemoryStore::set(&store.omit_users, true);
        let mut dashboard = AdminDashboard::new(AnalysisPeriod::Annual, Month::July);
        assert_eq!(dashboard.load(&store).await.unwrap(), LoadOutcome::NotReady);
        assert!(!dashboard.is_ready());
        assert!(dashboard.standings().is_empty());
        assert!(dashboard.councils().iter().all(|c| c.indicators.iter().all(|i| i.current == 0.0)));
    }

    #[tokio::test]
    async fn period_switch_does_not_fetch() {
        let store = populated_store();
        let mut dashboard = AdminDashboard::new(AnalysisPeriod::Annual, Month::July);
        dashboard.load(&store).await.unwrap();
        MemoryStore::set(&store.offline, true);

        dashboard.set_period(AnalysisPeriod::Month(Month::June));
        assert_eq!(dashboard.standing("danli").unwrap().indicators[1].current, 10.0);
        assert_eq!(dashboard.standing("country").unwrap().indicators[1].current, 0.0);
    }

    #[tokio::test]
    async fn reminders_target_units_without_current_report() {
        let store = populated_store();
        let mut dashboard = AdminDashboard::new(AnalysisPeriod::Annual, Month::July);
        dashboard.load(&store).await.unwrap();

        let reminders = dashboard.pending_reminders();
        let names: Vec<_> = reminders.iter().map(|r| r.user.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Beto"]);
        assert!(reminders[0].message.contains("Estaca Danlí"));
        assert!(reminders[0].message.contains("Julio"));
    }

    #[tokio::test]
    async fn rejected_removal_restores_user() {
        let store = populated_store();
        let mut dashboard = AdminDashboard::new(AnalysisPeriod::Annual, Month::July);
        dashboard.load(&store).await.unwrap();

        MemoryStore::set(&store.reject_writes, true);
        assert!(dashboard.remove_user(&store, "31110001").await.is_err());
        assert_eq!(dashboard.standing("danli").unwrap().users.len(), 2);

        MemoryStore::set(&store.reject_writes, false);
        dashboard.remove_user(&store, "31110001").await.unwrap();
        assert_eq!(dashboard.standing("danli").unwrap().users.len(), 1);
        assert_eq!(store.user_count(), 2);
    }

    #[tokio::test]
    async fn removal_before_load_is_refused() {
        let store = populated_store();
        let mut dashboard = AdminDashboard::new(AnalysisPeriod::Annual, Month::July);
        assert!(matches!(
            dashboard.remove_user(&store, "31110001").await,
            Err(AdminError::NotReady)
        ));
    }

    #[tokio::test]
    async fn roster_searches_names_and_units() {
        let store = populated_store().with_user(leader("atlantis", "31110009", "Dora"));
        let mut dashboard = AdminDashboard::new(AnalysisPeriod::Annual, Month::July);
        dashboard.load(&store).await.unwrap();

        assert_eq!(dashboard.roster("danlí", CouncilFilter::All).len(), 2);
        assert_eq!(dashboard.roster("carla", CouncilFilter::All).len(), 1);
        assert_eq!(
            dashboard.roster("", CouncilFilter::Only(Council::Comayaguela)).len(),
            1
        );
        let unknown = dashboard.roster("dora", CouncilFilter::All);
        assert_eq!(unknown[0].unit_name, "Desconocido");
    }

    #[test]
    fn access_keys_reflect_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SessionStore::load(dir.path().join("s.json")).unwrap();
        session.set_access_key("juticalpa", "JUT-2026").unwrap();

        let keys = access_keys(&session);
        assert_eq!(keys.len(), UNITS.len());
        assert_eq!(keys[0].0.council, Council::Comayaguela);
        let juticalpa = keys.iter().find(|(u, _)| u.id == "juticalpa").unwrap();
        assert_eq!(juticalpa.1, "JUT-2026");
    }
}
