use std::collections::HashMap;

use thiserror::Error;
use tracing::info;

use crate::catalog::{self, TEMPLATES};
use crate::models::{AnalysisPeriod, EnrichedIndicator, Month, Priority, Unit};
use crate::optimistic::apply_optimistically;
use crate::resolver;
use crate::store::{parse_amount, DataStore, StoreError};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("unknown stake or district '{0}'")]
    UnknownUnit(String),
    #[error("unknown indicator '{0}'")]
    UnknownIndicator(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A leader's view of their own unit.
#[derive(Debug, Clone)]
pub struct Workspace {
    unit: Unit,
    period: AnalysisPeriod,
    indicators: Vec<EnrichedIndicator>,
}

impl Workspace {
    pub async fn load(
        store: &dyn DataStore,
        unit_id: &str,
        period: AnalysisPeriod,
    ) -> Result<Self, WorkspaceError> {
        let unit = *catalog::unit_by_id(unit_id)
            .ok_or_else(|| WorkspaceError::UnknownUnit(unit_id.to_string()))?;

        let data = store.fetch_unit_data(unit.id).await?;
        let (reports, goals) = data.into_rows(unit.id);
        info!(unit = unit.id, reports = reports.len(), goals = goals.len(), "unit data loaded");

        Ok(Self {
            unit,
            period,
            indicators: resolver::resolve_unit(&TEMPLATES, unit.id, &reports, &goals, period),
        })
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn period(&self) -> AnalysisPeriod {
        self.period
    }

    pub fn indicators(&self) -> &[EnrichedIndicator] {
        &self.indicators
    }

    pub fn indicator(&self, id: &str) -> Option<&EnrichedIndicator> {
        self.indicators.iter().find(|i| i.template.id == id)
    }

    pub fn set_period(&mut self, period: AnalysisPeriod) {
        self.period = period;
        for indicator in &mut self.indicators {
            resolver::refresh(indicator, period);
        }
    }

    fn position(&self, indicator_id: &str) -> Result<usize, WorkspaceError> {
        self.indicators
            .iter()
            .position(|i| i.template.id == indicator_id)
            .ok_or_else(|| WorkspaceError::UnknownIndicator(indicator_id.to_string()))
    }

    /// Records a month's value from form input. Non-numeric input is stored as 0.
    pub async fn record_value(
        &mut self,
        store: &dyn DataStore,
        indicator_id: &str,
        month: Month,
        input: &str,
    ) -> Result<f64, WorkspaceError> {
        let idx = self.position(indicator_id)?;
        let value = parse_amount(input);
        let period = self.period;
        let unit_id = self.unit.id;

        apply_optimistically(
            &mut self.indicators,
            |indicators| {
                indicators[idx].monthly[month.index()] = value;
                resolver::refresh(&mut indicators[idx], period);
            },
            store.save_value(unit_id, indicator_id, month, value),
        )
        .await?;

        info!(unit = unit_id, indicator = indicator_id, %month, value, "value recorded");
        Ok(value)
    }

    pub async fn save_goals(
        &mut self,
        store: &dyn DataStore,
        goals: HashMap<String, f64>,
    ) -> Result<(), WorkspaceError> {
        let mut updates = Vec::with_capacity(goals.len());
        for (indicator_id, goal) in &goals {
            updates.push((self.position(indicator_id)?, goal.max(0.0)));
        }
        let sanitized: HashMap<String, f64> = goals
            .into_iter()
            .map(|(id, goal)| (id, goal.max(0.0)))
            .collect();
        let period = self.period;
        let unit_id = self.unit.id;

        apply_optimistically(
            &mut self.indicators,
            |indicators| {
                for (idx, goal) in updates {
                    indicators[idx].goal = goal;
                    resolver::refresh(&mut indicators[idx], period);
                }
            },
            store.save_goals(unit_id, &sanitized),
        )
        .await?;

        info!(unit = unit_id, count = sanitized.len(), "goals saved");
        Ok(())
    }

    /// Indicators with a positive value in `month`.
    pub fn filled_count(&self, month: Month) -> usize {
        self.indicators
            .iter()
            .filter(|i| i.value_in(month) > 0.0)
            .count()
    }

    pub fn filter_priority(&self, priority: Option<Priority>) -> Vec<&EnrichedIndicator> {
        self.indicators
            .iter()
            .filter(|i| priority.map_or(true, |p| i.template.priority == p))
            .collect()
    }

    pub fn by_priority(&self) -> Vec<(Priority, Vec<&EnrichedIndicator>)> {
        Priority::ALL
            .iter()
            .map(|priority| (*priority, self.filter_priority(Some(*priority))))
            .filter(|(_, group)| !group.is_empty())
            .collect()
    }
}
