use std::collections::HashMap;

use crate::models::{
    AnalysisPeriod, ComparisonRow, Council, CouncilFilter, CouncilIndicator, CouncilRollup,
    GoalOverride, IndicatorTemplate, Month, MonthlyReport, Unit, UnitStanding, User,
};
use crate::resolver;
use crate::store::AdminSnapshot;

/// Computes every unit's indicators from one bulk snapshot.
///
/// Rows are indexed by unit once instead of scanning the full row set per unit.
/// `today` is the real calendar month and only drives `has_reported`.
pub fn standings(
    templates: &[IndicatorTemplate],
    units: &[Unit],
    snapshot: &AdminSnapshot,
    period: AnalysisPeriod,
    today: Month,
) -> Vec<UnitStanding> {
    let mut reports_by_unit: HashMap<&str, Vec<&MonthlyReport>> = HashMap::new();
    for report in &snapshot.reports {
        reports_by_unit
            .entry(report.unit_id.as_str())
            .or_default()
            .push(report);
    }

    let mut goals_by_unit: HashMap<&str, Vec<&GoalOverride>> = HashMap::new();
    for goal in &snapshot.goals {
        goals_by_unit.entry(goal.unit_id.as_str()).or_default().push(goal);
    }

    let mut users_by_unit: HashMap<&str, Vec<&User>> = HashMap::new();
    for user in &snapshot.users {
        if let Some(unit_id) = user.unit_id.as_deref() {
            users_by_unit.entry(unit_id).or_default().push(user);
        }
    }

    units
        .iter()
        .map(|unit| {
            let reports = reports_by_unit.get(unit.id).map(Vec::as_slice).unwrap_or(&[]);
            let goals = goals_by_unit.get(unit.id).map(Vec::as_slice).unwrap_or(&[]);

            let indicators: Vec<_> = templates
                .iter()
                .map(|template| {
                    let monthly = resolver::monthly_series(template.id, reports.iter().copied());
                    let goal = resolver::resolve_goal(template, goals.iter().copied());
                    resolver::enrich(template, monthly, goal, period)
                })
                .collect();

            let avg_progress = if indicators.is_empty() {
                0.0
            } else {
                indicators.iter().map(|i| i.progress).sum::<f64>() / indicators.len() as f64
            };

            let users = users_by_unit
                .get(unit.id)
                .map(|users| users.iter().map(|u| (*u).clone()).collect())
                .unwrap_or_default();

            UnitStanding {
                unit: *unit,
                has_reported: resolver::has_reported(&indicators, today),
                indicators,
                avg_progress,
                users,
            }
        })
        .collect()
}

pub fn filter_standings(standings: &[UnitStanding], filter: CouncilFilter) -> Vec<&UnitStanding> {
    standings
        .iter()
        .filter(|standing| filter.admits(standing.unit.council))
        .collect()
}

/// Consolidates one indicator over the units of a council.
///
/// Ratio-style indicators average goal and current over the units with a
/// positive goal; everything else is summed. Progress is not clamped.
pub fn consolidate_indicator(
    template: &IndicatorTemplate,
    standings: &[&UnitStanding],
) -> CouncilIndicator {
    let figures = standings.iter().filter_map(|standing| {
        standing
            .indicators
            .iter()
            .find(|indicator| indicator.template.id == template.id)
            .map(|indicator| (indicator.goal, indicator.current))
    });

    let (goal, current) = if template.aggregate_as_ratio {
        let counted: Vec<(f64, f64)> = figures.filter(|(goal, _)| *goal > 0.0).collect();
        if counted.is_empty() {
            (0.0, 0.0)
        } else {
            let n = counted.len() as f64;
            let goal_total: f64 = counted.iter().map(|(goal, _)| goal).sum();
            let current_total: f64 = counted.iter().map(|(_, current)| current).sum();
            (goal_total / n, current_total / n)
        }
    } else {
        figures.fold((0.0, 0.0), |(goal_total, current_total), (goal, current)| {
            (goal_total + goal, current_total + current)
        })
    };

    CouncilIndicator {
        template: *template,
        goal,
        current,
        progress: resolver::raw_progress(current, goal),
    }
}

pub fn council_rollup(
    templates: &[IndicatorTemplate],
    standings: &[UnitStanding],
    council: Council,
) -> CouncilRollup {
    let members = filter_standings(standings, CouncilFilter::Only(council));
    CouncilRollup {
        council,
        indicators: templates
            .iter()
            .map(|template| consolidate_indicator(template, &members))
            .collect(),
    }
}

pub fn council_rollups(
    templates: &[IndicatorTemplate],
    standings: &[UnitStanding],
) -> Vec<CouncilRollup> {
    Council::ALL
        .iter()
        .map(|council| council_rollup(templates, standings, *council))
        .collect()
}

/// Ranks units on one indicator by unclamped progress, highest first.
/// Ties keep roster order.
pub fn compare(
    standings: &[UnitStanding],
    indicator_id: &str,
    filter: CouncilFilter,
) -> Vec<ComparisonRow> {
    let mut rows: Vec<ComparisonRow> = filter_standings(standings, filter)
        .into_iter()
        .map(|standing| {
            let indicator = standing
                .indicators
                .iter()
                .find(|indicator| indicator.template.id == indicator_id);
            ComparisonRow {
                unit: standing.unit,
                current: indicator.map(|i| i.current).unwrap_or(0.0),
                goal: indicator.map(|i| i.goal).unwrap_or(0.0),
                progress: indicator.map(|i| i.raw_progress).unwrap_or(0.0),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.progress
            .partial_cmp(&a.progress)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows
}
