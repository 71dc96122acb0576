use crate::models::{
    AnalysisPeriod, CalculationType, EnrichedIndicator, GoalOverride, IndicatorTemplate, Month,
    MonthlyReport,
};

/// Lays the reports of one indicator out over the twelve calendar months.
/// The first report for a month wins; months without a report stay at 0.
pub fn monthly_series<'a, I>(indicator_id: &str, reports: I) -> [f64; 12]
where
    I: IntoIterator<Item = &'a MonthlyReport>,
{
    let mut series = [0.0; 12];
    let mut filled = [false; 12];

    for report in reports {
        if report.indicator_id != indicator_id {
            continue;
        }
        let slot = report.month.index();
        if !filled[slot] {
            series[slot] = report.value;
            filled[slot] = true;
        }
    }

    series
}

pub fn resolve_goal<'a, I>(template: &IndicatorTemplate, overrides: I) -> f64
where
    I: IntoIterator<Item = &'a GoalOverride>,
{
    overrides
        .into_iter()
        .find(|row| row.indicator_id == template.id)
        .map(|row| row.goal)
        .unwrap_or(template.goal)
}

pub fn current_value(calculation: CalculationType, series: &[f64; 12], period: AnalysisPeriod) -> f64 {
    if let AnalysisPeriod::Month(month) = period {
        return series[month.index()];
    }

    let sum: f64 = series.iter().sum();
    let positive: Vec<f64> = series.iter().copied().filter(|value| *value > 0.0).collect();

    match calculation {
        CalculationType::Sum => sum,
        CalculationType::Average => {
            if positive.is_empty() {
                0.0
            } else {
                sum / positive.len() as f64
            }
        }
        CalculationType::Cumulative => positive.last().copied().unwrap_or(0.0),
    }
}

pub fn raw_progress(current: f64, goal: f64) -> f64 {
    if goal > 0.0 {
        current / goal * 100.0
    } else {
        0.0
    }
}

pub fn clamped_progress(current: f64, goal: f64) -> f64 {
    raw_progress(current, goal).min(100.0)
}

pub fn enrich(
    template: &IndicatorTemplate,
    monthly: [f64; 12],
    goal: f64,
    period: AnalysisPeriod,
) -> EnrichedIndicator {
    let current = current_value(template.calculation, &monthly, period);
    EnrichedIndicator {
        template: *template,
        monthly,
        goal,
        current,
        progress: clamped_progress(current, goal),
        raw_progress: raw_progress(current, goal),
    }
}

/// Merges the catalog with one unit's reports and goal overrides, in catalog order.
pub fn resolve_unit(
    templates: &[IndicatorTemplate],
    unit_id: &str,
    reports: &[MonthlyReport],
    goals: &[GoalOverride],
    period: AnalysisPeriod,
) -> Vec<EnrichedIndicator> {
    let unit_reports: Vec<&MonthlyReport> =
        reports.iter().filter(|r| r.unit_id == unit_id).collect();
    let unit_goals: Vec<&GoalOverride> = goals.iter().filter(|g| g.unit_id == unit_id).collect();

    templates
        .iter()
        .map(|template| {
            let monthly = monthly_series(template.id, unit_reports.iter().copied());
            let goal = resolve_goal(template, unit_goals.iter().copied());
            enrich(template, monthly, goal, period)
        })
        .collect()
}

/// Re-derives `current` and progress after the period or a value changed.
pub fn refresh(indicator: &mut EnrichedIndicator, period: AnalysisPeriod) {
    *indicator = enrich(&indicator.template, indicator.monthly, indicator.goal, period);
}

/// True when any indicator carries a positive value for `month`.
pub fn has_reported(indicators: &[EnrichedIndicator], month: Month) -> bool {
    indicators.iter().any(|indicator| indicator.value_in(month) > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TEMPLATES;
    use crate::models::{Priority, ReportCriteria};

    fn template(calculation: CalculationType, goal: f64) -> IndicatorTemplate {
        IndicatorTemplate {
            id: "x",
            priority: Priority::Others,
            name: "Test",
            description: "",
            criteria: ReportCriteria::Cumulative,
            calculation,
            goal,
            aggregate_as_ratio: false,
        }
    }

    fn series(values: &[f64]) -> [f64; 12] {
        let mut out = [0.0; 12];
        out[..values.len()].copy_from_slice(values);
        out
    }

    fn report(unit: &str, indicator: &str, month: Month, value: f64) -> MonthlyReport {
        MonthlyReport {
            unit_id: unit.to_string(),
            indicator_id: indicator.to_string(),
            month,
            value,
        }
    }

    #[test]
    fn sum_with_no_reports_is_zero() {
        let indicator = enrich(
            &template(CalculationType::Sum, 150.0),
            [0.0; 12],
            150.0,
            AnalysisPeriod::Annual,
        );
        assert_eq!(indicator.current, 0.0);
        assert_eq!(indicator.progress, 0.0);
    }

    #[test]
    fn cumulative_takes_last_positive_report() {
        let values = series(&[0.0, 0.0, 50.0, 0.0, 80.0, 0.0]);
        assert_eq!(
            current_value(CalculationType::Cumulative, &values, AnalysisPeriod::Annual),
            80.0
        );
    }

    #[test]
    fn average_ignores_empty_months() {
        let values = series(&[0.0, 100.0, 0.0, 200.0, 0.0]);
        assert_eq!(
            current_value(CalculationType::Average, &values, AnalysisPeriod::Annual),
            150.0
        );
    }

    #[test]
    fn sum_adds_every_month() {
        let values = series(&[3.0, 0.0, 4.0, 5.0]);
        assert_eq!(
            current_value(CalculationType::Sum, &values, AnalysisPeriod::Annual),
            12.0
        );
    }

    #[test]
    fn single_month_returns_raw_value() {
        let mut values = [0.0; 12];
        values[Month::March.index()] = 42.0;
        values[Month::April.index()] = 100.0;
        let period = AnalysisPeriod::Month(Month::March);
        assert_eq!(current_value(CalculationType::Average, &values, period), 42.0);
        assert_eq!(current_value(CalculationType::Cumulative, &values, period), 42.0);
        assert_eq!(
            current_value(CalculationType::Sum, &values, AnalysisPeriod::Month(Month::May)),
            0.0
        );
    }

    #[test]
    fn unit_progress_is_clamped() {
        let indicator = enrich(
            &template(CalculationType::Sum, 50.0),
            series(&[200.0]),
            50.0,
            AnalysisPeriod::Annual,
        );
        assert_eq!(indicator.progress, 100.0);
        assert_eq!(indicator.raw_progress, 400.0);
    }

    #[test]
    fn zero_goal_never_divides() {
        assert_eq!(clamped_progress(30.0, 0.0), 0.0);
        assert_eq!(raw_progress(30.0, 0.0), 0.0);
    }

    #[test]
    fn goal_defaults_to_template_without_override() {
        let indicators = resolve_unit(&TEMPLATES, "danli", &[], &[], AnalysisPeriod::Annual);
        assert_eq!(indicators.len(), TEMPLATES.len());
        for (indicator, template) in indicators.iter().zip(TEMPLATES.iter()) {
            assert_eq!(indicator.template.id, template.id);
            assert_eq!(indicator.goal, template.goal);
            assert_eq!(indicator.current, 0.0);
        }
    }

    #[test]
    fn explicit_zero_override_yields_zero_progress() {
        let goals = vec![GoalOverride {
            unit_id: "danli".to_string(),
            indicator_id: "mision".to_string(),
            goal: 0.0,
        }];
        let reports = vec![report("danli", "mision", Month::January, 12.0)];
        let indicators = resolve_unit(&TEMPLATES, "danli", &reports, &goals, AnalysisPeriod::Annual);
        assert_eq!(indicators[0].goal, 0.0);
        assert_eq!(indicators[0].current, 12.0);
        assert_eq!(indicators[0].progress, 0.0);
    }

    #[test]
    fn other_units_rows_are_ignored() {
        let reports = vec![
            report("danli", "bautismos", Month::February, 4.0),
            report("uyuca", "bautismos", Month::February, 9.0),
        ];
        let goals = vec![GoalOverride {
            unit_id: "uyuca".to_string(),
            indicator_id: "bautismos".to_string(),
            goal: 10.0,
        }];
        let indicators = resolve_unit(&TEMPLATES, "danli", &reports, &goals, AnalysisPeriod::Annual);
        let baptisms = &indicators[1];
        assert_eq!(baptisms.current, 4.0);
        assert_eq!(baptisms.goal, 150.0);
    }

    #[test]
    fn first_report_for_a_month_wins() {
        let reports = vec![
            report("danli", "x", Month::June, 7.0),
            report("danli", "x", Month::June, 99.0),
        ];
        let values = monthly_series("x", reports.iter());
        assert_eq!(values[Month::June.index()], 7.0);
    }

    #[test]
    fn refresh_follows_period_change() {
        let mut indicator = enrich(
            &template(CalculationType::Sum, 10.0),
            series(&[2.0, 3.0]),
            10.0,
            AnalysisPeriod::Annual,
        );
        assert_eq!(indicator.current, 5.0);
        refresh(&mut indicator, AnalysisPeriod::Month(Month::February));
        assert_eq!(indicator.current, 3.0);
        assert_eq!(indicator.progress, 30.0);
    }

    #[test]
    fn reported_flag_needs_a_positive_value() {
        let mut values = [0.0; 12];
        values[Month::October.index()] = 1.0;
        let indicators = vec![enrich(
            &template(CalculationType::Sum, 1.0),
            values,
            1.0,
            AnalysisPeriod::Month(Month::January),
        )];
        assert!(has_reported(&indicators, Month::October));
        assert!(!has_reported(&indicators, Month::November));
    }
}
