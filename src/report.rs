use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{AnalysisPeriod, CouncilRollup, Month, UnitStanding};

/// Units ordered by average progress, best first. Ties keep roster order.
pub fn rank_by_progress(standings: &[UnitStanding]) -> Vec<&UnitStanding> {
    let mut ranked: Vec<&UnitStanding> = standings.iter().collect();
    ranked.sort_by(|a, b| {
        b.avg_progress
            .partial_cmp(&a.avg_progress)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

pub fn build_report(
    period: AnalysisPeriod,
    generated_on: NaiveDate,
    today: Month,
    councils: &[CouncilRollup],
    standings: &[UnitStanding],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Council Indicator Report");
    let _ = writeln!(
        output,
        "Generated on {} for period {}",
        generated_on, period
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Council Rollups");

    for rollup in councils {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {}", rollup.council);
        for indicator in &rollup.indicators {
            let _ = writeln!(
                output,
                "- {}: {:.1} of {:.1} ({:.1}%)",
                indicator.template.name, indicator.current, indicator.goal, indicator.progress
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Unit Ranking");

    if standings.is_empty() {
        let _ = writeln!(output, "No unit data loaded.");
    } else {
        for (position, standing) in rank_by_progress(standings).iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} ({}) average progress {:.1}%",
                position + 1,
                standing.unit.name,
                standing.unit.council,
                standing.avg_progress
            );
        }
    }

    let pending: Vec<&UnitStanding> = standings.iter().filter(|s| !s.has_reported).collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Pending Reports for {}", today);

    if pending.is_empty() {
        let _ = writeln!(output, "Every unit has reported this month.");
    } else {
        for standing in pending {
            let leaders = if standing.users.is_empty() {
                "no registered leaders".to_string()
            } else {
                standing
                    .users
                    .iter()
                    .map(|u| u.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = writeln!(output, "- {} ({})", standing.unit.name, leaders);
        }
    }

    output
}
