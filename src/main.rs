use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod admin;
mod analyst;
mod auth;
mod catalog;
mod config;
mod consolidation;
mod db;
mod models;
mod optimistic;
mod report;
mod resolver;
mod session;
mod store;
mod workspace;

use crate::admin::AdminDashboard;
use crate::analyst::{Analyst, GeminiAnalyst};
use crate::auth::LeaderLogin;
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::models::{AnalysisPeriod, Council, CouncilFilter, Month, Role, User};
use crate::session::SessionStore;
use crate::workspace::Workspace;

#[derive(Parser)]
#[command(name = "council-indicators")]
#[command(about = "Monthly indicator reporting for the Tegucigalpa and Comayagüela councils", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import monthly values from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Log in as a stake or district leader with the unit access key
    Login {
        #[arg(long)]
        unit: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Log in as the council administrator
    AdminLogin {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session
    Logout {
        /// Also forget access key overrides
        #[arg(long)]
        all: bool,
    },
    /// Delete your user and end the session
    Deregister,
    /// Set the profile image of the logged-in user
    ProfileImage {
        #[arg(long)]
        image: String,
    },
    /// Show a unit's indicators for a period
    Indicators {
        #[arg(long)]
        unit: Option<String>,
        #[arg(long, default_value = "Anual")]
        period: AnalysisPeriod,
    },
    /// Record a monthly value for your unit
    Record {
        #[arg(long)]
        indicator: String,
        #[arg(long)]
        month: Month,
        #[arg(long)]
        value: String,
    },
    /// Set goals for your unit, e.g. --set mision=30
    Goals {
        #[arg(long = "set", value_parser = parse_goal, required = true)]
        goals: Vec<(String, f64)>,
    },
    /// Ask the analysis assistant about a unit's data
    Ask {
        #[arg(long)]
        unit: Option<String>,
        question: Option<String>,
    },
    /// Progress of every unit, or the detail of one with --unit
    Overview {
        #[arg(long, default_value = "Anual")]
        period: AnalysisPeriod,
        #[arg(long)]
        council: Option<Council>,
        #[arg(long)]
        unit: Option<String>,
    },
    /// Indicators consolidated per council, for one or more periods
    Councils {
        #[arg(long = "period", default_value = "Anual")]
        periods: Vec<AnalysisPeriod>,
    },
    /// Rank units on one indicator
    Compare {
        #[arg(long)]
        indicator: String,
        #[arg(long, default_value = "Anual")]
        period: AnalysisPeriod,
        #[arg(long)]
        council: Option<Council>,
    },
    /// Leaders of units that have not reported this month
    Reminders,
    /// List registered users
    Users {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        council: Option<Council>,
    },
    /// Remove a user by phone
    RemoveUser {
        #[arg(long)]
        phone: String,
    },
    /// Change the access key of a unit
    SetKey {
        #[arg(long)]
        unit: String,
        #[arg(long)]
        key: String,
    },
    /// Show the effective access key of every unit
    Keys,
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "Anual")]
        period: AnalysisPeriod,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn parse_goal(input: &str) -> Result<(String, f64), String> {
    let (id, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected INDICATOR=GOAL, got '{input}'"))?;
    let id = id.trim();
    if catalog::template(id).is_none() {
        return Err(format!("unknown indicator '{id}'"));
    }
    Ok((id.to_string(), store::parse_amount(value)))
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgStore> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")?;
    Ok(PgStore::new(pool))
}

fn logged_in(session: &SessionStore) -> anyhow::Result<&User> {
    session
        .current_user()
        .context("no active session, run `login` first")
}

fn require_admin(session: &SessionStore) -> anyhow::Result<()> {
    if logged_in(session)?.role != Role::AreaSeventy {
        bail!("this command is reserved for the council administrator");
    }
    Ok(())
}

/// Unit to act on: an explicit one (administrators only) or the leader's own.
fn target_unit(session: &SessionStore, requested: Option<String>) -> anyhow::Result<String> {
    let user = logged_in(session)?;
    match (requested, user.role) {
        (Some(unit), Role::AreaSeventy) => Ok(unit),
        (None, Role::AreaSeventy) => bail!("pass --unit to choose a stake or district"),
        (_, Role::StakeLeader) => user
            .unit_id
            .clone()
            .context("the session user has no unit"),
    }
}

async fn load_dashboard(
    store: &PgStore,
    period: AnalysisPeriod,
) -> anyhow::Result<AdminDashboard> {
    let mut dashboard = AdminDashboard::new(period, Month::current());
    dashboard.load(store).await?;
    if !dashboard.is_ready() {
        bail!("the data store returned no user list, try again shortly");
    }
    Ok(dashboard)
}

fn print_workspace(workspace: &Workspace) {
    println!(
        "{} ({}), period {}",
        workspace.unit().name,
        workspace.unit().council,
        workspace.period()
    );
    for (priority, indicators) in workspace.by_priority() {
        println!("\n{}", priority.label());
        for indicator in indicators {
            println!(
                "- {} [{}]: {:.1} of {:.1} ({:.0}%)",
                indicator.template.name,
                indicator.template.criteria.label(),
                indicator.current,
                indicator.goal,
                indicator.progress
            );
        }
    }
    let month = Month::current();
    println!(
        "\n{} of {} indicators reported for {}.",
        workspace.filled_count(month),
        workspace.indicators().len(),
        month
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let mut session = SessionStore::load(&config.session_file)
        .with_context(|| format!("failed to open {}", config.session_file.display()))?;

    match cli.command {
        Commands::InitDb => {
            let store = connect(&config).await?;
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let store = connect(&config).await?;
            db::seed(&store).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let store = connect(&config).await?;
            let written = db::import_csv(&store, &csv).await?;
            println!("Imported {written} values from {}.", csv.display());
        }
        Commands::Login {
            unit,
            key,
            phone,
            name,
        } => {
            let store = connect(&config).await?;
            let form = LeaderLogin {
                unit_id: unit,
                access_key: key,
                phone,
                name,
            };
            let user = auth::login_leader(&store, &mut session, &form).await?;
            println!("Welcome, {}.", user.name);
        }
        Commands::AdminLogin { phone, password } => {
            let user = auth::admin_login(config.admin.as_ref(), &mut session, &phone, &password)?;
            println!("Welcome, {}.", user.name);
        }
        Commands::Logout { all } => {
            if all {
                session.clear()?;
                println!("Session and access key overrides cleared.");
            } else {
                session.logout()?;
                println!("Session closed.");
            }
        }
        Commands::Deregister => {
            let store = connect(&config).await?;
            auth::deregister(&store, &mut session).await?;
            println!("Your user was removed and the session closed.");
        }
        Commands::ProfileImage { image } => {
            let store = connect(&config).await?;
            auth::update_profile_image(&store, &mut session, image).await?;
            println!("Profile image updated.");
        }
        Commands::Indicators { unit, period } => {
            let unit_id = target_unit(&session, unit)?;
            let store = connect(&config).await?;
            let workspace = Workspace::load(&store, &unit_id, period).await?;
            print_workspace(&workspace);
        }
        Commands::Record {
            indicator,
            month,
            value,
        } => {
            let unit_id = target_unit(&session, None)?;
            let store = connect(&config).await?;
            let mut workspace = Workspace::load(&store, &unit_id, AnalysisPeriod::Annual).await?;
            let saved = workspace
                .record_value(&store, &indicator, month, &value)
                .await?;
            println!("Saved {saved} for {indicator} in {month}.");
            if let Some(updated) = workspace.indicator(&indicator) {
                println!(
                    "Annual figure is now {:.1} of {:.1} ({:.0}%).",
                    updated.current, updated.goal, updated.progress
                );
            }
            workspace.set_period(AnalysisPeriod::Month(month));
            if let Some(updated) = workspace.indicator(&indicator) {
                println!("{month} figure is {:.1} ({:.0}%).", updated.current, updated.progress);
            }
        }
        Commands::Goals { goals } => {
            let unit_id = target_unit(&session, None)?;
            let store = connect(&config).await?;
            let mut workspace = Workspace::load(&store, &unit_id, AnalysisPeriod::Annual).await?;
            let goals: HashMap<String, f64> = goals.into_iter().collect();
            let count = goals.len();
            workspace.save_goals(&store, goals).await?;
            println!("Saved {count} goals.");
        }
        Commands::Ask { unit, question } => {
            let unit_id = target_unit(&session, unit)?;
            let store = connect(&config).await?;
            let workspace = Workspace::load(&store, &unit_id, AnalysisPeriod::Annual).await?;
            let analyst = GeminiAnalyst::new(config.gemini()?)?;
            let answer = analyst
                .analyze(workspace.indicators(), question.as_deref())
                .await?;
            println!("{answer}");
        }
        Commands::Overview {
            period,
            council,
            unit: Some(unit_id),
        } => {
            require_admin(&session)?;
            let store = connect(&config).await?;
            let dashboard = load_dashboard(&store, period).await?;
            let standing = dashboard
                .standing(&unit_id)
                .with_context(|| format!("unknown unit '{unit_id}'"))?;
            if !CouncilFilter::from(council).admits(standing.unit.council) {
                bail!("{} does not belong to the selected council", standing.unit.name);
            }
            println!(
                "{} ({}) {:.1}% for {period}",
                standing.unit.name, standing.unit.council, standing.avg_progress
            );
            for indicator in &standing.indicators {
                println!(
                    "- {}: {:.1} of {:.1} ({:.0}%)",
                    indicator.template.name, indicator.current, indicator.goal, indicator.progress
                );
            }
        }
        Commands::Overview {
            period,
            council,
            unit: None,
        } => {
            require_admin(&session)?;
            let store = connect(&config).await?;
            let dashboard = load_dashboard(&store, period).await?;
            println!("Unit progress for {period}:");
            for standing in dashboard.overview(CouncilFilter::from(council)) {
                println!(
                    "- {} ({}) {:.1}% {}",
                    standing.unit.name,
                    standing.unit.council,
                    standing.avg_progress,
                    if standing.has_reported { "reported" } else { "pending" }
                );
            }
        }
        Commands::Councils { periods } => {
            require_admin(&session)?;
            let first = periods.first().copied().unwrap_or_default();
            let store = connect(&config).await?;
            let mut dashboard = load_dashboard(&store, first).await?;
            for period in periods {
                // One load serves every period.
                dashboard.set_period(period);
                for rollup in dashboard.councils() {
                    println!("\n{} ({period})", rollup.council);
                    for indicator in rollup.indicators {
                        println!(
                            "- {}: {:.1} of {:.1} ({:.1}%)",
                            indicator.template.name,
                            indicator.current,
                            indicator.goal,
                            indicator.progress
                        );
                    }
                }
            }
        }
        Commands::Compare {
            indicator,
            period,
            council,
        } => {
            require_admin(&session)?;
            let template =
                catalog::template(&indicator).with_context(|| format!("unknown indicator '{indicator}'"))?;
            let store = connect(&config).await?;
            let dashboard = load_dashboard(&store, period).await?;
            println!("{} ({period}):", template.name);
            for row in dashboard.compare(template.id, CouncilFilter::from(council)) {
                println!(
                    "- {}: {:.1} of {:.1} ({:.1}%)",
                    row.unit.short_name(),
                    row.current,
                    row.goal,
                    row.progress
                );
            }
        }
        Commands::Reminders => {
            require_admin(&session)?;
            let store = connect(&config).await?;
            let dashboard = load_dashboard(&store, AnalysisPeriod::Annual).await?;
            let reminders = dashboard.pending_reminders();
            if reminders.is_empty() {
                println!("No reminders to send for {}.", dashboard.today());
            }
            for reminder in reminders {
                println!(
                    "{} ({}, {}):\n  {}",
                    reminder.user.name, reminder.user.phone, reminder.unit.name, reminder.message
                );
            }
        }
        Commands::Users { search, council } => {
            require_admin(&session)?;
            let store = connect(&config).await?;
            let dashboard = load_dashboard(&store, AnalysisPeriod::Annual).await?;
            let entries = dashboard.roster(&search, CouncilFilter::from(council));
            if entries.is_empty() {
                println!("No users found.");
            }
            for entry in entries {
                let council = entry
                    .council
                    .map(|c| c.label().to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                println!(
                    "- {} ({}) {} / {}",
                    entry.user.name, entry.user.phone, entry.unit_name, council
                );
            }
        }
        Commands::RemoveUser { phone } => {
            require_admin(&session)?;
            let store = connect(&config).await?;
            let mut dashboard = load_dashboard(&store, AnalysisPeriod::Annual).await?;
            dashboard
                .remove_user(&store, &phone)
                .await
                .context("failed to remove the user from the data store")?;
            println!("User {phone} removed.");
        }
        Commands::SetKey { unit, key } => {
            require_admin(&session)?;
            if catalog::unit_by_id(&unit).is_none() {
                bail!("unknown stake or district '{unit}'");
            }
            session.set_access_key(&unit, &key)?;
            println!("Access key for {unit} updated.");
        }
        Commands::Keys => {
            require_admin(&session)?;
            for (unit, key) in admin::access_keys(&session) {
                println!("- {} ({}): {}", unit.name, unit.council, key);
            }
        }
        Commands::Report { period, out } => {
            require_admin(&session)?;
            let store = connect(&config).await?;
            let dashboard = load_dashboard(&store, period).await?;
            let report = report::build_report(
                dashboard.period(),
                Local::now().date_naive(),
                dashboard.today(),
                &dashboard.councils(),
                dashboard.standings(),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
