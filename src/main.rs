// Entry point: load the subscription dataset once, then print every report
// in a fixed order, rendering charts and exports along the way.
mod charts;
mod derive;
mod error;
mod loader;
mod output;
mod reports;
mod types;
mod util;

use anyhow::{anyhow, Context, Result};
use charts::ChartRenderer;
use clap::Parser;
use error::ChartError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use types::{Crosstab, SubscriptionRecord};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Descriptive statistics and charts for a subscription dataset"
)]
struct Args {
    /// CSV file with one row per subscriber
    #[arg(default_value = "netflixdata/abc.csv")]
    input: PathBuf,

    /// Directory the PNG charts are written to
    #[arg(long, default_value = "charts")]
    chart_dir: PathBuf,

    /// Skip chart rendering
    #[arg(long)]
    no_charts: bool,

    /// Also write every report as CSV, plus summary.json, into this directory
    #[arg(long)]
    export: Option<PathBuf>,

    /// chrono format for Join Date and Last Payment Date (e.g. "%d-%m-%y")
    ///
    /// Without it a handful of common layouts are tried in turn.
    #[arg(long)]
    date_format: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Logs go to stderr so stdout carries only the report text.
fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Where report results go besides the console.
struct Outputs {
    charts: Option<ChartRenderer>,
    export_dir: Option<PathBuf>,
}

impl Outputs {
    fn new(args: &Args) -> Result<Self> {
        let charts = if args.no_charts {
            None
        } else {
            match ChartRenderer::new(&args.chart_dir) {
                Ok(renderer) => Some(renderer),
                Err(e) => {
                    warn!("Charts disabled: {}", e);
                    None
                }
            }
        };
        if let Some(dir) = &args.export {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating export directory {}", dir.display()))?;
        }
        Ok(Self {
            charts,
            export_dir: args.export.clone(),
        })
    }

    /// A chart that fails to render is reported and skipped.
    fn chart(&self, f: impl FnOnce(&ChartRenderer) -> Result<PathBuf, ChartError>) {
        let Some(renderer) = &self.charts else { return };
        match f(renderer) {
            Ok(path) => info!("Chart saved to {}", path.display()),
            Err(e) => warn!("Chart skipped: {}", e),
        }
    }

    fn export_path(&self, file: &str) -> Option<PathBuf> {
        self.export_dir.as_deref().map(|dir| dir.join(file))
    }

    fn export_rows<T: Serialize>(&self, file: &str, rows: &[T]) -> Result<()> {
        let Some(path) = self.export_path(file) else { return Ok(()) };
        output::write_csv(&path, rows).map_err(|e| anyhow!("writing {}: {}", path.display(), e))
    }

    fn export_crosstab(&self, file: &str, table: &Crosstab) -> Result<()> {
        let Some(path) = self.export_path(file) else { return Ok(()) };
        output::write_crosstab_csv(&path, table)
            .map_err(|e| anyhow!("writing {}: {}", path.display(), e))
    }

    fn export_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let Some(path) = self.export_path(file) else { return Ok(()) };
        output::write_json(&path, value).map_err(|e| anyhow!("writing {}: {}", path.display(), e))
    }
}

fn run_reports(data: &[SubscriptionRecord], out: &Outputs) -> Result<()> {
    output::print_section("Gender distribution by subscription plan (%)");
    let gender = reports::gender_distribution_by_plan(data);
    output::print_crosstab(&gender, 2);
    out.chart(|c| c.gender_by_plan(&gender));
    out.export_crosstab("gender_by_plan.csv", &gender)?;

    output::print_section("Percentage of users by country");
    let countries = reports::users_by_country(data);
    output::print_table(&output::share_rows(&countries));
    out.chart(|c| c.users_by_country(&countries));
    out.export_rows("users_by_country.csv", &countries)?;

    output::print_section("Age group with highest subscription rate for each plan type");
    let age_leaders = reports::age_group_leader_by_plan(data);
    output::print_table(&output::leader_rows(&age_leaders));
    out.export_rows("age_group_by_plan.csv", &age_leaders)?;

    output::print_section("Average age of users for each subscription type");
    let ages = reports::average_age_by_plan(data);
    output::print_table(&output::group_value_rows(&ages, 2));
    out.export_rows("average_age_by_plan.csv", &ages)?;

    output::print_section("Total number of subscribers for each subscription plan");
    let plans = reports::subscribers_by_plan(data);
    output::print_table(&output::share_rows(&plans));
    out.chart(|c| c.subscribers_by_plan(&plans));
    out.export_rows("subscribers_by_plan.csv", &plans)?;

    output::print_section("Monthly revenue by subscription type");
    let plan_revenue = reports::revenue_by_plan(data);
    output::print_table(&output::group_value_rows(&plan_revenue, 2));
    out.chart(|c| c.revenue_by_plan(&plan_revenue));
    out.export_rows("revenue_by_plan.csv", &plan_revenue)?;

    output::print_section("Average duration of subscription plans (days)");
    let durations = reports::average_duration_by_plan(data);
    output::print_table(&output::group_value_rows(&durations, 2));
    out.export_rows("duration_by_plan.csv", &durations)?;

    output::print_section("Average time between join date and last payment date");
    output::print_scalar("Days", reports::average_join_to_last_payment(data), 2);

    output::print_section("Average time since join by device type (days)");
    let devices = reports::average_tenure_by_device(data);
    output::print_table(&output::group_value_rows(&devices, 2));
    out.export_rows("tenure_by_device.csv", &devices)?;

    output::print_section("Percentage of users with recent payments");
    let recent = reports::recent_payment_share(data);
    if let Some(date) = recent.reference_date {
        println!("Latest payment in dataset: {}", date);
    }
    output::print_scalar("Payments in the last month (%)", recent.within_30_days, 2);
    output::print_scalar("Payments in the last three months (%)", recent.within_90_days, 2);
    out.export_json("recent_payments.json", &recent)?;

    output::print_section("Most common devices by subscription type");
    let common_devices = reports::common_device_by_plan(data);
    output::print_table(&output::leader_rows(&common_devices));
    out.export_rows("common_device_by_plan.csv", &common_devices)?;

    output::print_section("Correlation between device type and subscription plan");
    let device_plan = reports::device_plan_crosstab(data);
    output::print_crosstab(&device_plan, 4);
    out.chart(|c| c.device_plan_heatmap(&device_plan));
    out.export_crosstab("device_plan.csv", &device_plan)?;

    output::print_section("User sign-up trends over time");
    let signups = reports::monthly_signups(data);
    let signup_rows = output::monthly_rows(&signups);
    output::print_table(&signup_rows);
    out.chart(|c| c.signup_trends(&signups));
    out.export_rows("monthly_signups.csv", &signup_rows)?;

    output::print_section("Average tenure of subscribers");
    output::print_scalar("Days", reports::average_tenure(data), 2);

    output::print_section("Total revenue by country");
    let country_revenue = reports::revenue_by_country(data);
    output::print_table(&output::group_value_rows(&country_revenue, 2));
    out.export_rows("revenue_by_country.csv", &country_revenue)?;

    output::print_section("Correlation between revenue and number of subscribers by country");
    output::print_scalar("Pearson r", reports::revenue_subscriber_correlation(data), 4);

    output::print_section("Average Revenue Per User (ARPU) by country and subscription type");
    let arpu = reports::arpu_by_country_and_plan(data);
    output::print_table(&output::arpu_rows(&arpu));
    out.export_rows("arpu_by_country_and_plan.csv", &arpu)?;

    out.export_json("summary.json", &reports::summarize(data))?;
    Ok(())
}

fn load(path: &Path, date_format: Option<&str>) -> Result<Vec<SubscriptionRecord>> {
    loader::load_records(path, date_format)
        .with_context(|| format!("loading subscriptions from {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let data = load(&args.input, args.date_format.as_deref())?;
    let outputs = Outputs::new(&args)?;
    run_reports(&data, &outputs)?;

    if let Some(dir) = &args.export {
        info!("Reports exported to {}", dir.display());
    }
    Ok(())
}
