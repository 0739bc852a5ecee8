// Entry point and high-level CLI flow.
//
// - Option [1] loads and cleans the project CSV, printing diagnostics.
// - Option [2] generates the project views (overview, contractors, delays,
//   scorecards, investigative, regional map) plus a JSON summary.
// - Option [3] generates the budget views from the budget workbooks.
// - Options [4] and [5] drill into one contractor or one scorecard entity.
// Each section fails on its own: a missing file or bad sheet prints a
// section-local message and the rest keeps going.
use anyhow::{Context, Result};
use clap::Parser;
use dpwh_pipeline::config::AppConfig;
use dpwh_pipeline::error::PipelineError;
use dpwh_pipeline::geo::{join_regions, GeoAvailability};
use dpwh_pipeline::output::{preview_table, write_csv, write_json};
use dpwh_pipeline::reports::{self, MapMetric};
use dpwh_pipeline::scorecard::{compute_scorecard, entity_deep_dive, EntityDimension};
use dpwh_pipeline::util::{format_billions, format_int, format_millions, format_number};
use dpwh_pipeline::DataService;
use std::io::{self, BufRead, Write};
use dpwh_pipeline::types::ProjectRecord;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "dpwh_pipeline", about = "DPWH project and budget data reports")]
struct Args {
    /// TOML file overriding the default paths and settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the input files.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Directory receiving the CSV/JSON exports.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Generate every report once and exit, without the menu.
    #[arg(long)]
    all: bool,
}

/// Read a single line after printing `prompt`. `None` once input is exhausted.
fn read_line_from<R: BufRead>(input: &mut R, prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn read_line(prompt: &str) -> Option<String> {
    read_line_from(&mut io::stdin().lock(), prompt)
}

/// Ask whether to go back to the report selection menu. End of input means no.
fn prompt_back_to_menu_from<R: BufRead>(input: &mut R) -> bool {
    loop {
        let Some(answer) = read_line_from(input, "Back to Report Selection (Y/N): ") else {
            return false;
        };
        match answer.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn prompt_back_to_menu() -> bool {
    prompt_back_to_menu_from(&mut io::stdin().lock())
}

/// Run one report section, reporting its failure without stopping the others.
fn run_section<F>(name: &str, section: F)
where
    F: FnOnce() -> Result<()>,
{
    if let Err(e) = section() {
        error!(section = name, error = %e, "section failed");
        match e.downcast_ref::<PipelineError>() {
            Some(pe) if pe.is_missing_source() => {
                println!("[{}] No data available: {}\n", name, pe)
            }
            _ => println!("[{}] Error: {:#}\n", name, e),
        }
    }
}

fn handle_load(service: &DataService) -> Result<()> {
    let dataset = service.project_dataset()?;
    let r = &dataset.report;
    println!(
        "Processing dataset... ({} rows read, {} kept)",
        format_int(r.total_rows as u64),
        format_int(r.kept_rows as u64)
    );
    println!(
        "Note: {} rows dropped for missing/unparseable fields, {} rows repeat an earlier project ID (kept).",
        format_int(r.dropped_incomplete as u64),
        format_int(r.duplicate_ids as u64)
    );
    println!();
    Ok(())
}

fn handle_project_reports(service: &DataService) -> Result<()> {
    let dataset = service.project_dataset()?;
    let data = &dataset.records;
    let out = service.config().output_dir.clone();
    println!("Generating project reports into {}...\n", out.display());

    run_section("National Overview", || {
        let kpis = reports::overview(data);
        println!("National Overview");
        println!("  Total Projects Analyzed: {}", format_int(kpis.total_projects as u64));
        println!("  Total Investment:        {}", format_billions(kpis.total_investment));
        println!(
            "  Projects with Delays:    {} ({}%)",
            format_int(kpis.overdue_projects as u64),
            format_number(kpis.overdue_share_pct, 1)
        );
        match kpis.avg_delay_overdue_days {
            Some(d) => println!("  Average Delay Duration:  {} days\n", format_number(d, 0)),
            None => println!("  Average Delay Duration:  No Delays\n"),
        }
        let by_region = reports::investment_by_region(data);
        write_csv(&out.join("investment_by_region.csv"), &by_region)?;
        preview_table("Total Contract Cost per Region", None, &by_region, 5);
        Ok(())
    });

    run_section("Contractor Analysis", || {
        let by_count = reports::top_contractors_by_count(data, reports::TOP_CONTRACTORS);
        let by_value = reports::top_contractors_by_value(data, reports::TOP_CONTRACTORS);
        write_csv(&out.join("top_contractors_by_count.csv"), &by_count)?;
        write_csv(&out.join("top_contractors_by_value.csv"), &by_value)?;
        preview_table("Top 15 Contractors by Project Count", None, &by_count, 5);
        preview_table("Top 15 Contractors by Total Contract Value", None, &by_value, 5);
        Ok(())
    });

    run_section("Delay Analysis", || {
        let delayed = reports::top_delayed_projects(data, reports::TOP_DELAYED);
        let histogram = reports::delay_histogram(data, reports::DELAY_HISTOGRAM_BINS);
        let by_region = reports::avg_delay_by_region(data);
        write_csv(&out.join("top_delayed_projects.csv"), &delayed)?;
        write_csv(&out.join("delay_histogram.csv"), &histogram)?;
        write_csv(&out.join("avg_delay_by_region.csv"), &by_region)?;
        preview_table("Top 20 Most Delayed Projects", None, &delayed, 5);
        preview_table("Average Delay by Region", Some("late projects only"), &by_region, 5);
        Ok(())
    });

    for dimension in EntityDimension::ALL {
        run_section("Risk Factor Scorecard", || {
            let rows = compute_scorecard(data, dimension);
            write_csv(&out.join(format!("scorecard_{}.csv", dimension.slug())), &rows)?;
            preview_table(
                &format!("Risk Factor Scorecard: {}", dimension.label()),
                Some("sorted by total contract value"),
                &rows,
                5,
            );
            Ok(())
        });
    }

    run_section("Investigative Insights", || {
        let rows = reports::contractors_of_interest(data, &service.config().contractors_of_interest);
        write_csv(&out.join("contractors_of_interest.csv"), &rows)?;
        preview_table("Summary for Identified Contractors", None, &rows, 10);
        Ok(())
    });

    run_section("Regional Map", || regional_map_section(service, data, &out));

    let summary = reports::generate_summary(data);
    write_json(&out.join("summary.json"), &summary).context("writing summary.json")?;
    println!("Summary Stats (summary.json):");
    println!("{}\n", serde_json::to_string(&summary)?);
    Ok(())
}

/// Both map metrics against one geometry lookup.
fn regional_map_section(service: &DataService, data: &[ProjectRecord], out: &Path) -> Result<()> {
    let geometry = service.region_geometry();
    if let GeoAvailability::Unavailable { reason } = &geometry {
        println!("Map unavailable ({}); showing tables only.\n", reason);
    }
    for metric in [MapMetric::TotalContractCost, MapMetric::NumberOfProjects] {
        let values = reports::regional_map(data, metric);
        let file = match metric {
            MapMetric::TotalContractCost => "region_map_cost.csv",
            MapMetric::NumberOfProjects => "region_map_count.csv",
        };
        write_csv(&out.join(file), &values)?;
        if let Some(doc) = geometry.document() {
            let join = join_regions(&values, doc);
            info!(
                matched = join.matched.len(),
                unmatched = join.unmatched.len(),
                "joined regions to geometry"
            );
            if !join.unmatched.is_empty() {
                let keys: Vec<&str> = join.unmatched.iter().map(|g| g.key.as_str()).collect();
                println!("Regions without a map shape: {}", keys.join(", "));
            }
        }
        preview_table(&format!("{} by Region", metric.label()), None, &values, 5);
    }
    Ok(())
}

fn handle_budget_reports(service: &DataService) {
    let out = service.config().output_dir.clone();

    run_section("DPWH Budget Trend", || {
        let totals = service.budget_trend()?;
        write_csv(&out.join("budget_trend.csv"), &totals)?;
        preview_table("Total DPWH Budget per Year (GAA)", None, &totals, 20);
        Ok(())
    });

    run_section("Proposed (NEP) vs. Approved (GAA) Budget", || {
        let rows = service.nep_vs_gaa()?;
        write_csv(&out.join("nep_vs_gaa.csv"), &rows)?;
        preview_table("Comparison by Program", None, &rows, 10);
        Ok(())
    });

    run_section("DPWH vs. Other National Agencies", || {
        let agencies = service.top_agencies()?;
        write_csv(&out.join("top_agencies.csv"), &agencies)?;
        preview_table(
            &format!(
                "Top 10 Government Agencies by Budget ({})",
                service.config().agency_fiscal_year
            ),
            None,
            &agencies,
            10,
        );
        Ok(())
    });
}

fn handle_contractor_dive(service: &DataService) -> Result<()> {
    let dataset = service.project_dataset()?;
    let Some(name) = read_line("Contractor name: ") else {
        return Ok(());
    };
    let name = name.to_uppercase();
    let Some(profile) = reports::contractor_profile(&dataset.records, &name) else {
        let close: Vec<String> = reports::contractor_names(&dataset.records)
            .into_iter()
            .filter(|c| c.contains(&name))
            .take(10)
            .collect();
        println!("No contractor named '{}'.", name);
        if !close.is_empty() {
            println!("Did you mean: {}", close.join("; "));
        }
        println!();
        return Ok(());
    };
    println!("Total Projects:        {}", profile.total_projects);
    println!("Total Contract Value:  {}", format_millions(profile.total_contract_value));
    match profile.avg_delay_days {
        Some(d) => println!("Average Project Delay: {} days\n", format_number(d, 0)),
        None => println!("Average Project Delay: No Delays\n"),
    }
    preview_table(&profile.contractor, None, &profile.projects, 20);
    Ok(())
}

fn handle_entity_dive(service: &DataService) -> Result<()> {
    let dataset = service.project_dataset()?;
    println!("[1] Provinces  [2] Implementing Offices  [3] Contractors");
    let Some(choice) = read_line("Enter choice: ") else {
        return Ok(());
    };
    let dimension = match choice.as_str() {
        "1" => EntityDimension::Province,
        "2" => EntityDimension::ImplementingOffice,
        "3" => EntityDimension::Contractor,
        _ => {
            println!("Invalid choice.\n");
            return Ok(());
        }
    };
    let Some(key) = read_line("Entity name: ") else {
        return Ok(());
    };
    match entity_deep_dive(&dataset.records, dimension, &key) {
        Some(dive) => {
            println!("\nAnalysis for: {}\n", dive.key);
            let delayed: Vec<_> = dive
                .top_delayed
                .iter()
                .map(|r| (r.project_description.clone().unwrap_or_default(), r.project_delay))
                .collect();
            if delayed.is_empty() {
                println!("No delayed projects found.\n");
            } else {
                println!("Top 5 Delayed Projects");
                for (desc, days) in delayed {
                    println!("  {:>6} days  {}", days, desc);
                }
                println!();
            }
            preview_table("Top 5 Contractors by Contract Value", None, &dive.top_contractors, 5);
        }
        None => println!("No {} named '{}'.\n", dimension.label().to_lowercase(), key),
    }
    Ok(())
}

fn init_logging() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    info!(data_dir = %config.data_dir.display(), "startup");
    let service = DataService::from_config(config);

    if args.all {
        run_section("Project Data", || handle_project_reports(&service));
        handle_budget_reports(&service);
        return Ok(());
    }

    loop {
        println!("Select Report:");
        println!("[1] Load the file");
        println!("[2] Generate Project Reports");
        println!("[3] Generate Budget Reports");
        println!("[4] Contractor Deep Dive");
        println!("[5] Scorecard Deep Dive");
        println!("[0] Exit\n");
        let Some(choice) = read_line("Enter choice: ") else {
            println!("Exiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => run_section("Project Data", || handle_load(&service)),
            "2" => {
                println!();
                if !service.dataset_loaded() {
                    println!("Note: project data not loaded yet; loading now.\n");
                }
                run_section("Project Data", || handle_project_reports(&service));
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => {
                println!();
                // Budget reports do not need the project file.
                handle_budget_reports(&service);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            "4" => run_section("Contractor Deep Dive", || handle_contractor_dive(&service)),
            "5" => run_section("Scorecard Deep Dive", || handle_entity_dive(&service)),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-5.\n"),
        }
    }
    Ok(())
}
