//! `wl index` command - Maintain the derived index
//!
//! The index (`.workline/index.json`) is derived from the item documents and
//! can always be rebuilt from them. `validate` and `repair` report their
//! result through the exit code: 0 healthy, 1 issues found (repaired or not),
//! 2 repair failed.

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{open_project, print_json, print_yaml};
use crate::cli::{exit, GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::core::identity::ItemType;
use crate::core::index::{HealthReport, IndexEngine, RepairReport};

#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Rebuild the index from scratch
    Rebuild,

    /// Show index statistics
    Status,

    /// Compare the index with the documents on disk
    Validate {
        /// Repair any problems found
        #[arg(long)]
        repair: bool,
    },

    /// Validate and repair in one step
    Repair,

    /// Delete the index file
    Clear,
}

pub fn run(cmd: IndexCommands, global: &GlobalOpts) -> Result<i32> {
    let project = open_project(global)?;
    let config = Config::load_with(Some(&project));
    let mut engine = IndexEngine::open(project, &config);

    match cmd {
        IndexCommands::Rebuild => run_rebuild(&mut engine, global),
        IndexCommands::Status => run_status(&mut engine, global),
        IndexCommands::Validate { repair } => run_validate(&mut engine, repair, global),
        IndexCommands::Repair => run_validate(&mut engine, true, global),
        IndexCommands::Clear => run_clear(&mut engine, global),
    }
}

fn run_rebuild(engine: &mut IndexEngine, global: &GlobalOpts) -> Result<i32> {
    if global.format == OutputFormat::Auto && !global.quiet {
        println!("{} Rebuilding index...", style("→").blue());
    }
    let stats = engine.rebuild_index()?;

    match global.format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Yaml => print_yaml(&stats)?,
        _ => {
            println!(
                "{} Index rebuilt in {}ms",
                style("✓").green(),
                stats.duration_ms
            );
            println!("  Items indexed:      {}", stats.items_indexed);
            if stats.duplicates_skipped > 0 {
                println!(
                    "  Duplicates skipped: {}",
                    style(stats.duplicates_skipped).yellow()
                );
            }
            if !stats.persisted {
                println!(
                    "{} Index could not be written; see the log for details",
                    style("!").yellow()
                );
            }
        }
    }

    Ok(exit::OK)
}

fn run_status(engine: &mut IndexEngine, global: &GlobalOpts) -> Result<i32> {
    let path = engine.project().index_path();
    let present = path.exists();
    let index = engine.load_index()?;

    match global.format {
        OutputFormat::Json => print_json(&index.counts)?,
        OutputFormat::Yaml => print_yaml(&index.counts)?,
        _ => {
            println!("{}", style("Index Status").bold());
            println!("{}", style("─".repeat(40)).dim());
            println!("  Location:      {}", path.display());
            if !present {
                println!("  {}", style("(no index file, built from documents)").dim());
            }
            println!("  Version:       {}", index.version);
            println!(
                "  Last updated:  {}",
                index.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("  Total items:   {}", style(index.counts.total).cyan());
            println!();
            println!("  {}", style("By Type:").bold());
            for &item_type in ItemType::indexed() {
                let count = index.map(item_type).map_or(0, |m| m.len());
                println!("    {:<15} {}", item_type.plural(), count);
            }
        }
    }

    Ok(exit::OK)
}

fn run_validate(engine: &mut IndexEngine, repair: bool, global: &GlobalOpts) -> Result<i32> {
    let report = engine.validate_index_health()?;

    if !report.has_issues() {
        match global.format {
            OutputFormat::Json => print_json(&report)?,
            OutputFormat::Yaml => print_yaml(&report)?,
            _ => {
                if !global.quiet {
                    println!(
                        "{} Index is healthy ({} items)",
                        style("✓").green(),
                        report.stats.indexed_count
                    );
                }
            }
        }
        return Ok(exit::OK);
    }

    if !repair {
        match global.format {
            OutputFormat::Json => print_json(&report)?,
            OutputFormat::Yaml => print_yaml(&report)?,
            _ => print_health(&report),
        }
        return Ok(exit::ISSUES);
    }

    let repaired = engine.auto_repair_index()?;
    match global.format {
        OutputFormat::Json => print_json(&repaired)?,
        OutputFormat::Yaml => print_yaml(&repaired)?,
        _ => {
            print_health(&repaired.before);
            println!();
            print_repair(&repaired);
        }
    }

    Ok(if repaired.repaired {
        exit::ISSUES
    } else {
        exit::REPAIR_FAILED
    })
}

fn run_clear(engine: &mut IndexEngine, global: &GlobalOpts) -> Result<i32> {
    let removed = engine.clear_index()?;
    if !global.quiet {
        if removed {
            println!("{} Index cleared", style("✓").green());
        } else {
            println!("{} No index file to clear", style("•").dim());
        }
    }
    Ok(exit::OK)
}

fn print_health(report: &HealthReport) {
    println!("{}", style("Index Health").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Documents on disk: {}", report.stats.file_count);
    println!("  Indexed items:     {}", report.stats.indexed_count);
    println!("  Missing:           {}", report.stats.missing_count);
    println!("  Orphaned:          {}", report.stats.orphaned_count);

    if !report.issues.is_empty() {
        println!();
        println!("{}", style("Issues:").bold());
        for issue in &report.issues {
            println!("  {} {}", style("✗").red(), issue);
        }
    }

    if !report.suggestions.is_empty() {
        println!();
        println!("{}", style("Suggestions:").bold());
        for suggestion in &report.suggestions {
            println!("  {} {}", style("→").blue(), suggestion);
        }
    }
}

fn print_repair(report: &RepairReport) {
    for action in &report.actions {
        println!("  {} {}", style("✓").green(), action);
    }
    for error in &report.errors {
        println!("  {} {}", style("✗").red(), error);
    }

    if report.repaired {
        println!("{} Index repaired", style("✓").green());
    } else {
        println!(
            "{} Index still has {} problem(s) after repair",
            style("✗").red(),
            report.after.issues.len()
        );
        for issue in &report.after.issues {
            println!("    {}", issue);
        }
    }
}
