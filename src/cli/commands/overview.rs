//! `wl overview` command - Project-wide summary

use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{open_resolver, print_json, print_yaml, styled_state, truncate_str};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::index::RECENT_DAYS;

#[derive(clap::Args, Debug)]
pub struct OverviewArgs {
    /// Maximum number of recently updated items to show
    #[arg(long, default_value = "10")]
    pub recent: usize,
}

pub fn run(args: OverviewArgs, global: &GlobalOpts) -> Result<()> {
    let (_config, mut resolver) = open_resolver(global)?;
    let overview = resolver.engine_mut().get_project_overview()?;

    match global.format {
        OutputFormat::Json => return print_json(&overview),
        OutputFormat::Yaml => return print_yaml(&overview),
        _ => {}
    }

    println!("{}", style("Project Overview").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Total items:     {}", style(overview.total_items).cyan());
    println!("  Completion rate: {}%", style(overview.completion_rate).cyan());

    let mut counts = Builder::default();
    counts.push_record(["Type", "Count"]);
    for (item_type, count) in &overview.by_type {
        counts.push_record([item_type.clone(), count.to_string()]);
    }
    println!();
    println!("{}", counts.build().with(Style::markdown()));

    let mut states = Builder::default();
    states.push_record(["State", "Count"]);
    for (state, count) in &overview.by_state {
        states.push_record([state.clone(), count.to_string()]);
    }
    println!();
    println!("{}", states.build().with(Style::markdown()));

    let mut priorities = Builder::default();
    priorities.push_record(["Priority", "Count"]);
    for (priority, count) in &overview.by_priority {
        priorities.push_record([priority.clone(), count.to_string()]);
    }
    println!();
    println!("{}", priorities.build().with(Style::markdown()));

    if !overview.epics.is_empty() {
        let mut epics = Builder::default();
        epics.push_record(["Epic", "Title", "State", "Delivered", "Complete"]);
        for epic in &overview.epics {
            epics.push_record([
                epic.id.clone(),
                truncate_str(&epic.title, 40),
                epic.state.to_string(),
                format!("{}/{}", epic.delivered_count, epic.child_count),
                format!("{:.1}%", epic.completion_percentage),
            ]);
        }
        println!();
        println!("{}", style("Epics").bold());
        println!("{}", epics.build().with(Style::markdown()));
    }

    println!();
    println!(
        "{}",
        style(format!("Updated in the last {} days", RECENT_DAYS)).bold()
    );
    if overview.recently_updated.is_empty() {
        println!("  {}", style("(nothing)").dim());
    }
    for item in overview.recently_updated.iter().take(args.recent) {
        println!(
            "  {} {} {} [{}]",
            style(item.updated_at.format("%Y-%m-%d")).dim(),
            style(&item.id).cyan(),
            truncate_str(&item.title, 50),
            styled_state(item.state)
        );
    }

    Ok(())
}
