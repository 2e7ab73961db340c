//! `wl show` command - Show a single item

use console::style;
use miette::Result;

use crate::cli::helpers::{open_resolver, print_json, print_yaml, styled_state};
use crate::cli::{exit, GlobalOpts, OutputFormat};
use crate::core::item::ItemRecord;

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Item id (e.g. EP-0001, TSK-0042)
    pub id: String,
}

pub fn run(args: ShowArgs, global: &GlobalOpts) -> Result<i32> {
    let (_config, mut resolver) = open_resolver(global)?;
    let Some(item) = resolver.engine_mut().find_item(&args.id)? else {
        eprintln!("{} No item with id {}", style("✗").red(), style(&args.id).cyan());
        return Ok(exit::ISSUES);
    };

    match global.format {
        OutputFormat::Json => print_json(item)?,
        OutputFormat::Auto => print_item(item),
        OutputFormat::Id => println!("{}", item.id),
        _ => print_yaml(item)?,
    }

    Ok(exit::OK)
}

fn print_item(item: &ItemRecord) {
    println!(
        "{} {}",
        style(&item.id).cyan().bold(),
        style(&item.title).bold()
    );
    println!("{}", style("─".repeat(60)).dim());
    println!("  Type:       {}", item.item_type);
    println!("  State:      {}", styled_state(item.effective_state()));
    if item.resolution.is_some() {
        println!("  Lifecycle:  {}", item.status);
    }
    println!("  Priority:   {}", item.priority);
    if let Some(assignee) = &item.assignee {
        println!("  Assignee:   {}", assignee);
    }
    if !item.tags.is_empty() {
        let tags: Vec<&str> = item.tags.iter().map(String::as_str).collect();
        println!("  Tags:       {}", tags.join(", "));
    }
    if let Some(pct) = item.completion_percentage {
        println!("  Complete:   {}%", pct);
    }

    for parent in item.parent_refs() {
        println!("  {:<11} {}", format!("{}:", parent.parent_type), style(parent.id).cyan());
    }
    if !item.dependencies.is_empty() {
        println!("  Depends on: {}", item.dependencies.join(", "));
    }
    if !item.blocked_by.is_empty() {
        println!("  Blocked by: {}", item.blocked_by.join(", "));
    }
    if !item.children.is_empty() {
        println!(
            "  Children:   {} issue(s), {} task(s), {} PR(s)",
            item.children.issues.len(),
            item.children.tasks.len(),
            item.children.prs.len()
        );
    }

    if let Some(created) = item.created_at {
        println!("  Created:    {}", created.format("%Y-%m-%d %H:%M"));
    }
    if let Some(updated) = item.updated_at {
        println!("  Updated:    {}", updated.format("%Y-%m-%d %H:%M"));
    }
    println!("  File:       {}", style(item.file_path.display()).dim());

    if let Some(record) = &item.state_metadata {
        println!();
        println!("{}", style("Last transition").bold());
        println!(
            "  {} → {} by {} on {}",
            record.previous_state,
            item.effective_state(),
            record.transitioned_by,
            record.transitioned_at.format("%Y-%m-%d %H:%M")
        );
        if let Some(reason) = &record.reason {
            println!("  Reason:     {}", reason);
        }
        if let Some(reviewer) = &record.reviewer {
            println!("  Reviewer:   {}", reviewer);
        }
    }
}
