//! `wl related` command - Dependency view of one item

use console::style;
use miette::Result;

use crate::cli::helpers::{item_line, open_resolver, print_json, print_yaml};
use crate::cli::{exit, GlobalOpts, OutputFormat};

#[derive(clap::Args, Debug)]
pub struct RelatedArgs {
    /// Item id
    pub id: String,
}

pub fn run(args: RelatedArgs, global: &GlobalOpts) -> Result<i32> {
    let (_config, mut resolver) = open_resolver(global)?;
    if resolver.engine_mut().find_item(&args.id)?.is_none() {
        eprintln!("{} No item with id {}", style("✗").red(), style(&args.id).cyan());
        return Ok(exit::ISSUES);
    }

    let related = resolver.get_related_items(&args.id)?;

    match global.format {
        OutputFormat::Json => print_json(&related)?,
        OutputFormat::Yaml => print_yaml(&related)?,
        OutputFormat::Id | OutputFormat::Tsv => {
            for item in &related.blockers {
                println!("blocker\t{}", item.id);
            }
            for id in &related.missing {
                println!("missing\t{}", id);
            }
            for item in &related.dependents {
                println!("dependent\t{}", item.id);
            }
        }
        OutputFormat::Auto | OutputFormat::Md => {
            println!("{}", style(format!("Relations of {}", related.id)).bold());
            println!("{}", style("─".repeat(40)).dim());

            println!("{}", style("Waits on:").bold());
            if related.blockers.is_empty() && related.missing.is_empty() {
                println!("  {}", style("(nothing)").dim());
            }
            for item in &related.blockers {
                println!("  {}", item_line(item));
            }
            for id in &related.missing {
                println!("  {} {}", style(id).red(), style("(not indexed)").dim());
            }

            println!();
            println!("{}", style("Needed by:").bold());
            if related.dependents.is_empty() {
                println!("  {}", style("(nothing)").dim());
            }
            for item in &related.dependents {
                println!("  {}", item_line(item));
            }
        }
    }

    Ok(exit::OK)
}
