//! `wl list` command - List items of one type

use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{open_resolver, print_json, print_yaml, truncate_str};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::ItemType;
use crate::core::item::{ItemRecord, Priority, WorkflowState};

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Item type (epic, issue, task, pr)
    pub item_type: ItemType,

    /// Only items in this effective state (e.g. active, ready_for_qa)
    #[arg(long, short = 's')]
    pub status: Option<WorkflowState>,

    /// Only items assigned to this person
    #[arg(long, short = 'a')]
    pub assignee: Option<String>,

    /// Only items with this priority
    #[arg(long, short = 'p')]
    pub priority: Option<Priority>,

    /// Only items carrying this tag
    #[arg(long, short = 't')]
    pub tag: Option<String>,

    /// Hide items in a closed state (done, won't do, archived)
    #[arg(long)]
    pub open: bool,
}

impl ListArgs {
    fn matches(&self, item: &ItemRecord) -> bool {
        let state = item.effective_state();
        self.status.map_or(true, |s| s == state)
            && self.assignee.as_deref().map_or(true, |a| {
                item.assignee
                    .as_deref()
                    .is_some_and(|x| x.eq_ignore_ascii_case(a))
            })
            && self.priority.map_or(true, |p| p == item.priority)
            && self.tag.as_deref().map_or(true, |t| item.tags.contains(t))
            && !(self.open && state.is_closed())
    }
}

pub fn run(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let (_config, mut resolver) = open_resolver(global)?;
    let items: Vec<&ItemRecord> = resolver
        .engine_mut()
        .get_items_by_type(args.item_type)?
        .into_iter()
        .filter(|item| args.matches(item))
        .collect();

    match global.format {
        OutputFormat::Json => print_json(&items)?,
        OutputFormat::Yaml => print_yaml(&items)?,
        OutputFormat::Id => {
            for item in &items {
                println!("{}", item.id);
            }
        }
        OutputFormat::Tsv => {
            println!("ID\tTITLE\tSTATE\tPRIORITY\tASSIGNEE");
            for item in &items {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    item.id,
                    item.title,
                    item.effective_state(),
                    item.priority,
                    item.assignee.as_deref().unwrap_or("")
                );
            }
        }
        OutputFormat::Auto | OutputFormat::Md => {
            if items.is_empty() {
                if !global.quiet {
                    println!("No {} found.", args.item_type.plural());
                }
                return Ok(());
            }

            let mut builder = Builder::default();
            builder.push_record(["ID", "Title", "State", "Priority", "Assignee"]);
            for item in &items {
                builder.push_record([
                    item.id.clone(),
                    truncate_str(&item.title, 48),
                    item.effective_state().to_string(),
                    item.priority.to_string(),
                    item.assignee.clone().unwrap_or_else(|| "-".to_string()),
                ]);
            }

            let mut table = builder.build();
            if global.format == OutputFormat::Md {
                table.with(Style::markdown());
            } else {
                table.with(Style::rounded());
            }
            println!("{}", table);

            if !global.quiet {
                println!();
                println!(
                    "{} {} found",
                    style(items.len()).cyan(),
                    args.item_type.plural()
                );
            }
        }
    }

    Ok(())
}
