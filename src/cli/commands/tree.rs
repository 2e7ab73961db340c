//! `wl tree` command - An item with its ancestors and descendants

use console::style;
use miette::Result;

use crate::cli::helpers::{item_line, open_resolver, print_json, print_yaml};
use crate::cli::{exit, GlobalOpts, OutputFormat};
use crate::core::identity::ItemType;
use crate::core::item::ItemRecord;
use crate::core::relations::Hierarchy;

#[derive(clap::Args, Debug)]
pub struct TreeArgs {
    /// Item id to anchor the tree on
    pub id: String,
}

pub fn run(args: TreeArgs, global: &GlobalOpts) -> Result<i32> {
    let (_config, mut resolver) = open_resolver(global)?;
    let Some(hierarchy) = resolver.get_hierarchy(&args.id)? else {
        eprintln!("{} No item with id {}", style("✗").red(), style(&args.id).cyan());
        return Ok(exit::ISSUES);
    };

    match global.format {
        OutputFormat::Json => print_json(&hierarchy)?,
        OutputFormat::Yaml => print_yaml(&hierarchy)?,
        OutputFormat::Id | OutputFormat::Tsv => {
            for item in std::iter::once(&hierarchy.anchor).chain(hierarchy.descendants()) {
                println!("{}", item.id);
            }
        }
        OutputFormat::Auto | OutputFormat::Md => print_tree(&hierarchy),
    }

    Ok(exit::OK)
}

fn print_tree(hierarchy: &Hierarchy) {
    for ancestor in &hierarchy.ancestors {
        println!("{} {}", style("↑").dim(), item_line(ancestor));
    }
    if !hierarchy.ancestors.is_empty() {
        println!();
    }

    println!("{}", item_line(&hierarchy.anchor));
    print_children(hierarchy, &hierarchy.anchor, "");
}

/// Children of `parent` that appear in the hierarchy, one level at a time
fn direct_children<'a>(hierarchy: &'a Hierarchy, parent: &ItemRecord) -> Vec<&'a ItemRecord> {
    let mut children: Vec<&ItemRecord> = hierarchy
        .descendants()
        .filter(|child| is_direct_child(hierarchy, child, parent))
        .collect();
    children.sort_by(|a, b| a.item_type.cmp(&b.item_type).then_with(|| a.id.cmp(&b.id)));
    children
}

/// Whether `child` sits directly under `parent`
///
/// The nearest parent reference that resolves inside the hierarchy wins.
fn is_direct_child(hierarchy: &Hierarchy, child: &ItemRecord, parent: &ItemRecord) -> bool {
    let mut refs = child.parent_refs();
    refs.sort_by(|a, b| b.parent_type.cmp(&a.parent_type));
    refs.into_iter()
        .find(|r| hierarchy.contains(r.id))
        .is_some_and(|r| r.id == parent.id && r.parent_type == parent.item_type)
}

fn print_children(hierarchy: &Hierarchy, parent: &ItemRecord, prefix: &str) {
    let children = direct_children(hierarchy, parent);
    let count = children.len();

    for (i, child) in children.into_iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        println!("{}{}{}", prefix, style(branch).dim(), item_line(child));

        if child.item_type != ItemType::Pr {
            let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
            print_children(hierarchy, child, &next);
        }
    }
}
