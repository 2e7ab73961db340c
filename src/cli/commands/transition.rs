//! `wl transition` / `wl transitions` - Move items through the workflow
//!
//! A transition is validated against the adjacency table, checked against
//! the item's blockers, dependents and children, then written back into the
//! document's front matter and merged into the index.

use console::style;
use miette::Result;
use serde_json::json;

use crate::cli::helpers::{open_resolver, print_json, styled_state};
use crate::cli::{exit, GlobalOpts, OutputFormat};
use crate::core::item::{ItemRecord, WorkflowState};
use crate::core::store::DocumentStore;
use crate::core::workflow::{TransitionOutcome, TransitionRequest, WorkflowEngine};

#[derive(clap::Args, Debug)]
pub struct TransitionsArgs {
    /// Item id
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct TransitionArgs {
    /// Item id
    pub id: String,

    /// Target state (e.g. active, ready_for_qa, done, won_t_do)
    pub state: WorkflowState,

    /// Who is making the change (default: configured author)
    #[arg(long)]
    pub actor: Option<String>,

    /// Why the change is made (required for won_t_do)
    #[arg(long, short = 'r')]
    pub reason: Option<String>,

    /// Reviewer to record with the change
    #[arg(long)]
    pub reviewer: Option<String>,

    /// Apply the change even when blockers, dependents or children are still open
    #[arg(long)]
    pub force: bool,

    /// Validate only, do not write anything
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run_available(args: TransitionsArgs, global: &GlobalOpts) -> Result<i32> {
    let (config, mut resolver) = open_resolver(global)?;
    let Some(item) = resolver.engine_mut().find_item(&args.id)?.cloned() else {
        return Ok(not_found(&args.id));
    };

    let workflow = WorkflowEngine::new(config.workflow());
    let current = workflow.get_effective_state(&item);
    let available = workflow.get_available_transitions(&item);

    match global.format {
        OutputFormat::Json => {
            let targets: Vec<_> = available
                .iter()
                .map(|&state| {
                    json!({
                        "state": state,
                        "automationEligible": workflow.can_automate(&item, state),
                    })
                })
                .collect();
            print_json(&json!({
                "id": item.id,
                "currentState": current,
                "transitions": targets,
            }))?;
        }
        OutputFormat::Id | OutputFormat::Tsv => {
            for state in &available {
                println!("{}", state);
            }
        }
        _ => {
            println!(
                "{} is {}",
                style(&item.id).cyan(),
                styled_state(current)
            );
            if available.is_empty() {
                println!("  {}", style("(terminal state, no transitions)").dim());
            }
            for state in available {
                let automation = if workflow.can_automate(&item, state) {
                    style("automatable").dim()
                } else {
                    style("needs a person").yellow()
                };
                println!("  {} {:<24} {}", style("→").blue(), state.as_str(), automation);
            }
        }
    }

    Ok(exit::OK)
}

pub fn run(args: TransitionArgs, global: &GlobalOpts) -> Result<i32> {
    let (config, mut resolver) = open_resolver(global)?;
    let Some(item) = resolver.engine_mut().find_item(&args.id)?.cloned() else {
        return Ok(not_found(&args.id));
    };

    let context = resolver.transition_context(&item.id)?;
    let actor = args.actor.clone().unwrap_or_else(|| config.author());

    let mut request = TransitionRequest::new(args.state, actor).context(context);
    if let Some(reason) = &args.reason {
        request = request.reason(reason.as_str());
    }
    if let Some(reviewer) = &args.reviewer {
        request = request.reviewer(reviewer.as_str());
    }

    let workflow = WorkflowEngine::new(config.workflow());
    let outcome = workflow.transition_state(&item, &request);

    if !outcome.success {
        report(&item, &args, &outcome, Verdict::Rejected, global)?;
        return Ok(exit::ISSUES);
    }

    if !outcome.warnings.is_empty() && !args.force {
        report(&item, &args, &outcome, Verdict::Blocked, global)?;
        if global.format == OutputFormat::Auto {
            println!("Use {} to apply it anyway", style("--force").yellow());
        }
        return Ok(exit::ISSUES);
    }

    if args.dry_run {
        report(&item, &args, &outcome, Verdict::DryRun, global)?;
        return Ok(exit::OK);
    }

    let Some(updates) = outcome.front_matter_updates() else {
        return Err(miette::miette!("transition of {} produced no changes", item.id));
    };
    let path = resolver.engine().project().root().join(&item.file_path);
    resolver.engine().store().write_fields(&path, &updates)?;
    resolver.engine_mut().update_item(item.item_type, &item.id)?;

    tracing::info!(
        "{} moved {} from {} to {}",
        request.actor,
        item.id,
        outcome.previous_state,
        args.state
    );
    report(&item, &args, &outcome, Verdict::Applied, global)?;
    Ok(exit::OK)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Rejected,
    Blocked,
    DryRun,
    Applied,
}

impl Verdict {
    fn as_str(self) -> &'static str {
        match self {
            Verdict::Rejected => "rejected",
            Verdict::Blocked => "blocked",
            Verdict::DryRun => "valid",
            Verdict::Applied => "applied",
        }
    }
}

fn not_found(id: &str) -> i32 {
    eprintln!("{} No item with id {}", style("✗").red(), style(id).cyan());
    exit::ISSUES
}

fn report(
    item: &ItemRecord,
    args: &TransitionArgs,
    outcome: &TransitionOutcome,
    verdict: Verdict,
    global: &GlobalOpts,
) -> Result<()> {
    if global.format == OutputFormat::Json {
        let errors: Vec<String> = outcome.errors.iter().map(|e| e.to_string()).collect();
        return print_json(&json!({
            "id": item.id,
            "result": verdict.as_str(),
            "success": outcome.success,
            "previousState": outcome.previous_state,
            "targetState": args.state,
            "errors": errors,
            "warnings": outcome.warnings,
        }));
    }

    for error in &outcome.errors {
        eprintln!("{} {}", style("✗").red(), error);
    }
    for warning in &outcome.warnings {
        eprintln!("{} {}", style("!").yellow(), warning);
    }

    if global.quiet {
        return Ok(());
    }
    let arrow = format!(
        "{} {} → {}",
        style(&item.id).cyan(),
        styled_state(outcome.previous_state),
        styled_state(args.state)
    );
    match verdict {
        Verdict::Applied => println!("{} {}", style("✓").green(), arrow),
        Verdict::DryRun => println!("{} {} (dry run, nothing written)", style("✓").green(), arrow),
        Verdict::Rejected | Verdict::Blocked => {
            println!("{} {} {}", style("✗").red(), arrow, verdict.as_str())
        }
    }
    Ok(())
}
