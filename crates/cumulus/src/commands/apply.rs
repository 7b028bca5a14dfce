//! `cumulus apply` and the shared playbook runner

use crate::playbook::{Playbook, ResourceEntry};
use colored::Colorize;
use cumulus_cloud::{ChangeSummary, DesiredState, Reconciler};
use std::time::Duration;

/// Invocation-wide wait behaviour, overridable per entry
#[derive(Debug, Clone, Copy)]
pub struct WaitArgs {
    pub wait: bool,
    pub timeout: Duration,
}

pub async fn handle(
    reconciler: &Reconciler,
    playbook: &Playbook,
    wait: WaitArgs,
) -> anyhow::Result<()> {
    run(reconciler, playbook, None, wait).await
}

/// Reconcile every entry, continuing past failures so one broken
/// resource does not hide the rest of the run.
pub async fn run(
    reconciler: &Reconciler,
    playbook: &Playbook,
    force_state: Option<DesiredState>,
    wait: WaitArgs,
) -> anyhow::Result<()> {
    let mut totals = ChangeSummary::default();
    let mut failures = 0usize;

    for entry in &playbook.resources {
        let desired = force_state.unwrap_or(entry.state);
        let spec = entry.to_spec();
        let entry_wait = entry.wait.unwrap_or(wait.wait);
        let entry_timeout = entry
            .wait_timeout
            .map(Duration::from_secs)
            .unwrap_or(wait.timeout);

        match reconciler
            .reconcile(&spec, desired, entry_wait, entry_timeout)
            .await
        {
            Ok(outcome) => {
                totals.merge(outcome.summary);
                print_entry(entry, desired, outcome.changed);
            }
            Err(e) => {
                failures += 1;
                println!("{} {} ({desired}): {e}", "✗".red(), entry.label());
            }
        }
    }

    println!();
    println!(
        "{}: {} created, {} updated, {} deleted, {} unchanged",
        "summary".bold(),
        totals.created.to_string().green(),
        totals.updated.to_string().yellow(),
        totals.deleted.to_string().red(),
        totals.unchanged,
    );

    if failures > 0 {
        anyhow::bail!("{failures} resource(s) failed");
    }
    Ok(())
}

fn print_entry(entry: &ResourceEntry, desired: DesiredState, changed: bool) {
    if changed {
        println!("{} {} ({desired}): changed", "✓".green(), entry.label());
    } else {
        println!("{} {} ({desired}): unchanged", "✓".green(), entry.label());
    }
}
