//! Subcommand implementations

use std::sync::Arc;

use anyhow::{bail, Context};
use tontine_runtime::{InMemoryDirectory, Snapshot, TontineEngine};
use tontine_types::{AssociationId, CommandContext, LedgerScope, TontineError};
use tracing::info;

use crate::config::CliConfig;

pub fn init(config: &CliConfig, force: bool) -> anyhow::Result<()> {
    let path = &config.snapshot_path;
    if path.exists() && !force {
        bail!("{} already exists, pass --force to replace it", path.display());
    }
    Snapshot::default()
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "Empty snapshot written");
    Ok(())
}

pub fn recompute(config: &CliConfig, dry_run: bool) -> anyhow::Result<()> {
    let engine = load_engine(config)?;
    let report = engine.recompute_all_ledgers()?;

    for outcome in report.outcomes.iter().filter(|o| o.drift_detected) {
        println!(
            "repaired {}: balance {} -> {} ({} transactions replayed)",
            outcome.scope,
            outcome.before.total_balance(),
            outcome.after.total_balance(),
            outcome.transactions_replayed
        );
    }
    for failure in &report.failures {
        println!("failed {}: {}", failure.scope, failure.reason);
    }
    println!(
        "ledgers scanned: {}, repaired: {}, failed: {}",
        report.ledgers_scanned,
        report.ledgers_repaired,
        report.failures.len()
    );

    if !dry_run && report.ledgers_repaired > 0 {
        save_engine(config, &engine)?;
    }
    Ok(())
}

pub fn purge(config: &CliConfig, dry_run: bool) -> anyhow::Result<()> {
    let engine = load_engine(config)?;
    let report = engine.purge_orphaned(&CommandContext::system())?;

    for finding in &report.findings {
        println!("{}", finding);
    }
    println!(
        "removed: {} ledgers, {} tours, {} contributions; index entries repaired: {}",
        report.ledgers_removed,
        report.tours_removed,
        report.contributions_removed,
        report.index_entries_repaired
    );

    if !dry_run && !report.is_clean() {
        save_engine(config, &engine)?;
    }
    Ok(())
}

pub fn inspect(config: &CliConfig, association: Option<&str>) -> anyhow::Result<()> {
    let engine = load_engine(config)?;
    let associations = match association {
        Some(id) => vec![engine.get_association(&AssociationId::new(id))?],
        None => engine.list_associations()?,
    };

    for association in associations {
        let totals = association.totals();
        let balances = engine.balances(&LedgerScope::Association(association.id.clone()))?;
        let tours = engine.tours_for_cycle(&association.id, association.current_cycle)?;

        println!("{} ({})", association.name, association.id);
        println!(
            "  status: {:?}, cycle {}, {} tours assigned of {}",
            association.status,
            association.current_cycle,
            tours.len(),
            totals.total_cycles
        );
        println!(
            "  members: {}, pool: {} {}",
            totals.active_member_count, totals.total_pool, config.currency
        );
        println!(
            "  balance: {} (contributions {}, refusals {})",
            balances.total_balance(),
            balances.cash_from_contributions,
            balances.cash_from_refusals
        );
        for tour in tours {
            println!(
                "  #{} {} [{}] {:?} due {}",
                tour.tour_number,
                tour.beneficiary_name,
                tour.mode.label(),
                tour.status,
                tour.scheduled_date
            );
        }
    }
    Ok(())
}

pub fn summary(config: &CliConfig) -> anyhow::Result<()> {
    let engine = load_engine(config)?;
    let summary = engine.global_summary()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn load_engine(config: &CliConfig) -> anyhow::Result<TontineEngine> {
    let path = &config.snapshot_path;
    let snapshot =
        Snapshot::load(path).with_context(|| format!("loading {}", path.display()))?;
    // Maintenance never adds members, so an empty directory is enough.
    let engine = TontineEngine::from_snapshot(
        snapshot,
        config.engine.clone(),
        Arc::new(InMemoryDirectory::new()),
    )
    .map_err(|e: TontineError| anyhow::anyhow!("{} ({:?})", e, e.kind()))?;
    Ok(engine)
}

fn save_engine(config: &CliConfig, engine: &TontineEngine) -> anyhow::Result<()> {
    let path = &config.snapshot_path;
    engine
        .snapshot()?
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "Snapshot saved");
    Ok(())
}
