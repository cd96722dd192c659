//! `sqlrisk policy ...` subcommands.

use anyhow::{bail, Context, Result};
use sqlrisk_core::PolicyStoreConfig;
use sqlrisk_rules::schema::rule_catalog;
use sqlrisk_rules::validation::validate_records;
use sqlrisk_rules::{open_store, PolicyRegistry, PolicySet, PolicyStore};

use crate::cli::PolicyCommand;

pub fn run(store_config: &PolicyStoreConfig, command: PolicyCommand) -> Result<()> {
    let open = || {
        open_store(store_config)
            .with_context(|| format!("failed to open policy store {}", store_config.path.display()))
    };
    match command {
        PolicyCommand::Init => init(open()?.as_ref()),
        PolicyCommand::List { json } => list(open()?.as_ref(), json),
        PolicyCommand::Validate => validate(open()?.as_ref()),
        PolicyCommand::Catalog { json } => catalog(json),
    }
}

fn init(store: &dyn PolicyStore) -> Result<()> {
    store.init().context("failed to initialize policy store")?;
    let count = store.read_records()?.len();
    println!("policy store ready at {} ({} policies)", store.location(), count);
    Ok(())
}

fn list(store: &dyn PolicyStore, json: bool) -> Result<()> {
    let registry = PolicyRegistry::open(store).context("failed to load policies")?;
    let set = registry.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(set.policies())?);
        return Ok(());
    }

    println!("{:<22} {:<6} {:>8} {:<8} EXPRESSION", "ID", "LEVEL", "PRIORITY", "SPECIAL");
    for p in set.policies() {
        println!(
            "{:<22} {:<6} {:>8} {:<8} {}",
            p.id,
            p.level,
            p.priority,
            if p.special { "yes" } else { "" },
            p.expr
        );
    }
    println!("{} active policies, loaded {}", set.len(), set.loaded_at().to_rfc3339());
    Ok(())
}

fn validate(store: &dyn PolicyStore) -> Result<()> {
    let records = store.read_records().context("failed to read policy records")?;
    let result = validate_records(&records);

    for w in &result.warnings {
        println!("warning: {}: {}", w.path, w.message);
    }
    for e in &result.errors {
        match &e.suggestion {
            Some(s) => println!("error: {}: {} (did you mean '{}'?)", e.path, e.message, s),
            None => println!("error: {}: {}", e.path, e.message),
        }
    }
    if !result.valid {
        bail!("{} invalid in {}", plural(result.errors.len(), "error"), store.location());
    }

    let set = PolicySet::from_records(records).context("policies failed to compile")?;
    println!(
        "{} policies valid ({})",
        set.len(),
        plural(result.warnings.len(), "warning")
    );
    Ok(())
}

fn catalog(json: bool) -> Result<()> {
    let catalog = rule_catalog();
    if json {
        println!("{}", serde_json::to_string_pretty(catalog)?);
        return Ok(());
    }

    println!("{:<18} {:<10} {:<13} {:<28} DESCRIPTION", "ID", "TYPE", "VALUE", "OPERATORS");
    for meta in catalog {
        let operators: Vec<String> = meta.operators.iter().map(|o| o.to_string()).collect();
        println!(
            "{:<18} {:<10} {:<13} {:<28} {}",
            meta.id_str,
            meta.kind.to_string(),
            meta.value_type.to_string(),
            operators.join(" "),
            meta.description
        );
    }
    Ok(())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("1 {}", word)
    } else {
        format!("{} {}s", n, word)
    }
}
