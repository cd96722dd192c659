//! `sqlrisk check`: assess one work order offline.

use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sqlrisk_core::RiskConfig;
use sqlrisk_engine::{RiskEngine, StaticProbe, StatementRisk, WorkOrderRisk};
use sqlrisk_rules::PolicySet;

use crate::cli::CheckArgs;

pub fn run(policies: Arc<PolicySet>, config: RiskConfig, args: CheckArgs) -> Result<()> {
    let sql = read_sql(&args)?;
    let probe = StaticProbe::load(&args.facts)
        .with_context(|| format!("failed to load facts from {}", args.facts.display()))?;

    let engine = RiskEngine::new(policies, Arc::new(probe), config);
    let mut order = WorkOrderRisk::new(&args.database, &sql);
    let outcome = engine.assess(&mut order);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&order)?);
    } else {
        print_report(&order);
    }

    if let Err(e) = outcome {
        bail!("work order {} failed: {}", order.id, e);
    }
    Ok(())
}

fn read_sql(args: &CheckArgs) -> Result<String> {
    match &args.sql {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut sql = String::new();
            std::io::stdin()
                .read_to_string(&mut sql)
                .context("failed to read SQL from stdin")?;
            Ok(sql)
        }
    }
}

fn print_report(order: &WorkOrderRisk) {
    let s = &order.summary;
    println!("work order {} on {}", order.id, order.database);
    println!(
        "  {} statements, {} tables, {} databases, {} errors",
        s.statement_count, s.table_count, s.database_count, s.error_count
    );
    println!(
        "  fatal={} high={} low={} info={}",
        s.fatal_count, s.high_count, s.low_count, s.info_count
    );

    match &order.pre_result {
        Some(pre) => println!(
            "  verdict: {}{}",
            pre.level,
            if pre.special { " (special)" } else { "" }
        ),
        None => println!("  verdict: none"),
    }
    for e in &order.errors {
        println!("  {}: {}", e.kind, e.error);
    }

    for (i, stmt) in order.statements.iter().enumerate() {
        print_statement(i, stmt);
    }
    println!("  assessed in {}ms", order.cost_ms);
}

fn print_statement(index: usize, stmt: &StatementRisk) {
    let level = stmt
        .pre_result
        .as_ref()
        .map(|p| p.level.to_string())
        .unwrap_or_else(|| "-".to_string());
    let policy = stmt.decisive.as_ref().map(|p| p.id.as_str()).unwrap_or("-");

    println!();
    println!("  [{}] {} {} {}", index + 1, level, policy, stmt.sql.trim());
    if let Some(p) = &stmt.decisive {
        if !p.suggestion.is_empty() {
            println!("      suggestion: {}", p.suggestion);
        }
    }
    for f in &stmt.facts {
        println!("      {:<28} {}", f.name, f.value);
    }
    for e in &stmt.errors {
        println!("      {:<28} error: {}", e.name, e.error);
    }
}
