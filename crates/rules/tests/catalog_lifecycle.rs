//! End-to-end: author a catalog on disk, load it, match against it.

use std::sync::Arc;

use sqlrisk_rules::matcher::facts;
use sqlrisk_rules::schema::Level;
use sqlrisk_rules::{
    EvalexprEvaluator, FileStore, Matcher, PolicyRegistry, PolicySet, PolicyStore, SqliteStore,
};

const CATALOG: &str = r#"
apiVersion: v1
kind: PolicyCatalog
policies:
  - id: OPE.DROP.001
    name: drop table
    type: BASIC
    rule_id: KeyWord
    operator: "=="
    value: drop table
    level: high
    priority: 60
  - id: RUN.CAPACITY.001
    name: big table
    type: BASIC
    rule_id: TableSize
    operator: ">"
    value: 2048
    level: high
    priority: 50
  - id: AGG.RULEMATCH.001
    type: AGG
    rule_id: RuleMatch
    operator: all
    value: ["OPE.DROP.001"]
    level: high
    priority: 200
  - id: AGG.RULEMATCH.002
    type: AGG
    rule_id: RuleMatch
    operator: all
    value: ["OPE.DROP.001", "RUN.CAPACITY.001"]
    level: fatal
    special: true
    priority: 300
"#;

#[test]
fn hand_written_catalog_drives_matching() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policies.yml");
    std::fs::write(&path, CATALOG).unwrap();

    let store = FileStore::new(&path);
    let registry = PolicyRegistry::open(&store).unwrap();
    let set = registry.snapshot();
    assert_eq!(set.len(), 4);
    assert_eq!(set.get("AGG.RULEMATCH.002").unwrap().name, "drop table&&big table");

    let evaluator = EvalexprEvaluator;
    let matcher = Matcher::new(&set, &evaluator);

    let mut small = facts([("KeyWord", "drop table")]);
    small.set("TableSize", 10_i64);
    let outcome = matcher.evaluate(&small).unwrap();
    assert_eq!(outcome.verdict.id, "AGG.RULEMATCH.001");
    assert_eq!(outcome.verdict.level, Level::High);

    let mut big = facts([("KeyWord", "drop table")]);
    big.set("TableSize", 4096_i64);
    let outcome = matcher.evaluate(&big).unwrap();
    assert_eq!(outcome.verdict.id, "AGG.RULEMATCH.002");
    assert_eq!(outcome.verdict.level, Level::Fatal);
    assert!(outcome.verdict.special);
}

#[test]
fn both_backends_compile_identically() {
    let dir = tempfile::tempdir().unwrap();
    let file: Arc<dyn PolicyStore> = Arc::new(FileStore::new(dir.path().join("p.yml")));
    let sqlite: Arc<dyn PolicyStore> = Arc::new(SqliteStore::in_memory().unwrap());

    let mut compiled = Vec::new();
    for store in [file, sqlite] {
        store.write(&PolicySet::defaults().unwrap().policies().to_vec()).unwrap();
        let set = PolicySet::from_records(store.read_records().unwrap()).unwrap();
        compiled.push(
            set.policies()
                .iter()
                .map(|p| format!("{} {}", p.id, p.expr))
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(compiled[0], compiled[1]);
    assert!(compiled[0].contains(&"OPE.AFFECTROWS.002 20000 <= AffectRows && AffectRows <= 100000".to_string()));
}
