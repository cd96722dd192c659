use super::*;

const RECORDS: &str = r#"
- id: OPE.AFFECTROWS.002
  name: affected rows between 20k and 100k
  type: BASIC
  rule_id: AffectRows
  operator: between
  value: [20000, 100000]
  level: high
  special: true
  priority: 70
- id: OPE.DROP.001
  name: drop table
  type: BASIC
  rule_id: KeyWord
  operator: "=="
  value: drop table
  level: high
  priority: 60
- id: RUN.CAPACITY.006
  name: disk sufficient
  type: BASIC
  rule_id: DiskSufficient
  operator: "=="
  value: "true"
  level: low
  priority: 10
- id: AGG.RULEMATCH.004
  name: ""
  enable: false
  type: AGG
  rule_id: RuleMatch
  operator: all
  value: '["OPE.DELETE.002","OPE.AFFECTROWS.001"]'
  level: high
  special: true
  priority: 200
"#;

#[test]
fn yaml_values_canonicalize_to_text() {
    let records: Vec<PolicyRecord> = serde_yaml::from_str(RECORDS).unwrap();
    assert_eq!(records[0].value, "[20000,100000]");
    assert_eq!(records[1].value, "drop table");
    assert_eq!(records[2].value, "true");
    assert_eq!(records[3].value, r#"["OPE.DELETE.002","OPE.AFFECTROWS.001"]"#);
    assert!(records[1].enable, "enable defaults to true");
    assert!(!records[3].enable);
}

#[test]
fn policies_deserialize_through_records() {
    let policies: Vec<Policy> = serde_yaml::from_str(RECORDS).unwrap();
    assert_eq!(policies[0].value, PolicyValue::IntList(vec![20000, 100000]));
    assert_eq!(policies[1].value, PolicyValue::Text(TextValue::KeyWord(KeyWordType::DropTable)));
    assert_eq!(policies[2].value, PolicyValue::Bool(true));
    assert_eq!(policies[3].rule_id, Dimension::RuleMatch);
    assert_eq!(policies[3].kind, RuleKind::Aggregate);
    assert!(policies.iter().all(|p| p.expr.is_empty()));
}

#[test]
fn invalid_level_is_rejected() {
    let yaml = r#"
id: OPE.DROP.001
type: BASIC
rule_id: KeyWord
operator: "=="
value: drop table
level: critical
"#;
    assert!(serde_yaml::from_str::<PolicyRecord>(yaml).is_err());
}

#[test]
fn record_written_natively_reads_back_identically() {
    let records: Vec<PolicyRecord> = serde_yaml::from_str(RECORDS).unwrap();
    let yaml = serde_yaml::to_string(&records).unwrap();
    assert!(yaml.contains("- 20000"), "int list written as a sequence:\n{yaml}");
    let again: Vec<PolicyRecord> = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(records, again);
}

#[test]
fn levels_are_ordered() {
    assert!(Level::Fatal > Level::High);
    assert!(Level::High > Level::Low);
    assert!(Level::Low > Level::Info);
    assert_eq!(serde_json::to_string(&Level::Fatal).unwrap(), "\"fatal\"");
}

#[test]
fn operators_use_wire_spelling() {
    assert_eq!(serde_json::to_string(&Operator::Ge).unwrap(), "\">=\"");
    assert_eq!("highest".parse::<Operator>().unwrap(), Operator::Highest);
    assert!("=~".parse::<Operator>().is_err());
}
