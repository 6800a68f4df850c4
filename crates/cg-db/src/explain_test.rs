use super::*;

#[test]
fn test_byte_units_are_converted_individually() {
    let plan = parse_plan_text([
        "Scan bytes: 2 MB",
        "Scan bytes: 1 GB, 512 KB",
        "estimated size 100 bytes",
    ]);
    let expected = 2 * 1024 * 1024 + 1024 * 1024 * 1024 + 512 * 1024 + 100;
    assert_eq!(plan.bytes_scanned, expected);
}

#[test]
fn test_numbers_without_byte_context_are_ignored() {
    let plan = parse_plan_text(["Filter: amount > 10 MB"]);
    assert_eq!(plan.bytes_scanned, 0);
    assert!(!plan.is_plausible());
}

#[test]
fn test_snowflake_global_stats() {
    let plan = parse_plan_text([
        "GlobalStats:",
        "    partitionsTotal=120",
        "    partitionsAssigned=12",
        "    bytesAssigned=1048576",
        "1:0     ->TableScan  ANALYTICS.PUBLIC.ORDERS  ID, AMOUNT  {partitionsTotal=120, partitionsAssigned=12, bytesAssigned=1048576}",
    ]);
    assert_eq!(plan.bytes_scanned, 2 * 1048576);
    assert_eq!(plan.partitions_scanned, 24);
    assert_eq!(plan.partitions_total, Some(240));
    assert!(plan.partition_pruning);
    assert!(plan.full_scan);
}

#[test]
fn test_partition_counts_and_ratios() {
    let plan = parse_plan_text(["Scanning 150 partitions", "partitions: 10/40"]);
    assert_eq!(plan.partitions_scanned, 160);
    assert_eq!(plan.partitions_total, Some(40));
    assert!(plan.partition_pruning);
}

#[test]
fn test_explicit_pruning_marker() {
    let plan = parse_plan_text(["Partition pruning: enabled"]);
    assert!(plan.partition_pruning);
    assert!(!plan.full_scan);
}

#[test]
fn test_duckdb_scan_operator() {
    let plan = parse_plan_text([
        "┌───────────────────────────┐",
        "│         SEQ_SCAN          │",
        "│    ────────────────────   │",
        "│       Table: orders       │",
        "│       Table: orders       │",
        "└───────────────────────────┘",
    ]);
    assert!(plan.full_scan);
    assert_eq!(plan.scanned_tables, vec!["orders"]);
}

#[test]
fn test_empty_plan() {
    let plan = parse_plan_text(Vec::<String>::new());
    assert_eq!(plan, PlanEstimate::default());
}
