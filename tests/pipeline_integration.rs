//! End-to-end threading over a realistic log parser module.

use param_threader::audit::{audit_files, Finding};
use param_threader::config::{load_from_path, ThreaderConfig};
use param_threader::driver::{run, run_with, FileStatus, RunOptions};
use param_threader::pipeline::{derive_repair, derive_threading};
use param_threader::safety::WorkspaceGuard;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BEFORE: &str = include_str!("fixtures/meteora_dlmm.rs");
const AFTER: &str = include_str!("fixtures/meteora_dlmm.threaded.rs");

fn shipped_config() -> ThreaderConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("threads/grpc_recv_us.toml");
    load_from_path(path).unwrap()
}

fn workspace_with(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("src/logs/meteora_dlmm.rs");
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(&file, content).unwrap();
    (dir, file)
}

#[test]
fn threads_whole_module() {
    let config = shipped_config();
    let rules = derive_threading(&config.chain).unwrap();
    let (_dir, file) = workspace_with(BEFORE);

    let report = run(&[&file], &rules);
    assert!(report.is_success());
    assert_eq!(report.files[0].status, FileStatus::Modified);
    assert_eq!(fs::read_to_string(&file).unwrap(), AFTER);

    let hits: Vec<(&str, usize)> = report.files[0]
        .hits
        .iter()
        .map(|h| (h.rule.as_str(), h.hits))
        .collect();
    assert_eq!(
        hits,
        [
            ("promote:parse_log", 1),
            ("call:parse_structured_log", 1),
            ("signature:parse_structured_log", 1),
            ("call:parse_*_event", 2),
            ("signature:parse_*_event", 2),
            ("call:parse_text_log", 1),
            ("signature:parse_text_log", 1),
            ("call:parse_*_from_text", 2),
            ("signature:parse_*_from_text", 2),
            ("constructor:create_metadata_simple", 4),
        ]
    );
}

#[test]
fn second_run_leaves_file_alone() {
    let config = shipped_config();
    let rules = derive_threading(&config.chain).unwrap();
    let (_dir, file) = workspace_with(AFTER);
    let stamp = filetime::FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(&file, stamp).unwrap();

    let report = run(&[&file], &rules);
    assert_eq!(report.files[0].status, FileStatus::Unchanged);
    assert_eq!(report.total_hits(), 0);

    let meta = fs::metadata(&file).unwrap();
    assert_eq!(filetime::FileTime::from_last_modification_time(&meta), stamp);
    assert_eq!(fs::read_to_string(&file).unwrap(), AFTER);
}

#[test]
fn combined_run_matches_threading_on_clean_sources() {
    let config = shipped_config();
    let threading = derive_threading(&config.chain).unwrap();
    let combined = threading.then(&derive_repair(&config.repair).unwrap()).unwrap();

    let out = combined.apply(BEFORE);
    assert_eq!(out.text, AFTER);
    assert!(out
        .hits
        .iter()
        .filter(|(id, _)| id.starts_with("repair:"))
        .all(|(_, n)| *n == 0));
}

#[test]
fn repair_fixes_naive_leftovers() {
    let config = shipped_config();
    let repair = derive_repair(&config.repair).unwrap();
    let naive = "        return parse_swap_from_text(log, signature, slot, block_time, grpc_recv_us));\n\
                 let m = build(signature, Pubkey::default()),\n";
    let (_dir, file) = workspace_with(naive);

    let report = run(&[&file], &repair);
    assert_eq!(report.total_hits(), 2);
    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "        return parse_swap_from_text(log, signature, slot, block_time, grpc_recv_us);\n\
         let m = build(signature, Pubkey::default(),\n"
    );

    let again = run(&[&file], &repair);
    assert_eq!(again.files[0].status, FileStatus::Unchanged);
}

#[test]
fn missing_sources_abort_the_batch() {
    let config = shipped_config();
    let rules = derive_threading(&config.chain).unwrap();
    let (dir, file) = workspace_with(BEFORE);

    let files = config.resolved_files(dir.path());
    assert_eq!(files[0], file);

    let options = RunOptions {
        guard: Some(WorkspaceGuard::new(dir.path()).unwrap()),
        ..Default::default()
    };
    let report = run_with(&files, &rules, &options);
    assert!(report.aborted);
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.files[0].status, FileStatus::Modified);
    assert!(matches!(report.files[1].status, FileStatus::Failed { .. }));
    assert_eq!(report.skipped.len(), files.len() - 2);

    // The first file was written before the abort
    assert_eq!(fs::read_to_string(&file).unwrap(), AFTER);
}

#[test]
fn audit_accepts_both_ends_and_flags_partial_threading() {
    let config = shipped_config();
    let rules = derive_threading(&config.chain).unwrap();

    for (content, pending) in [(BEFORE, true), (AFTER, false)] {
        let (_dir, file) = workspace_with(content);
        let report = audit_files(&[&file], &config.chain, &rules).unwrap();
        assert!(report.is_clean(), "{:?}", report.findings);
        assert_eq!(!report.pending.is_empty(), pending);
    }

    // Signature threaded, one call site left behind
    let partial = AFTER.replacen(
        "parse_add_liquidity_event(data, signature, slot, block_time, grpc_recv_us)",
        "parse_add_liquidity_event(data, signature, slot, block_time)",
        1,
    );
    let (_dir, file) = workspace_with(&partial);
    let report = audit_files(&[&file], &config.chain, &rules).unwrap();
    assert_eq!(report.findings.len(), 1);
    match &report.findings[0] {
        Finding::ArityMismatch {
            function,
            expected,
            found,
            line,
            ..
        } => {
            assert_eq!(function, "parse_add_liquidity_event");
            assert_eq!(expected, &[5]);
            assert_eq!(*found, 4);
            assert_eq!(*line, 50);
        }
        other => panic!("unexpected finding {other:?}"),
    }
    assert_eq!(report.pending.len(), 1);
    assert_eq!(report.pending[0].rule, "call:parse_*_event");
}

#[test]
fn rules_do_not_overlap_on_real_sources() {
    let config = shipped_config();
    let rules = derive_threading(&config.chain).unwrap();
    assert!(rules.domain_conflicts(BEFORE).is_empty());
    assert!(rules.domain_conflicts(AFTER).is_empty());
}
