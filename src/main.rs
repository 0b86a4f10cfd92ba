use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use param_threader::audit::{audit_files, AuditReport, Finding};
use param_threader::config::{discover_configs, load_from_path, ThreaderConfig};
use param_threader::driver::{run_with, FileStatus, RunOptions, RunReport};
use param_threader::pipeline::{derive_repair, derive_threading};
use param_threader::rule::RuleSet;
use param_threader::safety::WorkspaceGuard;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};

const WORKSPACE_ENV: &str = "PARAM_THREADER_WORKSPACE";

#[derive(Parser)]
#[command(name = "param-threader")]
#[command(about = "Thread an extra parameter through a call chain by textual rewriting", long_about = None)]
#[command(version)]
struct Cli {
    /// Log per-rule activity
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Workspace root (falls back to $PARAM_THREADER_WORKSPACE, then the current directory)
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Threader config to use (otherwise every .toml in <workspace>/threads)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct PassArgs {
    #[command(flatten)]
    target: Target,

    /// Compute rewrites without touching files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show a unified diff of every modified file
    #[arg(short, long)]
    diff: bool,

    /// Print run reports as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Thread the parameter through the configured call chain
    Thread(PassArgs),

    /// Fix leftovers of an earlier naive threading run
    Repair(PassArgs),

    /// Thread, then repair, in one pass over each file
    Run(PassArgs),

    /// Check arity consistency and rule overlap without writing
    Audit {
        #[command(flatten)]
        target: Target,

        /// Print the audit report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the rules derived from each config
    Rules {
        #[command(flatten)]
        target: Target,

        /// Print rules as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Thread,
    Repair,
    Run,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Thread(args) => cmd_pass(Pass::Thread, args),
        Commands::Repair(args) => cmd_pass(Pass::Repair, args),
        Commands::Run(args) => cmd_pass(Pass::Run, args),
        Commands::Audit { target, json } => cmd_audit(target, json),
        Commands::Rules { target, json } => cmd_rules(target, json),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "param_threader=debug"
    } else {
        "param_threader=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve the workspace root.
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. PARAM_THREADER_WORKSPACE environment variable
/// 3. Current directory
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return path
            .canonicalize()
            .with_context(|| format!("workspace {} does not exist", path.display()));
    }

    if let Ok(env_path) = env::var(WORKSPACE_ENV) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!("Warning: {WORKSPACE_ENV} is set but path doesn't exist: {env_path}").yellow()
        );
    }

    Ok(env::current_dir()?.canonicalize()?)
}

fn load_configs(target: Target) -> Result<(PathBuf, Vec<(PathBuf, ThreaderConfig)>)> {
    let workspace = resolve_workspace(target.workspace)?;
    let paths = match target.config {
        Some(path) => vec![path],
        None => discover_configs(&workspace)?,
    };
    let configs = paths
        .into_iter()
        .map(|path| {
            let config = load_from_path(&path)?;
            Ok((path, config))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((workspace, configs))
}

fn rule_set_for(pass: Pass, config: &ThreaderConfig) -> Result<RuleSet> {
    let threading = || derive_threading(&config.chain);
    let set = match pass {
        Pass::Thread => threading()?,
        Pass::Repair => derive_repair(&config.repair)?,
        Pass::Run if config.repair.is_empty() => threading()?,
        Pass::Run => threading()?.then(&derive_repair(&config.repair)?)?,
    };
    Ok(set)
}

fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (threaded)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for hunk in diff.unified_diff().context_radius(2).iter_hunks() {
        println!("{}", hunk.header().to_string().cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{change}").red(),
                ChangeTag::Insert => format!("+{change}").green(),
                ChangeTag::Equal => format!(" {change}").normal(),
            };
            print!("{line}");
            if change.missing_newline() {
                println!();
            }
        }
    }
}

fn print_run(report: &RunReport, dry_run: bool, show_diff: bool) {
    for file in &report.files {
        match &file.status {
            FileStatus::Modified => {
                let verb = if dry_run { "would rewrite" } else { "rewrote" };
                println!(
                    "{} {}: {} ({} hits)",
                    "✓".green(),
                    file.path.display(),
                    verb,
                    file.total_hits()
                );
                for hit in file.hits.iter().filter(|h| h.hits > 0) {
                    println!("    {} x{}", hit.rule.dimmed(), hit.hits);
                }
                if show_diff {
                    if let Some(text) = &file.text {
                        display_diff(&file.path, &text.before, &text.after);
                    }
                }
            }
            FileStatus::Unchanged => {
                println!("{} {}: no rule matched", "⊙".yellow(), file.path.display());
            }
            FileStatus::Failed { reason } => {
                eprintln!("{} {}: {}", "✗".red(), file.path.display(), reason);
            }
        }
    }
    for path in &report.skipped {
        println!("{} {}: skipped after failure", "⊘".cyan(), path.display());
    }
}

fn cmd_pass(pass: Pass, args: PassArgs) -> Result<()> {
    let (workspace, configs) = load_configs(args.target)?;
    let guard = WorkspaceGuard::new(&workspace)?;
    let options = RunOptions {
        dry_run: args.dry_run,
        guard: Some(guard),
        capture_text: args.diff,
    };

    if !args.json {
        println!("Workspace: {}", workspace.display());
        if args.dry_run {
            println!("{}", "[DRY RUN - no files will be written]".cyan());
        }
        println!();
    }

    let mut reports = Vec::new();
    for (path, config) in &configs {
        if pass == Pass::Repair && config.repair.is_empty() {
            if !args.json {
                println!(
                    "{}",
                    format!("{}: no [[repair]] fixes, skipping", path.display()).yellow()
                );
            }
            continue;
        }

        let rules = rule_set_for(pass, config)
            .with_context(|| format!("building rules from {}", path.display()))?;
        let files = config.resolved_files(&workspace);

        if !args.json {
            let name = if config.meta.name.is_empty() {
                path.display().to_string()
            } else {
                config.meta.name.clone()
            };
            println!(
                "{} ({} rules, {} files)",
                name.bold(),
                rules.len(),
                files.len()
            );
        }

        let report = run_with(&files, &rules, &options);
        if !args.json {
            print_run(&report, args.dry_run, args.diff);
            if pass != Pass::Repair && report.is_success() && report.modified() == 0 {
                println!(
                    "{}",
                    "  Warning: no rule matched any file; check the chain against the sources"
                        .yellow()
                );
            }
            println!();
        }
        reports.push(report);
    }

    let failed = reports.iter().any(|r| !r.is_success());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        let modified: usize = reports.iter().map(RunReport::modified).sum();
        let unchanged: usize = reports.iter().map(RunReport::unchanged).sum();
        let errors: usize = reports.iter().map(RunReport::failed).sum();
        let skipped: usize = reports.iter().map(|r| r.skipped.len()).sum();

        println!("{}", "Summary:".bold());
        println!("  {} modified", modified.to_string().green());
        println!("  {} unchanged", unchanged.to_string().yellow());
        println!("  {} skipped", skipped.to_string().cyan());
        println!("  {} failed", errors.to_string().red());
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_audit(report: &AuditReport) {
    for finding in &report.findings {
        match finding {
            Finding::ArityMismatch {
                path,
                line,
                function,
                expected,
                found,
            } => {
                let expected = expected
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" or ");
                println!(
                    "{} {}:{}: {} called with {} arguments, defined with {}",
                    "✗".red(),
                    path.display(),
                    line,
                    function,
                    found,
                    expected
                );
            }
            Finding::RuleOverlap {
                path,
                line,
                first,
                second,
            } => {
                println!(
                    "{} {}:{}: rules {} and {} match overlapping text",
                    "✗".red(),
                    path.display(),
                    line,
                    first,
                    second
                );
            }
            Finding::Unreadable { path, reason } => {
                println!("{} {}: {}", "✗".red(), path.display(), reason);
            }
        }
    }
    for pending in &report.pending {
        println!(
            "{} {}: {} would rewrite {} site(s)",
            "⊙".yellow(),
            pending.path.display(),
            pending.rule,
            pending.sites
        );
    }
}

fn cmd_audit(target: Target, json: bool) -> Result<()> {
    let (workspace, configs) = load_configs(target)?;

    let mut reports = Vec::new();
    for (path, config) in &configs {
        let rules = derive_threading(&config.chain)
            .with_context(|| format!("building rules from {}", path.display()))?;
        let report = audit_files(&config.resolved_files(&workspace), &config.chain, &rules)?;
        if !json {
            println!("{}", format!("Auditing {}", path.display()).bold());
            print_audit(&report);
            if report.is_clean() {
                println!("{} {} files consistent", "✓".green(), report.files);
            }
            println!();
        }
        reports.push(report);
    }

    let findings: usize = reports.iter().map(|r| r.findings.len()).sum();
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("{}", "Summary:".bold());
        println!("  {} findings", findings.to_string().red());
    }

    if findings > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[derive(Serialize)]
struct RuleListing<'a> {
    config: &'a Path,
    set: &'a str,
    id: &'a str,
    scope: param_threader::rule::Scope,
    pattern: String,
    template: &'a str,
}

fn cmd_rules(target: Target, json: bool) -> Result<()> {
    let (_, configs) = load_configs(target)?;

    let mut sets = Vec::new();
    for (path, config) in &configs {
        sets.push((path, derive_threading(&config.chain)?));
        if !config.repair.is_empty() {
            sets.push((path, derive_repair(&config.repair)?));
        }
    }

    if json {
        let listing: Vec<RuleListing> = sets
            .iter()
            .flat_map(|(path, set)| {
                set.rules().iter().map(move |rule| RuleListing {
                    config: path.as_path(),
                    set: set.name(),
                    id: rule.id(),
                    scope: rule.scope(),
                    pattern: rule.pattern(),
                    template: rule.template(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for (path, set) in &sets {
        println!(
            "{} {} ({} rules)",
            path.display().to_string().bold(),
            set.name().cyan(),
            set.len()
        );
        for rule in set {
            println!("  {} [{:?}]", rule.id().green(), rule.scope());
            println!("    {} {}", "match:".dimmed(), rule.pattern());
            println!("    {} {}", "into: ".dimmed(), rule.template());
        }
        println!();
    }
    Ok(())
}
