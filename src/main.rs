mod api;
mod audit;
mod cache;
mod collector;
mod config;
mod diff;
mod enrich;
mod error;
mod finding;
mod output;
mod poison;
mod quarantine;
mod report;
mod scanner;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use error::AgentAuditError;
use finding::{PackageKind, Report, ReportResult};

/// AgentAudit -- automated security auditing for AI agent packages and MCP
/// servers.
///
/// Scans repositories, packages, and agent tooling for malicious or
/// poisoned tool definitions using a quarantine-first workflow, with an
/// optional LLM-driven deep audit layer.
#[derive(Parser)]
#[command(name = "agentaudit", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json, sarif)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone a git repository into quarantine and scan it
    Clone {
        /// Git repository URL to clone
        url: String,

        /// Branch to clone
        #[arg(short, long)]
        branch: Option<String>,

        /// Automatically approve if scan passes
        #[arg(long)]
        auto_approve: bool,
    },

    /// Download and scan a pip package
    Pip {
        /// Package name
        package: String,

        /// Specific version to download
        #[arg(short = 'V', long)]
        version: Option<String>,

        /// Automatically approve if scan passes
        #[arg(long)]
        auto_approve: bool,
    },

    /// Download and scan an npm package
    Npm {
        /// Package name
        package: String,

        /// Specific version to download
        #[arg(short = 'V', long)]
        version: Option<String>,

        /// Automatically approve if scan passes
        #[arg(long)]
        auto_approve: bool,
    },

    /// Scan an existing directory or file with the static pipeline
    Scan {
        /// Path to scan
        path: PathBuf,

        /// Minimum severity to report (low, medium, high, critical)
        #[arg(short, long, default_value = "low")]
        severity: String,

        /// Also run the LLM-driven deep audit layer
        #[arg(long)]
        deep: bool,

        /// Submit results to AgentAudit cloud
        #[arg(long)]
        submit: bool,

        /// Disable cache (force a fresh scan even if content is unchanged)
        #[arg(long)]
        no_cache: bool,

        /// Enrich scan with cloud threat intelligence (hash lookup)
        #[arg(long)]
        enrich: bool,
    },

    /// Run the full LLM-driven audit pipeline over a path
    Audit {
        /// Path to audit
        path: PathBuf,

        /// Override the model to use (provider inferred from its prefix)
        #[arg(long)]
        model: Option<String>,

        /// Comma-separated list of models to fan out to for consensus
        #[arg(long)]
        models: Option<String>,

        /// Preferred provider key when no model override is given
        #[arg(long)]
        provider: Option<String>,

        /// Verification mode: "self", "cross", or a specific provider key
        #[arg(long, default_value = "self")]
        verify: String,

        /// Skip the verification pass entirely
        #[arg(long)]
        no_verify: bool,

        /// Path to a package manifest to include in the verification prompt
        #[arg(long)]
        manifest: Option<String>,

        /// Submit results to AgentAudit cloud
        #[arg(long)]
        submit: bool,

        /// Do not submit results even if cloud credentials are configured
        #[arg(long)]
        no_upload: bool,
    },

    /// Search the AgentAudit registry for packages (external collaborator, stub)
    Discover {
        /// Search query
        query: String,
    },

    /// Look up a package's known audit history (external collaborator, stub)
    Lookup {
        /// Package name or source URL
        query: String,
    },

    /// Clear all cached scan results
    ClearCache,

    /// Fetch latest threat signatures from AgentAudit cloud
    Fetch {
        /// Force re-download even if signatures are fresh
        #[arg(short, long)]
        force: bool,
    },

    /// Approve a quarantined item
    Approve {
        /// Quarantine ID to approve
        id: String,

        /// Reason for approval
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Reject a quarantined item and remove it
    Reject {
        /// Quarantine ID to reject
        id: String,

        /// Reason for rejection
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// List quarantined items
    List {
        /// Filter by status (pending, approved, rejected)
        #[arg(short, long)]
        status: Option<String>,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Install agentaudit to system PATH
    Install {
        /// Installation directory
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Authenticate with AgentAudit cloud
    Login {
        /// API token (if not provided, interactive login is used)
        #[arg(short, long)]
        token: Option<String>,

        /// API endpoint URL
        #[arg(long, default_value = "https://api.agentaudit.dev")]
        endpoint: String,
    },

    /// Report a threat to the AgentAudit cloud
    Report {
        /// SHA256 hash of the malicious file
        hash: String,

        /// Type of threat (e.g. malware, backdoor, exfil)
        #[arg(short = 't', long)]
        threat_type: String,

        /// Description of the threat
        #[arg(short, long)]
        description: String,
    },

    /// Compare a scan against a baseline to find new/resolved findings
    Diff {
        /// Path to baseline report JSON file
        #[arg(long)]
        baseline: String,

        /// Path to scan (runs a fresh scan and compares)
        path: PathBuf,
    },

    /// View or modify configuration
    Config {
        /// Configuration key to get or set
        key: Option<String>,

        /// Value to set (if omitted, prints current value)
        value: Option<String>,

        /// List all configuration values
        #[arg(short, long)]
        list: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        eprintln!("{} verbose mode enabled", "agentaudit:".bold().cyan());
    }

    let exit_code = match cli.command {
        Commands::Clone {
            url,
            branch,
            auto_approve,
        } => cmd_clone(&url, branch.as_deref(), auto_approve, &cli.format, cli.verbose).await,

        Commands::Pip {
            package,
            version,
            auto_approve,
        } => cmd_pip(&package, version.as_deref(), auto_approve, &cli.format, cli.verbose).await,

        Commands::Npm {
            package,
            version,
            auto_approve,
        } => cmd_npm(&package, version.as_deref(), auto_approve, &cli.format, cli.verbose).await,

        Commands::Scan {
            path,
            severity,
            deep,
            submit,
            no_cache,
            enrich,
        } => {
            cmd_scan(
                &path, &severity, deep, submit, no_cache, enrich, &cli.format, cli.verbose,
            )
            .await
        }

        Commands::Audit {
            path,
            model,
            models,
            provider,
            verify,
            no_verify,
            manifest,
            submit,
            no_upload,
        } => {
            cmd_audit(
                &path,
                model.as_deref(),
                models.as_deref(),
                provider.as_deref(),
                &verify,
                no_verify,
                manifest.as_deref(),
                submit,
                no_upload,
                &cli.format,
                cli.verbose,
            )
            .await
        }

        Commands::Discover { query } => cmd_discover(&query),

        Commands::Lookup { query } => cmd_lookup(&query),

        Commands::ClearCache => cmd_clear_cache().await,

        Commands::Fetch { force } => cmd_fetch(force, cli.verbose).await,

        Commands::Approve { id, reason } => cmd_approve(&id, reason.as_deref(), cli.verbose).await,

        Commands::Reject { id, reason } => cmd_reject(&id, reason.as_deref(), cli.verbose).await,

        Commands::List { status, detailed } => {
            cmd_list(status.as_deref(), detailed, &cli.format, cli.verbose).await
        }

        Commands::Install { path } => cmd_install(path.as_deref(), cli.verbose).await,

        Commands::Login { token, endpoint } => cmd_login(token.as_deref(), &endpoint, cli.verbose).await,

        Commands::Report {
            hash,
            threat_type,
            description,
        } => cmd_report(&hash, &threat_type, &description, cli.verbose).await,

        Commands::Diff { baseline, path } => cmd_diff(&baseline, &path, &cli.format, cli.verbose).await,

        Commands::Config { key, value, list } => {
            cmd_config(key.as_deref(), value.as_deref(), list, cli.verbose).await
        }
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Archive extraction helper
// ---------------------------------------------------------------------------

/// Extract .whl/.zip and .tar.gz/.tgz archives in a directory so the scanner
/// can inspect the actual source files inside packages.
fn extract_archives(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();

    for entry in entries {
        let path = entry.path();
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        if name.ends_with(".whl") || name.ends_with(".zip") {
            let file = std::fs::File::open(&path)?;
            let mut archive = zip::ZipArchive::new(file)?;
            let extract_dir = dir.join(name.trim_end_matches(".whl").trim_end_matches(".zip"));
            std::fs::create_dir_all(&extract_dir)?;
            archive.extract(&extract_dir)?;
            std::fs::remove_file(&path)?;
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            let file = std::fs::File::open(&path)?;
            let gz = flate2::read::GzDecoder::new(file);
            let mut archive = tar::Archive::new(gz);
            let extract_dir = dir.join(name.trim_end_matches(".tar.gz").trim_end_matches(".tgz"));
            std::fs::create_dir_all(&extract_dir)?;
            archive.unpack(&extract_dir)?;
            std::fs::remove_file(&path)?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Pipeline helpers shared by clone/pip/npm/scan/audit
// ---------------------------------------------------------------------------

/// Run the static pipeline: collection, tool-poisoning detection, pattern
/// scanning, and enrichment. Does not call an LLM.
fn run_static_scan(path: &Path) -> Report {
    let started = std::time::Instant::now();
    let (entries, profile) = collector::collect(path);
    let tools = collector::extract_tool_definitions(&entries);

    let mut findings = scanner::scan_patterns(path);
    let (poison_findings, _summary) = poison::scan_tools(&tools);
    findings.extend(poison_findings);

    let source_hash = collector::source_hash(&entries);
    let skill_slug = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let mut report = Report {
        skill_slug,
        source_url: None,
        package_type: profile.kind,
        package_version: profile.version,
        audit_model: None,
        audit_provider: None,
        commit_sha: None,
        source_hash,
        risk_score: 0,
        max_severity: None,
        result: ReportResult::Safe,
        findings_count: 0,
        findings,
        input_tokens: None,
        output_tokens: None,
        duration_ms: started.elapsed().as_millis() as u64,
        output_truncated: false,
        verification: None,
    };

    enrich::enrich(&mut report, &entries);
    report
}

/// Run the deep LLM audit layer over a path and merge its findings into an
/// existing static-scan report, re-running enrichment afterward.
async fn run_deep_audit(
    report: &mut Report,
    path: &Path,
    model: Option<&str>,
    preferred_provider: Option<&str>,
    verify: Option<&str>,
    manifest: Option<&str>,
) -> Result<(), AgentAuditError> {
    let (entries, _profile) = collector::collect(path);
    let opts = audit::AuditOptions {
        model_override: model,
        preferred_provider,
        verify,
        manifest,
    };
    let outcome = audit::run_audit(&entries, &opts).await?;

    report.audit_model = Some(outcome.audit_model);
    report.audit_provider = Some(outcome.audit_provider);
    report.input_tokens = outcome.input_tokens;
    report.output_tokens = outcome.output_tokens;
    report.output_truncated = outcome.output_truncated;
    report.verification = outcome.verification;
    report.findings.extend(outcome.findings);

    enrich::enrich(report, &entries);
    Ok(())
}

/// §6 exit codes: 0 clean, 1 findings retained (any non-Safe result), 2
/// error. Genuine errors (invalid input, clone failure, over-context,
/// provider unreachable) are signalled separately, never through this.
fn exit_code_for(result: ReportResult) -> i32 {
    match result {
        ReportResult::Safe => 0,
        ReportResult::Caution | ReportResult::Unsafe => 1,
    }
}

fn print_report(report: &Report, format: &str, target: &str) {
    match format {
        "json" => println!("{}", report::to_json(report)),
        "sarif" => println!("{}", report::to_sarif(report, target)),
        _ => {
            output::print_scan_summary(report);
            output::print_findings(&report.findings);
            output::print_result(report.result);
        }
    }
}

fn parse_min_severity(severity: &str) -> Option<finding::Severity> {
    match severity.to_lowercase().as_str() {
        "medium" => Some(finding::Severity::Medium),
        "high" => Some(finding::Severity::High),
        "critical" => Some(finding::Severity::Critical),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_clone(url: &str, branch: Option<&str>, auto_approve: bool, format: &str, verbose: bool) -> i32 {
    if let Err(err) = collector::validate_source_url(url) {
        eprintln!("{} {}", "error:".bold().red(), err);
        return 2;
    }

    println!("{} cloning {} into quarantine...", "agentaudit:".bold().cyan(), url.bold());

    let entry = match quarantine::add(url, "git") {
        Ok(e) => e,
        Err(err) => {
            eprintln!("{} failed to create quarantine entry: {}", "error:".bold().red(), err);
            return 2;
        }
    };

    if verbose {
        eprintln!("quarantine id: {}", entry.id);
        eprintln!("quarantine path: {}", entry.path.display());
    }

    let mut cmd = std::process::Command::new("git");
    cmd.arg("clone").arg("--depth").arg("1");
    if let Some(b) = branch {
        cmd.arg("--branch").arg(b);
    }
    cmd.arg(url).arg(&entry.path);

    match cmd.status() {
        Ok(s) if s.success() => {}
        _ => {
            eprintln!("{} git clone failed", "error:".bold().red());
            return 2;
        }
    }

    let mut report = run_static_scan(&entry.path);
    report.source_url = Some(url.to_string());
    print_report(&report, format, &entry.path.to_string_lossy());

    if auto_approve && report.result == ReportResult::Safe {
        if let Err(err) = quarantine::approve(&entry.id, Some("auto-approved: safe scan")) {
            eprintln!("{} failed to auto-approve: {}", "warning:".bold().yellow(), err);
        } else {
            println!("{} auto-approved (safe)", "agentaudit:".bold().green());
        }
    }

    exit_code_for(report.result)
}

async fn cmd_pip(package: &str, version: Option<&str>, auto_approve: bool, format: &str, verbose: bool) -> i32 {
    let pkg_spec = match version {
        Some(v) => format!("{}=={}", package, v),
        None => package.to_string(),
    };

    println!(
        "{} downloading pip package {} into quarantine...",
        "agentaudit:".bold().cyan(),
        pkg_spec.bold()
    );

    let entry = match quarantine::add(&pkg_spec, "pip") {
        Ok(e) => e,
        Err(err) => {
            eprintln!("{} failed to create quarantine entry: {}", "error:".bold().red(), err);
            return 2;
        }
    };

    if verbose {
        eprintln!("quarantine id: {}", entry.id);
    }

    let status = std::process::Command::new("pip")
        .arg("download")
        .arg("--no-deps")
        .arg("--dest")
        .arg(&entry.path)
        .arg(&pkg_spec)
        .status();

    match status {
        Ok(s) if s.success() => {}
        _ => {
            eprintln!("{} pip download failed", "error:".bold().red());
            return 2;
        }
    }

    if let Err(err) = extract_archives(&entry.path) {
        eprintln!(
            "{} failed to extract archives: {} (scanning raw archives instead)",
            "warning:".bold().yellow(),
            err
        );
    }

    let report = run_static_scan(&entry.path);
    print_report(&report, format, &entry.path.to_string_lossy());

    if auto_approve && report.result == ReportResult::Safe {
        if let Err(err) = quarantine::approve(&entry.id, Some("auto-approved: safe scan")) {
            eprintln!("{} failed to auto-approve: {}", "warning:".bold().yellow(), err);
        } else {
            println!("{} auto-approved (safe)", "agentaudit:".bold().green());
        }
    }

    exit_code_for(report.result)
}

async fn cmd_npm(package: &str, version: Option<&str>, auto_approve: bool, format: &str, verbose: bool) -> i32 {
    let pkg_spec = match version {
        Some(v) => format!("{}@{}", package, v),
        None => package.to_string(),
    };

    println!(
        "{} downloading npm package {} into quarantine...",
        "agentaudit:".bold().cyan(),
        pkg_spec.bold()
    );

    let entry = match quarantine::add(&pkg_spec, "npm") {
        Ok(e) => e,
        Err(err) => {
            eprintln!("{} failed to create quarantine entry: {}", "error:".bold().red(), err);
            return 2;
        }
    };

    if verbose {
        eprintln!("quarantine id: {}", entry.id);
    }

    let status = std::process::Command::new("npm")
        .arg("pack")
        .arg(&pkg_spec)
        .current_dir(&entry.path)
        .status();

    match status {
        Ok(s) if s.success() => {}
        _ => {
            eprintln!("{} npm pack failed", "error:".bold().red());
            return 2;
        }
    }

    if let Err(err) = extract_archives(&entry.path) {
        eprintln!(
            "{} failed to extract archives: {} (scanning raw archives instead)",
            "warning:".bold().yellow(),
            err
        );
    }

    let report = run_static_scan(&entry.path);
    print_report(&report, format, &entry.path.to_string_lossy());

    if auto_approve && report.result == ReportResult::Safe {
        if let Err(err) = quarantine::approve(&entry.id, Some("auto-approved: safe scan")) {
            eprintln!("{} failed to auto-approve: {}", "warning:".bold().yellow(), err);
        } else {
            println!("{} auto-approved (safe)", "agentaudit:".bold().green());
        }
    }

    exit_code_for(report.result)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_scan(
    path: &Path,
    severity: &str,
    deep: bool,
    submit: bool,
    no_cache: bool,
    enrich_cloud: bool,
    format: &str,
    verbose: bool,
) -> i32 {
    if !path.exists() {
        eprintln!("{} path does not exist: {}", "error:".bold().red(), path.display());
        return 2;
    }

    println!("{} scanning {}...", "agentaudit:".bold().cyan(), path.display().to_string().bold());

    let min_severity = parse_min_severity(severity);
    let use_cache = !no_cache && !deep && min_severity.is_none();

    if use_cache {
        if let Some(cached) = cache::load_cached(path) {
            println!("{} using cached result", "agentaudit:".bold().green());
            print_report(&cached, format, &path.to_string_lossy());
            return exit_code_for(cached.result);
        } else if verbose {
            eprintln!("no cache entry found, scanning fresh");
        }
    }

    let mut report = run_static_scan(path);

    if deep {
        if verbose {
            eprintln!("running deep LLM audit layer...");
        }
        if let Err(err) = run_deep_audit(&mut report, path, None, None, Some("self"), None).await {
            eprintln!(
                "{} deep audit failed: {} (keeping static results)",
                "warning:".bold().yellow(),
                err
            );
            if let Some(hint) = err.hint() {
                eprintln!("hint: {}", hint);
            }
        }
    }

    if let Some(min) = min_severity {
        report.findings.retain(|f| f.severity >= min);
        report.findings_count = report.findings.len();
    }

    print_report(&report, format, &path.to_string_lossy());

    if use_cache {
        if let Err(err) = cache::save_to_cache(path, &report) {
            if verbose {
                eprintln!("cache save failed: {}", err);
            }
        } else if verbose {
            eprintln!("result cached successfully");
        }
    }

    if enrich_cloud {
        let dir_hash = cache::compute_directory_hash(path).unwrap_or_default();
        if verbose {
            eprintln!("directory hash: {}", dir_hash);
            eprintln!("checking hash against cloud threat database...");
        }

        let client = api::AgentAuditClient::new(None);
        match client.lookup_threat(&dir_hash).await {
            Ok(info) => {
                if info.known_malicious {
                    println!(
                        "\n  {} {} is a known threat: {}",
                        "THREAT INTEL:".bold().red(),
                        path.display(),
                        info.description.as_deref().unwrap_or("no description")
                    );
                    if let Some(threat_type) = &info.threat_type {
                        println!("  Type: {}", threat_type);
                    }
                } else if verbose {
                    eprintln!("no threat intel match for this target");
                }
            }
            Err(err) => {
                if verbose {
                    eprintln!("{} cloud enrichment unavailable: {}", "warning:".bold().yellow(), err);
                }
            }
        }
    }

    if submit {
        if verbose {
            eprintln!("submitting results to AgentAudit cloud...");
        }
        let client = api::AgentAuditClient::new(None);
        match client.submit_scan(&report).await {
            Ok(_) => println!("{} results submitted to AgentAudit cloud", "agentaudit:".bold().green()),
            Err(err) => eprintln!(
                "{} failed to submit results: {} (continuing offline)",
                "warning:".bold().yellow(),
                err
            ),
        }
    }

    exit_code_for(report.result)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_audit(
    path: &Path,
    model: Option<&str>,
    models: Option<&str>,
    provider: Option<&str>,
    verify: &str,
    no_verify: bool,
    manifest: Option<&str>,
    submit: bool,
    no_upload: bool,
    format: &str,
    verbose: bool,
) -> i32 {
    if !path.exists() {
        eprintln!("{} path does not exist: {}", "error:".bold().red(), path.display());
        return 2;
    }

    let cfg = config::load();
    let preferred_provider = provider.or(cfg.preferred_provider.as_deref());
    let manifest_text = manifest.and_then(|p| std::fs::read_to_string(p).ok());
    let verify_mode = if no_verify { None } else { Some(verify) };

    println!("{} auditing {}...", "agentaudit:".bold().cyan(), path.display().to_string().bold());

    let mut report = run_static_scan(path);

    let model_list = models.map(|m| m.split(',').map(|s| s.trim().to_string()).collect::<Vec<_>>());

    match model_list {
        Some(list) if list.len() > 1 => {
            let (entries, _profile) = collector::collect(path);
            let results = audit::run_multi_model_audit(
                &entries,
                &list,
                preferred_provider,
                verify_mode,
                manifest_text.as_deref(),
            )
            .await;

            let mut any_succeeded = false;
            for (model_name, result) in list.iter().zip(results) {
                match result {
                    Ok(outcome) => {
                        any_succeeded = true;
                        if report.audit_model.is_none() {
                            report.audit_model = Some(model_name.clone());
                        }
                        if report.audit_provider.is_none() {
                            report.audit_provider = Some(outcome.audit_provider.clone());
                        }
                        report.findings.extend(outcome.findings);
                    }
                    Err(err) => {
                        eprintln!("{} model {} failed: {}", "warning:".bold().yellow(), model_name, err);
                    }
                }
            }
            if !any_succeeded {
                eprintln!("{} every model in the fan-out failed", "error:".bold().red());
                return 2;
            }
            enrich::enrich(&mut report, &entries);
        }
        _ => {
            if let Err(err) = run_deep_audit(
                &mut report,
                path,
                model,
                preferred_provider,
                verify_mode,
                manifest_text.as_deref(),
            )
            .await
            {
                eprintln!("{} {}", "error:".bold().red(), err);
                if let Some(hint) = err.hint() {
                    eprintln!("hint: {}", hint);
                }
                return err.exit_code();
            }
        }
    }

    print_report(&report, format, &path.to_string_lossy());

    if submit && !no_upload && !cfg.no_upload {
        if verbose {
            eprintln!("submitting results to AgentAudit cloud...");
        }
        let client = api::AgentAuditClient::new(None);
        match client.submit_scan(&report).await {
            Ok(_) => println!("{} results submitted to AgentAudit cloud", "agentaudit:".bold().green()),
            Err(err) => eprintln!(
                "{} failed to submit results: {} (continuing offline)",
                "warning:".bold().yellow(),
                err
            ),
        }
    }

    exit_code_for(report.result)
}

// ---------------------------------------------------------------------------
// External collaborator stubs
// ---------------------------------------------------------------------------

fn cmd_discover(query: &str) -> i32 {
    println!(
        "{} registry search for {} is not configured in this build",
        "agentaudit:".bold().yellow(),
        query.bold()
    );
    eprintln!("hint: registry discovery is an external collaborator, out of scope here");
    2
}

fn cmd_lookup(query: &str) -> i32 {
    println!(
        "{} audit-history lookup for {} is not configured in this build",
        "agentaudit:".bold().yellow(),
        query.bold()
    );
    eprintln!("hint: audit-history lookup is an external collaborator, out of scope here");
    2
}

// ---------------------------------------------------------------------------
// Baseline diff
// ---------------------------------------------------------------------------

async fn cmd_diff(baseline_path: &str, scan_path: &Path, format: &str, verbose: bool) -> i32 {
    let baseline_data = match std::fs::read_to_string(baseline_path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!(
                "{} failed to read baseline file '{}': {}",
                "error:".bold().red(),
                baseline_path,
                err
            );
            return 2;
        }
    };

    let baseline_report: Report = match serde_json::from_str(&baseline_data) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("{} failed to parse baseline JSON: {}", "error:".bold().red(), err);
            return 2;
        }
    };

    if verbose {
        eprintln!(
            "loaded baseline: {} findings, risk {}",
            baseline_report.findings.len(),
            baseline_report.risk_score
        );
    }

    let current_report = run_static_scan(scan_path);
    let diff_result = diff::diff_scans(&baseline_report, &current_report);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&diff_result).unwrap_or_default());
    } else {
        println!("\n  {} {}", "Scan Diff:".bold(), diff_result.summary);

        if !diff_result.new_findings.is_empty() {
            println!("\n  {} ({}):", "NEW FINDINGS".bold().red(), diff_result.new_findings.len());
            for f in &diff_result.new_findings {
                println!(
                    "    {} [{}] {} in {} (line {})",
                    "+".green(),
                    f.pattern_id,
                    f.severity,
                    f.file.as_deref().unwrap_or("<unknown>"),
                    f.line.unwrap_or(0)
                );
            }
        }

        if !diff_result.resolved_findings.is_empty() {
            println!("\n  {} ({}):", "RESOLVED".bold().green(), diff_result.resolved_findings.len());
            for f in &diff_result.resolved_findings {
                println!(
                    "    {} [{}] {} in {} (line {})",
                    "-".red(),
                    f.pattern_id,
                    f.severity,
                    f.file.as_deref().unwrap_or("<unknown>"),
                    f.line.unwrap_or(0)
                );
            }
        }

        if diff_result.new_findings.is_empty() && diff_result.resolved_findings.is_empty() {
            println!("  {}", "No changes detected.".dimmed());
        }
    }

    if !diff_result.new_findings.is_empty() {
        1
    } else {
        0
    }
}

async fn cmd_clear_cache() -> i32 {
    match cache::clear_cache() {
        Ok(count) => {
            println!("{} cleared {} cached scan result(s)", "agentaudit:".bold().green(), count);
            0
        }
        Err(err) => {
            eprintln!("{} failed to clear cache: {}", "error:".bold().red(), err);
            1
        }
    }
}

async fn cmd_fetch(force: bool, verbose: bool) -> i32 {
    println!("{} fetching latest threat signatures...", "agentaudit:".bold().cyan());

    let client = api::AgentAuditClient::new(None);
    match client.get_signatures(force).await {
        Ok(count) => {
            println!("{} fetched {} signatures", "agentaudit:".bold().green(), count);
            0
        }
        Err(err) => {
            eprintln!("{} failed to fetch signatures: {}", "error:".bold().red(), err);
            if verbose {
                eprintln!("hint: check your network connection or API token");
            }
            1
        }
    }
}

async fn cmd_approve(id: &str, reason: Option<&str>, verbose: bool) -> i32 {
    if verbose {
        eprintln!("approving quarantine entry: {}", id);
    }

    match quarantine::approve(id, reason) {
        Ok(entry) => {
            println!("{} approved {} ({})", "agentaudit:".bold().green(), entry.id, entry.source);
            0
        }
        Err(err) => {
            eprintln!("{} {}", "error:".bold().red(), err);
            1
        }
    }
}

async fn cmd_reject(id: &str, reason: Option<&str>, verbose: bool) -> i32 {
    if verbose {
        eprintln!("rejecting quarantine entry: {}", id);
    }

    match quarantine::reject(id, reason) {
        Ok(entry) => {
            println!("{} rejected {} ({})", "agentaudit:".bold().red(), entry.id, entry.source);
            0
        }
        Err(err) => {
            eprintln!("{} {}", "error:".bold().red(), err);
            1
        }
    }
}

async fn cmd_list(status: Option<&str>, detailed: bool, format: &str, _verbose: bool) -> i32 {
    match quarantine::list(status) {
        Ok(entries) => {
            if entries.is_empty() {
                println!("{} no quarantined items found", "agentaudit:".bold().cyan());
                return 0;
            }

            output::print_quarantine_list(&entries, detailed, format);
            0
        }
        Err(err) => {
            eprintln!("{} {}", "error:".bold().red(), err);
            1
        }
    }
}

async fn cmd_install(path: Option<&Path>, verbose: bool) -> i32 {
    let install_dir = path.map(|p| p.to_path_buf()).unwrap_or_else(|| PathBuf::from("/usr/local/bin"));

    println!("{} installing agentaudit to {}...", "agentaudit:".bold().cyan(), install_dir.display());

    let target = install_dir.join("agentaudit");

    let current_exe = match std::env::current_exe() {
        Ok(p) => p,
        Err(err) => {
            eprintln!("{} cannot determine current binary path: {}", "error:".bold().red(), err);
            return 1;
        }
    };

    if verbose {
        eprintln!("copying {} -> {}", current_exe.display(), target.display());
    }

    match std::fs::copy(&current_exe, &target) {
        Ok(_) => {
            println!("{} installed successfully to {}", "agentaudit:".bold().green(), target.display());
            0
        }
        Err(err) => {
            eprintln!("{} installation failed: {}", "error:".bold().red(), err);
            eprintln!("hint: you may need to run with sudo");
            1
        }
    }
}

async fn cmd_login(token: Option<&str>, endpoint: &str, verbose: bool) -> i32 {
    if verbose {
        eprintln!("authenticating with {}", endpoint);
    }

    let client = api::AgentAuditClient::new(Some(endpoint.to_string()));

    match token {
        Some(t) => match client.login_with_token(t).await {
            Ok(_) => {
                println!("{} authenticated successfully", "agentaudit:".bold().green());
                0
            }
            Err(err) => {
                eprintln!("{} authentication failed: {}", "error:".bold().red(), err);
                1
            }
        },
        None => {
            print!("Email: ");
            if io::stdout().flush().is_err() {
                eprintln!("{} failed to flush stdout", "error:".bold().red());
                return 1;
            }
            let mut email = String::new();
            if io::stdin().read_line(&mut email).is_err() {
                eprintln!("{} failed to read email", "error:".bold().red());
                return 1;
            }
            let email = email.trim();

            print!("Password: ");
            if io::stdout().flush().is_err() {
                eprintln!("{} failed to flush stdout", "error:".bold().red());
                return 1;
            }
            let mut password = String::new();
            if io::stdin().read_line(&mut password).is_err() {
                eprintln!("{} failed to read password", "error:".bold().red());
                return 1;
            }
            let password = password.trim();

            match client.login(email, password).await {
                Ok(_) => {
                    println!("{} logged in successfully", "agentaudit:".bold().green());
                    0
                }
                Err(err) => {
                    eprintln!("{} login failed: {}", "error:".bold().red(), err);
                    1
                }
            }
        }
    }
}

async fn cmd_report(hash: &str, threat_type: &str, description: &str, verbose: bool) -> i32 {
    if verbose {
        eprintln!("reporting threat: hash={}", hash);
    }

    let client = api::AgentAuditClient::new(None);

    if !client.is_authenticated() {
        eprintln!(
            "{} you must be logged in to report threats (run: agentaudit login)",
            "error:".bold().red()
        );
        return 1;
    }

    match client.report_threat(hash, threat_type, description).await {
        Ok(response) => {
            println!("{} threat reported successfully (id: {})", "agentaudit:".bold().green(), response.id);
            0
        }
        Err(err) => {
            eprintln!("{} failed to report threat: {}", "error:".bold().red(), err);
            1
        }
    }
}

async fn cmd_config(key: Option<&str>, value: Option<&str>, list: bool, _verbose: bool) -> i32 {
    if list {
        let cfg = config::load();
        println!("{}", serde_json::to_string_pretty(&cfg).unwrap_or_default());
        return 0;
    }

    let Some(k) = key else {
        eprintln!("{} specify a key or use --list", "agentaudit:".bold().yellow());
        return 1;
    };

    let mut cfg = config::load();

    if let Some(v) = value {
        let applied = match k {
            "preferred_provider" => {
                cfg.preferred_provider = Some(v.to_string());
                true
            }
            "preferred_model" => {
                cfg.preferred_model = Some(v.to_string());
                true
            }
            "no_upload" => match v.parse::<bool>() {
                Ok(b) => {
                    cfg.no_upload = b;
                    true
                }
                Err(_) => false,
            },
            _ => false,
        };

        if !applied {
            eprintln!("{} unknown config key '{}'", "error:".bold().red(), k);
            return 1;
        }

        match config::save(&cfg) {
            Ok(_) => {
                println!("{} {} = {}", "agentaudit:".bold().green(), k, v);
                0
            }
            Err(err) => {
                eprintln!("{} failed to write config: {}", "error:".bold().red(), err);
                1
            }
        }
    } else {
        let value = match k {
            "preferred_provider" => cfg.preferred_provider.clone(),
            "preferred_model" => cfg.preferred_model.clone(),
            "no_upload" => Some(cfg.no_upload.to_string()),
            _ => None,
        };

        match value {
            Some(v) => {
                println!("{}", v);
                0
            }
            None => {
                eprintln!("{} key '{}' not set", "agentaudit:".bold().yellow(), k);
                1
            }
        }
    }
}

/// Referenced through `Report::package_type`; kept visible here so a reader
/// can see the type that drives skill/package classification end to end.
#[allow(dead_code)]
fn _package_kind_surface(_: PackageKind) {}
