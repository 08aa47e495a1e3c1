//! CLI binary for rxscan.
//!
//! A thin shim over the library crate that maps CLI flags to `ScanConfig`,
//! drives one `ScanSession` and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rxscan::output::format_won;
use rxscan::{
    write_json, ImageSource, MedicineEntry, MedicineList, NormalizedPrescription,
    ProgressCallback, ScanConfig, ScanError, ScanProgressCallback, ScanSession, ScanState,
};
use serde::Serialize;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that follows the session state.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let template = "{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}";
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Scan");
        Arc::new(Self { bar })
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_state_change(&self, state: &ScanState) {
        match state {
            ScanState::Previewing => self.bar.set_message("photo loaded"),
            ScanState::Processing => {
                self.bar.reset_elapsed();
                self.bar.enable_steady_tick(Duration::from_millis(80));
                self.bar.set_message("reading prescription…");
            }
            ScanState::Succeeded(p) => {
                self.bar.finish_and_clear();
                eprintln!(
                    "{} {} medicines read from {}",
                    green("✔"),
                    bold(&p.medicines.len().to_string()),
                    p.pharmacy_name
                );
            }
            ScanState::Failed(e) => {
                self.bar.finish_and_clear();
                eprintln!("{} {}", red("✘"), red(&e.to_string()));
            }
            ScanState::Idle => self.bar.finish_and_clear(),
        }
    }

    fn on_request_start(&self, image_bytes: usize) {
        self.bar
            .set_message(format!("uploading {} KB…", image_bytes.div_ceil(1024)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan a receipt photo (pretty summary on stdout)
  rxscan receipt.jpg

  # Machine-readable output
  rxscan --json receipt.jpg > receipt.json

  # Write JSON to a file
  rxscan receipt.jpg -o scans/2025-11-20.json

  # Use a remote OCR service
  rxscan --api-url https://ocr.example.com receipt.jpg

  # Show the medicine-list entries the scan would create
  rxscan --commit receipt.jpg

ENVIRONMENT VARIABLES:
  RXSCAN_API_URL   Base URL of the OCR service (default http://localhost:7080)
  RUST_LOG         Override log filter (e.g. rxscan=debug)

RETRY:
  Failed calls are never retried automatically. In an interactive terminal
  rxscan asks before re-sending the same photo.
"#;

/// Read a prescription photo into a structured medicine record.
#[derive(Parser, Debug)]
#[command(
    name = "rxscan",
    version,
    about = "Read a prescription or pharmacy-receipt photo into a structured medicine record",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Photo of the prescription or receipt (JPEG, PNG, HEIC, …).
    image: PathBuf,

    /// Write JSON to this file instead of printing.
    #[arg(short, long, env = "RXSCAN_OUTPUT")]
    output: Option<PathBuf>,

    /// Base URL of the OCR service.
    #[arg(long, env = "RXSCAN_API_URL", default_value = rxscan::config::DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Per-request timeout in seconds (default: none).
    #[arg(long, env = "RXSCAN_TIMEOUT")]
    timeout: Option<u64>,

    /// Largest accepted photo, in megabytes.
    #[arg(long, env = "RXSCAN_MAX_IMAGE_MB", default_value_t = 20)]
    max_image_mb: usize,

    /// Print the normalized record as JSON.
    #[arg(long, env = "RXSCAN_JSON")]
    json: bool,

    /// Add the result to an in-memory medicine list and print the entries.
    #[arg(long)]
    commit: bool,

    /// Never ask to retry after a failure.
    #[arg(long)]
    no_retry_prompt: bool,

    /// Disable the spinner.
    #[arg(long, env = "RXSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RXSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RXSCAN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; INFO logs would
    // tear through it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && io::stderr().is_terminal();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ScanProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let session = ScanSession::new(&config).context("Failed to set up scan session")?;

    // ── Scan, with user-confirmed retry ──────────────────────────────────
    let can_prompt = !cli.no_retry_prompt && !cli.quiet && io::stdin().is_terminal();
    let mut outcome = session
        .submit(ImageSource::Path(cli.image.clone()))
        .await;
    while let Err(ref e) = outcome {
        if !(e.is_retryable() && can_prompt && ask_retry(e)?) {
            break;
        }
        outcome = session.retry().await;
    }
    let prescription = outcome.with_context(|| format!("Failed to scan {}", cli.image.display()))?;

    // ── Commit (optional) ────────────────────────────────────────────────
    let committed = if cli.commit {
        let mut list = MedicineList::new();
        session
            .commit(&mut list)
            .context("Failed to add medicines to the list")?;
        Some(list)
    } else {
        None
    };

    // ── Output ───────────────────────────────────────────────────────────
    if let Some(ref path) = cli.output {
        write_json(path, &prescription)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if cli.json {
        if let Some(json) = stdout_json(&prescription, committed.as_ref(), cli.output.is_some())? {
            println!("{json}");
        }
    } else if !cli.quiet {
        if cli.output.is_none() {
            print_summary(&prescription);
        }
        if let Some(ref list) = committed {
            print_entries(list);
        }
    }

    Ok(())
}

/// Map CLI args to `ScanConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .api_base_url(&cli.api_url)
        .max_image_bytes(cli.max_image_mb.saturating_mul(1024 * 1024));
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Ask on stderr whether to re-send the same photo.
fn ask_retry(error: &ScanError) -> Result<bool> {
    eprint!("{} {}  Retry? [y/N] ", red("!"), error);
    io::stderr().flush().ok();
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// `--json --commit` output.
#[derive(Serialize)]
struct CommitReport<'a> {
    prescription: &'a NormalizedPrescription,
    entries: Vec<&'a MedicineEntry>,
}

/// The single JSON document `--json` prints: the record, or the record plus
/// the committed entries. `None` when the record already went to `-o` and
/// there is nothing else to report.
fn stdout_json(
    prescription: &NormalizedPrescription,
    committed: Option<&MedicineList>,
    wrote_file: bool,
) -> Result<Option<String>> {
    let json = match committed {
        Some(list) => serde_json::to_string_pretty(&CommitReport {
            prescription,
            entries: list.iter().collect(),
        }),
        None if !wrote_file => serde_json::to_string_pretty(prescription),
        None => return Ok(None),
    };
    json.map(Some).context("Failed to serialise output")
}

fn print_entries(list: &MedicineList) {
    println!();
    println!("{}", bold(&format!("Added {} medicines:", list.len())));
    for entry in list.iter() {
        let until = entry
            .end_date
            .map(|d| format!(" until {d}"))
            .unwrap_or_default();
        println!(
            "  #{:<3} {}  {}{}",
            entry.id,
            entry.name,
            dim(&format!("{} {}", entry.dosage, entry.frequency)),
            until
        );
    }
}

fn print_summary(p: &NormalizedPrescription) {
    println!("Pharmacy:     {}", p.pharmacy_name);
    println!("Dispensed:    {}", p.dispensing_date);
    if let Some(ref a) = p.pharmacy_address {
        println!("Address:      {}", a);
    }
    if let Some(ref t) = p.pharmacy_phone {
        println!("Phone:        {}", t);
    }
    if let Some(ref d) = p.prescribing_doctor {
        println!("Doctor:       {}", d);
    }
    if let Some(ref n) = p.patient_name {
        println!("Patient:      {}", n);
    }
    if let Some(t) = p.total_amount {
        println!("Total:        {}", format_won(t));
    }
    if let Some(c) = p.copayment {
        println!("Copayment:    {}", format_won(c));
    }

    println!();
    println!("{}", bold(&format!("Medicines ({})", p.medicines.len())));
    for (i, m) in p.medicines.iter().enumerate() {
        let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
        println!(
            "  {}. {}  {}",
            i + 1,
            bold(&m.name),
            dim(&format!(
                "per dose {} · per day {} · days {}",
                or_dash(&m.dosage_per_intake),
                or_dash(&m.daily_frequency),
                or_dash(&m.total_days)
            ))
        );
        if let Some(ref u) = m.usage_instruction {
            println!("     usage:  {}", u);
        }
        if let Some(ref e) = m.effect {
            println!("     effect: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxscan::{MedicineLine, MedicineSink};
    use serde_json::Value;

    fn prescription() -> NormalizedPrescription {
        NormalizedPrescription {
            pharmacy_name: "행복약국".into(),
            dispensing_date: "2025-11-20".into(),
            patient_name: None,
            pharmacy_address: None,
            pharmacy_phone: None,
            prescribing_doctor: None,
            total_amount: None,
            copayment: None,
            medicines: vec![MedicineLine {
                name: "타이레놀".into(),
                ..MedicineLine::unknown()
            }],
        }
    }

    #[test]
    fn json_with_commit_is_one_document() {
        let p = prescription();
        let mut list = MedicineList::new();
        list.add_prescription(p.clone());

        let out = stdout_json(&p, Some(&list), false).unwrap().unwrap();
        let doc: Value = serde_json::from_str(&out).expect("stdout parses as one JSON value");
        assert_eq!(doc["prescription"]["pharmacyName"], "행복약국");
        assert_eq!(doc["entries"][0]["name"], "타이레놀");
        assert_eq!(doc["entries"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn json_without_commit_is_the_record() {
        let p = prescription();
        let out = stdout_json(&p, None, false).unwrap().unwrap();
        let doc: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(doc["pharmacyName"], "행복약국");

        assert!(stdout_json(&p, None, true).unwrap().is_none());
    }
}
