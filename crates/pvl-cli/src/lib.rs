//! `pvl`: validate PVL documents and replay proof checks offline.
//!
//! ```bash
//! pvl validate pvl.json --service github
//! pvl check pvl.json --service dns --case case.json -v
//! ```
//!
//! `check` never touches the network: pages, TXT records and the signature
//! all come from the case file (see [`fixture`]).

pub mod fixture;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fixture::{CaseFile, FixtureFetcher, FixtureOpener, FixtureResolver};
use pvl_core::{Engine, ProofDocument, PvlConfig, ServiceType, parse_document_str};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_FILTER: &str = "pvl_core=info,pvl_cli=info";
const VERBOSE_LOG_FILTER: &str = "pvl_core=debug,pvl_cli=debug";

/// Proof Verification Language tools.
#[derive(Debug, Parser)]
#[command(name = "pvl", version, about, long_about = None)]
pub struct Cli {
    /// PvlConfig JSON file; defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log interpreter decisions at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that a document is well formed for one service.
    Validate {
        /// PVL document.
        doc: PathBuf,
        #[arg(long)]
        service: String,
    },
    /// Run a full proof check against a fixture case.
    Check {
        /// PVL document.
        doc: PathBuf,
        #[arg(long)]
        service: String,
        /// Case file with the proof, hint, signature, pages and TXT records.
        #[arg(long)]
        case: PathBuf,
    },
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let report = run(&cli)?;
    println!("{report}");
    Ok(())
}

pub fn run_from_args<I, T>(args: I) -> Result<String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    run(&cli)
}

/// Execute a parsed command and return the line to print on success.
pub fn run(cli: &Cli) -> Result<String> {
    let config = load_config(cli.config.as_deref())?;
    match &cli.command {
        Command::Validate { doc, service } => {
            let service: ServiceType = service.parse()?;
            let doc = load_document(doc)?;
            let scripts = pvl_core::validate_document(&doc, service, &config)?;
            info!(%service, scripts = scripts.len(), "document is valid");
            Ok("ok".to_string())
        }
        Command::Check { doc, service, case } => {
            let service: ServiceType = service.parse()?;
            let doc = load_document(doc)?;
            let case = load_case(case)?;
            let engine = Engine::new(
                config,
                Box::new(FixtureFetcher::new(case.pages)),
                Box::new(FixtureResolver::new(case.txt)),
                Box::new(FixtureOpener::new(case.proof.sig.clone(), case.signature)),
            );
            engine.check_proof(&doc, service, &case.proof, &case.hint)?;
            info!(%service, "proof verified");
            Ok("ok".to_string())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<PvlConfig> {
    let Some(path) = path else {
        return Ok(PvlConfig::default());
    };
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_document(path: &Path) -> Result<ProofDocument> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_document_str(&source)?)
}

fn load_case(path: &Path) -> Result<CaseFile> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use pretty_assertions::assert_eq;
    use pvl_core::{ProofError, ProofStatus};
    use serde_json::{Value, json};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SIG_ID: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff0f";

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{}-{}-{}", prefix, std::process::id(), ts));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    fn write_json(dir: &Path, name: &str, value: &Value) -> String {
        let path = dir.join(name);
        fs::write(&path, value.to_string()).expect("failed to write fixture");
        path.display().to_string()
    }

    fn proof_status(err: anyhow::Error) -> ProofStatus {
        err.downcast_ref::<ProofError>()
            .expect("error should be a proof error")
            .status
    }

    fn github_doc() -> Value {
        json!({
            "pvl_version": 1,
            "services": {
                "github": [{"fetch": "string"}, {"assert_find_base64": "sig"}],
                "dns": [{"assert_regex_match": "/^keybase-site-verification=%{sig_id_medium}$/"}]
            }
        })
    }

    fn case(page: &str) -> Value {
        json!({
            "proof": {"username_keybase": "kronk", "username_service": "kronk", "sig": "ARMOR"},
            "hint": {"api_url": "https://gist.test/kronk"},
            "signature": {"body_base64": STANDARD.encode(b"signed"), "sig_id": SIG_ID},
            "pages": {"https://gist.test/kronk": page}
        })
    }

    #[test]
    fn validate_reports_ok() {
        let dir = unique_temp_dir("pvl-validate");
        let doc = write_json(&dir, "pvl.json", &github_doc());
        let out = run_from_args(["pvl", "validate", doc.as_str(), "--service", "github"]).unwrap();
        assert_eq!(out, "ok");
    }

    #[test]
    fn validate_rejects_unknown_service() {
        let dir = unique_temp_dir("pvl-validate-service");
        let doc = write_json(&dir, "pvl.json", &github_doc());
        let err =
            run_from_args(["pvl", "validate", doc.as_str(), "--service", "myspace"]).unwrap_err();
        assert_eq!(proof_status(err), ProofStatus::InvalidPvl);
    }

    #[test]
    fn check_runs_against_fixture_pages() {
        let dir = unique_temp_dir("pvl-check");
        let doc = write_json(&dir, "pvl.json", &github_doc());
        let page = format!("proof: {}", STANDARD.encode(b"signed"));
        let case_ok = write_json(&dir, "ok.json", &case(&page));
        let out = run_from_args([
            "pvl",
            "check",
            doc.as_str(),
            "--service",
            "github",
            "--case",
            case_ok.as_str(),
        ])
        .unwrap();
        assert_eq!(out, "ok");

        let case_bad = write_json(&dir, "bad.json", &case("nothing"));
        let err = run_from_args([
            "pvl",
            "check",
            doc.as_str(),
            "--service",
            "github",
            "--case",
            case_bad.as_str(),
        ])
        .unwrap_err();
        assert_eq!(proof_status(err), ProofStatus::TextNotFound);
    }

    #[test]
    fn check_uses_txt_records_for_dns() {
        let dir = unique_temp_dir("pvl-check-dns");
        let doc = write_json(&dir, "pvl.json", &github_doc());
        let medium = pvl_core::SigId::from_hex(SIG_ID).unwrap().to_medium_id();
        let mut case = case("");
        case["proof"]["hostname"] = json!("kronk.example");
        case["txt"] = json!({
            "_keybase.kronk.example": [format!("keybase-site-verification={medium}")]
        });
        let case = write_json(&dir, "case.json", &case);
        let out = run_from_args([
            "pvl",
            "check",
            doc.as_str(),
            "--service",
            "dns",
            "--case",
            case.as_str(),
        ])
        .unwrap();
        assert_eq!(out, "ok");
    }

    #[test]
    fn config_file_can_disable_checks() {
        let dir = unique_temp_dir("pvl-config");
        let doc = write_json(&dir, "pvl.json", &github_doc());
        let case = write_json(&dir, "case.json", &case("x"));
        let config = write_json(&dir, "config.json", &json!({"enabled": false}));
        let err = run_from_args([
            "pvl",
            "check",
            doc.as_str(),
            "--service",
            "github",
            "--case",
            case.as_str(),
            "--config",
            config.as_str(),
        ])
        .unwrap_err();
        assert_eq!(proof_status(err), ProofStatus::InternalError);
    }

    #[test]
    fn missing_document_names_the_path() {
        let err = run_from_args(["pvl", "validate", "/nonexistent/pvl.json", "--service", "github"])
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pvl.json"));
    }
}
