//! trustprobe: Command-line tool for checking TLS servers and certificate
//! files against a JKS/PKCS#12 truststore.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use trustprobe_lib::{
    AnchorStore, ScanOutcome, ScanTarget, ValidationOptions, ValidationOutcome, Validator,
};

/// Exit code for a target that is not trusted.
const EXIT_NOT_TRUSTED: i32 = 2;
/// Exit code for a PKCS#12 certificate file that needs a password.
const EXIT_PASSWORD_REQUIRED: i32 = 3;

#[derive(Parser)]
#[command(
    name = "trustprobe",
    about = "Check which trust anchors of a truststore trust a TLS server or certificate file",
    long_about = "trustprobe loads a PKCS#12 or JKS truststore (optionally packed in a\n\
                  single-file .tar.gz) and validates a live TLS endpoint or an offline\n\
                  certificate file against the whole store or a single alias.\n\n\
                  Only the store's certificates are trusted; system roots are never\n\
                  consulted and the server host name is not checked.",
    after_help = "EXIT CODES:\n\
                  \n  0  trusted / success\
                  \n  2  not trusted\
                  \n  3  PKCS#12 certificate file needs a password (--cert-password)\
                  \n  1  operational error\
                  \n\nEXAMPLES:\n\
                  \n  trustprobe list --store truststore.p12 --password changeit\
                  \n  trustprobe check --store truststore.jks example.com 443\
                  \n  trustprobe check-file --store truststore.p12 server.pem --show-chain\
                  \n  trustprobe scan --store truststore.jks --host example.com --port 443"
)]
struct Cli {
    /// Enable debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Truststore file: PKCS#12, JKS, or a .tar.gz holding one of them
    #[arg(long, value_name = "FILE")]
    store: PathBuf,
    /// Truststore password (default: empty)
    #[arg(long, value_name = "PW", default_value = "")]
    password: String,
}

#[derive(Args)]
struct ValidationArgs {
    /// TCP connect timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    connect_timeout: u64,
    /// TLS handshake read/write timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    handshake_timeout: u64,
    /// Validate at a specific Unix timestamp instead of current time
    #[arg(long, value_name = "EPOCH")]
    attime: Option<i64>,
}

impl ValidationArgs {
    fn validator(&self) -> Validator {
        Validator::new(ValidationOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout),
            handshake_timeout: Duration::from_millis(self.handshake_timeout),
            at_time: self.attime,
            ..Default::default()
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the truststore's certificates, soonest expiry first
    #[command(after_help = "EXAMPLES:\n\
                      \n  trustprobe list --store truststore.p12 --password changeit\
                      \n  trustprobe list --store truststore.jks --json")]
    List {
        #[command(flatten)]
        store: StoreArgs,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Validate a live TLS server (exit 0 = trusted, 2 = not trusted)
    #[command(after_help = "EXAMPLES:\n\
                      \n  trustprobe check --store truststore.jks example.com 443\
                      \n  trustprobe check --store truststore.jks example.com 443 --alias rootca\
                      \n  trustprobe check --store truststore.p12 --password s3cret 10.0.0.5 8443 --json")]
    Check {
        #[command(flatten)]
        store: StoreArgs,
        /// Server host name or IP address
        host: String,
        /// Server port
        port: u16,
        /// Trust only the certificate stored under this alias
        #[arg(long)]
        alias: Option<String>,
        #[command(flatten)]
        validation: ValidationArgs,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Display subject and issuer for each certificate the server sent
        #[arg(long)]
        show_chain: bool,
    },
    /// Validate a certificate file (exit 0 = trusted, 2 = not trusted, 3 = password needed)
    #[command(after_help = "CERT may be PEM or DER (one or more certificates), PKCS#12 or JKS.\n\
                      Every certificate in the file is tried as the leaf.\n\
                      \nEXAMPLES:\n\
                      \n  trustprobe check-file --store truststore.jks server.pem\
                      \n  trustprobe check-file --store truststore.jks server.p12 --cert-password s3cret\
                      \n  trustprobe check-file --store truststore.jks chain.pem --alias rootca --show-chain")]
    CheckFile {
        #[command(flatten)]
        store: StoreArgs,
        /// Certificate file
        cert: PathBuf,
        /// Trust only the certificate stored under this alias
        #[arg(long)]
        alias: Option<String>,
        /// Password for a PKCS#12 certificate file
        #[arg(long, value_name = "PW")]
        cert_password: Option<String>,
        #[command(flatten)]
        validation: ValidationArgs,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Display subject and issuer for each certificate in the chain
        #[arg(long)]
        show_chain: bool,
    },
    /// Find which aliases individually trust a server or certificate file
    #[command(after_help = "EXAMPLES:\n\
                      \n  trustprobe scan --store truststore.jks --host example.com --port 443\
                      \n  trustprobe scan --store truststore.jks --file server.pem\
                      \n  trustprobe scan --store truststore.jks --file server.p12 --cert-password s3cret --json")]
    Scan {
        #[command(flatten)]
        store: StoreArgs,
        /// Server host name or IP address
        #[arg(long, requires = "port", conflicts_with = "file")]
        host: Option<String>,
        /// Server port
        #[arg(long, requires = "host")]
        port: Option<u16>,
        /// Certificate file
        #[arg(long, value_name = "CERT", required_unless_present = "host")]
        file: Option<PathBuf>,
        /// Password for a PKCS#12 certificate file
        #[arg(long, value_name = "PW", requires = "file")]
        cert_password: Option<String>,
        #[command(flatten)]
        validation: ValidationArgs,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,trustprobe=debug,trustprobe_lib=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_store(args: &StoreArgs) -> Result<AnchorStore> {
    debug!(path = %args.store.display(), "loading truststore");
    trustprobe_lib::load_file(&args.store, &args.password)
        .with_context(|| format!("Failed to load truststore: {}", args.store.display()))
}

/// Exit code for a finished validation.
fn outcome_code(outcome: &ValidationOutcome) -> i32 {
    if outcome.success {
        0
    } else if outcome.is_password_required() {
        EXIT_PASSWORD_REQUIRED
    } else {
        EXIT_NOT_TRUSTED
    }
}

/// Exit code for a finished scan.
fn scan_code(outcome: &ScanOutcome) -> i32 {
    if outcome.error.is_some() {
        1
    } else if outcome.valid_aliases.is_empty() {
        EXIT_NOT_TRUSTED
    } else {
        0
    }
}

fn print_outcome(outcome: &ValidationOutcome, json: bool, show_chain: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else if outcome.success {
        print!("{}", trustprobe_lib::display_outcome(outcome, show_chain));
    } else {
        eprint!("{}", trustprobe_lib::display_outcome(outcome, show_chain));
    }
    Ok(())
}

fn scan_target(
    host: Option<&String>,
    port: Option<u16>,
    file: Option<&PathBuf>,
    cert_password: Option<&String>,
) -> Result<ScanTarget> {
    match (host, port, file) {
        (Some(host), Some(port), None) => Ok(ScanTarget::Live {
            host: host.clone(),
            port,
        }),
        (None, None, Some(path)) => Ok(ScanTarget::File {
            path: path.clone(),
            password: cert_password.cloned(),
        }),
        _ => anyhow::bail!("Specify either --host and --port, or --file"),
    }
}

fn run_scan(
    validator: Validator,
    target: ScanTarget,
    store: AnchorStore,
    json: bool,
) -> Result<ScanOutcome> {
    let (progress, handle) = trustprobe_lib::spawn_scan(validator, target, Arc::new(store));
    for update in progress {
        if !json {
            eprintln!(
                "[{}/{}] {} ({} valid so far)",
                update.checked, update.total, update.current_alias, update.valid_so_far
            );
        }
    }
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("Alias scan worker terminated unexpectedly"))
}

fn check_cert_path(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Certificate file is not found: {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::List { store, json } => {
            let anchors = load_store(store)?;
            let records = trustprobe_lib::list(&anchors);
            if *json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print!("{}", trustprobe_lib::display_records(&records));
            }
        }
        Commands::Check {
            store,
            host,
            port,
            alias,
            validation,
            json,
            show_chain,
        } => {
            let anchors = load_store(store)?;
            let outcome = validation
                .validator()
                .validate_live(host, *port, &anchors, alias.as_deref());
            print_outcome(&outcome, *json, *show_chain)?;
            let code = outcome_code(&outcome);
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::CheckFile {
            store,
            cert,
            alias,
            cert_password,
            validation,
            json,
            show_chain,
        } => {
            let anchors = load_store(store)?;
            let outcome = validation.validator().validate_file(
                cert,
                &anchors,
                alias.as_deref(),
                cert_password.as_deref(),
            );
            print_outcome(&outcome, *json, *show_chain)?;
            let code = outcome_code(&outcome);
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Scan {
            store,
            host,
            port,
            file,
            cert_password,
            validation,
            json,
        } => {
            let target =
                scan_target(host.as_ref(), *port, file.as_ref(), cert_password.as_ref())?;
            if let ScanTarget::File { path, .. } = &target {
                check_cert_path(path)?;
            }
            let anchors = load_store(store)?;
            let outcome = run_scan(validation.validator(), target, anchors, *json)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", trustprobe_lib::display_scan(&outcome));
            }
            let code = scan_code(&outcome);
            if code != 0 {
                std::process::exit(code);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_check_with_alias_and_timeouts() {
        let cli = Cli::try_parse_from([
            "trustprobe",
            "check",
            "--store",
            "trust.jks",
            "example.com",
            "443",
            "--alias",
            "root",
            "--connect-timeout",
            "250",
            "--attime",
            "1700000000",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Check {
                store,
                host,
                port,
                alias,
                validation,
                ..
            } => {
                assert_eq!(store.store, PathBuf::from("trust.jks"));
                assert_eq!(store.password, "");
                assert_eq!(host, "example.com");
                assert_eq!(port, 443);
                assert_eq!(alias.as_deref(), Some("root"));
                let validator = validation.validator();
                let options = validator.options();
                assert_eq!(options.connect_timeout, Duration::from_millis(250));
                assert_eq!(options.handshake_timeout, Duration::from_millis(5000));
                assert_eq!(options.at_time, Some(1_700_000_000));
            }
            _ => unreachable!("parsed as another command"),
        }
    }

    #[test]
    fn port_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["trustprobe", "check", "--store", "t", "h", "70000"]).is_err());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        for flag in ["--connect-timeout", "--handshake-timeout"] {
            assert!(
                Cli::try_parse_from(["trustprobe", "check", "--store", "t", flag, "0", "h", "443"])
                    .is_err()
            );
            assert!(
                Cli::try_parse_from(["trustprobe", "check", "--store", "t", flag, "1", "h", "443"])
                    .is_ok()
            );
        }
    }

    #[test]
    fn scan_requires_exactly_one_target() {
        assert!(Cli::try_parse_from(["trustprobe", "scan", "--store", "t"]).is_err());
        assert!(
            Cli::try_parse_from(["trustprobe", "scan", "--store", "t", "--host", "h"]).is_err()
        );
        assert!(Cli::try_parse_from([
            "trustprobe", "scan", "--store", "t", "--host", "h", "--port", "1", "--file", "f"
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "trustprobe", "scan", "--store", "t", "--host", "h", "--port", "1", "--cert-password", "x"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["trustprobe", "scan", "--store", "t", "--file", "f"]).is_ok());
    }

    #[test]
    fn scan_targets() {
        let host = "h".to_string();
        let target = scan_target(Some(&host), Some(8443), None, None).unwrap();
        assert_eq!(
            target,
            ScanTarget::Live {
                host: "h".into(),
                port: 8443
            }
        );

        let file = PathBuf::from("server.p12");
        let pw = "pw".to_string();
        let target = scan_target(None, None, Some(&file), Some(&pw)).unwrap();
        assert_eq!(
            target,
            ScanTarget::File {
                path: file,
                password: Some("pw".into())
            }
        );
        assert!(scan_target(None, None, None, None).is_err());
    }

    #[test]
    fn outcome_exit_codes() {
        assert_eq!(outcome_code(&ValidationOutcome::success("ok", Vec::new())), 0);
        assert_eq!(
            outcome_code(&ValidationOutcome::failure("Certificate is not trusted (x)")),
            EXIT_NOT_TRUSTED
        );
        assert_eq!(
            outcome_code(&ValidationOutcome::failure(
                "PKCS12_PASSWORD_REQUIRED: PKCS12 container is detected. Enter password and retry."
            )),
            EXIT_PASSWORD_REQUIRED
        );
    }

    #[test]
    fn scan_exit_codes() {
        let mut outcome = ScanOutcome::default();
        assert_eq!(scan_code(&outcome), EXIT_NOT_TRUSTED);
        outcome.valid_aliases.push("a".into());
        assert_eq!(scan_code(&outcome), 0);
        outcome.error = Some("boom".into());
        assert_eq!(scan_code(&outcome), 1);
    }

    #[test]
    fn unreadable_store_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.jks");
        std::fs::write(&path, b"not a keystore").unwrap();
        let args = StoreArgs {
            store: path.clone(),
            password: "changeit".into(),
        };
        let err = load_store(&args).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Failed to load truststore: {}", path.display())
        );
        assert!(format!("{:#}", err).contains("Check password and store format (JKS/PKCS12)"));
    }

    #[test]
    fn missing_scan_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.pem");
        let err = check_cert_path(&path).unwrap_err();
        assert!(err.to_string().starts_with("Certificate file is not found: "));
    }
}
