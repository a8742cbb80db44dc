// # cfspflat - SPF Flattener
//
// Thin command-line layer over spflat-core. It is responsible for:
// 1. Parsing arguments and loading the JSON configuration
// 2. Resolving Cloudflare credentials
// 3. Wiring the crawler, provider and notifier into the driver
// 4. Persisting the resulting state
//
// All reconciliation logic lives in spflat-core.
//
// ## Configuration
//
// `spfs.json` (or `--config <path>`):
//
// ```json
// {
//     "sending domains": {
//         "example.com": ["include:_spf.google.com", "ip4:192.0.2.0/24"]
//     },
//     "resolvers": ["1.1.1.1"],
//     "output": "spf_sums.json",
//     "email": {
//         "to": "dns-admins@example.com",
//         "from": "spf-monitor@example.com",
//         "server": "smtp.example.com"
//     }
// }
// ```
//
// Credentials come from `.cloudflare.cf` (working directory, then home
// directory, or `--credentials <path>`) or from `CLOUDFLARE_API_TOKEN`,
// `CLOUDFLARE_EMAIL` and `CLOUDFLARE_API_KEY`. They are only required with
// `--update-records` or `--force-update`.
//
// ## Example
//
// ```bash
// cfspflat --config spfs.json --update-records
// ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use spflat_core::config::DEFAULT_CONFIG_PATH;
use spflat_core::traits::{Crawler, DnsProvider, Notifier};
use spflat_core::{
    CredentialSources, Credentials, EnvSnapshot, ReconciliationDriver, RunPolicy, Settings,
    StateFile,
};
use spflat_crawler::DnsCrawler;
use spflat_notify_smtp::SmtpNotifier;
use spflat_provider_cloudflare::CloudflareProvider;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpflatExitCode {
    /// Run completed and state was saved
    Success = 0,
    /// Invalid arguments, configuration or credentials
    ConfigError = 1,
    /// Failure after configuration was accepted
    RuntimeError = 2,
}

impl From<SpflatExitCode> for ExitCode {
    fn from(code: SpflatExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Flatten SPF records and keep them published in Cloudflare DNS
#[derive(Parser, Debug)]
#[command(name = "cfspflat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// State file (overrides "output" from the configuration)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Publish the flattened records when they have changed
    #[arg(long)]
    update_records: bool,

    /// Publish the flattened records even when nothing changed
    #[arg(long)]
    force_update: bool,

    /// Do not send change notifications
    #[arg(long)]
    no_email: bool,

    /// Cloudflare credentials file
    #[arg(long, value_name = "FILE")]
    credentials: Option<PathBuf>,

    /// Log level
    #[arg(
        long,
        env = "SPFLAT_LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    log_level: String,
}

impl Cli {
    fn policy(&self) -> RunPolicy {
        RunPolicy {
            update: self.update_records,
            force_update: self.force_update,
            send_email: !self.no_email,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Print a configuration error followed by usage
fn usage_error(message: impl std::fmt::Display) -> ExitCode {
    eprintln!("{}", message);
    eprintln!();
    eprintln!("{}", Cli::command().render_usage());
    SpflatExitCode::ConfigError.into()
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too
            let _ = e.print();
            return if e.use_stderr() {
                SpflatExitCode::ConfigError.into()
            } else {
                SpflatExitCode::Success.into()
            };
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&cli.log_level))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SpflatExitCode::ConfigError.into();
    }

    let policy = cli.policy();

    let settings = match Settings::load(&cli.config).and_then(|s| {
        s.validate(policy.send_email)?;
        Ok(s)
    }) {
        Ok(settings) => settings,
        Err(e) => return usage_error(e),
    };

    let credentials = match credentials_for_run(&cli) {
        Ok(credentials) => credentials,
        Err(e) => return usage_error(e),
    };

    let notifier: Option<Box<dyn Notifier>> = match settings.email.as_ref() {
        Some(email) if policy.send_email => match SmtpNotifier::new(email) {
            Ok(notifier) => Some(Box::new(notifier)),
            Err(e) => return usage_error(e),
        },
        _ => None,
    };

    info!(
        "Loaded {} sending domain(s) from {}",
        settings.sending_domains.len(),
        cli.config.display()
    );

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SpflatExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run(&cli, &settings, credentials, notifier).await {
            error!("{:#}", e);
            SpflatExitCode::RuntimeError
        } else {
            SpflatExitCode::Success
        }
    });

    result.into()
}

/// Credentials when this run may write DNS records, `None` otherwise
fn credentials_for_run(cli: &Cli) -> spflat_core::Result<Option<Credentials>> {
    if !cli.policy().writes_enabled() {
        return Ok(None);
    }
    resolve_credentials(cli).map(Some)
}

fn resolve_credentials(cli: &Cli) -> spflat_core::Result<Credentials> {
    let file = match &cli.credentials {
        Some(path) if !path.exists() => {
            return Err(spflat_core::Error::config(format!(
                "Credentials file not found: {}",
                path.display()
            )));
        }
        Some(path) => Some(path.clone()),
        None => std::env::current_dir()
            .ok()
            .and_then(|cwd| CredentialSources::default_file(&cwd)),
    };

    Credentials::resolve(&CredentialSources::new(file, EnvSnapshot::capture()))
}

/// One reconciliation pass followed by saving the state
async fn run(
    cli: &Cli,
    settings: &Settings,
    credentials: Option<Credentials>,
    notifier: Option<Box<dyn Notifier>>,
) -> Result<()> {
    let provider = match credentials {
        Some(credentials) => {
            let provider = CloudflareProvider::new(credentials)
                .context("Failed to create Cloudflare provider")?;
            Some(Arc::new(provider) as Arc<dyn DnsProvider>)
        }
        None => {
            info!("Detection only, DNS records will not be changed");
            None
        }
    };

    let nameservers = settings.resolver_addrs()?;
    let crawler: Box<dyn Crawler> = if nameservers.is_empty() {
        Box::new(DnsCrawler::system().context("Failed to create DNS resolver")?)
    } else {
        info!("Using nameservers {:?}", nameservers);
        Box::new(DnsCrawler::with_nameservers(&nameservers))
    };

    let mut driver = ReconciliationDriver::new(crawler, provider, notifier, cli.policy());
    if let Some(email) = &settings.email {
        driver = driver.with_subjects(email);
    }

    let store = StateFile::new(settings.output_path(cli.output.as_deref()));
    let previous = store.load().await;

    let report = driver.run(&settings.sending_domains, previous).await;

    store
        .save(&report.state)
        .await
        .with_context(|| format!("Failed to save state to {}", store.path().display()))?;

    let changed = report.changed_domains();
    if changed.is_empty() {
        info!("No SPF changes across {} domain(s)", report.outcomes.len());
    } else {
        info!("SPF changes for: {}", changed.join(", "));
    }
    if report.has_failures() {
        warn!("Some sending domains could not be fully reconciled, see errors above");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["cfspflat"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("spfs.json"));
        assert!(cli.output.is_none());
        assert!(cli.credentials.is_none());

        let policy = cli.policy();
        assert!(!policy.update);
        assert!(!policy.force_update);
        assert!(policy.send_email);
    }

    #[test]
    fn test_flags_map_to_policy() {
        let cli = Cli::try_parse_from([
            "cfspflat",
            "-c",
            "/etc/spflat/spfs.json",
            "-o",
            "/var/lib/spflat/sums.json",
            "--update-records",
            "--force-update",
            "--no-email",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/spflat/spfs.json"));
        assert_eq!(cli.output, Some(PathBuf::from("/var/lib/spflat/sums.json")));
        let policy = cli.policy();
        assert!(policy.update);
        assert!(policy.force_update);
        assert!(!policy.send_email);
    }

    #[test]
    fn test_detection_only_run_skips_credentials() {
        let cli = Cli::try_parse_from([
            "cfspflat",
            "--no-email",
            "--credentials",
            "/nonexistent/.cloudflare.cf",
        ])
        .unwrap();
        assert!(!cli.policy().writes_enabled());
        assert!(credentials_for_run(&cli).unwrap().is_none());
    }

    #[test]
    fn test_writing_run_requires_credentials() {
        for flag in ["--update-records", "--force-update"] {
            let cli = Cli::try_parse_from([
                "cfspflat",
                flag,
                "--credentials",
                "/nonexistent/.cloudflare.cf",
            ])
            .unwrap();
            let err = credentials_for_run(&cli).unwrap_err();
            assert!(matches!(err, spflat_core::Error::Config(_)), "{}", flag);
        }
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let err = Cli::try_parse_from(["cfspflat", "--log-level", "verbose"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("info"), Level::INFO);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
    }
}
