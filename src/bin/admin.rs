use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use verifier_portal::conflict::detect_conflicts;
use verifier_portal::domain::{
    extract_ipfs_hash, CompilerKind, CompilerSettings, ContractProof, ContractProofMap,
    SourceFile, VerifierId,
};
use verifier_portal::infra::{
    fetch_remote_config, HttpContentFetcher, HttpVerifierBackend, IpfsGateway,
};
use verifier_portal::latest::LatestFeed;
use verifier_portal::metrics::{metric_names, timed_ms, MetricsRegistry};
use verifier_portal::proof_loader::fetch_sources_data;
use verifier_portal::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use verifier_portal::{Network, PortalConfig};

fn print_help() {
    eprintln!(
        "\
portal-admin

USAGE:
  portal-admin <command> [options]

COMMANDS:
  backends                        List verifier backend pools
  latest                          Show the latest verified contracts
  compilers                       Show compiler versions accepted by the backends
  fetch-sources <link>            Download and list a published source bundle
  conflicts <file.json>           Check a verifier → sources link map for conflicts

COMMON OPTIONS:
  --network <mainnet|testnet>     (defaults to env PORTAL_NETWORK, then mainnet)
  --metrics                       Print the run's metrics as JSON to stderr

latest OPTIONS:
  --json                          Print raw JSON entries

compilers OPTIONS:
  --url <url>                     (defaults to env REMOTE_CONFIG_URL)

conflicts INPUT:
  {{ \"<verifier name>\": \"<sources link>\" | null, ... }}

ENV:
  SOURCES_REGISTRY / VERIFIER_BACKENDS / IPFS_MIRRORS / HTTP_TIMEOUT_SECS / LOG_LEVEL
"
    );
}

fn take_value(args: &mut VecDeque<String>, flag: &str) -> anyhow::Result<String> {
    args.pop_front()
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

/// Environment config, replaced by the network defaults when `--network` is given.
fn load_config(network: Option<Network>) -> anyhow::Result<PortalConfig> {
    Ok(match network {
        Some(network) => PortalConfig::for_network(network),
        None => PortalConfig::from_env()?,
    })
}

fn describe_settings(settings: &CompilerSettings) -> String {
    match settings.command_line() {
        Some(cmd) => format!("{} {} ({cmd})", settings.kind(), settings.display_version()),
        None => format!("{} {}", settings.kind(), settings.display_version()),
    }
}

fn print_file(file: &SourceFile) {
    let marker = if file.is_entrypoint() { "*" } else { " " };
    match file {
        SourceFile::Resolved { name, content, .. } => {
            println!("  {marker} {name} ({} bytes)", content.len());
        }
        SourceFile::Missing { name, error, .. } => {
            println!("  {marker} {name} MISSING: {error}");
        }
    }
}

/// Offline proof map built from `name → link`.
fn proofs_from_links(links: BTreeMap<String, Option<String>>) -> ContractProofMap {
    links
        .into_iter()
        .map(|(name, link)| {
            let id = VerifierId::from_name(&name);
            let proof = match link {
                Some(link) => ContractProof {
                    verifier_id: id.clone(),
                    has_onchain_proof: true,
                    ipfs_link: Some(link.clone()),
                    content_fingerprint: Some(extract_ipfs_hash(&link)),
                    ..Default::default()
                },
                None => ContractProof::absent(id.clone()),
            };
            (id, proof)
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(command) = args.pop_front() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print_help();
        return Ok(());
    }

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    init_telemetry(&TelemetryConfig::cli(&log_level))
        .map_err(|e| anyhow::anyhow!("telemetry: {e}"))?;

    let result = run(command, args).await;
    shutdown_telemetry();
    result
}

async fn run(command: String, mut args: VecDeque<String>) -> anyhow::Result<()> {
    let mut network: Option<Network> = None;
    let mut json = false;
    let mut print_metrics = false;
    let mut url: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    while let Some(arg) = args.pop_front() {
        match arg.as_str() {
            "--network" => network = Some(take_value(&mut args, "--network")?.parse()?),
            "--url" => url = Some(take_value(&mut args, "--url")?),
            "--json" => json = true,
            "--metrics" => print_metrics = true,
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            other if other.starts_with("--") => anyhow::bail!("unexpected argument: {other}"),
            _ => positional.push(arg),
        }
    }

    let config = load_config(network)?;
    let metrics = Arc::new(MetricsRegistry::new());

    let result = execute(&command, &config, json, url, &positional, &metrics).await;
    if print_metrics {
        eprintln!("{}", serde_json::to_string_pretty(&metrics.snapshot().await)?);
    }
    result
}

async fn execute(
    command: &str,
    config: &PortalConfig,
    json: bool,
    url: Option<String>,
    positional: &[String],
    metrics: &Arc<MetricsRegistry>,
) -> anyhow::Result<()> {
    match command {
        "backends" => {
            println!("network: {}", config.network);
            println!("sources registry: {}", config.sources_registry);
            for (verifier, urls) in &config.backends {
                println!("{verifier}");
                for url in urls {
                    println!("  {url}");
                }
            }
            Ok(())
        }
        "latest" => {
            let backend = HttpVerifierBackend::new(config.http_timeout)?;
            let feed = LatestFeed::new(Arc::new(backend), Arc::new(config.backends.clone()))
                .with_metrics(metrics.clone());
            let entries = feed.load_latest_verified().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!("{}  {:<5}  {}", entry.address, entry.compiler, entry.main_file);
                }
                println!("ok: {} contracts", entries.len());
            }
            Ok(())
        }
        "compilers" => {
            let url = url.unwrap_or_else(|| config.remote_config_url.clone());
            let client = reqwest::Client::builder()
                .timeout(config.http_timeout)
                .build()?;
            let remote = fetch_remote_config(&client, &url).await?;

            for kind in [CompilerKind::Func, CompilerKind::Tact, CompilerKind::Tolk] {
                println!("{kind}: {}", remote.versions_for(kind).join(", "));
            }
            Ok(())
        }
        "fetch-sources" => {
            let [link] = positional else {
                anyhow::bail!("fetch-sources expects exactly one link");
            };
            let fetcher = HttpContentFetcher::new(config.http_timeout)?;
            let gateway = IpfsGateway::new(
                Arc::new(fetcher),
                config.ipfs_mirrors.clone(),
                config.ipfs_retry.clone(),
            );
            let data = timed_ms(
                metrics,
                metric_names::SOURCES_FETCH_MS,
                fetch_sources_data(&gateway, link),
            )
            .await?;

            println!("served from: {}", data.ipfs_http_link);
            println!("verified at: {}", data.verification_date.to_rfc3339());
            match &data.compiler_settings {
                Some(settings) => println!("compiler: {}", describe_settings(settings)),
                None => println!("compiler: {}", data.compiler),
            }
            println!("files:");
            data.files.iter().for_each(print_file);

            let missing = data.files.iter().filter(|f| f.is_missing()).count();
            if missing > 0 {
                anyhow::bail!("{missing} source files could not be downloaded");
            }
            Ok(())
        }
        "conflicts" => {
            let [path] = positional else {
                anyhow::bail!("conflicts expects exactly one input file");
            };
            let raw = std::fs::read_to_string(path)?;
            let links: BTreeMap<String, Option<String>> = serde_json::from_str(&raw)?;
            let names: BTreeMap<VerifierId, String> = links
                .keys()
                .map(|name| (VerifierId::from_name(name), name.clone()))
                .collect();

            let report = detect_conflicts(&proofs_from_links(links));
            for row in &report.rows {
                let name = names.get(&row.verifier_id).map(String::as_str).unwrap_or("?");
                let state = match (&row.fingerprint, row.is_conflicting) {
                    (None, _) => "no proof".to_string(),
                    (Some(fp), true) => format!("{fp} CONFLICT"),
                    (Some(fp), false) => fp.clone(),
                };
                println!("{name}: {state}");
            }

            if report.has_conflicts {
                anyhow::bail!("verifiers disagree on the published sources");
            }
            println!("ok: no conflicts");
            Ok(())
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}")
        }
    }
}
