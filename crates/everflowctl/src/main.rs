//! everflowctl: Everflow verification helpers from the command line.
//!
//! Parses `show mirror_session` output, resolves monitor ports, classifies
//! testbeds and prints the expected ERSPAN packet for a payload.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use sonic_everflow_common::config::DEFAULT_CONFIG_PATH;
use sonic_everflow_common::show::ERSPAN_SESSIONS_GROUP;
use sonic_everflow_common::{get_monitor_port, parse_sessions, resolve_monitor_port, EverflowConfig, LocalShell};
use sonic_everflow_packet::{build_expected, summarize};
use sonic_everflow_test::{classify, FirstPicker, NamespacePicker, RandomPicker, TopologyFacts};
use sonic_everflow_types::{AsicFamily, MacAddress, MirrorSessionDescriptor, PlatformQuirks};

/// SONiC Everflow verification helpers
#[derive(Parser, Debug)]
#[command(name = "everflowctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse `show mirror_session` output into JSON groups
    ParseSessions {
        /// Read the output from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output of a 201911 image, which prints no ERSPAN group title
        #[arg(long = "legacy-201911")]
        legacy_201911: bool,
    },

    /// Print the PTF id of a session's monitor port
    MonitorPort {
        #[arg(short, long)]
        session: String,

        /// Topology facts file (YAML)
        #[arg(long)]
        facts: PathBuf,

        /// Saved `show mirror_session` output
        #[arg(short, long, conflicts_with = "local", required_unless_present = "local")]
        file: Option<PathBuf>,

        /// Run `show mirror_session` on this machine
        #[arg(long)]
        local: bool,
    },

    /// Classify a testbed into traffic directions
    Classify {
        /// Topology facts file (YAML)
        #[arg(long)]
        facts: PathBuf,

        /// Always pick the first candidate namespace
        #[arg(long)]
        deterministic: bool,
    },

    /// Print the expected mirrored packet for a payload
    Expected {
        /// ASIC family, e.g. `broadcom` or `mellanox`
        #[arg(long)]
        asic: String,

        #[arg(long)]
        router_mac: MacAddress,

        /// Mirrored frame as hex
        #[arg(long)]
        payload_hex: String,

        /// Leave the outer TTL out of the comparison
        #[arg(long)]
        no_ttl_check: bool,

        #[arg(long, default_value = "test_session_1")]
        session_name: String,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input).context("reading stdin")?;
            Ok(input)
        }
    }
}

fn parse_sessions_json(output: &str, legacy_201911: bool) -> Result<serde_json::Value> {
    let mut lines: Vec<&str> = output.lines().collect();
    if legacy_201911 {
        lines.insert(0, ERSPAN_SESSIONS_GROUP);
    }
    let groups = parse_sessions(&lines);
    debug!(groups = groups.len(), "Parsed session tables");
    Ok(serde_json::to_value(groups)?)
}

async fn monitor_port(session: &str, facts: &Path, file: Option<&Path>, local: bool) -> Result<u32> {
    let topology = TopologyFacts::from_file(facts).with_context(|| format!("loading {}", facts.display()))?;
    let port_index_map = topology.port_index_map();

    let port = match file {
        Some(path) if !local => {
            let output = read_input(Some(path))?;
            let lines: Vec<&str> = output.lines().collect();
            resolve_monitor_port(&parse_sessions(&lines), session, &port_index_map)?
        }
        _ => get_monitor_port(&LocalShell::new(), session, &port_index_map).await?,
    };
    Ok(port)
}

fn classify_json(facts: &Path, deterministic: bool) -> Result<serde_json::Value> {
    let topology = TopologyFacts::from_file(facts).with_context(|| format!("loading {}", facts.display()))?;
    let mut picker: Box<dyn NamespacePicker> = if deterministic {
        Box::new(FirstPicker)
    } else {
        Box::new(RandomPicker)
    };
    let classification = classify(&topology, picker.as_mut())?;
    info!(kind = classification.kind.as_str(), "Classified testbed");
    Ok(serde_json::to_value(classification)?)
}

fn expected_json(
    config: &EverflowConfig,
    asic: &str,
    router_mac: MacAddress,
    payload_hex: &str,
    check_ttl: bool,
    session_name: &str,
) -> Result<serde_json::Value> {
    let payload = hex::decode(payload_hex.trim()).context("payload is not valid hex")?;
    if payload.is_empty() {
        bail!("payload is empty");
    }

    let asic = AsicFamily::from(asic);
    let session = MirrorSessionDescriptor::for_platform(session_name, &asic, &config.session_defaults())?;
    let platform = PlatformQuirks::lookup(asic, 1);
    let mask = build_expected(&session, &platform, router_mac, &payload, check_ttl)?;

    Ok(serde_json::json!({
        "session": session,
        "template": hex::encode(mask.template()),
        "summary": summarize(mask.template()),
        "entries": mask.entries(),
    }))
}

async fn run(args: Args) -> Result<()> {
    let config = EverflowConfig::load_or_default(&args.config)?;
    config.validate()?;

    match args.command {
        Command::ParseSessions { file, legacy_201911 } => {
            let output = read_input(file.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&parse_sessions_json(&output, legacy_201911)?)?);
        }
        Command::MonitorPort {
            session,
            facts,
            file,
            local,
        } => {
            println!("{}", monitor_port(&session, &facts, file.as_deref(), local).await?);
        }
        Command::Classify { facts, deterministic } => {
            println!("{}", serde_json::to_string_pretty(&classify_json(&facts, deterministic)?)?);
        }
        Command::Expected {
            asic,
            router_mac,
            payload_hex,
            no_ttl_check,
            session_name,
        } => {
            let expected = expected_json(&config, &asic, router_mac, &payload_hex, !no_ttl_check, &session_name)?;
            println!("{}", serde_json::to_string_pretty(&expected)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("everflowctl failed: {:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SHOW_OUTPUT: &str = "\
Name            Status    Monitor Port
--------------  --------  --------------
test_session_1  active    Ethernet4
";

    const TOPOLOGY: &str = "\
topo_name: t0
minigraph_neighbors:
  Ethernet0: {name: Servers0}
  Ethernet4: {name: Servers1}
  Ethernet8: {name: ARISTA01T1}
  Ethernet12: {name: ARISTA02T1}
minigraph_ptf_indices: {Ethernet0: 0, Ethernet4: 1, Ethernet8: 2, Ethernet12: 3}
minigraph_ports: {Ethernet0: {}, Ethernet4: {}, Ethernet8: {}, Ethernet12: {}}
";

    fn temp_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "everflowctl",
            "monitor-port",
            "--session",
            "s1",
            "--facts",
            "facts.yml",
            "--local",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::MonitorPort { local: true, file: None, .. }));
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));

        // Either a saved output or --local is required.
        assert!(Args::try_parse_from(["everflowctl", "monitor-port", "--session", "s1", "--facts", "f"]).is_err());
        assert!(Args::try_parse_from(["everflowctl", "expected", "--asic", "broadcom", "--router-mac", "bad", "--payload-hex", "00"]).is_err());
    }

    #[test]
    fn test_parse_sessions_legacy() {
        let groups = parse_sessions_json(SHOW_OUTPUT, true).unwrap();
        assert_eq!(groups[ERSPAN_SESSIONS_GROUP]["records"].as_array().unwrap().len(), 1);

        // Without the title line the header is taken as the title.
        let groups = parse_sessions_json(SHOW_OUTPUT, false).unwrap();
        assert!(groups.get(ERSPAN_SESSIONS_GROUP).is_none());
    }

    #[tokio::test]
    async fn test_monitor_port_from_file() {
        let facts = temp_file(TOPOLOGY);
        let output = temp_file(&format!("{}\n{}", ERSPAN_SESSIONS_GROUP, SHOW_OUTPUT));

        let port = monitor_port("test_session_1", facts.path(), Some(output.path()), false)
            .await
            .unwrap();
        assert_eq!(port, 1);
    }

    #[test]
    fn test_classify_deterministic() {
        let facts = temp_file(TOPOLOGY);
        let classification = classify_json(facts.path(), true).unwrap();
        assert_eq!(classification["server_dest_ptf_ids"], serde_json::json!(["0", "1"]));
    }

    #[test]
    fn test_expected() {
        let config = EverflowConfig::default();
        let mac: MacAddress = "52:54:00:00:00:01".parse().unwrap();
        let payload = "00".repeat(64);

        let expected = expected_json(&config, "mellanox", mac, &payload, false, "s1").unwrap();
        let template = hex::decode(expected["template"].as_str().unwrap()).unwrap();
        // Outer headers, platform padding and the payload.
        assert_eq!(template.len(), 38 + 11 + 64);
        assert!(expected["entries"].as_array().unwrap().len() > 1);

        assert!(expected_json(&config, "broadcom", mac, "zz", true, "s1").is_err());
        assert!(expected_json(&config, "broadcom", mac, "", true, "s1").is_err());
    }
}
