// crates/adt-bridge-cli/src/main.rs
// ============================================================================
// Module: ADT Bridge CLI Entry Point
// Description: Command dispatcher for the debug daemon and tool listings.
// Purpose: Resolve connection settings and run the local daemon.
// Dependencies: clap, adt-bridge-client, adt-bridge-daemon, tokio
// ============================================================================

//! ## Overview
//! The CLI resolves the connection configuration from flags and
//! environment variables, then either runs the debug daemon or prints the
//! tool listing of the selected profile. Credentials never appear in
//! output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use adt_bridge_client::AdtClient;
use adt_bridge_core::Config;
use adt_bridge_core::SafetyMode;
use adt_bridge_core::SafetyPolicy;
use adt_bridge_core::config::DEBUG_LISTENER_TIMEOUT;
use adt_bridge_daemon::DaemonConfig;
use adt_bridge_daemon::DebugDaemon;
use adt_bridge_tools::ToolProfile;
use adt_bridge_tools::tool_definitions;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "adt-bridge", version, about = "Client and local daemon for the ABAP development tools REST surface")]
struct Cli {
    /// Base URL of the SAP system.
    #[arg(long, env = "ADT_BASE_URL", global = true, default_value = "")]
    base_url: String,
    /// Logon user.
    #[arg(long, env = "ADT_USER", global = true, default_value = "")]
    user: String,
    /// Logon password.
    #[arg(long, env = "ADT_PASSWORD", global = true, default_value = "", hide_env_values = true)]
    password: String,
    /// SAP client code.
    #[arg(long, env = "ADT_CLIENT", global = true, default_value = "")]
    sap_client: String,
    /// Logon language.
    #[arg(long, env = "ADT_LANGUAGE", global = true, default_value = "EN")]
    language: String,
    /// Accept invalid TLS certificates (test systems only).
    #[arg(long, env = "ADT_INSECURE", global = true)]
    insecure: bool,
    /// Session cookies as `name=value` pairs separated by `;`.
    #[arg(long, env = "ADT_COOKIES", global = true, default_value = "", hide_env_values = true)]
    cookies: String,
    /// Safety mode for the embedded policy.
    #[arg(long, env = "ADT_SAFETY_MODE", global = true, value_enum, default_value = "read-only")]
    safety_mode: SafetyModeArg,
    #[command(subcommand)]
    command: Command,
}

/// Safety mode flag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SafetyModeArg {
    /// Only read operations.
    ReadOnly,
    /// Development changes allowed, transport management blocked.
    DevOnly,
    /// Everything allowed.
    Full,
}

impl SafetyModeArg {
    const fn into_mode(self) -> SafetyMode {
        match self {
            Self::ReadOnly => SafetyMode::ReadOnly,
            Self::DevOnly => SafetyMode::DevOnly,
            Self::Full => SafetyMode::Full,
        }
    }
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the debug daemon on loopback.
    ServeDaemon {
        /// Bind host.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Bind port.
        #[arg(long, short = 'P', default_value_t = 9123)]
        port: u16,
        /// Debugged user (defaults to the logon user).
        #[arg(long, default_value = "")]
        debug_user: String,
    },
    /// Print the tool listing of a profile as JSON.
    ListTools {
        /// Operation-set profile.
        #[arg(long, value_enum, default_value = "focused")]
        profile: ProfileArg,
    },
}

/// Profile flag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProfileArg {
    /// The focused day-to-day surface.
    Focused,
    /// The focused surface plus per-kind reads and raw atomics.
    Expert,
}

impl ProfileArg {
    const fn into_profile(self) -> ToolProfile {
        match self {
            Self::Focused => ToolProfile::Focused,
            Self::Expert => ToolProfile::Expert,
        }
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            let _ = writeln!(std::io::stderr(), "adt-bridge: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match &cli.command {
        Command::ListTools {
            profile,
        } => {
            let listing = tool_definitions(profile.into_profile());
            let rendered = serde_json::to_string_pretty(&listing)
                .map_err(|err| format!("tool listing failed: {err}"))?;
            println!("{rendered}");
            Ok(())
        }
        Command::ServeDaemon {
            host,
            port,
            debug_user,
        } => {
            let host = host.clone();
            let port = *port;
            let debug_user = debug_user.clone();
            let config = resolve_config(&cli)?;
            serve_daemon(config, host, port, debug_user).await
        }
    }
}

// ============================================================================
// SECTION: Configuration Resolution
// ============================================================================

/// Builds the connection configuration from flags and environment.
fn resolve_config(cli: &Cli) -> Result<Config, String> {
    if cli.base_url.is_empty() {
        return Err("base url is required (--base-url or ADT_BASE_URL)".to_string());
    }
    if cli.user.is_empty() {
        return Err("user is required (--user or ADT_USER)".to_string());
    }
    if cli.password.is_empty() && cli.cookies.is_empty() {
        return Err(
            "credentials are required (--password, ADT_PASSWORD, or session cookies)".to_string(),
        );
    }
    let mut config = Config::new(&cli.base_url, &cli.user, &cli.password)
        .with_sap_client(&cli.sap_client)
        .with_language(&cli.language)
        .with_safety(SafetyPolicy::new(cli.safety_mode.into_mode()));
    if cli.insecure {
        config = config.with_accept_invalid_certs();
    }
    if !cli.cookies.is_empty() {
        config = config.with_cookies(parse_cookie_pairs(&cli.cookies));
    }
    config.validate()?;
    Ok(config)
}

/// Parses `name=value; name2=value2` cookie strings.
fn parse_cookie_pairs(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

// ============================================================================
// SECTION: Daemon Command
// ============================================================================

/// Runs the debug daemon until interrupted.
async fn serve_daemon(
    config: Config,
    host: String,
    port: u16,
    debug_user: String,
) -> Result<(), String> {
    // Debug sessions long-poll; the client needs the dedicated timeout.
    let config = config.with_timeout(DEBUG_LISTENER_TIMEOUT + Duration::from_secs(30));
    let base_url = config.base_url.clone();
    let client = AdtClient::new(config).map_err(|err| err.to_string())?;
    let daemon_config = DaemonConfig {
        host: host.clone(),
        port,
        default_user: debug_user,
        default_timeout_seconds: 60,
    };
    let daemon = DebugDaemon::new(Arc::new(client), daemon_config);

    let mut banner = std::io::stderr();
    let _ = writeln!(banner, "[daemon] debug daemon on http://{host}:{port}");
    let _ = writeln!(banner, "[daemon] upstream system: {base_url}");
    let _ = writeln!(banner, "[daemon] endpoints:");
    let _ = writeln!(banner, "  POST   /session     start debug listener");
    let _ = writeln!(banner, "  GET    /session     session snapshot");
    let _ = writeln!(banner, "  DELETE /session     detach and stop");
    let _ = writeln!(banner, "  POST   /breakpoint  create breakpoint");
    let _ = writeln!(banner, "  GET    /breakpoints list breakpoints");
    let _ = writeln!(banner, "  DELETE /breakpoint  delete breakpoint by id");
    let _ = writeln!(banner, "  POST   /step        step execution");
    let _ = writeln!(banner, "  GET    /stack       call stack");
    let _ = writeln!(banner, "  GET    /variables   variable inspection");
    let _ = writeln!(banner, "  GET    /health      liveness");

    tokio::select! {
        result = daemon.serve() => result.map_err(|err| err.to_string()),
        _ = tokio::signal::ctrl_c() => {
            let _ = writeln!(std::io::stderr(), "[daemon] shutting down");
            Ok(())
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use super::*;

    /// Tests cookie pair parsing.
    #[test]
    fn cookie_pairs_parse() {
        let cookies = parse_cookie_pairs("SAP_SESSIONID_X=abc; sap-usercontext=client=100;");
        assert_eq!(cookies.get("SAP_SESSIONID_X").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("sap-usercontext").map(String::as_str), Some("client=100"));
        assert_eq!(cookies.len(), 2);
    }

    /// Tests config resolution failure without credentials.
    #[test]
    fn missing_credentials_are_rejected() {
        let cli = Cli::parse_from([
            "adt-bridge",
            "--base-url",
            "https://sap.example.com",
            "--user",
            "developer",
            "serve-daemon",
        ]);
        let err = resolve_config(&cli).unwrap_err();
        assert!(err.contains("credentials"));
    }

    /// Tests config resolution with cookies instead of a password.
    #[test]
    fn cookies_substitute_for_a_password() {
        let cli = Cli::parse_from([
            "adt-bridge",
            "--base-url",
            "https://sap.example.com",
            "--user",
            "developer",
            "--cookies",
            "SAP_SESSIONID_X=abc",
            "serve-daemon",
        ]);
        let config = resolve_config(&cli).expect("config");
        assert!(config.cookies.contains_key("SAP_SESSIONID_X"));
    }
}
