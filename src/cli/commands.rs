// Sessiongate: CLI Command Handlers
//
// Each function handles one CLI subcommand. `capture` and `unlock` drive a
// real session: an in-process cookie jar stands in for the live session and
// the verifier program runs the biometric challenge.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{CapturePolicy, Config};
use crate::cookie::{self, CookieSet};
use crate::enclave::{DeviceKeyProvider, KeyringProvider};
use crate::error::{Result, SessionGateError};
use crate::gate::CommandChallenge;
use crate::registration::{spawn_registration, HttpRegistration};
use crate::session::{
    CookieJarHost, LiveSessionHost, SessionDriver, SessionError, SessionHandle, SessionLifecycle,
    SessionStatus,
};
use crate::store::{
    CredentialRecord, CredentialStore, SqliteCredentialStore, Wiped, COOKIE_BLOB_KEY,
};

use super::{Cli, Commands, VerifierArgs};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.config();
    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::Status { json } => cmd_status(&config, json),
        Commands::Capture {
            cookie_header,
            verifier,
        } => cmd_capture(&config, &cookie_header, verifier).await,
        Commands::Unlock { verifier } => cmd_unlock(&config, verifier).await,
        Commands::Forget { device_key } => cmd_forget(&config, device_key),
        Commands::Register {
            token,
            identities,
            endpoint,
        } => cmd_register(&config, token, identities, endpoint).await,
    }
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init(config: &Config) -> Result<()> {
    let provider = KeyringProvider::new();
    let (store, reset) = SqliteCredentialStore::create_or_reset(&config.db_path(), &provider)?;

    println!("✓ Sessiongate initialized");
    println!("  Record: {}", store.path().display());
    if reset {
        println!("  A record left without its device key was discarded");
    }
    println!("  Device key stored in platform keyring");
    println!();
    println!("Next: capture a login with `sessiongate capture --site-url <url> --cookie-header <cookies>`");

    Ok(())
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StatusReport {
    initialized: bool,
    armed: bool,
    cookies: usize,
    skipped: usize,
    captured_at: Option<DateTime<Utc>>,
    record: String,
    capture_policy: CapturePolicy,
}

fn cmd_status(config: &Config, json: bool) -> Result<()> {
    let mut report = StatusReport {
        initialized: false,
        armed: false,
        cookies: 0,
        skipped: 0,
        captured_at: None,
        record: config.db_path().display().to_string(),
        capture_policy: config.capture_policy,
    };

    if config.db_path().exists() {
        let store = open_store(config)?;
        let record = CredentialRecord::load(&store)?;
        report.initialized = true;
        report.armed = record.gate_armed;
        if let Some(blob) = record.armed_blob()? {
            // counted only; values never leave the record here
            let decoded = cookie::decode_report(blob);
            report.cookies = decoded.cookies.len();
            report.skipped = decoded.skipped.len();
        }
        report.captured_at = store.modified_at(COOKIE_BLOB_KEY)?;
    }

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| SessionGateError::Other(format!("cannot render status: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    if !report.initialized {
        println!("Not initialized. Run `sessiongate init` first.");
        return Ok(());
    }

    println!("Record:   {}", report.record);
    println!("Gate:     {}", if report.armed { "armed" } else { "not armed" });
    println!("Cookies:  {}", report.cookies);
    if report.skipped > 0 {
        println!("Skipped:  {} malformed entries", report.skipped);
    }
    if let Some(at) = report.captured_at {
        println!("Captured: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}

// ─── Capture ─────────────────────────────────────────────────────────────────

async fn cmd_capture(config: &Config, cookie_header: &str, verifier: VerifierArgs) -> Result<()> {
    let domain = config.cookie_domain()?;
    let cookies = CookieSet::from_header(cookie_header, &domain);
    if cookies.is_empty() {
        return Err(SessionGateError::Other(
            "no cookies found in --cookie-header".to_string(),
        ));
    }

    let host = Arc::new(CookieJarHost::new());
    let handle = start_session(config, &domain, host.clone(), verifier)?;

    if !capture_login(&handle, host.as_ref(), cookies).await? {
        return Err(SessionGateError::Other(format!(
            "no cookies matched {}",
            domain
        )));
    }

    println!("✓ Login captured for {}", domain);
    println!("  The gate is armed; `sessiongate unlock` releases the session.");
    Ok(())
}

// ─── Unlock ──────────────────────────────────────────────────────────────────

async fn cmd_unlock(config: &Config, verifier: VerifierArgs) -> Result<()> {
    let domain = config.cookie_domain()?;
    tracing::info!(site = %config.base_url()?, "Unlocking stored session");
    let host = Arc::new(CookieJarHost::new());
    let handle = start_session(config, &domain, host.clone(), verifier)?;

    match run_startup(&handle).await? {
        SessionStatus::Active { restored: true } => {
            // stdout carries only the header, for the consuming client
            println!("{}", host.snapshot().to_header());
            Ok(())
        }
        SessionStatus::Active { restored: false } => Err(SessionGateError::Other(format!(
            "no stored session for {}; capture a login first",
            domain
        ))),
        other => Err(unexpected(other)),
    }
}

// ─── Forget ──────────────────────────────────────────────────────────────────

fn cmd_forget(config: &Config, device_key: bool) -> Result<()> {
    let provider = KeyringProvider::new();
    let path = config.db_path();

    if device_key {
        // without the key the record is unreadable anyway
        SqliteCredentialStore::discard(&path)?;
        provider.delete_master_secret()?;
        println!("✓ Stored session and device key removed");
        return Ok(());
    }

    match SqliteCredentialStore::wipe(&path, &provider)? {
        Wiped::NothingStored => println!("Nothing stored; the gate is not armed"),
        Wiped::Cleared => println!("✓ Stored session wiped; the gate is disarmed"),
        Wiped::Discarded => {
            println!("✓ Unreadable stored session removed; the gate is disarmed")
        }
    }
    Ok(())
}

// ─── Register ────────────────────────────────────────────────────────────────

async fn cmd_register(
    config: &Config,
    token: String,
    identities: Vec<String>,
    endpoint: Option<url::Url>,
) -> Result<()> {
    let endpoint = match endpoint {
        Some(url) => url,
        None => config.token_endpoint()?.clone(),
    };
    let service = Arc::new(HttpRegistration::new(endpoint)?);
    println!("Registering push token with {}", service.endpoint());

    spawn_registration(service, token, identities)
        .await
        .map_err(|e| SessionGateError::Other(format!("registration task failed: {}", e)))?;
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Open the encrypted record with the device key from the platform keyring.
fn open_store(config: &Config) -> Result<SqliteCredentialStore> {
    let provider = KeyringProvider::new();
    let path = config.db_path();

    if !path.exists() || !provider.has_master_secret()? {
        return Err(SessionGateError::Other(
            "Sessiongate is not initialized. Run `sessiongate init` first.".to_string(),
        ));
    }

    Ok(SqliteCredentialStore::open(&path, &provider)?)
}

fn start_session(
    config: &Config,
    domain: &str,
    host: Arc<CookieJarHost>,
    verifier: VerifierArgs,
) -> Result<SessionHandle> {
    let store = Arc::new(open_store(config)?);
    let lifecycle = SessionLifecycle::new(store, host, domain, config.capture_policy);
    let challenger =
        Arc::new(CommandChallenge::new(verifier.verifier).with_args(verifier.verifier_args));

    let (handle, _task) = SessionDriver::spawn(lifecycle, challenger);
    Ok(handle)
}

/// Start the session, then replace whatever the live session holds with a
/// fresh login and capture it. Returns whether anything was captured.
async fn capture_login(
    handle: &SessionHandle,
    host: &dyn LiveSessionHost,
    cookies: CookieSet,
) -> Result<bool> {
    // an armed record must be unlocked before it can be replaced
    match run_startup(handle).await? {
        SessionStatus::Active { .. } => {}
        other => return Err(unexpected(other)),
    }

    // cookies restored from the previous login must not end up in the new record
    host.clear_live_session();
    host.inject_cookies(cookies);
    Ok(handle.login_completed().await?)
}

/// Activate the session and wait for the challenge, if any. Ctrl-C while the
/// verifier is prompting cancels the challenge.
async fn run_startup(handle: &SessionHandle) -> Result<SessionStatus> {
    let status = handle.activate().await?;
    if !matches!(status, SessionStatus::AwaitingChallenge { .. }) {
        return Ok(status);
    }

    eprintln!("Waiting for biometric verification...");
    let status = tokio::select! {
        settled = handle.settled() => settled?,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel_challenge().await?;
            handle.settled().await?
        }
    };
    Ok(status)
}

fn unexpected(status: SessionStatus) -> SessionGateError {
    match status {
        SessionStatus::Terminated(reason) => SessionError::Terminated(reason).into(),
        other => SessionGateError::Other(format!("session ended up {:?}", other)),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
