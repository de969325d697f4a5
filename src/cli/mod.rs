// Sessiongate: CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, status, capture, unlock, forget, register.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::config::{self, CapturePolicy, Config};

pub use commands::execute;

/// Sessiongate: keeps a site's login cookies under device encryption and
/// hands them back only after a biometric check.
#[derive(Parser, Debug)]
#[command(name = "sessiongate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Protected site; its host is the cookie scope.
    #[arg(long, global = true, env = "SESSIONGATE_SITE_URL", value_parser = parse_url_arg)]
    pub site_url: Option<Url>,

    /// Endpoint that receives push token registrations.
    #[arg(long, global = true, env = "SESSIONGATE_TOKEN_ENDPOINT", value_parser = parse_url_arg)]
    pub token_endpoint: Option<Url>,

    /// Directory holding the encrypted record.
    #[arg(long, global = true, env = "SESSIONGATE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// When live cookies are captured into the record.
    #[arg(long, global = true, value_enum, default_value_t = CapturePolicy::LoginSignal)]
    pub capture_policy: CapturePolicy,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            site_url: self.site_url.clone(),
            token_endpoint: self.token_endpoint.clone(),
            data_dir: self
                .data_dir
                .clone()
                .unwrap_or_else(config::default_data_dir),
            capture_policy: self.capture_policy,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the device master key and the encrypted record.
    Init,

    /// Show whether the gate is armed and how many cookies are stored.
    Status {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Record a completed login: store the given cookies and arm the gate.
    Capture {
        /// The site's `Cookie:` header after login (e.g. "sid=abc; csrftoken=x").
        #[arg(long)]
        cookie_header: String,

        #[command(flatten)]
        verifier: VerifierArgs,
    },

    /// Pass the biometric challenge and print the restored `Cookie:` header.
    Unlock {
        #[command(flatten)]
        verifier: VerifierArgs,
    },

    /// Wipe the stored session and disarm the gate.
    Forget {
        /// Also delete the device key from the platform keyring.
        #[arg(long)]
        device_key: bool,
    },

    /// Register a push token for one or more identities.
    Register {
        /// The push token issued to this device.
        #[arg(long)]
        token: String,

        /// Identity to associate with the token (repeatable).
        #[arg(long = "identity")]
        identities: Vec<String>,

        /// Overrides the configured token endpoint.
        #[arg(long, value_parser = parse_url_arg)]
        endpoint: Option<Url>,
    },
}

/// Which program runs the biometric challenge.
#[derive(Args, Debug, Clone)]
pub struct VerifierArgs {
    /// Verifier program; exit 0 passes, 130 cancels, anything else fails.
    #[arg(long, default_value = "fprintd-verify")]
    pub verifier: String,

    /// Argument passed to the verifier (repeatable).
    #[arg(long = "verifier-arg", allow_hyphen_values = true)]
    pub verifier_args: Vec<String>,
}

fn parse_url_arg(raw: &str) -> Result<Url, String> {
    config::parse_url(raw).map_err(|e| e.to_string())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unlock_with_verifier() {
        let cli = Cli::try_parse_from([
            "sessiongate",
            "--site-url",
            "https://mail.example.com/",
            "unlock",
            "--verifier",
            "my-verifier",
            "--verifier-arg",
            "-u",
            "--verifier-arg",
            "alice",
        ])
        .unwrap();

        match cli.command {
            Commands::Unlock { verifier } => {
                assert_eq!(verifier.verifier, "my-verifier");
                assert_eq!(verifier.verifier_args, vec!["-u", "alice"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_from_flags() {
        let cli = Cli::try_parse_from([
            "sessiongate",
            "status",
            "--data-dir",
            "/tmp/sg",
            "--capture-policy",
            "any-page-load",
        ])
        .unwrap();

        let config = cli.config();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/sg"));
        assert_eq!(config.capture_policy, CapturePolicy::AnyPageLoad);
    }

    #[test]
    fn test_register_collects_identities() {
        let cli = Cli::try_parse_from([
            "sessiongate",
            "register",
            "--token",
            "t0k",
            "--identity",
            "a@example.com",
            "--identity",
            "b@example.com",
            "--endpoint",
            "https://example.com/api/save_token",
        ])
        .unwrap();

        match cli.command {
            Commands::Register {
                token,
                identities,
                endpoint,
            } => {
                assert_eq!(token, "t0k");
                assert_eq!(identities.len(), 2);
                assert!(endpoint.is_some());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_forget_keeps_device_key_by_default() {
        let cli = Cli::try_parse_from(["sessiongate", "forget"]).unwrap();
        assert!(matches!(cli.command, Commands::Forget { device_key: false }));

        let cli = Cli::try_parse_from(["sessiongate", "forget", "--device-key"]).unwrap();
        assert!(matches!(cli.command, Commands::Forget { device_key: true }));
    }

    #[test]
    fn test_rejects_non_http_site() {
        let parsed = Cli::try_parse_from(["sessiongate", "--site-url", "file:///etc", "status"]);
        assert!(parsed.is_err());
    }
}
