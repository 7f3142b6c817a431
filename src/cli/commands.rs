//! CLI command implementations

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::access::{Role, Tier};
use crate::core::config::GateConfig;
use crate::credential::{CreateCredential, CredentialRepository, InMemoryCredentialRepository};
use crate::http_server::{admin_auth, GateServer, GateState};
use crate::observability::{Logger, MemoryAuditLog};
use crate::verification::{InMemoryCodeRepository, IssueRequest, VerificationService};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Entry point called from `main`
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Command::Serve { config } => serve(&config),
        Command::IssueCodes {
            config,
            count,
            role,
            tier,
            expires_in_days,
            max_uses,
            namespace,
        } => issue_codes(&config, count, role, tier, expires_in_days, max_uses, namespace),
        Command::ImportCredentials { config, file } => import_credentials(&config, &file),
        Command::HashToken { token } => {
            println!("{}", admin_auth::hash_token(&token));
            Ok(())
        }
    }
}

/// Load config, falling back to defaults when the file is absent
fn load_config(path: &Path) -> CliResult<GateConfig> {
    if path.exists() {
        Ok(GateConfig::load(path)?)
    } else {
        Logger::info(
            "CONFIG_DEFAULTED",
            &[("path", &path.display().to_string())],
        );
        Ok(GateConfig::default())
    }
}

fn serve(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let state = Arc::new(GateState::new(config));
    let server = GateServer::new(state);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.start())?;
    Ok(())
}

fn issue_codes(
    config_path: &Path,
    count: usize,
    role: Option<String>,
    tier: Option<String>,
    expires_in_days: Option<u32>,
    max_uses: Option<u32>,
    namespace: Option<String>,
) -> CliResult<()> {
    let config = load_config(config_path)?;

    let service = VerificationService::new(
        Arc::new(InMemoryCodeRepository::new()),
        Arc::new(InMemoryCredentialRepository::new()),
        Arc::new(MemoryAuditLog::new()),
        &config,
    );

    let request = IssueRequest {
        role: role.as_deref().map(parse_role).transpose()?,
        tier: tier.as_deref().map(parse_tier).transpose()?,
        expires_in_days,
        max_uses,
        namespace,
        ..Default::default()
    };

    for _ in 0..count {
        let issued = service.issue(request.clone())?;
        println!("{}", serde_json::to_string(&issued.code)?);
    }

    Ok(())
}

fn import_credentials(config_path: &Path, file: &Path) -> CliResult<()> {
    let _config = load_config(config_path)?;

    let raw = fs::read_to_string(file)?;
    let rows: Vec<CreateCredential> = serde_json::from_str(&raw)?;

    let repo = InMemoryCredentialRepository::new();
    let outcome = repo.create_bulk(rows)?;

    println!(
        "{}",
        serde_json::to_string(&serde_json::json!({
            "created": outcome.created.len(),
            "errors": outcome.errors,
        }))?
    );

    if !outcome.errors.is_empty() {
        return Err(CliError::InvalidArgument(format!(
            "{} row(s) failed validation",
            outcome.errors.len()
        )));
    }
    Ok(())
}

fn parse_role(s: &str) -> CliResult<Role> {
    Role::ALL
        .into_iter()
        .find(|r| r.as_str() == s.to_lowercase())
        .ok_or_else(|| CliError::InvalidArgument(format!("unknown role: {s}")))
}

fn parse_tier(s: &str) -> CliResult<Tier> {
    Tier::ALL
        .into_iter()
        .find(|t| t.as_str() == s.to_lowercase())
        .ok_or_else(|| CliError::InvalidArgument(format!("unknown tier: {s}")))
}
