//! Run configuration.
//!
//! Settings are layered: built-in defaults, then the optional TOML file given
//! with `--config`, then command line flags and environment variables.
//!
//! ```toml
//! [source]
//! kind = "index"            # or "repository"
//! api_url = "https://gitee.com/api/v5"
//! index_url = "https://ipb.osinfra.cn"
//! revisions = "api"         # or "git"
//!
//! [labels]
//! cla_approved = "openeuler-cla/yes"
//!
//! [routing]
//! organizations = ["openeuler", "src-openeuler"]
//! governance_repository = "openeuler/community"
//! exclude_target_members = true
//! skip_unready = false
//!
//! [roster]
//! root = "sig"
//! file_name = "sig-info.yaml"
//!
//! [activity]
//! enabled = true
//! url = "https://dsapi.osinfra.cn"
//! community = "openeuler"
//!
//! [checklist]
//! enabled = true
//! bot_login = "openeuler-ci-bot"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use attention::{
    AttentionError, ChecklistPolicy, LabelPolicy, RepositoryId, RosterLayout, RoutingPolicy,
    Scope, SigName,
};

/// Default base URL of the pull request index service.
pub const DEFAULT_INDEX_URL: &str = "https://ipb.osinfra.cn";

/// Environment variable read when `GITEE_ACCESS_TOKEN` is unset.
pub const LEGACY_TOKEN_VAR: &str = "ACCESS_TOKEN";

fn invalid(message: impl Into<String>) -> AttentionError {
    AttentionError::Configuration {
        message: message.into(),
    }
}

/// Where open pull requests are listed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// One repository through the Gitee REST API.
    Repository,
    /// Every repository through the pull request index service.
    Index,
}

/// Which backend answers revision queries for membership detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RevisionBackend {
    /// The Gitee REST API.
    #[default]
    Api,
    /// The local clone given with `--checkout`.
    Git,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    /// Every SIG in the directory.
    #[default]
    All,
    /// One SIG, for the pull requests of one repository.
    Sig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// `[source]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Unset means: the index for all SIGs, the repository for one SIG.
    pub kind: Option<SourceKind>,
    pub api_url: String,
    pub index_url: String,
    pub revisions: RevisionBackend,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: None,
            api_url: gitee::DEFAULT_API_URL.to_string(),
            index_url: DEFAULT_INDEX_URL.to_string(),
            revisions: RevisionBackend::Api,
        }
    }
}

/// `[activity]` section: the weekly processed rate shown per SIG in
/// all-SIGs reports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivityConfig {
    pub enabled: bool,
    pub url: String,
    pub community: String,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: gitee::DEFAULT_ACTIVITY_URL.to_string(),
            community: "openeuler".to_string(),
        }
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub labels: LabelPolicy,
    pub routing: RoutingPolicy,
    pub roster: RosterLayout,
    pub activity: ActivityConfig,
    /// Applies to one-SIG runs only.
    pub checklist: ChecklistPolicy,
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self, AttentionError> {
        toml::from_str(text).map_err(|e| invalid(format!("invalid configuration file: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, AttentionError> {
        let text = fs::read_to_string(path)
            .map_err(|e| invalid(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }
}

/// Routes open pull requests to the people who must look at them and writes
/// one report per recipient.
#[derive(Debug, Clone, Parser)]
#[command(name = "sig-attention", version)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Gitee access token (falls back to ACCESS_TOKEN).
    #[arg(long, env = "GITEE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Local checkout of the governance repository.
    #[arg(long, value_name = "DIR", default_value = "community")]
    pub checkout: PathBuf,

    /// Directory the per-recipient reports are written to.
    #[arg(long, value_name = "DIR", default_value = "data")]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = ScopeArg::All)]
    pub scope: ScopeArg,

    /// SIG notified under `--scope sig`.
    #[arg(long)]
    pub sig: Option<String>,

    /// Repository whose pull requests are routed under `--scope sig`
    /// (default: the governance repository).
    #[arg(long, value_name = "ORG/NAME")]
    pub repository: Option<String>,

    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    #[arg(long, value_enum)]
    pub revisions: Option<RevisionBackend>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Fully resolved settings of one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: AppConfig,
    pub scope: Scope,
    pub source: SourceKind,
    /// Repository listed when `source` is [`SourceKind::Repository`].
    pub listed_repository: Option<RepositoryId>,
    pub access_token: Option<String>,
    pub checkout: PathBuf,
    pub output: PathBuf,
}

impl Settings {
    /// Reads the configuration file and the legacy token variable, then
    /// applies `cli`.
    pub fn resolve(cli: Cli) -> Result<Self, AttentionError> {
        let config = match &cli.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        let legacy_token = std::env::var(LEGACY_TOKEN_VAR).ok();
        Self::from_parts(cli, config, legacy_token)
    }

    /// Applies `cli` on top of `config`. Fails before any I/O on invalid
    /// combinations.
    pub fn from_parts(
        cli: Cli,
        mut config: AppConfig,
        legacy_token: Option<String>,
    ) -> Result<Self, AttentionError> {
        if let Some(revisions) = cli.revisions {
            config.source.revisions = revisions;
        }

        let scope = match cli.scope {
            ScopeArg::All => {
                if cli.sig.is_some() || cli.repository.is_some() {
                    return Err(invalid("--sig and --repository require --scope sig"));
                }
                Scope::AllSigs
            }
            ScopeArg::Sig => {
                let sig = cli
                    .sig
                    .as_deref()
                    .and_then(|s| SigName::new(s.trim()))
                    .ok_or_else(|| invalid("--scope sig requires --sig"))?;
                let repository = match cli.repository.as_deref() {
                    Some(repo) => parse_repository(repo)?,
                    None => config.routing.governance_repository.clone().ok_or_else(|| {
                        invalid("--scope sig requires --repository when no governance repository is configured")
                    })?,
                };
                Scope::Sig { sig, repository }
            }
        };

        let source = cli.source.or(config.source.kind).unwrap_or(match scope {
            Scope::AllSigs => SourceKind::Index,
            Scope::Sig { .. } => SourceKind::Repository,
        });
        let listed_repository = match (&source, &scope) {
            (SourceKind::Index, _) => None,
            (SourceKind::Repository, Scope::Sig { repository, .. }) => Some(repository.clone()),
            (SourceKind::Repository, Scope::AllSigs) => {
                Some(config.routing.governance_repository.clone().ok_or_else(|| {
                    invalid("a repository source needs a governance repository")
                })?)
            }
        };

        Ok(Self {
            config,
            scope,
            source,
            listed_repository,
            access_token: cli.access_token.or(legacy_token).filter(|t| !t.is_empty()),
            checkout: cli.checkout,
            output: cli.output,
        })
    }
}

fn parse_repository(value: &str) -> Result<RepositoryId, AttentionError> {
    match value.trim().split_once('/') {
        Some((org, name)) if !org.is_empty() && !name.is_empty() && !name.contains('/') => {
            RepositoryId::new(value.trim()).ok_or_else(|| invalid("empty repository"))
        }
        _ => Err(invalid(format!("repository '{value}' is not of the form ORG/NAME"))),
    }
}
