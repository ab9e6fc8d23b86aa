//! Command-line and environment configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;
use url::Url;

use hub_artifacts::{
    CommandTracer, DEFAULT_HUB_URL, DEFAULT_REVISION, HubClient, HubModelSource, HubTracedFile,
    LocalArtifactSource, LocalTracedFile, ModelSource, TRACED_MODEL_FILE, Tracer,
};
use ml_registry::{
    Auth, ConnectionSettings, DEFAULT_CHUNK_SIZE, DeploymentOptions, ElasticsearchRegistry,
    ExistsPolicy, ModelId, RegistryError, TaskType, TrainedModelConfig, UploadOptions,
};

use crate::pipeline::{CleanupPolicy, ImportRequest};

#[derive(Parser, Debug)]
#[command(name = "model-import")]
#[command(about = "Import a hub transformer model into a cluster's trained-model registry")]
pub struct Cli {
    /// Hub model id, e.g. sentence-transformers/msmarco-MiniLM-L-12-v3
    #[arg(long)]
    pub model: String,

    /// Inference task the model performs
    #[arg(long, value_parser = parse_task)]
    pub task: TaskType,

    /// Directory the artifacts are written to
    #[arg(long, env = "MODEL_IMPORT_OUTPUT_DIR")]
    pub output_dir: String,

    /// Registry key to import under (derived from model and task if omitted)
    #[arg(long)]
    pub model_id: Option<String>,

    /// JSON file used verbatim as the model configuration
    #[arg(long)]
    pub config_override: Option<String>,

    /// Re-use artifacts from an earlier run instead of contacting the hub
    #[arg(long)]
    pub from_artifacts: Option<String>,

    /// Cluster URL
    #[arg(long, env = "ELASTICSEARCH_URL")]
    pub es_url: String,

    #[arg(long, env = "ELASTICSEARCH_USERNAME")]
    pub es_username: Option<String>,

    #[arg(long, env = "ELASTICSEARCH_PASSWORD", hide_env_values = true)]
    pub es_password: Option<String>,

    /// API key, used instead of username and password when set
    #[arg(long, env = "ELASTICSEARCH_API_KEY", hide_env_values = true)]
    pub es_api_key: Option<String>,

    /// PEM file with the CA that signed the cluster certificate
    #[arg(long, env = "ELASTICSEARCH_CA_CERT")]
    pub ca_cert: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,

    /// Hub base URL
    #[arg(long, env = "HF_ENDPOINT", default_value = DEFAULT_HUB_URL)]
    pub hub_url: String,

    /// Hub access token for gated or private models
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hub_token: Option<String>,

    /// Hub revision (branch, tag or commit)
    #[arg(long, default_value = DEFAULT_REVISION)]
    pub revision: String,

    /// How the traced model file is obtained
    #[arg(long, value_enum, default_value_t = TracerKind::Hub)]
    pub tracer: TracerKind,

    /// Name of the pre-traced file in the hub repository (hub tracer)
    #[arg(long, default_value = TRACED_MODEL_FILE)]
    pub traced_file: String,

    /// Exporter program (command tracer)
    #[arg(long)]
    pub trace_command: Option<String>,

    /// Exporter argument; {model}, {task} and {output} are substituted (command tracer)
    #[arg(long = "trace-arg", allow_hyphen_values = true)]
    pub trace_args: Vec<String>,

    /// Existing traced model file (local tracer)
    #[arg(long)]
    pub traced_path: Option<String>,

    /// Raw bytes per uploaded definition part
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// What to do when the model id is already registered
    #[arg(long, value_enum, default_value_t = IfExists::Replace)]
    pub if_exists: IfExists,

    /// Start a deployment once the model is stored
    #[arg(long)]
    pub start: bool,

    /// Delete local artifacts after a successful registration
    #[arg(long)]
    pub cleanup: bool,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracerKind {
    /// Download a pre-traced file from the model repository
    Hub,
    /// Run an external exporter
    Command,
    /// Copy an existing traced file
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IfExists {
    Replace,
    Fail,
}

fn parse_task(s: &str) -> Result<TaskType, String> {
    s.parse().map_err(|e: ml_registry::UnknownTask| e.to_string())
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid cluster URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid model id: {0}")]
    InvalidModelId(#[from] ml_registry::ModelIdError),

    #[error("--es-password is required with --es-username")]
    MissingPassword,

    #[error("--tracer {0} requires {1}")]
    MissingTracerOption(&'static str, &'static str),

    #[error("--chunk-size must be positive")]
    InvalidChunkSize,

    #[error("Failed to read config override {path}: {reason}")]
    ConfigOverride { path: String, reason: String },

    #[error(transparent)]
    Hub(#[from] hub_artifacts::AcquireError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Where the traced model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracerSettings {
    Hub { file: String },
    Command { program: String, args: Vec<String> },
    Local { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Hub {
        url: String,
        token: Option<String>,
        revision: String,
        tracer: TracerSettings,
    },
    Artifacts(PathBuf),
}

/// Validated settings for one import run.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub model: String,
    pub task: TaskType,
    pub output_dir: PathBuf,
    pub model_id: Option<ModelId>,
    pub config_override: Option<PathBuf>,
    pub acquisition: Acquisition,
    pub connection: ConnectionSettings,
    pub upload: UploadOptions,
    pub cleanup: CleanupPolicy,
    pub verbose: bool,
}

impl ImportSettings {
    pub fn from_cli(cli: Cli) -> Result<Self, SettingsError> {
        let url = Url::parse(&cli.es_url)
            .map_err(|e| SettingsError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SettingsError::InvalidUrl(
                "scheme must be http or https".to_string(),
            ));
        }

        // URL userinfo becomes Basic auth; explicit flags take precedence
        let mut connection = ConnectionSettings::new(url);
        match (cli.es_api_key, cli.es_username) {
            (Some(key), _) => connection.auth = Auth::ApiKey(key),
            (None, Some(username)) => {
                connection.auth = Auth::Basic {
                    username,
                    password: cli.es_password.ok_or(SettingsError::MissingPassword)?,
                }
            }
            (None, None) => {
                if let (Auth::Basic { password, .. }, Some(flag)) =
                    (&mut connection.auth, cli.es_password)
                {
                    if password.is_empty() {
                        *password = flag;
                    }
                }
            }
        }
        connection.ca_cert = cli.ca_cert.as_deref().map(expand_tilde);
        connection.insecure = cli.insecure;
        connection.request_timeout = Duration::from_secs(cli.timeout_secs);

        let acquisition = match cli.from_artifacts {
            Some(dir) => Acquisition::Artifacts(expand_tilde(&dir)),
            None => {
                let tracer = match cli.tracer {
                    TracerKind::Hub => TracerSettings::Hub {
                        file: cli.traced_file,
                    },
                    TracerKind::Command => TracerSettings::Command {
                        program: cli.trace_command.ok_or(SettingsError::MissingTracerOption(
                            "command",
                            "--trace-command",
                        ))?,
                        args: cli.trace_args,
                    },
                    TracerKind::Local => TracerSettings::Local {
                        path: cli.traced_path.as_deref().map(expand_tilde).ok_or(
                            SettingsError::MissingTracerOption("local", "--traced-path"),
                        )?,
                    },
                };
                Acquisition::Hub {
                    url: cli.hub_url,
                    token: cli.hub_token,
                    revision: cli.revision,
                    tracer,
                }
            }
        };

        if cli.chunk_size == 0 {
            return Err(SettingsError::InvalidChunkSize);
        }
        let upload = UploadOptions {
            chunk_size: cli.chunk_size,
            exists: match cli.if_exists {
                IfExists::Replace => ExistsPolicy::Replace,
                IfExists::Fail => ExistsPolicy::Fail,
            },
            start: cli.start.then(DeploymentOptions::default),
        };

        Ok(Self {
            model: cli.model,
            task: cli.task,
            output_dir: expand_tilde(&cli.output_dir),
            model_id: cli.model_id.as_deref().map(ModelId::parse).transpose()?,
            config_override: cli.config_override.as_deref().map(expand_tilde),
            acquisition,
            connection,
            upload,
            cleanup: if cli.cleanup {
                CleanupPolicy::RemoveArtifacts
            } else {
                CleanupPolicy::Keep
            },
            verbose: cli.verbose,
        })
    }

    /// Build the model source this run acquires artifacts from.
    pub fn model_source(&self) -> Result<Box<dyn ModelSource>, SettingsError> {
        match &self.acquisition {
            Acquisition::Artifacts(dir) => Ok(Box::new(LocalArtifactSource::new(dir.clone()))),
            Acquisition::Hub {
                url,
                token,
                revision,
                tracer,
            } => {
                let hub = HubClient::new()?
                    .with_base_url(url.as_str())
                    .with_revision(revision.as_str())
                    .with_token(token.clone());
                let tracer: Box<dyn Tracer> = match tracer {
                    TracerSettings::Hub { file } => {
                        Box::new(HubTracedFile::new(hub.clone(), file.as_str()))
                    }
                    TracerSettings::Command { program, args } => {
                        Box::new(CommandTracer::new(program.as_str(), args.clone()))
                    }
                    TracerSettings::Local { path } => Box::new(LocalTracedFile::new(path.clone())),
                };
                Ok(Box::new(HubModelSource::new(hub, tracer)))
            }
        }
    }

    /// Build the registry client. Dropping it releases its connections.
    pub fn registry(&self) -> Result<ElasticsearchRegistry, SettingsError> {
        Ok(ElasticsearchRegistry::new(&self.connection)?)
    }

    /// Build the import request, reading the config override if one was given.
    pub fn import_request(&self) -> Result<ImportRequest, SettingsError> {
        let config_override = self
            .config_override
            .as_deref()
            .map(load_config_override)
            .transpose()?;

        Ok(ImportRequest {
            model: self.model.clone(),
            task: self.task,
            output_dir: self.output_dir.clone(),
            model_id: self.model_id.clone(),
            config_override,
            upload: self.upload.clone(),
            cleanup: self.cleanup,
        })
    }
}

fn load_config_override(path: &Path) -> Result<TrainedModelConfig, SettingsError> {
    let err = |reason: String| SettingsError::ConfigOverride {
        path: path.display().to_string(),
        reason,
    };
    let content = std::fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| err(e.to_string()))
}

/// Expand ~ or ~/ prefix to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}
