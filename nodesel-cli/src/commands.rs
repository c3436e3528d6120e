//! Subcommand handlers
//!
//! Each handler returns a [CliError] instead of exiting so that `main` owns the exit codes:
//! 1 for bad queries and inputs, 2 for a fatal wait timeout.

use nodesel_config::{ConfigError, NodeselConfig, WaitOverrides};
use nodesel_fleet::provider::read_json;
use nodesel_fleet::{
    init_tracing_with, known_fields, wait_for_self_addresses, wait_for_slots, FleetError,
    LogConfig, NetworkInfo, SnapshotProvider, WaitOptions,
};
use nodesel_query::query::tokenize;
use nodesel_query::{compile, AttributeMap, KnownFields, QueryError};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Fleet(#[from] FleetError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Fleet(FleetError::Timeout { .. }) => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).map_err(|e| CliError::Output(e.to_string()))
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|e| CliError::Output(e.to_string()))
        }
    }
}

fn known(fields: &[String]) -> KnownFields {
    fields.iter().cloned().collect()
}

/// Handle the tokens command
pub fn tokens(query: &str, fields: &[String], format: OutputFormat) -> Result<(), CliError> {
    init_tracing_with(&LogConfig::default());
    let tokens = tokenize(query, &known(fields))?;
    println!("{}", render(&tokens, format)?.trim_end());
    Ok(())
}

/// Handle the check command
pub fn check(query: &str, fields: &[String]) -> Result<(), CliError> {
    init_tracing_with(&LogConfig::default());
    let selectors = compile(query, &known(fields))?;
    for (slot, selector) in selectors.iter().enumerate() {
        println!("{}: {}", slot, selector);
    }
    Ok(())
}

/// Handle the match command
pub fn match_pool(
    query: &str,
    fields: &[String],
    pool: &str,
    format: OutputFormat,
) -> Result<(), CliError> {
    init_tracing_with(&LogConfig::default());
    let pool: Vec<AttributeMap> = read_json(Path::new(pool))?;
    let fields = if fields.is_empty() {
        pool.iter().flat_map(|candidate| candidate.keys().cloned()).collect()
    } else {
        known(fields)
    };

    let selectors = compile(query, &fields)?;
    let assignment = selectors.assign(&pool);
    tracing::debug!(
        candidates = pool.len(),
        pending = assignment.pending(),
        "assignment pass"
    );
    println!("{}", render(&assignment.slots(), format)?.trim_end());
    Ok(())
}

/// Arguments of the wait command
#[derive(Debug, Clone, Default)]
pub struct WaitArgs {
    pub query: String,
    pub members: String,
    pub network: String,
    pub self_id: Option<String>,
    /// Addresses the own member must hold before the wait ends
    pub ip: Vec<String>,
    pub config: Option<String>,
    pub overrides: WaitOverrides,
}

/// Handle the wait command
///
/// Waits for the selector slots, then, when `self_id` is known, for the node's own addresses.
/// Both phases share the configured timeout.
pub fn wait(args: WaitArgs) -> Result<(), CliError> {
    let config = NodeselConfig::load(args.config.as_deref().map(Path::new), &args.overrides)?;
    init_tracing_with(&config.log_config());

    let network: NetworkInfo = read_json(Path::new(&args.network))?;
    tracing::info!(
        network = network.name().unwrap_or(""),
        self_id = args.self_id.as_deref().unwrap_or(""),
        "waiting for selector slots"
    );
    let selectors = compile(&args.query, &known_fields(&network))?;
    let mut provider = SnapshotProvider::new(
        &args.members,
        network,
        config.active_filter(args.self_id.clone()),
    );
    let options = config.wait_options();
    let version = config.fleet.ip_version;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (slots, own) = runtime.block_on(async {
        let started = tokio::time::Instant::now();
        let slots = wait_for_slots(&selectors, &mut provider, &options).await?;
        if args.self_id.is_none() {
            return Ok::<_, FleetError>((slots, None));
        }
        let rest = WaitOptions {
            timeout: options.timeout.remaining(started.elapsed()),
            ..options.clone()
        };
        let own = wait_for_self_addresses(&mut provider, &args.ip, version, &rest).await?;
        Ok((slots, Some(own)))
    })?;

    let addresses = if slots.timed_out {
        Vec::new()
    } else {
        slots.addresses()
    };
    let mut timed_out = slots.timed_out;
    println!("wait_for_addresses={}", addresses.join(" "));
    if let Some(own) = own {
        println!("ip={}", own.address);
        timed_out |= own.timed_out;
    }
    println!("timeout={}", timed_out);
    Ok(())
}
