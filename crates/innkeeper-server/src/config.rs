//! Runtime configuration for the `innkeeper-server` binary.

use anyhow::bail;
use clap::Parser;
use innkeeper::ResolverConfig;
use std::time::Duration;

/// CLI/environment arguments.
///
/// Every field is independently tunable at runtime; only the webhook URL has
/// no default, since it embeds the deployment's credential.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "innkeeper-server",
    version,
    about = "HTTP service resolving company ownership metadata by INN"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Base webhook URL of the CRM REST surface, credential included.
    ///
    /// Example: `https://crm.example.com/rest/1/abc123`
    ///
    /// Environment variable: `CRM_WEBHOOK_URL`
    #[arg(long, env = "CRM_WEBHOOK_URL")]
    pub webhook_url: String,

    /// Comma-separated company fields probed for the INN, in priority
    /// order. The first field yielding a row wins.
    ///
    /// Environment variable: `CRM_INN_FIELDS`
    #[arg(long, env = "CRM_INN_FIELDS", default_value_t = String::from("UF_CRM_INN,RQ_INN"))]
    pub inn_fields: String,

    /// Company field carrying the raw color code.
    ///
    /// Environment variable: `CRM_COLOR_FIELD`
    #[arg(long, env = "CRM_COLOR_FIELD", default_value_t = String::from("UF_CRM_COLOR"))]
    pub color_field: String,

    /// Enum entity the color table is resolved against.
    ///
    /// Environment variable: `CRM_ENUM_FIELD`
    #[arg(long, env = "CRM_ENUM_FIELD", default_value_t = String::from("COMPANY_COLOR"))]
    pub enum_field: String,

    /// Maximum commands per upstream batch call. The CRM rejects batches
    /// above 50; lower values only spread load.
    ///
    /// Environment variable: `CRM_BATCH_CAP`
    #[arg(long, env = "CRM_BATCH_CAP", default_value_t = 50)]
    pub batch_cap: usize,

    /// TTL of assembled per-INN results, in seconds.
    ///
    /// Environment variable: `COMPANY_TTL_SECS`
    #[arg(long, env = "COMPANY_TTL_SECS", default_value_t = 60)]
    pub company_ttl_secs: u64,

    /// TTL of resolved user display names, in seconds.
    ///
    /// Environment variable: `USER_TTL_SECS`
    #[arg(long, env = "USER_TTL_SECS", default_value_t = 600)]
    pub user_ttl_secs: u64,

    /// TTL of the color enum table, in seconds.
    ///
    /// Environment variable: `ENUM_TTL_SECS`
    #[arg(long, env = "ENUM_TTL_SECS", default_value_t = 3600)]
    pub enum_ttl_secs: u64,

    /// Budget for one whole resolution pipeline, in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_SECS`
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub webhook_url: String,
    pub resolver: ResolverConfig,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if !args.webhook_url.starts_with("http://") && !args.webhook_url.starts_with("https://") {
            bail!("CRM_WEBHOOK_URL must be an absolute http(s) URL");
        }

        let candidate_fields = split_fields(&args.inn_fields);
        if candidate_fields.is_empty() {
            bail!("CRM_INN_FIELDS must name at least one field");
        }

        if args.request_timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be greater than 0");
        }

        let resolver = ResolverConfig {
            candidate_fields,
            color_field: args.color_field,
            enum_field: args.enum_field,
            batch_cap: args.batch_cap,
            company_ttl: Duration::from_secs(args.company_ttl_secs),
            user_ttl: Duration::from_secs(args.user_ttl_secs),
            enum_ttl: Duration::from_secs(args.enum_ttl_secs),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
        };
        // Surface cap/field violations here, before the service binds.
        if let Err(e) = resolver.validate() {
            bail!("{e}");
        }

        Ok(Self {
            server_addr: args.server_addr,
            webhook_url: args.webhook_url,
            resolver,
        })
    }
}

fn split_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}
