mod config;

pub use config::GatewayConfig;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use sqlbridge::{Gateway, Interceptor, PgDatabase, Schema, SqlExecutor, Validator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "sqlbridge-gateway.toml";

const HELP: &str = "\
sqlbridge-gateway: serve sqlbridge requests over HTTP

USAGE:
    sqlbridge-gateway [--config <path>]

OPTIONS:
    -c, --config <path>    config file (default: $SQLBRIDGE_GATEWAY_CONFIG or sqlbridge-gateway.toml)
    -h, --help             print this help
";

#[derive(Debug, PartialEq, Eq)]
enum Args {
    Help,
    Serve { config: PathBuf },
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mut config = None;
    let mut it = args.iter().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Args::Help),
            "-c" | "--config" => {
                let path = it
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("{arg} requires a path"))?;
                config = Some(PathBuf::from(path));
            }
            other => anyhow::bail!("unexpected argument: {other}\n\n{HELP}"),
        }
    }
    let config = config
        .or_else(|| std::env::var_os("SQLBRIDGE_GATEWAY_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    Ok(Args::Serve { config })
}

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let config = match parse_args(&args)? {
        Args::Help => {
            print!("{HELP}");
            return Ok(());
        }
        Args::Serve { config } => config,
    };

    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::load(&config)?;
    let shutdown = CancellationToken::new();
    let gateway = Arc::new(build(&config, shutdown.clone()).await?);
    serve(&config, gateway, shutdown).await
}

async fn build(
    config: &GatewayConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<Gateway<SqlExecutor<PgDatabase>>> {
    let pool = sqlbridge::create_pool_with_config(&config.database.url, config.database.pool_size)?;
    let db = PgDatabase::new(pool);

    let mut gateway = Gateway::new(SqlExecutor::new(db.clone())).shutdown_token(shutdown);

    if config.validation.enabled {
        let v = &config.validation;
        let mut validator = Validator::new()
            .allow_alias(v.allow_alias)
            .allow_json_path(v.allow_json_path)
            .allow_random(v.allow_random);
        if let Some(pattern) = &v.resource_pattern {
            validator = validator.resource_pattern(pattern)?;
        }
        let schema = Schema::load(&db, &config.schemas()).await?;
        gateway = gateway
            .validator(validator, schema)
            .allow_statements(v.allow_statements);
    }

    if !config.interceptor.is_empty() {
        let interceptor = config
            .interceptor
            .iter()
            .fold(Interceptor::new(), |i, (resource, c)| {
                i.resource(resource, c.keys.iter().cloned())
            });
        gateway = gateway.interceptor(interceptor);
    }

    for (header, key) in &config.context.headers {
        gateway = gateway.context_header(header, key)?;
    }

    Ok(gateway)
}

async fn serve(
    config: &GatewayConfig,
    gateway: Arc<Gateway<SqlExecutor<PgDatabase>>>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(target: "sqlbridge.gateway", %addr, "listening");

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(target: "sqlbridge.gateway", "shutting down");
                shutdown.cancel();
                return Ok(());
            }
        };
        let io = TokioIo::new(stream);
        let gateway = gateway.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let gateway = gateway.clone();
                async move { gateway.serve(req).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                tracing::warn!(target: "sqlbridge.gateway", %peer, error = %err, "connection error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("sqlbridge-gateway")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_flags() {
        assert_eq!(parse_args(&args(&["--help"])).unwrap(), Args::Help);
        assert_eq!(
            parse_args(&args(&["-c", "/etc/gw.toml"])).unwrap(),
            Args::Serve {
                config: PathBuf::from("/etc/gw.toml")
            }
        );
        assert!(parse_args(&args(&["--config"])).is_err());
        assert!(parse_args(&args(&["serve"])).is_err());
    }
}
