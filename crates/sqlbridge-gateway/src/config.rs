use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

/// The gateway's TOML configuration.
///
/// ```toml
/// listen = "0.0.0.0:8080"
///
/// [database]
/// url = "${DATABASE_URL}"
/// pool_size = 16
/// schemas = ["public"]
///
/// [validation]
/// enabled = true
/// allow_json_path = true
///
/// [interceptor.resources]
/// keys = ["tenant"]
///
/// [context]
/// headers = { "x-tenant" = "tenant" }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    pub database: DatabaseConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// Resource name to the context keys injected into its commands.
    #[serde(default)]
    pub interceptor: BTreeMap<String, InterceptorConfig>,

    #[serde(default)]
    pub context: ContextConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default)]
    pub schemas: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub resource_pattern: Option<String>,
    #[serde(default)]
    pub allow_alias: bool,
    #[serde(default)]
    pub allow_json_path: bool,
    #[serde(default)]
    pub allow_random: bool,
    /// Accept raw statements. They bypass validation and the interceptor.
    #[serde(default)]
    pub allow_statements: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resource_pattern: None,
            allow_alias: false,
            allow_json_path: false,
            allow_random: false,
            allow_statements: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterceptorConfig {
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Request header to context key.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_pool_size() -> usize {
    sqlbridge::pool::DEFAULT_POOL_SIZE
}

fn default_true() -> bool {
    true
}

impl GatewayConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        Self::parse(&raw)
            .map_err(|e| anyhow::anyhow!("invalid config file {}: {e:#}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut config: GatewayConfig = toml::from_str(raw)?;
        config.expand_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address {:?}: {e}", self.listen))
    }

    /// Schemas to introspect; `public` when none are configured.
    pub fn schemas(&self) -> Vec<String> {
        if self.database.schemas.is_empty() {
            vec!["public".to_string()]
        } else {
            self.database.schemas.clone()
        }
    }

    fn expand_env(&mut self) -> anyhow::Result<()> {
        self.listen = expand_env_vars(&self.listen)?;
        self.database.url = expand_env_vars(&self.database.url)?;
        for s in &mut self.database.schemas {
            *s = expand_env_vars(s)?;
        }
        if let Some(p) = self.validation.resource_pattern.as_mut() {
            *p = expand_env_vars(p)?;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.trim().is_empty() {
            anyhow::bail!("database.url must not be empty");
        }
        if self.database.pool_size == 0 {
            anyhow::bail!("database.pool_size must be at least 1");
        }
        for (resource, interceptor) in &self.interceptor {
            if interceptor.keys.iter().any(|k| k.trim().is_empty()) {
                anyhow::bail!("interceptor.{resource}.keys must not contain empty keys");
            }
        }
        self.listen_addr()?;
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    expand_with(input, |key| std::env::var(key).ok())
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                anyhow::bail!("unterminated env var reference: ${{{key}}}");
            }
            if key.is_empty() {
                anyhow::bail!("invalid env var reference: ${{}}");
            }

            let v = lookup(&key)
                .ok_or_else(|| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let config = GatewayConfig::parse(
            r#"
listen = "0.0.0.0:9000"

[database]
url = "postgres://localhost/app"
pool_size = 4
schemas = ["app", "public"]

[validation]
resource_pattern = '^\w+$'
allow_json_path = true
allow_statements = true

[interceptor.resources]
keys = ["tenant"]

[context]
headers = { "x-tenant" = "tenant" }
"#,
        )
        .unwrap();

        assert_eq!(config.listen_addr().unwrap().port(), 9000);
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(config.schemas(), ["app", "public"]);
        assert!(config.validation.enabled);
        assert!(config.validation.allow_json_path);
        assert!(!config.validation.allow_alias);
        assert!(config.validation.allow_statements);
        assert_eq!(config.interceptor["resources"].keys, ["tenant"]);
        assert_eq!(config.context.headers["x-tenant"], "tenant");
    }

    #[test]
    fn defaults_apply() {
        let config = GatewayConfig::parse(
            r#"
[database]
url = "postgres://localhost/app"
"#,
        )
        .unwrap();
        assert_eq!(config.listen, "127.0.0.1:8080");
        assert_eq!(config.database.pool_size, 16);
        assert_eq!(config.schemas(), ["public"]);
        assert!(config.validation.enabled);
        assert!(!config.validation.allow_statements);
        assert!(config.interceptor.is_empty());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(GatewayConfig::parse("[database]\nurl = \"\"\n").is_err());
        assert!(GatewayConfig::parse("listen = \"nowhere\"\n[database]\nurl = \"x\"\n").is_err());
        assert!(GatewayConfig::parse("[database]\nurl = \"x\"\npool_size = 0\n").is_err());
        assert!(GatewayConfig::parse("[database]\nurl = \"x\"\nunknown = 1\n").is_err());
    }

    #[test]
    fn expands_env_references() {
        let lookup = |k: &str| (k == "HOST").then(|| "db.internal".to_string());
        assert_eq!(
            expand_with("postgres://${HOST}/app", lookup).unwrap(),
            "postgres://db.internal/app"
        );
        assert_eq!(expand_with("no refs $HOST", lookup).unwrap(), "no refs $HOST");
        assert!(expand_with("${MISSING}", lookup).is_err());
        assert!(expand_with("${HOST", lookup).is_err());
        assert!(expand_with("${}", lookup).is_err());
    }
}
