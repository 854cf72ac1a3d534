//! `wstun create-config` (§14): renders a starter client YAML config from
//! an embedded template, substituting the server URL/addr — simple
//! placeholder substitution, no templating engine dependency needed for
//! two placeholders.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;

const TEMPLATE: &str = include_str!("../templates/config_template.yml");

#[derive(Parser, Debug, Clone)]
pub struct CreateConfigArgs {
    /// The wstun gateway's URL, e.g. `http://gateway.example:8080`.
    #[arg(long)]
    pub server_url: String,

    /// The gateway's listen address. Derived from `--server-url`'s port
    /// (or `:80`/`:443` by scheme) when not given.
    #[arg(long)]
    pub server_addr: Option<String>,

    /// Output file path; stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &CreateConfigArgs) -> anyhow::Result<()> {
    let server_addr = match &args.server_addr {
        Some(addr) => addr.clone(),
        None => derive_server_addr(&args.server_url)?,
    };

    let rendered = TEMPLATE
        .replace("{{SERVER_URL}}", &args.server_url)
        .replace("{{SERVER_ADDR}}", &server_addr);

    match &args.out {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|e| anyhow::anyhow!("writing {}: {e}", path.display()))?;
        }
        None => {
            std::io::stdout().write_all(rendered.as_bytes())?;
        }
    }
    Ok(())
}

/// `:<port>` derived from the URL's explicit port, else `:80`/`:443` by
/// scheme (§14).
fn derive_server_addr(server_url: &str) -> anyhow::Result<String> {
    let url = url::Url::parse(server_url)
        .map_err(|e| anyhow::anyhow!("invalid --server-url {server_url:?}: {e}"))?;
    let port = url.port().unwrap_or(if url.scheme() == "https" { 443 } else { 80 });
    Ok(format!(":{port}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_default_http_port() {
        assert_eq!(derive_server_addr("http://gw.example").unwrap(), ":80");
    }

    #[test]
    fn derives_default_https_port() {
        assert_eq!(derive_server_addr("https://gw.example").unwrap(), ":443");
    }

    #[test]
    fn derives_explicit_port() {
        assert_eq!(derive_server_addr("http://gw.example:9090").unwrap(), ":9090");
    }
}
