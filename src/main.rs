use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};
use outbound_gateway::config::{Config, OutboundGatewayConfig};
use outbound_gateway::logging::{self, CustomLogger};
use outbound_gateway::{ForwardRequest, Forwarder, HeaderList, ResponseBody, ResponseType};
use std::path::Path;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[clap(
    version,
    about = "Send a request through the outbound gateway instead of dialing the target directly"
)]
struct Args {
    #[clap(short, long, value_name = "FILE", help = "Configuration file path")]
    config: Option<String>,

    #[clap(long, value_name = "URL", help = "Gateway endpoint; enables forwarding when no config file is given")]
    gateway_url: Option<String>,

    #[clap(short, long, value_name = "URL", help = "Real destination of the request")]
    target: Option<String>,

    #[clap(short = 'X', long, value_name = "METHOD", default_value = "POST", help = "HTTP method")]
    method: String,

    #[clap(short = 'H', long = "header", value_name = "NAME: VALUE", help = "Request header (can be used multiple times)")]
    headers: Vec<String>,

    #[clap(short, long, value_name = "BODY", help = "Request body")]
    data: Option<String>,

    #[clap(long, value_name = "JSON", help = "Upstream proxy descriptor, e.g. {\"type\":\"socks5\",\"host\":\"h\",\"port\":1080}")]
    proxy: Option<String>,

    #[clap(long, value_name = "TYPE", default_value = "json", help = "Response decoding: json, text or binary")]
    response_type: String,

    #[clap(long, value_name = "MILLISECONDS", help = "Request timeout (0 disables the deadline)")]
    timeout_ms: Option<u64>,

    #[clap(long, help = "Do not send the x-proxy-url header")]
    no_proxy_header: bool,

    #[clap(long, value_name = "FILE", help = "Generate a sample configuration file")]
    generate_config: Option<String>,

    #[clap(long, value_name = "LEVEL", help = "Log level when the config has no logging section")]
    log_level: Option<String>,

    #[clap(long, value_name = "FORMAT", help = "Log format (text or json) when the config has no logging section")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(config_file) = &args.generate_config {
        generate_sample_config(config_file)?;
        println!("Sample configuration file generated: {}", config_file);
        return Ok(());
    }

    let config = load_config(&args)?;

    match config.logging.clone() {
        Some(logging_config) => CustomLogger::init(logging_config)?,
        None => logging::init_fallback(args.log_level.as_deref(), args.log_format.as_deref())?,
    }

    let forwarder = Forwarder::from_config(&config).context("Invalid gateway configuration")?;
    if !forwarder.is_enabled() {
        warn!("Outbound gateway is disabled; nothing to forward");
        println!("Gateway disabled: send the request directly.");
        return Ok(());
    }

    let request = build_request(&args)?;
    let token = CancellationToken::new();
    let request = request.with_cancellation(token.clone());

    info!("Forwarding through {}", forwarder.settings().url);
    let forward = forwarder.forward(request);
    tokio::pin!(forward);

    let outcome = tokio::select! {
        outcome = &mut forward => outcome,
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, cancelling request...");
            token.cancel();
            forward.await
        }
    };

    let Some(result) = outcome? else {
        println!("Gateway disabled: send the request directly.");
        return Ok(());
    };

    println!("Status: {}", result.status);
    if let Some(proxy_url) = &result.proxy_url_used {
        println!(
            "Proxy: {}",
            outbound_gateway::proxy_url::mask_proxy_url(Some(proxy_url))
        );
    }
    for (name, value) in result.headers.iter() {
        println!("{}: {}", name, value);
    }
    println!();
    match &result.body {
        ResponseBody::Json(value) => println!("{}", serde_json::to_string_pretty(value)?),
        ResponseBody::Text(text) => println!("{}", text),
        ResponseBody::Binary(bytes) => println!("<{} bytes of binary data>", bytes.len()),
    }

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(config_file) => {
            if args.gateway_url.is_some() {
                bail!("--gateway-url cannot be combined with --config; set outbound_gateway.url in the file instead");
            }
            if !Path::new(config_file).exists() {
                bail!("Configuration file not found: {}", config_file);
            }
            Config::from_file(config_file)
                .with_context(|| format!("Failed to load configuration from {}", config_file))?
        }
        None => Config {
            outbound_gateway: args.gateway_url.as_ref().map(|url| OutboundGatewayConfig {
                enabled: Some(true),
                url: Some(url.clone()),
                forward_proxy_header: None,
            }),
            ..Default::default()
        },
    };

    if args.no_proxy_header {
        if let Some(gateway) = config.outbound_gateway.as_mut() {
            gateway.forward_proxy_header = Some(false);
        }
    }

    Ok(config)
}

fn build_request(args: &Args) -> anyhow::Result<ForwardRequest> {
    let Some(target) = &args.target else {
        bail!("--target is required when forwarding");
    };

    let mut headers = HeaderList::new();
    for raw in &args.headers {
        let Some((name, value)) = raw.split_once(':') else {
            bail!("Invalid header: '{}'. Use format 'NAME: VALUE'", raw);
        };
        headers.insert(name.trim(), value.trim());
    }

    let response_type: ResponseType = args
        .response_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let mut request = ForwardRequest::new(target.clone())
        .with_method(args.method.to_uppercase())
        .with_headers(headers)
        .with_response_type(response_type);

    if let Some(data) = &args.data {
        request = request.with_body(data.clone());
    }
    if let Some(proxy) = &args.proxy {
        request = request.with_proxy(proxy.as_str());
    }
    if let Some(timeout_ms) = args.timeout_ms {
        request = request.with_timeout_ms(timeout_ms);
    }

    Ok(request)
}

fn generate_sample_config(file_path: &str) -> anyhow::Result<()> {
    let sample = r#"{
  "outbound_gateway": {
    "enabled": true,
    "url": "http://127.0.0.1:8080/proxy",
    "forward_proxy_header": true
  },
  "request_timeout_ms": 600000,
  "logging": {
    "level": "info",
    "format": "text",
    "targets": [{ "type": "stdout" }]
  }
}"#;

    std::fs::write(file_path, sample)
        .with_context(|| format!("Failed to write {}", file_path))?;
    Ok(())
}
