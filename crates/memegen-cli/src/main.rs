use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use memegen_contracts::decode::DataUri;
use memegen_contracts::input::InputBinder;
use memegen_contracts::status::{Notifier, StatusChannel};
use memegen_contracts::templates::Category;
use memegen_engine::{
    ApiClient, ClientConfig, GenerationOutcome, GenerationRequest, GenerationSession,
    LocalPlatform, PlatformServices, RuntimePlatform, TemplateCatalog,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "memegen-rs", version, about = "Meme template browser and generator")]
struct Cli {
    /// Overrides MEME_API_BASE.
    #[arg(long, global = true)]
    api_base: Option<String>,
    /// Overrides MEME_PAGE_SIZE.
    #[arg(long, global = true)]
    page_size: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Categories,
    Keys,
    List(ListArgs),
    Info(InfoArgs),
    Preview(PreviewArgs),
    Generate(GenerateArgs),
    Version,
}

#[derive(Debug, Parser)]
struct ListArgs {
    #[arg(long, default_value = "all")]
    category: Category,
    #[arg(long, default_value_t = 1)]
    page: usize,
}

#[derive(Debug, Parser)]
struct InfoArgs {
    key: String,
}

#[derive(Debug, Parser)]
struct PreviewArgs {
    key: String,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    key: String,
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    #[arg(long = "text")]
    texts: Vec<String>,
    /// Template argument as `name=value`; values that parse as JSON are sent
    /// as JSON.
    #[arg(long = "arg")]
    args: Vec<String>,
    #[arg(long, default_value = "native")]
    platform: RuntimePlatform,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

/// Mirrors every status message to stderr while keeping the channel state.
struct ConsoleStatus {
    channel: StatusChannel,
}

impl Notifier for ConsoleStatus {
    fn notify(&self, message: &str) {
        self.channel.show(message);
        eprintln!("{message}");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("memegen-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(api_base) = cli.api_base.as_deref() {
        config = config.with_api_base(api_base);
    }
    if let Some(page_size) = cli.page_size.filter(|value| *value > 0) {
        config.page_size = page_size;
    }
    debug!("using API at {}", config.api_base);

    let status = Arc::new(ConsoleStatus {
        channel: StatusChannel::new(),
    });
    match cli.command {
        Command::Categories => run_categories(config, status),
        Command::Keys => run_keys(config),
        Command::List(args) => run_list(config, status, args),
        Command::Info(args) => run_info(config, status, args),
        Command::Preview(args) => run_preview(config, status, args),
        Command::Generate(args) => run_generate(config, status, args),
        Command::Version => run_version(config),
    }
}

fn open_catalog(
    config: ClientConfig,
    status: Arc<ConsoleStatus>,
) -> Result<TemplateCatalog<ApiClient>> {
    let page_size = config.page_size;
    let api = ApiClient::new(config).context("failed building HTTP client")?;
    Ok(TemplateCatalog::new(api, status, page_size))
}

fn run_categories(config: ClientConfig, status: Arc<ConsoleStatus>) -> Result<i32> {
    let catalog = open_catalog(config, status)?;
    if !catalog.load_categories() {
        return Ok(1);
    }
    for (category, count) in catalog.category_counts() {
        println!("{:<12} {:<14} {count}", category.wire_name(), category.label());
    }
    Ok(0)
}

fn run_keys(config: ClientConfig) -> Result<i32> {
    let api = ApiClient::new(config).context("failed building HTTP client")?;
    for key in api.template_keys()? {
        println!("{key}");
    }
    Ok(0)
}

fn run_list(config: ClientConfig, status: Arc<ConsoleStatus>, args: ListArgs) -> Result<i32> {
    let catalog = open_catalog(config, status)?;
    if !catalog.load_categories() {
        return Ok(1);
    }
    let page = catalog.select_category_at(args.category, args.page);
    if page != args.page {
        warn!("page {} is out of range, showing page {page}", args.page);
    }

    for detail in catalog.current_page_templates() {
        let keywords = if detail.keywords.is_empty() {
            "-".to_string()
        } else {
            detail.keywords.join(", ")
        };
        let preview = if detail.preview_image.is_some() {
            "preview"
        } else {
            "no preview"
        };
        println!(
            "{:<24} texts {:<5} images {:<5} {preview:<10} {keywords}",
            detail.key, detail.text_range, detail.image_range
        );
    }
    println!(
        "{} page {page}/{}",
        catalog.selected_category().label(),
        catalog.total_pages()
    );
    Ok(0)
}

fn run_info(config: ClientConfig, status: Arc<ConsoleStatus>, args: InfoArgs) -> Result<i32> {
    let catalog = open_catalog(config, status)?;
    let detail = catalog
        .fetch_template_metadata(&args.key)
        .ok_or_else(|| anyhow!("could not load template '{}'", args.key))?;
    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(0)
}

fn run_preview(config: ClientConfig, status: Arc<ConsoleStatus>, args: PreviewArgs) -> Result<i32> {
    let catalog = open_catalog(config, status)?;
    let data_uri = catalog
        .fetch_template_preview(&args.key)
        .ok_or_else(|| anyhow!("could not load preview for '{}'", args.key))?;
    let parsed = DataUri::parse(&data_uri).ok_or_else(|| anyhow!("malformed preview image"))?;
    let bytes = parsed.decode_bytes().context("preview is not valid base64")?;
    if let Some(parent) = args.out.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.out, bytes)
        .with_context(|| format!("failed writing {}", args.out.display()))?;
    println!("{}", args.out.display());
    Ok(0)
}

fn run_generate(
    config: ClientConfig,
    status: Arc<ConsoleStatus>,
    args: GenerateArgs,
) -> Result<i32> {
    let catalog = open_catalog(config.clone(), status.clone())?;
    let detail = catalog
        .fetch_template_metadata(&args.key)
        .ok_or_else(|| anyhow!("could not load template '{}'", args.key))?;

    let mut binder = InputBinder::new();
    binder.initialize(Some(detail));

    let services =
        LocalPlatform::new(args.platform, &args.out).with_picks(args.images.clone());
    let picked = services.pick_images(args.images.len())?;
    let kept = binder.add_images(picked);
    if kept < args.images.len() {
        warn!(
            "template accepts {} images, ignoring {}",
            kept,
            args.images.len() - kept
        );
    }
    for (idx, text) in args.texts.iter().enumerate() {
        if !binder.set_text(idx, text) {
            warn!("template has {} text slots, ignoring '{text}'", binder.text_slot_count());
        }
    }
    if !binder.is_valid() {
        bail!(
            "inputs do not fit template '{}': texts {} (got {}), images: {}",
            args.key,
            binder.text_input_range(),
            binder.filled_texts().len(),
            binder.image_upload_prompt()
        );
    }

    let request = GenerationRequest::new(&args.key)
        .with_images(binder.images().to_vec())
        .with_texts(binder.filled_texts())
        .with_args(parse_template_args(&args.args)?);

    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let session = GenerationSession::connect(args.platform, config, status)?
        .with_event_log(events_path);

    let outcome = session.generate(&request)?;
    if outcome == GenerationOutcome::Discarded {
        return Ok(1);
    }
    match session.save_meme(&services)? {
        Some(path) => println!("{}", path.display()),
        None => warn!("meme was not written to disk"),
    }
    session.close();
    Ok(0)
}

fn run_version(config: ClientConfig) -> Result<i32> {
    let api = ApiClient::new(config).context("failed building HTTP client")?;
    println!("{}", api.server_version()?);
    Ok(0)
}

/// `name=value` pairs into the `args` object. Values are parsed as JSON when
/// possible so `circle=true` sends a boolean.
fn parse_template_args(raw: &[String]) -> Result<Map<String, Value>> {
    let mut args = Map::new();
    for pair in raw {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("template argument '{pair}' is not name=value"))?;
        let name = name.trim();
        if name.is_empty() {
            bail!("template argument '{pair}' has no name");
        }
        let value = serde_json::from_str::<Value>(value.trim())
            .unwrap_or_else(|_| Value::String(value.to_string()));
        args.insert(name.to_string(), value);
    }
    Ok(args)
}
