//! Command-line generation driver: load a workflow graph, apply parameter
//! overrides, flatten it, submit it, watch the job, download the outputs.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::metadata::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use comfy_client::{fetch_workflow, load_workflow, wait_for_completion, Api, JobStatus, ViewQuery};
use comfy_graph::{
    analyze, apply_updates, to_execution_payload, GenerationOverrides, WorkflowDocument,
};

#[derive(Parser, Debug)]
#[command(name = "media-gen", about = "Generate images and videos from ComfyUI workflow graphs")]
struct Args {
    /// Workflow JSON: a file path or an http(s) URL.
    #[arg(short, long)]
    workflow: String,

    /// Positive prompt text.
    #[arg(short, long)]
    prompt: Option<String>,

    /// Negative prompt text.
    #[arg(short, long)]
    negative_prompt: Option<String>,

    /// Output width in pixels.
    #[arg(short = 'W', long)]
    width: Option<u32>,

    /// Output height in pixels.
    #[arg(short = 'H', long)]
    height: Option<u32>,

    /// Number of video frames to generate.
    #[arg(short, long)]
    frames: Option<u32>,

    /// Video frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Number of sampling steps.
    #[arg(short, long)]
    steps: Option<u32>,

    /// Random seed; omit to keep the workflow's seed (a fresh one is drawn
    /// for video workflows).
    #[arg(long)]
    seed: Option<i64>,

    /// CFG scale.
    #[arg(long)]
    cfg: Option<f64>,

    /// Raw widget writes as <nodeId>.<field>=<value>; repeatable.
    #[arg(long = "set", value_name = "NODE.FIELD=VALUE")]
    set: Vec<String>,

    /// Directory to download outputs into.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Timeout in minutes.
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,

    /// Print the execution payload without submitting it.
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// ComfyUI server url; overrides the config file.
    #[arg(long)]
    url: Option<String>,
}

#[derive(Serialize, Deserialize, Default, Debug)]
struct Config {
    server_url: Option<String>,
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env()
        .context("Failed to parse filter from env")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config: Config = Figment::new()
        .merge(Toml::file("media-gen.toml"))
        .merge(Env::prefixed("MEDIA_GEN_"))
        .extract()
        .context("Invalid configuration")?;

    let document = load_document(&args.workflow).await?;

    let validation = comfy_graph::validate(&document);
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if !validation.valid {
        anyhow::bail!("invalid workflow: {}", validation.errors.join(", "));
    }

    let analysis = analyze(&document);
    info!(
        parameters = analysis.configurable.len(),
        text_nodes = analysis.text_nodes.len(),
        "analyzed workflow"
    );
    for warning in &analysis.warnings {
        warn!("{}", warning);
    }

    let mut updates = build_overrides(&args, &document).to_updates(&analysis);
    for entry in &args.set {
        let (key, value) = parse_set(entry)?;
        updates.insert(key, value);
    }

    let outcome = apply_updates(&document, &updates);
    info!(applied = outcome.applied, "applied parameter updates");
    for key in &outcome.skipped {
        warn!(key = %key, "update did not match any widget slot");
    }

    let transformed = to_execution_payload(&outcome.document);
    for warning in &transformed.warnings {
        warn!("{}", warning);
    }

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&transformed.payload)?);
        return Ok(());
    }

    let server_url = args
        .url
        .or(config.server_url)
        .unwrap_or_else(|| "http://localhost:8188".to_string());
    let api = Api::new_with_url(&server_url)?;

    let extra_data = outcome.document.extra.get("extra_data").cloned();
    let response = api
        .prompt()?
        .send_with_extra(&transformed.payload, extra_data.as_ref())
        .await
        .context("failed to queue workflow")?;
    if !response.node_errors.is_empty() {
        for (node, error) in &response.node_errors {
            warn!(node = %node, error = %error, "server reported a node error");
        }
    }
    info!(prompt_id = %response.prompt_id, "workflow queued");

    let task = wait_for_completion(
        &api.history()?,
        &api.queue()?,
        &response.prompt_id,
        Duration::from_secs(args.timeout * 60),
        |status| match status {
            JobStatus::Queued { position, pending } => {
                info!(position, pending, "waiting in queue");
            }
            JobStatus::Running { completed_nodes } => {
                info!(completed_nodes, "generation in progress");
            }
        },
    )
    .await?;

    let output_dir = args
        .output_dir
        .or(config.output_dir)
        .unwrap_or_else(|| PathBuf::from("output"));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let files = task.output_files();
    if files.is_empty() {
        warn!("workflow completed but produced no output files");
        return Ok(());
    }
    let view = api.view()?;
    for output in &files {
        let bytes = view
            .get(&ViewQuery::from(&output.file))
            .await
            .with_context(|| format!("failed to download {}", output.file.filename))?;
        let path = output_dir.join(&output.file.filename);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("{}", path.display());
    }
    Ok(())
}

async fn load_document(source: &str) -> anyhow::Result<WorkflowDocument> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_workflow(&reqwest::Client::new(), source).await
    } else {
        load_workflow(source)
    }
}

/// Builds the semantic overrides from the flags. Video workflows get a
/// fresh time-derived seed when none was supplied, so repeated runs do not
/// replay the template's seed.
fn build_overrides(args: &Args, document: &WorkflowDocument) -> GenerationOverrides {
    let seed = args.seed.or_else(|| {
        document.contains_video_nodes().then(|| {
            (SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0)
                % u32::MAX as u128) as i64
        })
    });
    GenerationOverrides {
        prompt: args.prompt.clone(),
        negative_prompt: args.negative_prompt.clone(),
        width: args.width,
        height: args.height,
        frames: args.frames,
        fps: args.fps,
        seed,
        steps: args.steps,
        cfg: args.cfg,
    }
}

/// Parses a `--set NODE.FIELD=VALUE` entry. The value is taken as JSON when
/// it parses as such, and as a bare string otherwise.
fn parse_set(entry: &str) -> anyhow::Result<(String, Value)> {
    let (key, raw) = entry
        .split_once('=')
        .with_context(|| format!("--set expects NODE.FIELD=VALUE, got \"{}\"", entry))?;
    anyhow::ensure!(
        key.contains('.'),
        "--set key must be NODE.FIELD, got \"{}\"",
        key
    );
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn set_values_parse_as_json_when_possible() {
        assert_eq!(parse_set("3.steps=35").unwrap(), ("3.steps".to_string(), json!(35)));
        assert_eq!(
            parse_set("3.denoise=0.7").unwrap(),
            ("3.denoise".to_string(), json!(0.7))
        );
        assert_eq!(
            parse_set("16.force_zeros=true").unwrap(),
            ("16.force_zeros".to_string(), json!(true))
        );
        assert_eq!(
            parse_set("6.text=a red fox").unwrap(),
            ("6.text".to_string(), json!("a red fox"))
        );
    }

    #[test]
    fn malformed_set_entries_are_rejected() {
        assert!(parse_set("no-equals-sign").is_err());
        assert!(parse_set("steps=35").is_err());
    }

    #[test]
    fn video_documents_get_a_seed_when_none_is_given() {
        let video = WorkflowDocument::from_value(json!({
            "nodes": [{"id": 27, "type": "WanVideoSampler", "widgets_values": []}]
        }))
        .unwrap();
        let image = WorkflowDocument::from_value(json!({
            "nodes": [{"id": 3, "type": "KSampler", "widgets_values": []}]
        }))
        .unwrap();
        let args = Args::parse_from(["media-gen", "--workflow", "w.json"]);
        assert!(build_overrides(&args, &video).seed.is_some());
        assert!(build_overrides(&args, &image).seed.is_none());

        let args = Args::parse_from(["media-gen", "--workflow", "w.json", "--seed", "7"]);
        assert_eq!(build_overrides(&args, &video).seed, Some(7));
    }
}
