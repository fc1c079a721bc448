//! ActionDeck binary - composition root.
//!
//! Wires the catalog, selector, dispatcher, execution pipeline and approval
//! queue to the HTTP backend described in the config file.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::AsyncBufReadExt;
use uuid::Uuid;

use actiondeck_action::catalog::{get_action_definition, shipped_catalog, ActionCatalog};
use actiondeck_action::context::validate_context;
use actiondeck_action::dispatch::ActionDispatcher;
use actiondeck_action::icon::get_action_icon;
use actiondeck_action::pipeline::ExecutionPipeline;
use actiondeck_action::preferences::{select_with_preferences, MemoryPreferences, PreferencesProvider, TomlPreferences};
use actiondeck_action::queue::{ApprovalQueue, QueueSnapshot};
use actiondeck_action::registry::validate_action_registry;
use actiondeck_action::selector::{annotate, get_action_availability, SelectOptions};
use actiondeck_action::runs::ActionRun;
use actiondeck_action::types::{ActionContext, UiPlacement};
use actiondeck_action::RunState;
use actiondeck_client::HttpBackend;
use actiondeck_core::config::{expand_home, DeckConfig};
use actiondeck_core::error::DeckError;

use cli::{ApprovalsCommand, CliArgs, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Parse a `--context` argument.
///
/// Accepts either a full context object (with `module`) or just the field
/// bag for `module`, e.g. `{"itemId": "i-1"}`.
fn parse_context(module: &str, raw: Option<&str>) -> AppResult<ActionContext> {
    let raw = match raw {
        Some(raw) => raw,
        None => return Ok(ActionContext::new(module)),
    };
    let value: serde_json::Value = serde_json::from_str(raw)?;
    match value {
        serde_json::Value::Object(fields) if fields.contains_key("module") => {
            Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
        }
        serde_json::Value::Object(fields) => {
            let mut context = ActionContext::new(module);
            context.module_context.insert(module.to_string(), fields);
            Ok(context)
        }
        _ => Err(DeckError::Config("--context must be a JSON object".to_string()).into()),
    }
}

fn parse_placements(raw: &[String]) -> AppResult<Option<Vec<UiPlacement>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let placements = raw
        .iter()
        .map(|p| p.parse::<UiPlacement>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(placements))
}

fn open_preferences(config: &DeckConfig) -> Box<dyn PreferencesProvider> {
    let path = expand_home(&config.preferences.path);
    match TomlPreferences::open(&path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Preferences unavailable; using defaults");
            Box::new(MemoryPreferences::new())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_snapshot(snapshot: &QueueSnapshot) {
    println!(
        "{} shown, {} pending{}",
        snapshot.total_count,
        snapshot.pending_count,
        snapshot
            .last_refreshed
            .map(|t| format!(" (refreshed {})", t))
            .unwrap_or_default()
    );
    for request in &snapshot.queue {
        println!(
            "  {}  {:<28} {:<8} {}",
            request.id,
            request.tool_name,
            request.status,
            request.source.as_deref().unwrap_or("-")
        );
    }
    if let Some(error) = &snapshot.error {
        println!("  error: {}", error);
    }
}

fn cmd_list(
    config: &DeckConfig,
    module: &str,
    placement: &[String],
    whitelist: Option<Vec<String>>,
    blacklist: Option<Vec<String>>,
    context: Option<&str>,
) -> AppResult<()> {
    let context = parse_context(module, context)?;
    let options = SelectOptions {
        module: module.to_string(),
        placement: parse_placements(placement)?,
        whitelist,
        blacklist,
        context: Some(context.clone()),
    };

    let preferences = open_preferences(config);
    let actions = select_with_preferences(shipped_catalog(), preferences.as_ref(), module, &options);
    for entry in annotate(actions, &context) {
        let status = if entry.availability.available {
            String::new()
        } else {
            format!(
                "  (unavailable: {})",
                entry.availability.reason.unwrap_or_default()
            )
        };
        println!(
            "{} {:<28} {:<9} {:>5}  {}{}",
            entry.icon.glyph,
            entry.definition.id,
            entry.definition.ui_placement,
            entry.definition.effective_order(),
            entry.definition.label,
            status
        );
    }
    Ok(())
}

/// Wait for a decision on `request_id`, polling the service and accepting
/// `a`/`d` on stdin. Ctrl-C leaves the request pending.
async fn await_decision(
    config: &DeckConfig,
    backend: Arc<HttpBackend>,
    pipeline: Arc<ExecutionPipeline>,
    run_id: Uuid,
    request_id: Uuid,
) -> AppResult<ActionRun> {
    let queue = ApprovalQueue::new(backend, &config.approvals).with_sink(pipeline.clone());
    eprintln!(
        "Approval {} pending. Type 'a' to approve, 'd' to deny, or wait for a reviewer (Ctrl-C to detach).",
        request_id
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut tick = tokio::time::interval(Duration::from_secs(
        config.approvals.poll_interval_secs.max(1),
    ));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if let Err(e) = pipeline.sync_approval(request_id).await {
                    tracing::warn!(%request_id, error = %e, "Approval sync failed");
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        let outcome = match line.trim() {
                            "a" | "approve" => Some(queue.approve(request_id, None).await),
                            "d" | "deny" => Some(queue.deny(request_id, None, None).await),
                            "" => None,
                            other => {
                                eprintln!("Unrecognised input {:?}; expected 'a' or 'd'", other);
                                None
                            }
                        };
                        if let Some(Err(e)) = outcome {
                            eprintln!("Decision not recorded: {}", e);
                        }
                    }
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(pipeline.get_run(run_id)?),
        }

        let run = pipeline.get_run(run_id)?;
        if run.state != RunState::PendingApproval {
            return Ok(run);
        }
    }
}

async fn cmd_run(
    config: &DeckConfig,
    id: &str,
    module: &str,
    context: Option<&str>,
    default_config: Option<&str>,
    source: &str,
    detach: bool,
) -> AppResult<()> {
    let context = parse_context(module, context)?;
    let availability = get_action_availability(id, &context);
    if !availability.available {
        return Err(DeckError::Config(format!(
            "{} is not available: {}",
            id,
            availability.reason.unwrap_or_default()
        ))
        .into());
    }
    let default_config = match default_config {
        Some(raw) => Some(serde_json::from_str(raw)?),
        None => get_action_definition(id).and_then(|d| d.default_config.clone()),
    };

    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let pipeline = Arc::new(
        ExecutionPipeline::new(
            Arc::new(ActionCatalog::shipped()),
            backend.clone(),
            &config.general.tenant_id,
            config.pipeline.clone(),
        )
        .with_approval_backend(backend.clone()),
    );

    let dispatcher = ActionDispatcher::default();
    let mut signals = dispatcher.subscribe();
    dispatcher.dispatch_action_start(id, context, default_config, source);
    let signal = signals.recv().await?;

    let run = pipeline.handle_signal(&signal).await?;
    print_json(&run)?;

    let request_id = match run.approval_request_id {
        Some(request_id) if run.state == RunState::PendingApproval && !detach => request_id,
        _ => return Ok(()),
    };
    let run = await_decision(config, backend, pipeline, run.id, request_id).await?;
    print_json(&run)?;
    Ok(())
}

async fn cmd_approvals(config: &DeckConfig, command: ApprovalsCommand) -> AppResult<()> {
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let queue = Arc::new(ApprovalQueue::new(backend, &config.approvals));

    match command {
        ApprovalsCommand::List => {
            queue.refresh().await?;
            print_snapshot(&queue.snapshot());
        }
        ApprovalsCommand::Approve { id, actor } => {
            queue.approve(id, actor.as_deref()).await?;
            println!("approved {}", id);
            print_snapshot(&queue.snapshot());
        }
        ApprovalsCommand::Deny { id, actor, reason } => {
            queue.deny(id, actor.as_deref(), reason.as_deref()).await?;
            println!("denied {}", id);
            print_snapshot(&queue.snapshot());
        }
        ApprovalsCommand::Watch => {
            tracing::info!(
                interval_secs = config.approvals.poll_interval_secs,
                "Watching approval queue"
            );
            let poller = {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.run().await })
            };

            let mut last_printed = None;
            let mut tick = tokio::time::interval(std::time::Duration::from_millis(500));
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let snapshot = queue.snapshot();
                        let seen = (snapshot.last_refreshed, snapshot.error.clone());
                        if last_printed.as_ref() != Some(&seen) {
                            last_printed = Some(seen);
                            print_snapshot(&snapshot);
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            queue.shutdown();
            poller.await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let config = DeckConfig::load_or_default(&config_file);

    // Tracing goes to stderr so command output stays machine-readable.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(path = %config_file.display(), "Configuration resolved");

    match args.command {
        Command::Validate => {
            let report = validate_action_registry();
            print_json(&report)?;
            if !report.valid {
                return Err(DeckError::Config(format!(
                    "catalog has {} error(s)",
                    report.errors.len()
                ))
                .into());
            }
        }
        Command::List {
            module,
            placement,
            whitelist,
            blacklist,
            context,
        } => cmd_list(&config, &module, &placement, whitelist, blacklist, context.as_deref())?,
        Command::Show { id } => match get_action_definition(&id) {
            Some(definition) => print_json(definition)?,
            None => return Err(DeckError::Config(format!("Unknown action: {}", id)).into()),
        },
        Command::Icon { name } => {
            let icon = get_action_icon(name.as_deref());
            println!("{} {}", icon.glyph, icon.name);
        }
        Command::CheckContext { module, context } => {
            let context = parse_context(&module, context.as_deref())?;
            print_json(&validate_context(&module, &context))?;
        }
        Command::Run {
            id,
            module,
            context,
            default_config,
            source,
            detach,
        } => {
            cmd_run(
                &config,
                &id,
                &module,
                context.as_deref(),
                default_config.as_deref(),
                &source,
                detach,
            )
            .await?
        }
        Command::Approvals { command } => cmd_approvals(&config, command).await?,
    }

    Ok(())
}
