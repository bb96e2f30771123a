mod gateway;

use clap::{Parser, Subcommand};
use gateway::{
    ContextBuilder, ExactPolicy, Gateway, Pipeline, ResponderPolicy, ResponseGate, Responder,
    SubstringPolicy,
};
use parley_channels::telegram::TelegramChannel;
use parley_core::{
    config::{self, shellexpand},
    traits::{AnsweredStore, Channel, MessageStore, Provider},
};
use parley_memory::{InMemoryAnswered, ReplyLog, Store};
use parley_providers::GeminiProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt,
    layer::{Layered, SubscriberExt},
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

#[derive(Parser)]
#[command(
    name = "parley",
    version,
    about = "Parley: chat auto-responder with loop-safe reply gating"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the configured channels and start answering.
    Start,
    /// Show configuration, store, and provider health.
    Status,
    /// Send a one-shot message to the provider.
    Ask {
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Print the context block a reply in this chat would receive.
    History {
        chat_id: String,
        /// Group name to render, for group chats.
        #[arg(long)]
        group: Option<String>,
    },
    /// Search stored messages.
    Search {
        query: String,
        /// Restrict the search to one chat.
        #[arg(long)]
        chat: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List known chats.
    Chats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logging = Logging::console();
    let cfg = config::load(&cli.config)?;
    let _log_guard = logging.configure(&cfg);

    match cli.command {
        Commands::Start => {
            let provider = build_provider(&cfg)?;
            if !provider.is_available().await {
                tracing::warn!(
                    "provider '{}' is not reachable; replies will use the fallback text",
                    provider.name()
                );
            }

            let mut channels: Vec<Arc<dyn Channel>> = Vec::new();
            if let Some(ref tg) = cfg.channel.telegram {
                if tg.enabled {
                    if tg.bot_token.is_empty() {
                        anyhow::bail!(
                            "Telegram is enabled but bot_token is empty. \
                             Set it in config.toml or TELEGRAM_BOT_TOKEN env var."
                        );
                    }
                    channels.push(Arc::new(TelegramChannel::new(tg.clone())));
                }
            }
            if channels.is_empty() {
                anyhow::bail!("No channels enabled. Enable at least one channel in config.toml.");
            }

            let store = Store::new(&cfg.memory).await?;
            let reply_log = Arc::new(ReplyLog::new(store.pool().clone()));
            let store = Arc::new(store);

            let answered: Arc<dyn AnsweredStore> = if cfg.responder.persist_answered {
                store.clone()
            } else {
                Arc::new(InMemoryAnswered::new())
            };
            let gate = ResponseGate::new(build_policy(&cfg)?, answered);

            let messages: Arc<dyn MessageStore> = store;
            let context = Arc::new(
                ContextBuilder::new(messages.clone()).with_limit(cfg.memory.max_context_messages),
            );
            let responder = Arc::new(Responder::new(provider, cfg.responder.persona.clone()));

            let pipelines = channels
                .into_iter()
                .map(|channel| {
                    Arc::new(
                        Pipeline::new(
                            channel,
                            messages.clone(),
                            gate.clone(),
                            context.clone(),
                            responder.clone(),
                            cfg.responder.reply_signatures.clone(),
                        )
                        .with_reply_log(reply_log.clone()),
                    )
                })
                .collect();

            println!("Parley: starting...");
            Gateway::new(pipelines).run().await?;
        }
        Commands::Status => {
            println!("Parley status\n");
            println!("Config: {}", cli.config);
            println!("Default provider: {}", cfg.provider.default);
            println!(
                "Allow-list: {} name(s), {} match",
                cfg.responder.allow_list.len(),
                cfg.responder.match_mode
            );
            println!();

            match build_provider(&cfg) {
                Ok(provider) => println!(
                    "  {}: {}",
                    provider.name(),
                    if provider.is_available().await {
                        "available"
                    } else {
                        "unavailable"
                    }
                ),
                Err(e) => println!("  provider: {e}"),
            }

            if let Some(ref tg) = cfg.channel.telegram {
                println!(
                    "  telegram: {}",
                    if tg.enabled && !tg.bot_token.is_empty() {
                        "configured"
                    } else if tg.enabled {
                        "enabled but missing bot_token"
                    } else {
                        "disabled"
                    }
                );
            } else {
                println!("  telegram: not configured");
            }
            println!();

            let store = Store::new(&cfg.memory).await?;
            println!("Database: {}", shellexpand(&cfg.memory.db_path));
            println!("  size: {} bytes", store.db_size().await?);
            println!("  chats: {}", store.list_chats().await?.len());
            println!("  messages: {}", store.message_count(None).await?);
            for (status, count) in ReplyLog::new(store.pool().clone()).totals().await? {
                println!("  replies {status}: {count}");
            }
        }
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: parley ask <message>");
            }

            let provider = build_provider(&cfg)?;
            let responder = Responder::new(provider, cfg.responder.persona.clone());
            let generated = responder
                .reply(
                    &message.join(" "),
                    gateway::NEW_CONVERSATION,
                    parley_core::message::ChatKind::Direct,
                    None,
                )
                .await;
            println!("{}", generated.text);
        }
        Commands::History { chat_id, group } => {
            let store = Arc::new(Store::new(&cfg.memory).await?);
            let chat = store.chat(&chat_id).await?;
            let is_group = group.is_some() || chat.as_ref().is_some_and(|c| c.is_group);
            let group_name = group.or_else(|| chat.filter(|c| c.is_group).map(|c| c.name));

            let builder =
                ContextBuilder::new(store).with_limit(cfg.memory.max_context_messages);
            let context = builder
                .build(&chat_id, is_group, group_name.as_deref())
                .await?;
            println!("# last {} message(s) of {chat_id}\n", builder.limit());
            println!("{context}");
        }
        Commands::Search { query, chat, limit } => {
            let store = Store::new(&cfg.memory).await?;
            let results = store.search_messages(&query, chat.as_deref(), limit).await?;
            if results.is_empty() {
                println!("No messages match '{query}'.");
            }
            for m in results {
                let when = chrono::DateTime::from_timestamp_millis(m.timestamp)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!("{when} [{}] {}: {}", m.chat_id, m.author_name, m.body);
            }
        }
        Commands::Chats => {
            let store = Store::new(&cfg.memory).await?;
            for chat in store.list_chats().await? {
                let count = store.message_count(Some(chat.id.as_str())).await?;
                println!(
                    "{}  {}{}  ({count} messages, last {})",
                    chat.id,
                    chat.name,
                    if chat.is_group { " [group]" } else { "" },
                    chat.last_message_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "never".to_string())
                );
            }
        }
    }

    Ok(())
}

type FileLayer = Option<Box<dyn Layer<Registry> + Send + Sync>>;

/// Subscriber handles that are filled in once the config is known.
struct Logging {
    file: reload::Handle<FileLayer, Registry>,
    filter: reload::Handle<EnvFilter, Layered<reload::Layer<FileLayer, Registry>, Registry>>,
}

impl Logging {
    /// Console logging at `RUST_LOG` or `info`, installed before the config
    /// is read so that load warnings are visible.
    fn console() -> Self {
        let (file, file_handle) = reload::Layer::new(FileLayer::None);
        let (filter, filter_handle) = reload::Layer::new(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        );
        tracing_subscriber::registry()
            .with(file)
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
        Self {
            file: file_handle,
            filter: filter_handle,
        }
    }

    /// Apply the configured level and add `{data_dir}/logs/parley.log`.
    /// `RUST_LOG` wins over the configured level. The returned guard flushes
    /// the file writer on drop.
    fn configure(&self, cfg: &config::Config) -> Option<WorkerGuard> {
        if EnvFilter::try_from_default_env().is_err() {
            if let Err(e) = self.filter.reload(EnvFilter::new(&cfg.parley.log_level)) {
                tracing::warn!("cannot apply log level '{}': {e}", cfg.parley.log_level);
            }
        }

        let log_dir = PathBuf::from(shellexpand(&cfg.parley.data_dir)).join("logs");
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            tracing::warn!("file logging disabled, cannot create {}: {e}", log_dir.display());
            return None;
        }

        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, "parley.log"));
        let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
        if let Err(e) = self.file.reload(Some(layer)) {
            tracing::warn!("file logging disabled: {e}");
            return None;
        }
        Some(guard)
    }
}

/// Build the configured provider.
fn build_provider(cfg: &config::Config) -> anyhow::Result<Arc<dyn Provider>> {
    match cfg.provider.default.as_str() {
        "gemini" => {
            let gemini = cfg.provider.gemini.clone().unwrap_or_default();
            if !gemini.enabled {
                anyhow::bail!("provider 'gemini' is selected but disabled");
            }
            let provider = GeminiProvider::from_config(&gemini)?;
            tracing::info!("provider: gemini, model {}", provider.model());
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}

/// Build the allow-list policy named by `responder.match_mode`.
fn build_policy(cfg: &config::Config) -> anyhow::Result<Arc<dyn ResponderPolicy>> {
    let allow_list = cfg.responder.allow_list.clone();
    match cfg.responder.match_mode.as_str() {
        "substring" => Ok(Arc::new(SubstringPolicy::new(allow_list))),
        "exact" => Ok(Arc::new(ExactPolicy::new(allow_list))),
        other => anyhow::bail!("unknown responder.match_mode: {other}"),
    }
}
