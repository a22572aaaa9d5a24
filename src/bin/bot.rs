use anyhow::Result;
use log::{error, info, warn};
use openai::set_key;
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::Arc;

use devtips::agent::TipAgent;
use devtips::commands::CommandHandler;
use devtips::config::{Config, Provider};
use devtips::database::Database;
use devtips::llm::{GeminiGenerator, OpenAiGenerator, TextGenerator, TimeoutGenerator};
use devtips::scheduler::DailyTipScheduler;
use devtips::verifier::Verifier;

struct Handler {
    command_handler: Arc<CommandHandler>,
}

impl Handler {
    fn new(command_handler: CommandHandler) -> Self {
        Handler {
            command_handler: Arc::new(command_handler),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        if let Err(e) = self.command_handler.handle_message(&ctx, &msg).await {
            error!("Error handling message: {}", e);
            if let Err(why) = msg
                .channel_id
                .say(&ctx.http, "Sorry, I encountered an error processing your command.")
                .await
            {
                error!("Failed to send error message: {}", why);
            }
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());
        info!("🤖 Bot ID: {}", ready.user.id);
    }
}

fn build_generator(config: &Config, model: &str) -> Arc<dyn TextGenerator> {
    match config.provider {
        Provider::OpenAi => Arc::new(TimeoutGenerator::new(
            OpenAiGenerator::new(model),
            config.request_timeout,
        )),
        Provider::Gemini => Arc::new(TimeoutGenerator::new(
            GeminiGenerator::new(config.api_key.clone(), model),
            config.request_timeout,
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting DevTips Discord Bot...");

    if config.provider == Provider::OpenAi {
        set_key(config.api_key.clone());
    }

    let database = Database::new(&config.database_path).await?;
    let generator = build_generator(&config, &config.generator_model);
    let verifier = if config.verification_enabled {
        Some(Verifier::new(build_generator(&config, &config.verifier_model)))
    } else {
        warn!("⚠️ Tip verification disabled");
        None
    };

    let agent = Arc::new(TipAgent::new(
        generator,
        Arc::new(database),
        verifier,
        config.agent_settings(),
    ));
    if let Err(e) = agent.initialize().await {
        warn!("⚠️ Starting with empty agent memory: {}", e);
    }

    let handler = Handler::new(CommandHandler::new(
        agent.clone(),
        config.presentation,
        config.message_cap,
    ));

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {}", e);
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    let scheduler = DailyTipScheduler::new(
        agent,
        config.schedule.clone(),
        config.timezone,
        config.tip_channel_id,
        config.presentation,
        config.message_cap,
    );
    let http = client.cache_and_http.http.clone();
    let scheduler_task = tokio::spawn(async move { scheduler.run(http).await });

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("🛑 Ctrl-C received, shutting down");
        shard_manager.lock().await.shutdown_all().await;
    });

    info!("Bot configured successfully. Connecting to Discord gateway...");

    let result = client.start().await;
    scheduler_task.abort();

    if let Err(why) = result {
        error!("Gateway connection failed: {:?}", why);
        return Err(anyhow::anyhow!("Failed to establish gateway connection: {}", why));
    }

    info!("👋 Bot stopped");
    Ok(())
}
