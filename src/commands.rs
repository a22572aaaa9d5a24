use crate::agent::{DailyTip, TipAgent};
use crate::category::Category;
use crate::formatting::{post_tip, truncate_message, Presentation};
use anyhow::Result;
use log::{info, warn};
use serenity::model::channel::Message;
use serenity::prelude::Context;
use std::sync::Arc;

const PROCESSING_NOTICE: &str = "⏳ Generating a tip, give me a moment...";
const REASONING_NOTICE: &str = "🧠 Thinking about what to teach next...";

const HELP_TEXT: &str = r#"**Available Commands:**
`!daily-tip` - Today's frontend tip
`!frontend-tips` - A frontend development tip
`!backend-tips` - A backend development tip
`!fullstack-tips` - A fullstack development tip
`!ai-tips` - Let the agent pick the category
`!random-tip` - A tip from a random category
`!ai-reasoning` - Hear how the agent plans the next tip
`!ping` - Test bot responsiveness
`!help` - Show this help message"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipCommand {
    DailyTip,
    CategoryTips(Category),
    AiTips,
    RandomTip,
    AiReasoning,
    Help,
    Ping,
}

impl TipCommand {
    /// Exact match on the trimmed message. Anything else is not a command.
    pub fn parse(content: &str) -> Option<Self> {
        match content.trim() {
            "!daily-tip" => Some(TipCommand::DailyTip),
            "!frontend-tips" => Some(TipCommand::CategoryTips(Category::Frontend)),
            "!backend-tips" => Some(TipCommand::CategoryTips(Category::Backend)),
            "!fullstack-tips" => Some(TipCommand::CategoryTips(Category::Fullstack)),
            "!ai-tips" => Some(TipCommand::AiTips),
            "!random-tip" => Some(TipCommand::RandomTip),
            "!ai-reasoning" => Some(TipCommand::AiReasoning),
            "!help" => Some(TipCommand::Help),
            "!ping" => Some(TipCommand::Ping),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct CommandHandler {
    agent: Arc<TipAgent>,
    presentation: Presentation,
    message_cap: usize,
}

impl CommandHandler {
    pub fn new(agent: Arc<TipAgent>, presentation: Presentation, message_cap: usize) -> Self {
        CommandHandler {
            agent,
            presentation,
            message_cap,
        }
    }

    pub async fn handle_message(&self, ctx: &Context, msg: &Message) -> Result<()> {
        let command = match TipCommand::parse(&msg.content) {
            Some(command) => command,
            None => return Ok(()),
        };

        info!("Processing command: {:?} from user: {}", command, msg.author.id);

        match command {
            TipCommand::Ping => {
                msg.channel_id.say(&ctx.http, "Pong!").await?;
            }
            TipCommand::Help => {
                msg.channel_id.say(&ctx.http, HELP_TEXT).await?;
            }
            TipCommand::AiReasoning => {
                let notice = msg.channel_id.say(&ctx.http, REASONING_NOTICE).await?;
                let reasoning = self.agent.agent_reasoning().await;
                self.clear_notice(ctx, notice).await;
                msg.channel_id
                    .say(&ctx.http, truncate_message(&reasoning, self.message_cap))
                    .await?;
            }
            tip_command => {
                let notice = msg.channel_id.say(&ctx.http, PROCESSING_NOTICE).await?;
                let daily = self.run_tip_command(tip_command).await;
                self.clear_notice(ctx, notice).await;
                post_tip(&ctx.http, msg.channel_id, &daily, self.presentation, self.message_cap).await?;
            }
        }

        Ok(())
    }

    async fn run_tip_command(&self, command: TipCommand) -> DailyTip {
        match command {
            TipCommand::CategoryTips(Category::Frontend) | TipCommand::DailyTip => {
                self.agent.generate_frontend_tip().await
            }
            TipCommand::CategoryTips(Category::Backend) => self.agent.generate_backend_tip().await,
            TipCommand::CategoryTips(Category::Fullstack) => self.agent.generate_fullstack_tip().await,
            TipCommand::RandomTip => self.agent.generate_random_tip().await,
            _ => self.agent.generate_daily_tip(None).await,
        }
    }

    async fn clear_notice(&self, ctx: &Context, notice: Message) {
        if let Err(e) = notice.delete(ctx).await {
            warn!("⚠️ Could not delete processing message: {}", e);
        }
    }
}
