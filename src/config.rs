use crate::agent::AgentSettings;
use crate::category::{Category, TopicTags};
use crate::cron::CronSchedule;
use crate::formatting::{Presentation, DEFAULT_MESSAGE_CAP, MIN_MESSAGE_CAP};
use crate::selector::SelectionPolicy;
use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

impl Provider {
    pub fn default_generator_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }

    pub fn default_verifier_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Gemini => "gemini-1.5-flash",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub tip_channel_id: u64,
    pub provider: Provider,
    /// OpenAI or Google key, whichever `provider` needs.
    pub api_key: String,
    pub generator_model: String,
    pub verifier_model: String,
    pub verification_enabled: bool,
    pub temperature: f32,
    pub selection: SelectionPolicy,
    pub schedule: CronSchedule,
    pub timezone: Tz,
    pub message_cap: usize,
    pub presentation: Presentation,
    pub request_timeout: Duration,
    pub database_path: String,
    pub topics: TopicTags,
    pub log_level: String,
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| anyhow!("{} environment variable not set", name))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} has an invalid value: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let provider = match optional("GENERATION_PROVIDER", "openai").trim().to_lowercase().as_str() {
            "openai" => Provider::OpenAi,
            "gemini" | "google" => Provider::Gemini,
            other => return Err(anyhow!("GENERATION_PROVIDER must be openai or gemini, got {:?}", other)),
        };
        let api_key = match provider {
            Provider::OpenAi => required("OPENAI_API_KEY")?,
            Provider::Gemini => required("GOOGLE_API_KEY")?,
        };

        let tip_channel_id = required("TIP_CHANNEL_ID")?
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow!("TIP_CHANNEL_ID must be a numeric channel id"))?;

        let selection_raw = optional("TIP_SELECTION", SelectionPolicy::default().as_str());
        let selection = SelectionPolicy::from_str(&selection_raw)
            .ok_or_else(|| anyhow!("TIP_SELECTION must be weekday, random or recommended, got {:?}", selection_raw))?;

        let presentation_raw = optional("TIP_PRESENTATION", "plain");
        let presentation = Presentation::from_str(&presentation_raw)
            .ok_or_else(|| anyhow!("TIP_PRESENTATION must be plain or embed, got {:?}", presentation_raw))?;

        let timezone_raw = optional("TIP_TIMEZONE", "Europe/Stockholm");
        let timezone: Tz = timezone_raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("TIP_TIMEZONE is not a known timezone: {:?}", timezone_raw))?;

        let message_cap = parsed("MAX_MESSAGE_LENGTH", DEFAULT_MESSAGE_CAP)?;
        if !(MIN_MESSAGE_CAP..=DEFAULT_MESSAGE_CAP).contains(&message_cap) {
            return Err(anyhow!(
                "MAX_MESSAGE_LENGTH must be between {} and {}, got {}",
                MIN_MESSAGE_CAP,
                DEFAULT_MESSAGE_CAP,
                message_cap
            ));
        }

        let schedule = CronSchedule::parse(&optional("TIP_SCHEDULE", "0 9 * * *"))?;

        let mut topics = TopicTags::default();
        for (name, category) in [
            ("TOPICS_FRONTEND", Category::Frontend),
            ("TOPICS_BACKEND", Category::Backend),
            ("TOPICS_FULLSTACK", Category::Fullstack),
        ] {
            if let Ok(raw) = env::var(name) {
                topics.set(category, TopicTags::parse_list(&raw));
            }
        }

        Ok(Config {
            discord_token: required("DISCORD_TOKEN")?,
            tip_channel_id,
            provider,
            api_key,
            generator_model: optional("GENERATOR_MODEL", provider.default_generator_model()),
            verifier_model: optional("VERIFIER_MODEL", provider.default_verifier_model()),
            verification_enabled: parsed("TIP_VERIFICATION", true)?,
            temperature: parsed("TIP_TEMPERATURE", 1.5)?,
            selection,
            schedule,
            timezone,
            message_cap,
            presentation,
            request_timeout: Duration::from_secs(parsed("REQUEST_TIMEOUT_SECS", 60)?),
            database_path: optional("TIPS_DATABASE_PATH", "tips.db"),
            topics,
            log_level: optional("LOG_LEVEL", "info"),
        })
    }

    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            policy: self.selection,
            temperature: self.temperature,
            topics: self.topics.clone(),
            timezone: self.timezone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests share the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "DISCORD_TOKEN",
        "TIP_CHANNEL_ID",
        "GENERATION_PROVIDER",
        "OPENAI_API_KEY",
        "GOOGLE_API_KEY",
        "GENERATOR_MODEL",
        "VERIFIER_MODEL",
        "TIP_VERIFICATION",
        "TIP_TEMPERATURE",
        "TIP_SELECTION",
        "TIP_SCHEDULE",
        "TIP_TIMEZONE",
        "MAX_MESSAGE_LENGTH",
        "TIP_PRESENTATION",
        "REQUEST_TIMEOUT_SECS",
        "TIPS_DATABASE_PATH",
        "TOPICS_FRONTEND",
        "TOPICS_BACKEND",
        "TOPICS_FULLSTACK",
        "LOG_LEVEL",
    ];

    fn reset_env() {
        for name in ALL_VARS {
            env::remove_var(name);
        }
    }

    fn set_required() {
        env::set_var("DISCORD_TOKEN", "test_discord_token");
        env::set_var("TIP_CHANNEL_ID", "123456789");
        env::set_var("OPENAI_API_KEY", "test_openai_key");
    }

    #[test]
    fn test_config_from_env_missing_required() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();

        let result = Config::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        set_required();

        let config = Config::from_env().unwrap();
        assert_eq!(config.discord_token, "test_discord_token");
        assert_eq!(config.tip_channel_id, 123456789);
        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.api_key, "test_openai_key");
        assert_eq!(config.generator_model, "gpt-4o");
        assert!(config.verification_enabled);
        assert_eq!(config.temperature, 1.5);
        assert_eq!(config.selection, SelectionPolicy::Random);
        assert_eq!(config.schedule.as_str(), "0 9 * * *");
        assert_eq!(config.timezone, chrono_tz::Europe::Stockholm);
        assert_eq!(config.message_cap, 2000);
        assert_eq!(config.presentation, Presentation::Plain);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.database_path, "tips.db");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.topics, TopicTags::default());

        reset_env();
    }

    #[test]
    fn test_config_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        set_required();
        env::set_var("GENERATION_PROVIDER", "gemini");
        env::set_var("GOOGLE_API_KEY", "test_google_key");
        env::set_var("TIP_SELECTION", "weekday");
        env::set_var("TIP_VERIFICATION", "false");
        env::set_var("TIP_PRESENTATION", "embed");
        env::set_var("TIP_TIMEZONE", "America/New_York");
        env::set_var("TOPICS_BACKEND", "Rust, , Tokio");

        let config = Config::from_env().unwrap();
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.api_key, "test_google_key");
        assert_eq!(config.verifier_model, "gemini-1.5-flash");
        assert_eq!(config.selection, SelectionPolicy::WeekdayRotation);
        assert!(!config.verification_enabled);
        assert_eq!(config.presentation, Presentation::Embed);
        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert_eq!(config.topics.for_category(Category::Backend), ["Rust", "Tokio"]);

        let settings = config.agent_settings();
        assert_eq!(settings.policy, SelectionPolicy::WeekdayRotation);

        reset_env();
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        for (name, value) in [
            ("TIP_CHANNEL_ID", "general"),
            ("TIP_TIMEZONE", "Mars/Olympus_Mons"),
            ("TIP_SCHEDULE", "every morning"),
            ("TIP_SELECTION", "vibes"),
            ("MAX_MESSAGE_LENGTH", "lots"),
            ("MAX_MESSAGE_LENGTH", "0"),
            ("MAX_MESSAGE_LENGTH", "2"),
            ("MAX_MESSAGE_LENGTH", "2001"),
        ] {
            reset_env();
            set_required();
            env::set_var(name, value);
            assert!(Config::from_env().is_err(), "{}={}", name, value);
        }

        reset_env();
    }

    #[test]
    fn test_message_cap_bounds_are_accepted() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        for value in ["3", "2000"] {
            reset_env();
            set_required();
            env::set_var("MAX_MESSAGE_LENGTH", value);
            let config = Config::from_env().unwrap();
            assert_eq!(config.message_cap.to_string(), value);
        }

        reset_env();
    }
}
