use crate::agent::{DailyTip, FALLBACK_TIP};
use serenity::builder::CreateEmbed;
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::id::ChannelId;
use serenity::model::Timestamp;

/// Discord's limit for a plain message.
pub const DEFAULT_MESSAGE_CAP: usize = 2000;
/// Discord's limit for an embed description.
pub const EMBED_DESCRIPTION_CAP: usize = 4096;

const TRUNCATION_MARKER: &str = "...";
/// Smallest cap that still leaves room for the truncation marker.
pub const MIN_MESSAGE_CAP: usize = TRUNCATION_MARKER.len();

/// How a tip is rendered in the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Presentation {
    #[default]
    Plain,
    Embed,
}

impl Presentation {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "plain" | "text" => Some(Presentation::Plain),
            "embed" => Some(Presentation::Embed),
            _ => None,
        }
    }
}

/// Cuts `text` to at most `cap` characters, ending in `...` when shortened.
/// Counts characters, not bytes, so multi-byte text is never split.
pub fn truncate_message(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }

    if cap < TRUNCATION_MARKER.len() {
        return text.chars().take(cap).collect();
    }

    let keep = cap - TRUNCATION_MARKER.len();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

fn tip_body(daily: &DailyTip) -> &str {
    if daily.tip.trim().is_empty() {
        FALLBACK_TIP
    } else {
        &daily.tip
    }
}

/// `prefix` and tip on separate lines, capped as a whole.
pub fn render_plain(daily: &DailyTip, cap: usize) -> String {
    truncate_message(&format!("{}\n{}", daily.prefix, tip_body(daily)), cap)
}

pub fn tip_embed(daily: &DailyTip) -> CreateEmbed {
    let mut embed = CreateEmbed::default();
    embed
        .title(&daily.prefix)
        .description(truncate_message(tip_body(daily), EMBED_DESCRIPTION_CAP))
        .field("Category", daily.category, true)
        .field("Difficulty", daily.difficulty, true)
        .timestamp(Timestamp::now());
    embed
}

/// Sends `daily` to `channel` in the chosen presentation.
pub async fn post_tip(
    http: impl AsRef<Http>,
    channel: ChannelId,
    daily: &DailyTip,
    presentation: Presentation,
    cap: usize,
) -> serenity::Result<Message> {
    match presentation {
        Presentation::Plain => channel.say(http, render_plain(daily, cap)).await,
        Presentation::Embed => {
            let embed = tip_embed(daily);
            channel.send_message(http, |m| m.set_embed(embed)).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{Category, Difficulty};

    #[test]
    fn test_short_text_is_unchanged() {
        assert_eq!(truncate_message("Use const.", 2000), "Use const.");
        let exact = "a".repeat(2000);
        assert_eq!(truncate_message(&exact, 2000), exact);
    }

    #[test]
    fn test_long_text_is_capped_with_marker() {
        let long = "b".repeat(2500);
        let out = truncate_message(&long, 2000);
        assert_eq!(out.chars().count(), 2000);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_cap_below_marker_length_is_respected() {
        for cap in 0..3 {
            let out = truncate_message("hello world", cap);
            assert!(out.chars().count() <= cap, "cap={} out={:?}", cap, out);
        }
        assert_eq!(truncate_message("hello world", 2), "he");
        assert_eq!(truncate_message("hello world", 3), "...");
    }

    #[test]
    fn test_truncation_counts_characters() {
        let long = "ö".repeat(30);
        let out = truncate_message(&long, 10);
        assert_eq!(out, format!("{}...", "ö".repeat(7)));
    }

    #[test]
    fn test_plain_rendering() {
        let daily = DailyTip::new(Category::Frontend, Difficulty::Medium, "Use CSS grid for layouts.");
        assert_eq!(
            render_plain(&daily, DEFAULT_MESSAGE_CAP),
            "💡 **Today's medium frontend tip:**\nUse CSS grid for layouts."
        );

        let long = DailyTip::new(Category::Backend, Difficulty::Medium, "x".repeat(3000));
        let out = render_plain(&long, DEFAULT_MESSAGE_CAP);
        assert_eq!(out.chars().count(), DEFAULT_MESSAGE_CAP);
        assert!(out.starts_with("🛠️ **Today's medium backend tip:**\n"));
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_blank_tip_renders_fallback() {
        let daily = DailyTip::new(Category::Fullstack, Difficulty::Beginner, "  ");
        assert!(render_plain(&daily, DEFAULT_MESSAGE_CAP).ends_with(FALLBACK_TIP));
    }

    #[test]
    fn test_presentation_names() {
        assert_eq!(Presentation::from_str("embed"), Some(Presentation::Embed));
        assert_eq!(Presentation::from_str("Plain"), Some(Presentation::Plain));
        assert_eq!(Presentation::from_str("carousel"), None);
    }

    #[test]
    fn test_embed_fields() {
        let daily = DailyTip::new(Category::Fullstack, Difficulty::Advanced, "y".repeat(5000));
        let embed = tip_embed(&daily);

        assert_eq!(embed.0["title"], "🌐 **Today's advanced fullstack tip:**");
        let description = embed.0["description"].as_str().unwrap();
        assert_eq!(description.chars().count(), EMBED_DESCRIPTION_CAP);
        let fields = embed.0["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["value"], "fullstack");
        assert_eq!(fields[1]["value"], "advanced");
        assert!(embed.0.contains_key("timestamp"));
    }
}
