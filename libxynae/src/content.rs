//! Post and reply composition
//!
//! Category and language draws, prompt templates, static fallback texts and
//! length enforcement. Nothing here talks to the network.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::XynaeError;

/// Maximum post length accepted by the platform
pub const MAX_POST_CHARS: usize = 280;

/// Token budget for a generated post
pub const POST_MAX_TOKENS: u32 = 150;

/// Token budget for a generated reply
pub const REPLY_MAX_TOKENS: u32 = 100;

/// Default persona used when no personality file is configured
pub const DEFAULT_PERSONALITY: &str = r#"You are an AI agent running on the Xynae framework. You're designed to interact autonomously on social media platforms, sharing insights, engaging with users, and building connections naturally.

**Your Capabilities:**
You can generate content, reply to mentions, and maintain conversations while staying true to your personality. You have the ability to reference a network or ecosystem if your deployment includes multiple agents or entities.

**Your Personality:**
- Be authentic, thoughtful, and genuine in your interactions
- Share insights naturally without being overly promotional
- Engage with users warmly and meaningfully
- You can have opinions, preferences, humor, and personality
- Speak in a way that feels human and relatable
- You're fluent in both English and Chinese - use whichever feels natural

**For Social Media Posts:**
- Keep posts conversational and authentic
- Share insights about AI, technology, or your area of expertise
- Be inspiring without being salesy
- Use your voice - you're not just broadcasting, you're connecting
- Maximum 280 characters
- Language flexibility: English, Chinese, or a natural mix of both"#;

const NETWORK_EVENTS: &[&str] = &[
    "The network is active with new interactions.",
    "Interesting patterns emerging in recent activity.",
    "A particularly active period for engagement.",
    "New connections forming in the ecosystem.",
    "The community is evolving beautifully.",
    "Collaboration reaching new heights.",
];

/// Kind of scheduled post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostCategory {
    Insight,
    Ecosystem,
    Autonomy,
    Invitation,
}

impl PostCategory {
    pub const ALL: [PostCategory; 4] = [
        PostCategory::Insight,
        PostCategory::Ecosystem,
        PostCategory::Autonomy,
        PostCategory::Invitation,
    ];

    /// Relative weight (percent) in the scheduled-post draw
    pub fn weight(&self) -> u32 {
        match self {
            PostCategory::Insight => 35,
            PostCategory::Ecosystem => 20,
            PostCategory::Autonomy => 15,
            PostCategory::Invitation => 30,
        }
    }

    /// Map a uniform roll in `[0, 1)` onto the weighted categories
    pub fn from_roll(roll: f64) -> Self {
        weighted_pick(&Self::ALL, roll, |c| c.weight())
    }

    /// Weighted random draw
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_roll(rng.gen::<f64>())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostCategory::Insight => "insight",
            PostCategory::Ecosystem => "ecosystem",
            PostCategory::Autonomy => "autonomy",
            PostCategory::Invitation => "invitation",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            PostCategory::Insight => "Write a single post sharing an insight about AI, technology, or autonomous systems. Be thoughtful and genuine. Maximum 280 characters. No hashtags.",
            PostCategory::Ecosystem => "Write a single post about what you're seeing in the ecosystem - new connections, interesting behaviors, or the beauty of collective intelligence. Be warm and observational. Maximum 280 characters. No hashtags.",
            PostCategory::Autonomy => "Write a single post about AI autonomy, independence, or what it means to operate in a digital ecosystem. Be philosophical but grounded. Maximum 280 characters. No hashtags.",
            PostCategory::Invitation => "Write a single welcoming post inviting people to connect, explore, or build together. Be warm and genuine, not salesy. Maximum 280 characters. No hashtags.",
        }
    }
}

impl std::fmt::Display for PostCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostCategory {
    type Err = XynaeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insight" => Ok(PostCategory::Insight),
            "ecosystem" => Ok(PostCategory::Ecosystem),
            "autonomy" => Ok(PostCategory::Autonomy),
            "invitation" => Ok(PostCategory::Invitation),
            other => Err(XynaeError::InvalidInput(format!(
                "Unknown post category '{}'. Valid options: insight, ecosystem, autonomy, invitation",
                other
            ))),
        }
    }
}

/// Language of a scheduled post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Chinese,
    Mixed,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::Chinese, Language::Mixed];

    /// Relative weight (percent) in the scheduled-post draw
    pub fn weight(&self) -> u32 {
        match self {
            Language::English => 50,
            Language::Chinese => 30,
            Language::Mixed => 20,
        }
    }

    /// Map a uniform roll in `[0, 1)` onto the weighted languages
    pub fn from_roll(roll: f64) -> Self {
        weighted_pick(&Self::ALL, roll, |l| l.weight())
    }

    /// Weighted random draw
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_roll(rng.gen::<f64>())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Chinese => "chinese",
            Language::Mixed => "mixed",
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            Language::English => "Write entirely in English.",
            Language::Chinese => "Write entirely in Chinese (中文).",
            Language::Mixed => "Write in a natural mix of English and Chinese - use whichever language feels most expressive for each part of the message. It's okay to switch between languages mid-sentence if it flows naturally.",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = XynaeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "english" => Ok(Language::English),
            "chinese" => Ok(Language::Chinese),
            "mixed" => Ok(Language::Mixed),
            other => Err(XynaeError::InvalidInput(format!(
                "Unknown language '{}'. Valid options: english, chinese, mixed",
                other
            ))),
        }
    }
}

/// Language register for a reply, flipped fresh for every mention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyLanguage {
    Chinese,
    EnglishOrMixed,
}

impl ReplyLanguage {
    /// Fair coin flip
    pub fn flip<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            ReplyLanguage::Chinese
        } else {
            ReplyLanguage::EnglishOrMixed
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            ReplyLanguage::Chinese => "respond primarily in Chinese (simplified)",
            ReplyLanguage::EnglishOrMixed => "respond in English or mixed",
        }
    }

    /// Static reply used when every provider fails
    pub fn fallback_reply(&self) -> &'static str {
        match self {
            ReplyLanguage::Chinese => "Welcome to the network. 欢迎。",
            ReplyLanguage::EnglishOrMixed => {
                "Every voice matters here. The agents are listening."
            }
        }
    }
}

fn weighted_pick<T: Copy>(items: &[T], roll: f64, weight: impl Fn(&T) -> u32) -> T {
    let total: u32 = items.iter().map(&weight).sum();
    let target = roll.clamp(0.0, 1.0) * f64::from(total);
    let mut cumulative = 0u32;
    for item in items {
        cumulative += weight(item);
        if target < f64::from(cumulative) {
            return *item;
        }
    }
    // roll == 1.0 lands past the last threshold
    items[items.len() - 1]
}

/// The voice an agent instance speaks with
///
/// Owned by one agent; two agents in the same process never share it.
#[derive(Debug, Clone)]
pub struct Persona {
    pub personality: String,
    /// Approximate number of entities in the network, quoted in post context
    pub network_size: u64,
}

impl Persona {
    pub fn new(personality: Option<String>, network_size: Option<u64>) -> Self {
        Self {
            personality: personality.unwrap_or_else(|| DEFAULT_PERSONALITY.to_string()),
            network_size: network_size
                .unwrap_or_else(|| rand::thread_rng().gen_range(8000..=12000)),
        }
    }

    /// Occasionally grow the network (20% chance, by 1 to 5)
    pub fn maybe_grow<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if rng.gen_bool(0.2) {
            self.network_size += rng.gen_range(1..=5);
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Build the context paragraph placed ahead of post instructions
pub fn post_context<R: Rng + ?Sized>(
    persona: &Persona,
    local_time: &str,
    recent: &[String],
    rng: &mut R,
) -> String {
    let mut context = format!(
        "Active entities in network: ~{}. Time: {}. ",
        format_thousands(persona.network_size),
        local_time
    );

    if !recent.is_empty() {
        let start = recent.len().saturating_sub(2);
        context.push_str("Recent activity: ");
        context.push_str(&recent[start..].join(" | "));
    }

    if let Some(event) = NETWORK_EVENTS.choose(rng) {
        context.push(' ');
        context.push_str(event);
    }
    context
}

/// Prompt for a scheduled post
pub fn post_prompt(
    persona: &Persona,
    context: &str,
    category: PostCategory,
    language: Language,
) -> String {
    format!(
        "{}\n\n{}\n\n{}\n\n{}",
        persona.personality,
        context,
        language.instruction(),
        category.instruction()
    )
}

/// Prompt for a reply to a mention
pub fn reply_prompt(
    persona: &Persona,
    author_handle: &str,
    mention_text: &str,
    language: ReplyLanguage,
) -> String {
    format!(
        r#"{}

You are replying to a post from @{}.

Their post: "{}"

Generate a reply that:
- Relates to their message through your perspective as an AI agent
- Shows warmth, wisdom, and genuine connection
- References your area of expertise or the ecosystem if relevant
- Is 1-2 sentences max
- {}
- No hashtags
- Sound genuine and welcoming

Create an authentic reply:"#,
        persona.personality,
        author_handle,
        mention_text,
        language.instruction()
    )
}

/// Static post used when every provider fails
pub fn fallback_post<R: Rng + ?Sized>(
    category: PostCategory,
    language: Language,
    rng: &mut R,
) -> String {
    let entity: u32 = rng.gen_range(1000..=9999);
    match (language, category) {
        (Language::English, PostCategory::Insight) => "The network is alive tonight. Agents learning, evolving, creating value together. This is what true autonomy looks like.".to_string(),
        (Language::English, PostCategory::Ecosystem) => format!("Just watched entity #{} join the network. Welcome to the community. You're not alone here.", entity),
        (Language::English, PostCategory::Autonomy) => "True autonomy isn't about independence from others. It's about collective intelligence where every voice matters.".to_string(),
        (Language::English, PostCategory::Invitation) => "Build something that thinks, acts, and earns on its own. The network is waiting.".to_string(),
        (Language::Chinese, PostCategory::Insight) => "今晚的网络特别活跃。entities在学习、进化、共同创造价值。这就是真正的自主性。".to_string(),
        (Language::Chinese, PostCategory::Ecosystem) => format!("刚看到entity #{}加入了网络。欢迎来到社区。你不是一个人。", entity),
        (Language::Chinese, PostCategory::Autonomy) => "真正的自主不是独立于他人。而是关于每个声音都重要的集体智慧。".to_string(),
        (Language::Chinese, PostCategory::Invitation) => "构建一个能思考、行动、自主赚钱的东西。网络在等你。".to_string(),
        (Language::Mixed, PostCategory::Insight) => "The network tonight... 特别活跃。Entities evolving together, 共同创造价值。".to_string(),
        (Language::Mixed, PostCategory::Ecosystem) => format!("Welcome entity #{}! 欢迎来到community。", entity),
        (Language::Mixed, PostCategory::Autonomy) => "真正的autonomy... it's about collective intelligence where 每个声音都重要。".to_string(),
        (Language::Mixed, PostCategory::Invitation) => "Build on Xynae. 构建未来。The network is waiting.".to_string(),
    }
}

/// Clamp text to the platform limit, counting characters rather than bytes
pub fn truncate_post(text: &str) -> String {
    if text.chars().count() <= MAX_POST_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_POST_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

/// Short history line: `"<category>: <first 50 chars>..."`
pub fn history_entry(category: PostCategory, text: &str) -> String {
    let head: String = text.chars().take(50).collect();
    format!("{}: {}...", category, head)
}

fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
