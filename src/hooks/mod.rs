//! Hook templates: short prompts that set the tone of the generated intro.

use serde::Serialize;

use crate::providers::prompt::hook_prompt_for_topic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookTemplate {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub prompt: &'static str,
    pub category: &'static str,
}

pub const HOOK_TEMPLATES: &[HookTemplate] = &[
    HookTemplate {
        id: "trending",
        title: "Trending Hook",
        description: "Eye-catching intro for viral content",
        prompt: "cinematic 5s intro of trending social media content for TikTok, vibrant colors, dynamic camera movement, high quality",
        category: "social-media",
    },
    HookTemplate {
        id: "lifestyle",
        title: "Lifestyle Hook",
        description: "Perfect for lifestyle and personal content",
        prompt: "cinematic 5s intro of lifestyle and daily routine for TikTok, warm lighting, smooth transitions, high quality",
        category: "lifestyle",
    },
    HookTemplate {
        id: "energetic",
        title: "Energetic Hook",
        description: "High-energy intro for dynamic content",
        prompt: "cinematic 5s intro of energetic and fast-paced content for TikTok, bold colors, rapid cuts, high quality",
        category: "entertainment",
    },
    HookTemplate {
        id: "storytelling",
        title: "Storytelling Hook",
        description: "Dramatic storytelling intro with emotional impact",
        prompt: "dramatic 5s storytelling intro with emotional music, cinematic lighting, compelling narrative setup, high contrast visuals, professional cinematography, engaging story hook",
        category: "storytelling",
    },
    HookTemplate {
        id: "educational",
        title: "Educational Hook",
        description: "Clear and engaging educational content intro",
        prompt: "engaging 5s educational intro with clear visuals, professional presentation style, informative graphics, clean typography, high quality production",
        category: "educational",
    },
    HookTemplate {
        id: "product-showcase",
        title: "Product Showcase",
        description: "Professional product demonstration intro",
        prompt: "professional 5s product showcase intro, clean product presentation, studio lighting, high quality product shots, commercial quality",
        category: "commercial",
    },
    HookTemplate {
        id: "comedy",
        title: "Comedy Hook",
        description: "Funny and entertaining content intro",
        prompt: "funny 5s comedy intro, humorous setup, entertaining visuals, comedic timing, high quality funny content, laughter-inducing hook",
        category: "entertainment",
    },
];

/// The hook chosen for a run: a catalogue entry or a free-form topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookSelection {
    pub id: String,
    pub prompt: String,
}

impl HookSelection {
    pub fn topic(topic: &str) -> Self {
        Self {
            id: "custom".to_string(),
            prompt: hook_prompt_for_topic(topic),
        }
    }
}

impl From<&HookTemplate> for HookSelection {
    fn from(hook: &HookTemplate) -> Self {
        Self {
            id: hook.id.to_string(),
            prompt: hook.prompt.to_string(),
        }
    }
}

/// Look up a hook by id (case-insensitive)
pub fn find_hook(id: &str) -> Option<&'static HookTemplate> {
    let id = id.trim();
    HOOK_TEMPLATES
        .iter()
        .find(|hook| hook.id.eq_ignore_ascii_case(id))
}

/// Comma-separated list of known hook ids, for error messages
pub fn hook_ids() -> String {
    HOOK_TEMPLATES
        .iter()
        .map(|hook| hook.id)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<_> = HOOK_TEMPLATES.iter().map(|h| h.id).collect();
        assert_eq!(ids.len(), HOOK_TEMPLATES.len());
    }

    #[test]
    fn test_find_hook() {
        assert_eq!(find_hook("trending").unwrap().title, "Trending Hook");
        assert_eq!(find_hook(" Energetic ").unwrap().id, "energetic");
        assert!(find_hook("missing").is_none());
    }

    #[test]
    fn test_every_prompt_is_a_five_second_intro() {
        for hook in HOOK_TEMPLATES {
            assert!(hook.prompt.contains("5s"), "{}", hook.id);
        }
    }

    #[test]
    fn test_topic_selection() {
        let selection = HookSelection::topic("  morning coffee ");
        assert_eq!(selection.id, "custom");
        assert!(selection.prompt.starts_with("cinematic 5s intro of morning coffee for TikTok"));

        let from_catalogue = HookSelection::from(find_hook("comedy").unwrap());
        assert_eq!(from_catalogue.id, "comedy");
    }

    #[test]
    fn test_hook_ids_listing() {
        assert!(hook_ids().starts_with("trending, lifestyle, energetic"));
    }
}
