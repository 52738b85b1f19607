//! Prompt rewriting for the video-generation provider.
//!
//! The provider tends to stretch or letterbox portrait output unless the prompt
//! itself asks for vertical framing, so portrait requests get fixed keyword
//! clauses appended before submission.

const VERTICAL_KEYWORDS: &[&str] = &[
    "vertical video format",
    "portrait orientation",
    "mobile-friendly",
    "social media content",
    "no distortion",
    "proper aspect ratio",
    "9:16 aspect ratio",
    "TikTok format",
    "Instagram Reels format",
];

/// Clauses appended to every portrait prompt
const VERTICAL_COMPOSITION: &str = "cinematic composition for vertical format, dynamic movement suitable for mobile viewing, high contrast and vibrant colors for social media engagement";

/// Clauses appended to every landscape prompt
const HORIZONTAL_COMPOSITION: &str =
    "cinematic composition, high quality, smooth motion, professional lighting";

/// Append the first four vertical keywords unless the prompt already carries any of them
pub fn optimize_for_vertical(prompt: &str) -> String {
    let lowered = prompt.to_lowercase();
    let has_vertical_keywords = VERTICAL_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()));

    if has_vertical_keywords {
        prompt.to_string()
    } else {
        format!("{}, {}", prompt, VERTICAL_KEYWORDS[..4].join(", "))
    }
}

pub fn vertical_prompt(prompt: &str) -> String {
    format!("{}, {}", optimize_for_vertical(prompt), VERTICAL_COMPOSITION)
}

pub fn horizontal_prompt(prompt: &str) -> String {
    format!("{}, {}", prompt, HORIZONTAL_COMPOSITION)
}

/// Build the hook prompt for a free-form topic
pub fn hook_prompt_for_topic(topic: &str) -> String {
    format!(
        "cinematic 5s intro of {} for TikTok, vibrant colors, dynamic camera movement, high quality",
        topic.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_keywords_appended_once() {
        let rewritten = optimize_for_vertical("test");
        assert_eq!(
            rewritten,
            "test, vertical video format, portrait orientation, mobile-friendly, social media content"
        );
        assert_eq!(optimize_for_vertical(&rewritten), rewritten);
    }

    #[test]
    fn test_existing_keyword_is_detected_case_insensitively() {
        let prompt = "city lights in TIKTOK FORMAT";
        assert_eq!(optimize_for_vertical(prompt), prompt);
    }

    #[test]
    fn test_vertical_prompt_adds_composition() {
        let prompt = vertical_prompt("test");
        assert!(prompt.starts_with("test, vertical video format"));
        assert!(prompt.ends_with("social media engagement"));
    }

    #[test]
    fn test_horizontal_prompt() {
        assert_eq!(
            horizontal_prompt("ocean"),
            "ocean, cinematic composition, high quality, smooth motion, professional lighting"
        );
    }

    #[test]
    fn test_topic_prompt() {
        assert!(hook_prompt_for_topic(" cooking ").contains("intro of cooking for TikTok"));
    }
}
