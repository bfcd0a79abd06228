//! Canned replies served while the backend is unreachable.

use crate::classify::contains_token;
use crate::types::ChatRequest;

/// Keyword table mapping request wording to a canned reply.
struct ReplyPattern {
    keywords: &'static [&'static str],
    reply: &'static str,
}

/// Produces a deterministic, content-aware reply when the circuit is open
/// or the backend has failed terminally.
///
/// Matching is case-insensitive over the first user-visible segment and
/// respects word boundaries; the first table that matches wins. Scheduling
/// comes first, the assistant's home turf: "cancel the meeting" reads as a
/// scheduling request.
///
/// Never calls the backend, the cache, or mutates breaker state.
pub struct FallbackResponder {
    patterns: &'static [ReplyPattern],
    default_reply: &'static str,
}

const PATTERNS: &[ReplyPattern] = &[
    ReplyPattern {
        keywords: &[
            "schedule",
            "meeting",
            "calendar",
            "appointment",
            "book",
            "sync",
            "reschedule",
            "availability",
        ],
        reply: "I'm having trouble reaching my scheduling assistant right now. \
                I've noted your request and will confirm the meeting details as \
                soon as the service recovers. Please try again in a few minutes.",
    },
    ReplyPattern {
        keywords: &["cancel", "call off", "delete", "remove"],
        reply: "I can't confirm that cancellation just yet because my assistant \
                is temporarily unavailable. Nothing has been changed. Please try \
                again shortly and I'll take care of it.",
    },
    ReplyPattern {
        keywords: &["hello", "hi", "hey", "good morning", "good afternoon", "good evening"],
        reply: "Hello! I'm running in a limited mode at the moment, so I can't \
                help with much just yet. Please check back in a little while.",
    },
];

const DEFAULT_REPLY: &str = "I'm temporarily unable to process requests. \
                             Please try again in a few minutes.";

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackResponder {
    pub fn new() -> Self {
        Self { patterns: PATTERNS, default_reply: DEFAULT_REPLY }
    }

    /// Pick the canned reply for a request.
    pub fn respond(&self, request: &ChatRequest) -> String {
        let text = match request.first_user_text() {
            Some(text) => text.to_lowercase(),
            None => return self.default_reply.to_string(),
        };

        for pattern in self.patterns {
            if pattern.keywords.iter().any(|keyword| contains_token(&text, keyword)) {
                return pattern.reply.to_string();
            }
        }

        self.default_reply.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageSegment, ModelTier};

    fn request(content: &str) -> ChatRequest {
        ChatRequest::priority(vec![MessageSegment::user(content)], ModelTier::Light)
    }

    #[test]
    fn test_scheduling_reply() {
        let responder = FallbackResponder::new();
        let reply = responder.respond(&request("Can you schedule a sync with Dana?"));
        assert!(reply.contains("scheduling assistant"));
    }

    #[test]
    fn test_greeting_reply() {
        let responder = FallbackResponder::new();
        let reply = responder.respond(&request("Hey there"));
        assert!(reply.contains("limited mode"));
    }

    #[test]
    fn test_cancellation_reply() {
        let responder = FallbackResponder::new();
        let reply = responder.respond(&request("please call off tomorrow's review"));
        assert!(reply.contains("cancellation"));
    }

    #[test]
    fn test_generic_reply() {
        let responder = FallbackResponder::new();
        let reply = responder.respond(&request("what's the weather like?"));
        assert_eq!(reply, DEFAULT_REPLY);
    }

    #[test]
    fn test_case_insensitive() {
        let responder = FallbackResponder::new();
        let reply = responder.respond(&request("SCHEDULE A MEETING"));
        assert!(reply.contains("scheduling assistant"));
    }

    #[test]
    fn test_scheduling_outranks_cancellation() {
        let responder = FallbackResponder::new();
        let reply = responder.respond(&request("cancel the meeting on Friday"));
        assert!(reply.contains("scheduling assistant"));
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let responder = FallbackResponder::new();
        // "hi" inside "this"/"ship" and "book" inside "rebooking" must not
        // pick a table.
        let reply = responder.respond(&request("this ship needs repairs"));
        assert_eq!(reply, DEFAULT_REPLY);
        let reply = responder.respond(&request("why did the rebooking fail?"));
        assert_eq!(reply, DEFAULT_REPLY);
        // A bare greeting still matches.
        let reply = responder.respond(&request("hi"));
        assert!(reply.contains("limited mode"));
    }

    #[test]
    fn test_empty_request_gets_generic_reply() {
        let responder = FallbackResponder::new();
        let reply = responder.respond(&ChatRequest::priority(vec![], ModelTier::Light));
        assert_eq!(reply, DEFAULT_REPLY);
    }
}
