//! Operator-facing notification text (SPEC_FULL §11: "distinct notification templates per
//! outcome"), grounded on `scheduler.py`'s four-way split between immediate success, recurring
//! success, retry-scheduled, and permanent failure messages.

use std::time::Duration;

pub fn success(recurring: bool) -> String {
    if recurring {
        "Post published successfully. (recurring)".to_string()
    } else {
        "Post published successfully.".to_string()
    }
}

pub fn retry_scheduled(attempt: u32, wait: Duration) -> String {
    format!(
        "Publish attempt {attempt} failed; retrying in {}s.",
        wait.as_secs()
    )
}

pub fn permanent_failure(operator_guidance: &str) -> String {
    format!("Post failed permanently. {operator_guidance}")
}

pub fn access_denied() -> String {
    "Post failed: you no longer have access to this channel.".to_string()
}

pub fn media_missing() -> String {
    "Post failed: the media file could not be found on disk.".to_string()
}

pub fn delayed(post_id: i64) -> String {
    format!("Post {post_id} was overdue and has been rescheduled shortly.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_templates_differ_for_recurring() {
        assert!(success(true).contains("(recurring)"));
        assert!(!success(false).contains("(recurring)"));
    }

    #[test]
    fn retry_template_includes_attempt_and_wait() {
        let text = retry_scheduled(2, Duration::from_secs(10));
        assert!(text.contains('2'));
        assert!(text.contains("10s"));
    }
}
