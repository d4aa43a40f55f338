use crate::error::ValidationError;
use crate::CreatePaste;

/// Unsubmitted paste as entered by the author. Limits are kept as raw text so
/// that malformed input is reported instead of silently dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PasteDraft {
    pub content: String,
    pub ttl_seconds: Option<String>,
    pub max_views: Option<String>,
}

impl PasteDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ttl_seconds(mut self, ttl: impl Into<String>) -> Self {
        self.ttl_seconds = Some(ttl.into());
        self
    }

    #[must_use]
    pub fn max_views(mut self, max_views: impl Into<String>) -> Self {
        self.max_views = Some(max_views.into());
        self
    }

    /// Checks the draft and produces the request body to send.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule: blank content, then a TTL that is not
    /// a positive integer, then a view limit that is not a positive integer.
    pub fn validate(&self) -> Result<CreatePaste, ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }

        let ttl_seconds = parse_limit(self.ttl_seconds.as_deref(), ValidationError::InvalidTtl)?;
        let max_views = parse_limit(self.max_views.as_deref(), ValidationError::InvalidMaxViews)?;

        Ok(CreatePaste {
            content: self.content.clone(),
            ttl_seconds,
            max_views,
        })
    }
}

/// An empty field means "not set"; anything else must be an integer ≥ 1,
/// written as plain digits (`"1.0"` and `"1e3"` are rejected).
fn parse_limit(raw: Option<&str>, err: ValidationError) -> Result<Option<i64>, ValidationError> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(n) if n >= 1 => Ok(Some(n)),
            _ => Err(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn blank_content_is_rejected() {
        for content in ["", " ", "\n\t  "] {
            assert_eq!(
                PasteDraft::new(content).validate(),
                Err(ValidationError::EmptyContent)
            );
        }
    }

    #[test]
    fn content_is_sent_untrimmed() {
        let body = PasteDraft::new("  hello\n").validate().unwrap();
        assert_eq!(body.content, "  hello\n");
        assert_eq!(body.ttl_seconds, None);
        assert_eq!(body.max_views, None);
    }

    #[test]
    fn limits_must_be_positive_integers() {
        for bad in ["0", "-1", "1.5", "1.0", "abc", " ", "1e3"] {
            assert_eq!(
                PasteDraft::new("x").ttl_seconds(bad).validate(),
                Err(ValidationError::InvalidTtl),
                "ttl {:?}",
                bad
            );
            assert_eq!(
                PasteDraft::new("x").max_views(bad).validate(),
                Err(ValidationError::InvalidMaxViews),
                "max views {:?}",
                bad
            );
        }
    }

    #[test]
    fn empty_limits_are_unset() {
        let body = PasteDraft::new("x")
            .ttl_seconds("")
            .max_views("")
            .validate()
            .unwrap();
        assert_eq!(body.ttl_seconds, None);
        assert_eq!(body.max_views, None);
    }

    #[test]
    fn valid_limits_are_carried() {
        let body = PasteDraft::new("x")
            .ttl_seconds(" 60 ")
            .max_views("3")
            .validate();
        assert_matches!(
            body,
            Ok(CreatePaste {
                ttl_seconds: Some(60),
                max_views: Some(3),
                ..
            })
        );
    }

    #[test]
    fn content_is_checked_first() {
        assert_eq!(
            PasteDraft::new(" ").ttl_seconds("0").validate(),
            Err(ValidationError::EmptyContent)
        );
    }
}
