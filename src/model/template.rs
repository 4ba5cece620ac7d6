//! Path templates: the parsed form of rule patterns
//!
//! A rule pattern such as `shared:<center>/<subject>/t1mri_<acquisition>`
//! splits into an optional directory tag (`shared`) and slash-separated
//! segments whose `<attribute>` / `<attribute|regex>` placeholders are parsed
//! once at import time. Both translators work from the token form; the raw
//! text only survives for display.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{ModelError, ModelResult};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z_][A-Za-z0-9_]*)(?:\|([^>]+))?>").unwrap());

static DIRECTORY_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_\-]*):(.+)$").unwrap());

/// One lexical element of a path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateToken {
    /// Verbatim text
    Literal(String),
    /// `<attribute>` or `<attribute|regex>` placeholder
    Placeholder {
        attribute: String,
        /// Custom sub-pattern from the `<attribute|regex>` form
        pattern: Option<String>,
    },
}

/// One `/`-separated segment of a path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTemplate {
    raw: String,
    tokens: Vec<TemplateToken>,
}

impl SegmentTemplate {
    /// Parse a single segment into tokens
    pub fn parse(raw: &str) -> ModelResult<Self> {
        let mut tokens = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(raw) {
            let whole = caps.get(0).unwrap();
            if whole.start() > last {
                push_literal(&mut tokens, &raw[last..whole.start()], raw)?;
            }
            tokens.push(TemplateToken::Placeholder {
                attribute: caps[1].to_string(),
                pattern: caps.get(2).map(|m| m.as_str().to_string()),
            });
            last = whole.end();
        }
        if last < raw.len() {
            push_literal(&mut tokens, &raw[last..], raw)?;
        }
        Ok(Self {
            raw: raw.to_string(),
            tokens,
        })
    }

    /// The segment's source text
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The segment's parsed tokens
    pub fn tokens(&self) -> &[TemplateToken] {
        &self.tokens
    }
}

/// Reject segments with leftover placeholder syntax in literal parts
fn push_literal(tokens: &mut Vec<TemplateToken>, text: &str, raw: &str) -> ModelResult<()> {
    if text.contains('<') || text.contains('>') {
        return Err(ModelError::BadPlaceholder(raw.to_string()));
    }
    tokens.push(TemplateToken::Literal(text.to_string()));
    Ok(())
}

/// A parsed rule pattern: ordered path segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<SegmentTemplate>,
}

impl PathTemplate {
    /// Parse a pattern, splitting off an optional leading `directory_tag:`
    /// prefix.
    pub fn parse(pattern: &str) -> ModelResult<(Option<String>, Self)> {
        let (directory, path) = match DIRECTORY_TAG.captures(pattern) {
            Some(caps) => (Some(caps[1].to_string()), caps.get(2).unwrap().as_str()),
            None => (None, pattern),
        };
        if path.is_empty() {
            return Err(ModelError::BadPlaceholder(pattern.to_string()));
        }
        let segments = path
            .split('/')
            .map(SegmentTemplate::parse)
            .collect::<ModelResult<Vec<_>>>()?;
        Ok((directory, Self { segments }))
    }

    /// The template's segments, outermost directory first
    pub fn segments(&self) -> &[SegmentTemplate] {
        &self.segments
    }

    /// Attributes referenced by placeholders, in order of appearance
    /// (repeats included)
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().flat_map(|s| {
            s.tokens.iter().filter_map(|t| match t {
                TemplateToken::Placeholder { attribute, .. } => Some(attribute.as_str()),
                TemplateToken::Literal(_) => None,
            })
        })
    }

    /// Substitute every placeholder through `lookup`, producing a relative
    /// path. Returns `None` when any placeholder has no value.
    pub(crate) fn substitute(
        &self,
        mut lookup: impl FnMut(&str) -> Option<String>,
    ) -> Option<String> {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('/');
            }
            for token in &segment.tokens {
                match token {
                    TemplateToken::Literal(text) => out.push_str(text),
                    TemplateToken::Placeholder { attribute, .. } => {
                        out.push_str(&lookup(attribute)?)
                    }
                }
            }
        }
        Some(out)
    }
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", segment.raw)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_segments() {
        let (dir, template) = PathTemplate::parse("data/<subject>/t1").unwrap();
        assert!(dir.is_none());
        assert_eq!(template.segments().len(), 3);
        assert_eq!(template.attributes().collect::<Vec<_>>(), ["subject"]);
    }

    #[test]
    fn test_parse_directory_tag() {
        let (dir, template) = PathTemplate::parse("shared:<center>/<subject>").unwrap();
        assert_eq!(dir.as_deref(), Some("shared"));
        assert_eq!(template.segments().len(), 2);
    }

    #[test]
    fn test_parse_custom_regex_placeholder() {
        let (_, template) = PathTemplate::parse("<subject|s[0-9]+>_raw").unwrap();
        let tokens = template.segments()[0].tokens();
        assert_eq!(
            tokens[0],
            TemplateToken::Placeholder {
                attribute: "subject".to_string(),
                pattern: Some("s[0-9]+".to_string()),
            }
        );
        assert_eq!(tokens[1], TemplateToken::Literal("_raw".to_string()));
    }

    #[test]
    fn test_parse_unterminated_placeholder() {
        assert!(matches!(
            PathTemplate::parse("data/<subject"),
            Err(ModelError::BadPlaceholder(_))
        ));
    }

    #[test]
    fn test_substitute() {
        let (_, template) = PathTemplate::parse("data/<subject>_<session>").unwrap();
        let path = template
            .substitute(|attr| match attr {
                "subject" => Some("S1".to_string()),
                "session" => Some("a".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(path, "data/S1_a");
    }

    #[test]
    fn test_substitute_missing_attribute() {
        let (_, template) = PathTemplate::parse("data/<subject>").unwrap();
        assert!(template.substitute(|_| None).is_none());
    }

    #[test]
    fn test_display_round_trips() {
        let source = "<center>/<subject>/t1mri_<acquisition|a.*>";
        let (_, template) = PathTemplate::parse(source).unwrap();
        assert_eq!(template.to_string(), source);
    }
}
