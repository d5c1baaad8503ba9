//! Restricted substitution templates over [`EventView`].
//!
//! The language is a small subset of Go-style text templates:
//!
//! - literal text is copied verbatim;
//! - `{{ .Kind.Name }}` substitutes an event field;
//! - `{{- ` and ` -}}` trim whitespace before or after the action;
//! - `{{/* ... */}}` is a comment and produces no output.
//!
//! Field paths are resolved at compile time against the fixed set in
//! [`EventField`]. Anything else (pipelines, function calls, control
//! structures, unknown fields) is a compile error, so an executed template
//! can only ever read those fields.

use std::borrow::Cow;
use std::str::FromStr;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::event::EventView;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Error produced when a template source cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// An action was opened but never closed.
    #[error("unclosed action at byte {0}")]
    UnclosedAction(usize),
    /// An action contains nothing.
    #[error("empty action at byte {0}")]
    EmptyAction(usize),
    /// An action is not a plain field path.
    #[error("unsupported action {0:?}")]
    UnsupportedAction(String),
    /// A field path does not name an exposed event field.
    #[error("unknown field {0:?}")]
    UnknownField(String),
}

/// Event fields exposed to templates, keyed by their dotted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Display, EnumIter, EnumString, IntoStaticStr)]
pub enum EventField {
    #[strum(serialize = "UniqueID")]
    UniqueId,
    #[strum(serialize = "StartTime")]
    StartTime,
    #[strum(serialize = "EndTime")]
    EndTime,
    #[strum(serialize = "Target.Type")]
    TargetType,
    #[strum(serialize = "Target.Value")]
    TargetValue,
    #[strum(serialize = "Kind.Type")]
    KindType,
    #[strum(serialize = "Kind.Name")]
    KindName,
    #[strum(serialize = "Owner.Type")]
    OwnerType,
    #[strum(serialize = "Owner.Name")]
    OwnerName,
    #[strum(serialize = "Error")]
    Error,
    #[strum(serialize = "Cancelable")]
    Cancelable,
    #[strum(serialize = "Running")]
    Running,
}

impl EventField {
    /// Reads this field from `event` as text.
    pub fn project(self, event: &EventView) -> Cow<'_, str> {
        match self {
            Self::UniqueId => Cow::Owned(event.unique_id.to_string()),
            Self::StartTime => Cow::Owned(event.start_time.to_string()),
            Self::EndTime => event
                .end_time
                .map_or(Cow::Borrowed(""), |t| Cow::Owned(t.to_string())),
            Self::TargetType => Cow::Borrowed(&event.target.target_type),
            Self::TargetValue => Cow::Borrowed(&event.target.value),
            Self::KindType => Cow::Borrowed(&event.kind.kind_type),
            Self::KindName => Cow::Borrowed(&event.kind.name),
            Self::OwnerType => Cow::Borrowed(&event.owner.owner_type),
            Self::OwnerName => Cow::Borrowed(&event.owner.name),
            Self::Error => Cow::Borrowed(&event.error),
            Self::Cancelable => Cow::Borrowed(bool_str(event.cancelable)),
            Self::Running => Cow::Borrowed(bool_str(event.running)),
        }
    }
}

const fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(EventField),
}

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Compiles a template source.
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find(OPEN) {
            let position = source.len() - rest.len() + open;
            let mut text = &rest[..open];
            let after_open = &rest[open + OPEN.len()..];

            let trim_left = has_trim_marker(after_open);
            let close = after_open
                .find(CLOSE)
                .ok_or(TemplateError::UnclosedAction(position))?;

            let mut inner = &after_open[usize::from(trim_left)..close];
            let trim_right = inner
                .strip_suffix('-')
                .is_some_and(|s| s.ends_with(char::is_whitespace));
            if trim_right {
                inner = &inner[..inner.len() - 1];
            }

            if trim_left {
                text = text.trim_end();
            }
            push_text(&mut segments, text);

            if let Some(field) = parse_action(inner, position)? {
                segments.push(Segment::Field(field));
            }

            rest = &after_open[close + CLOSE.len()..];
            if trim_right {
                rest = rest.trim_start();
            }
        }

        push_text(&mut segments, rest);
        Ok(Self { segments })
    }

    /// Renders the template against `event`.
    pub fn execute(&self, event: &EventView) -> String {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Field(field) => output.push_str(&field.project(event)),
            }
        }
        output
    }

    /// Returns the fields this template reads, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = EventField> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(field) => Some(*field),
            Segment::Text(_) => None,
        })
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::compile(source)
    }
}

/// A `-` directly after `{{` followed by whitespace trims the preceding text.
fn has_trim_marker(after_open: &str) -> bool {
    after_open
        .strip_prefix('-')
        .is_some_and(|s| s.starts_with(char::is_whitespace))
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    match segments.last_mut() {
        Some(Segment::Text(previous)) => previous.push_str(text),
        _ => segments.push(Segment::Text(text.to_owned())),
    }
}

/// Parses the inside of an action. Comments yield `None`.
fn parse_action(inner: &str, position: usize) -> Result<Option<EventField>, TemplateError> {
    let action = inner.trim();
    if action.is_empty() {
        return Err(TemplateError::EmptyAction(position));
    }

    if action.starts_with("/*") && action.ends_with("*/") && action.len() >= 4 {
        return Ok(None);
    }

    let path = action
        .strip_prefix('.')
        .filter(|path| !path.is_empty() && !path.contains(char::is_whitespace))
        .ok_or_else(|| TemplateError::UnsupportedAction(action.to_owned()))?;

    EventField::from_str(path)
        .map(Some)
        .map_err(|_| TemplateError::UnknownField(path.to_owned()))
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::event::{Kind, Owner, Target};

    fn event() -> EventView {
        EventView::new(
            Target::new("app", "myapp"),
            Kind::new("app.update.env.set"),
            Owner::new("user", "me@me.com"),
        )
        .finish(None)
    }

    #[test]
    fn test_substitutes_fields() {
        let template = Template::compile(
            "{{.Kind.Name}} event for {{.Target.Type}} named {{.Target.Value}}",
        )
        .unwrap();

        assert_eq!(
            template.execute(&event()),
            "app.update.env.set event for app named myapp"
        );
    }

    #[test]
    fn test_spaces_inside_actions() {
        let template = Template::compile("by {{ .Owner.Name }} ({{ .Owner.Type }})").unwrap();
        assert_eq!(template.execute(&event()), "by me@me.com (user)");
    }

    #[test]
    fn test_trim_markers() {
        let template = Template::compile("kind:  \n {{- .Kind.Type -}} \n  !").unwrap();
        assert_eq!(template.execute(&event()), "kind:app!");
    }

    #[test]
    fn test_comment_produces_nothing() {
        let template = Template::compile("a{{/* ignored */}}b").unwrap();
        assert_eq!(template.execute(&event()), "ab");
        assert_eq!(template.fields().count(), 0);
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        let template = Template::compile("just text } {").unwrap();
        assert_eq!(template.execute(&event()), "just text } {");
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(
            Template::compile("ahoy {{ --"),
            Err(TemplateError::UnclosedAction(5))
        );
        assert_eq!(
            Template::compile("x {{ }}"),
            Err(TemplateError::EmptyAction(2))
        );
        assert!(matches!(
            Template::compile("{{ range .ExtraTargets }}"),
            Err(TemplateError::UnsupportedAction(_))
        ));
        assert!(matches!(
            Template::compile("{{ .Kind.Name | printf \"%s\" }}"),
            Err(TemplateError::UnsupportedAction(_))
        ));
        assert_eq!(
            Template::compile("{{ .Secret }}"),
            Err(TemplateError::UnknownField("Secret".into()))
        );
    }

    #[test]
    fn test_every_field_resolves() {
        let event = event();
        for field in EventField::iter() {
            let path: &'static str = field.into();
            let template = Template::compile(&format!("{{{{.{path}}}}}")).unwrap();
            assert_eq!(template.execute(&event), field.project(&event));
        }
    }

    #[test]
    fn test_optional_and_boolean_fields() {
        let running = EventView::new(
            Target::new("app", "myapp"),
            Kind::new("app.deploy"),
            Owner::new("user", "me@me.com"),
        );
        let template = Template::compile("[{{.EndTime}}] {{.Running}}").unwrap();
        assert_eq!(template.execute(&running), "[] true");
    }
}
