//! Webhook body rendering.
//!
//! A webhook without a body template receives the serialized event. A body
//! template is compiled with [`Template`]; when it does not compile, the
//! template source itself is delivered as the body instead of failing the
//! notification.

mod template;

pub use self::template::{EventField, Template, TemplateError};
use crate::Result;
use crate::event::EventView;

/// Tracing target for body rendering.
pub const TRACING_TARGET: &str = "tsuru_webhook::render";

/// A rendered request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBody {
    /// Body bytes.
    pub bytes: Vec<u8>,
    /// Whether the body is the default JSON serialization of the event.
    pub is_default_json: bool,
}

impl RenderedBody {
    /// Returns the body length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the body is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Renders a webhook body for `event`.
///
/// # Errors
///
/// Fails only if the default JSON body cannot be serialized. Template
/// problems never produce an error.
pub fn render(body_template: &str, event: &EventView) -> Result<RenderedBody> {
    if body_template.is_empty() {
        return Ok(RenderedBody {
            bytes: serde_json::to_vec(event)?,
            is_default_json: true,
        });
    }

    let bytes = match Template::compile(body_template) {
        Ok(template) => template.execute(event).into_bytes(),
        Err(error) => {
            tracing::debug!(
                target: TRACING_TARGET,
                event_id = %event.unique_id,
                error = %error,
                "Body template does not compile, sending it verbatim"
            );
            body_template.as_bytes().to_vec()
        }
    };

    Ok(RenderedBody {
        bytes,
        is_default_json: false,
    })
}
