use std::env;

use tracing::{debug, info};

use crate::{
    build_header, space_separators, ClassDefaults, Delivery, HookResult, InstanceOverrides,
    SendHook, SmtpApiError, SmtpApiResult, SMTPAPI_HEADER,
};

/// Environment variable enabling the header dump on the diagnostic channel.
pub const DEBUG_OUTPUT_ENV: &str = "SMTPAPI_DEBUG_OUTPUT";

/// Returns whether [`DEBUG_OUTPUT_ENV`] holds a truthy value.
pub fn debug_output_from_env() -> bool {
    env::var(DEBUG_OUTPUT_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Checks that every substitution list has one value per recipient.
///
/// A message without recipients counts as zero recipients, so any
/// non-empty substitution list fails.
pub fn validate_substitutions(overrides: &InstanceOverrides) -> SmtpApiResult<()> {
    let expected = overrides.recipients().map_or(0, <[String]>::len);
    for (placeholder, values) in overrides.substitutions().iter() {
        if values.len() != expected {
            return Err(SmtpApiError::SubstitutionLengthMismatch {
                placeholder: placeholder.to_string(),
                expected,
                actual: values.len(),
            });
        }
    }
    Ok(())
}

/// Validates the overrides and renders the header value for `subject`.
///
/// The output is the compact JSON of the merged [`HeaderDocument`](crate::HeaderDocument)
/// passed through [`space_separators`], identical inputs always render
/// identical text.
pub fn render_header(
    defaults: &ClassDefaults,
    overrides: &InstanceOverrides,
    subject: &str,
) -> SmtpApiResult<String> {
    validate_substitutions(overrides)?;
    let document = build_header(defaults, overrides, subject);
    let compact = serde_json::to_string(&document)?;
    Ok(space_separators(&compact))
}

/// Hook that writes the `X-SMTPAPI` header from the class defaults and the
/// message overrides.
///
/// Fails without touching the message when a substitution list does not
/// match the recipient count.
pub struct SmtpApiHook {
    debug_output: bool,
}

impl SmtpApiHook {
    /// Creates a new [`SmtpApiHook`], `debug_output` logs every rendered
    /// header on the `smtpapi::debug` target.
    pub fn new(debug_output: bool) -> Self {
        info!(debug_output = debug_output, "X-SMTPAPI hook initialized");
        Self { debug_output }
    }

    /// Creates a new [`SmtpApiHook`] with debug output taken from
    /// [`DEBUG_OUTPUT_ENV`].
    pub fn from_env() -> Self {
        Self::new(debug_output_from_env())
    }
}

impl SendHook for SmtpApiHook {
    fn before_send(&self, delivery: &mut Delivery) -> HookResult<()> {
        let header = render_header(
            delivery.class().defaults(),
            delivery.overrides(),
            delivery.message().subject(),
        )?;
        if self.debug_output {
            info!(
                target: "smtpapi::debug",
                class = delivery.class().name(),
                header = %header,
                "Rendered X-SMTPAPI header"
            );
        }
        debug!(
            message_id = %delivery.message().message_id,
            class = delivery.class().name(),
            "Setting X-SMTPAPI header"
        );
        delivery.message_mut().set_header(SMTPAPI_HEADER, &header);
        Ok(())
    }

    fn name(&self) -> &str {
        "smtpapi"
    }
}
