use std::sync::Arc;

use serde_json::Value;

use crate::{
    apply_hooks, Category, EmailMessage, Filter, FilterToggles, HookResult, InstanceOverrides,
    MailerClass, SendHook, Settings, SmtpApiHook,
};

/// A message under construction, together with its class and overrides.
///
/// Declarative calls made while building the message are recorded as
/// [`InstanceOverrides`], the class defaults are shared with every other
/// message of the same [`MailerClass`].
#[derive(Debug, Clone)]
pub struct Delivery {
    class: Arc<MailerClass>,
    overrides: InstanceOverrides,
    message: EmailMessage,
}

impl Delivery {
    pub fn new(class: Arc<MailerClass>, message: EmailMessage) -> Self {
        Self {
            class,
            overrides: InstanceOverrides::new(),
            message,
        }
    }

    pub fn class(&self) -> &MailerClass {
        &self.class
    }

    pub fn overrides(&self) -> &InstanceOverrides {
        &self.overrides
    }

    pub fn message(&self) -> &EmailMessage {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut EmailMessage {
        &mut self.message
    }

    pub fn into_message(self) -> EmailMessage {
        self.message
    }

    /// Overrides the class category for this message only.
    pub fn set_category(&mut self, category: Category) -> &mut Self {
        self.overrides.set_category(category);
        self
    }

    pub fn set_recipients(&mut self, recipients: Vec<String>) -> &mut Self {
        self.overrides.set_recipients(recipients);
        self
    }

    pub fn add_substitution(
        &mut self,
        placeholder: impl Into<String>,
        values: Vec<String>,
    ) -> &mut Self {
        self.overrides.add_substitution(placeholder, values);
        self
    }

    pub fn set_unique_args(&mut self, values: Value) -> &mut Self {
        self.overrides.set_unique_args(values);
        self
    }

    pub fn register_filter_settings(&mut self, name: &str, fragment: Settings) -> &mut Self {
        self.overrides.register_filter_settings(name, fragment);
        self
    }
}

impl FilterToggles for Delivery {
    fn merge_filter(&mut self, filter: Filter, fragment: Settings) {
        self.overrides.merge_filter(filter, fragment);
    }
}

/// Runs the registered [`SendHook`]s over deliveries, producing messages
/// ready for transport.
pub struct Mailer {
    hooks: Vec<Box<dyn SendHook>>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field(
                "hooks",
                &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Mailer {
    pub fn new(hooks: Vec<Box<dyn SendHook>>) -> Self {
        Self { hooks }
    }

    /// Runs every hook over `delivery` and returns the finished message
    /// with its serialization rebuilt.
    ///
    /// A failing hook aborts the preparation, no message is returned.
    pub fn prepare(&self, mut delivery: Delivery) -> HookResult<EmailMessage> {
        apply_hooks(&self.hooks, &mut delivery)?;
        let mut message = delivery.into_message();
        message.rebuild();
        Ok(message)
    }
}

impl Default for Mailer {
    /// A mailer with the [`SmtpApiHook`] as its only hook, debug output
    /// taken from the environment.
    fn default() -> Self {
        Self::new(vec![Box::new(SmtpApiHook::from_env())])
    }
}
