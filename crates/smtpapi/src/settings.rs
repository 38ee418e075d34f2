//! Class-level defaults and message-level overrides for the header.
//!
//! A [`MailerClass`] is the descriptor shared by every message of one
//! kind (welcome emails, newsletters...). It is built once, wrapped in an
//! `Arc` and handed to each message, which records its own
//! [`InstanceOverrides`] during construction.

use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{Filter, FilterSettings, FilterToggles, Settings};

/// Category assigned to a message for the provider's statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    /// A fixed category name.
    Named(String),
    /// Use the subject line of each message as its category.
    SubjectLine,
}

impl Category {
    pub fn named(name: impl Into<String>) -> Self {
        Category::Named(name.into())
    }
}

/// Placeholder to per-recipient replacement values, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitutions {
    entries: Vec<(String, Vec<String>)>,
}

impl Substitutions {
    /// Sets the values for `placeholder`, replacing previous values while
    /// keeping the placeholder's original position.
    pub fn insert(&mut self, placeholder: String, values: Vec<String>) {
        match self.entries.iter_mut().find(|(p, _)| *p == placeholder) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((placeholder, values)),
        }
    }

    pub fn get(&self, placeholder: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(p, _)| p == placeholder)
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(placeholder, values)| (placeholder.as_str(), values.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for Substitutions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (placeholder, values) in &self.entries {
            map.serialize_entry(placeholder, values)?;
        }
        map.end()
    }
}

/// Defaults shared by every message of a [`MailerClass`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDefaults {
    pub category: Option<Category>,
    pub filters: FilterSettings,
}

/// Descriptor of a message class, holding its [`ClassDefaults`].
///
/// Mutation needs `&mut self`, so once the class is shared through an
/// `Arc` its defaults are effectively frozen and may be read from any
/// number of messages concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct MailerClass {
    name: String,
    defaults: ClassDefaults,
}

impl MailerClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: ClassDefaults::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the default category, [`Category::SubjectLine`] makes every
    /// message use its own subject unless overridden per message.
    pub fn set_default_category(&mut self, category: Category) {
        self.defaults.category = Some(category);
    }

    /// Merges `fragment` into the class settings for the toggle `name`,
    /// unknown toggle names are ignored.
    pub fn register_filter_settings(&mut self, name: &str, fragment: Settings) {
        self.defaults.filters.register(name, fragment);
    }

    pub fn defaults(&self) -> &ClassDefaults {
        &self.defaults
    }
}

impl FilterToggles for MailerClass {
    fn merge_filter(&mut self, filter: Filter, fragment: Settings) {
        self.defaults.filters.merge(filter, fragment);
    }
}

/// Per-message overrides recorded while the message is being built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceOverrides {
    category: Option<Category>,
    recipients: Option<Vec<String>>,
    substitutions: Substitutions,
    unique_args: Map<String, Value>,
    filters: FilterSettings,
}

impl InstanceOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = Some(category);
    }

    /// Replaces the recipient list, lengths are only checked at send time.
    pub fn set_recipients(&mut self, recipients: Vec<String>) {
        self.recipients = Some(recipients);
    }

    /// Registers the per-recipient values for `placeholder`.
    ///
    /// Each list must have one entry per recipient by the time the message
    /// is sent.
    pub fn add_substitution(&mut self, placeholder: impl Into<String>, values: Vec<String>) {
        self.substitutions.insert(placeholder.into(), values);
    }

    /// Merges an object of unique arguments, any non-object value is dropped.
    pub fn set_unique_args(&mut self, values: Value) {
        match values {
            Value::Object(map) => self.unique_args.extend(map),
            other => debug!(value = %other, "Ignoring non-object unique args"),
        }
    }

    pub fn register_filter_settings(&mut self, name: &str, fragment: Settings) {
        self.filters.register(name, fragment);
    }

    pub fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }

    pub fn recipients(&self) -> Option<&[String]> {
        self.recipients.as_deref()
    }

    pub fn substitutions(&self) -> &Substitutions {
        &self.substitutions
    }

    pub fn unique_args(&self) -> &Map<String, Value> {
        &self.unique_args
    }

    pub fn filters(&self) -> &FilterSettings {
        &self.filters
    }
}

impl FilterToggles for InstanceOverrides {
    fn merge_filter(&mut self, filter: Filter, fragment: Settings) {
        self.filters.merge(filter, fragment);
    }
}
