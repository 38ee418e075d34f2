//! Feature toggles ("filters") understood by the delivery provider.
//!
//! Every toggle carries a settings fragment, a flat JSON object such as
//! `{"enabled": 1}` or `{"maxscore": 3.5}`. Registering a fragment for a
//! toggle that already has one merges the two key by key, so settings can
//! be layered by successive calls.

use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Settings fragment attached to a single [`Filter`].
pub type Settings = Map<String, Value>;

/// The closed set of feature toggles accepted in the `filters` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    OpenTracking,
    ClickTracking,
    GoogleAnalytics,
    GravatarInsertion,
    SubscriptionTracking,
    FooterInsertion,
    SpamCheck,
    BypassListManagement,
}

impl Filter {
    pub const ALL: [Filter; 8] = [
        Filter::OpenTracking,
        Filter::ClickTracking,
        Filter::GoogleAnalytics,
        Filter::GravatarInsertion,
        Filter::SubscriptionTracking,
        Filter::FooterInsertion,
        Filter::SpamCheck,
        Filter::BypassListManagement,
    ];

    /// Returns the name used for this toggle in the header JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Filter::OpenTracking => "open-tracking",
            Filter::ClickTracking => "click-tracking",
            Filter::GoogleAnalytics => "google-analytics",
            Filter::GravatarInsertion => "gravatar-insertion",
            Filter::SubscriptionTracking => "subscription-tracking",
            Filter::FooterInsertion => "footer-insertion",
            Filter::SpamCheck => "spam-check",
            Filter::BypassListManagement => "bypass-list-management",
        }
    }

    /// Returns the provider's legacy short name for this toggle.
    pub fn legacy_name(&self) -> &'static str {
        match self {
            Filter::OpenTracking => "opentrack",
            Filter::ClickTracking => "clicktrack",
            Filter::GoogleAnalytics => "ganalytics",
            Filter::GravatarInsertion => "gravatar",
            Filter::SubscriptionTracking => "subscriptiontrack",
            Filter::FooterInsertion => "footer",
            Filter::SpamCheck => "spamcheck",
            Filter::BypassListManagement => "bypass_list_management",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a name outside the known toggle set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown filter: {0}")]
pub struct UnknownFilter(pub String);

impl FromStr for Filter {
    type Err = UnknownFilter;

    /// Accepts both the header names (`open-tracking`) and the legacy
    /// short names (`opentrack`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Filter::ALL
            .into_iter()
            .find(|filter| filter.as_str() == value || filter.legacy_name() == value)
            .ok_or_else(|| UnknownFilter(value.to_string()))
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Ordered collection of settings fragments keyed by [`Filter`].
///
/// Entries keep the position of their first registration, later merges
/// for the same toggle update the fragment in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSettings {
    entries: Vec<(Filter, Settings)>,
}

impl FilterSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow-merges `fragment` into the settings for `filter`, creating
    /// the entry when missing.
    pub fn merge(&mut self, filter: Filter, fragment: Settings) {
        match self.entries.iter_mut().find(|(f, _)| *f == filter) {
            Some((_, settings)) => settings.extend(fragment),
            None => self.entries.push((filter, fragment)),
        }
    }

    /// Same as [`merge`](Self::merge) but keyed by name, unknown names are
    /// ignored.
    pub fn register(&mut self, name: &str, fragment: Settings) {
        match name.parse::<Filter>() {
            Ok(filter) => self.merge(filter, fragment),
            Err(_) => debug!(filter = %name, "Ignoring settings for unknown filter"),
        }
    }

    /// Returns the fragment registered for `filter`, if any.
    pub fn get(&self, filter: Filter) -> Option<&Settings> {
        self.entries
            .iter()
            .find(|(f, _)| *f == filter)
            .map(|(_, settings)| settings)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Filter, &Settings)> {
        self.entries.iter().map(|(filter, settings)| (*filter, settings))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// HTML and plain-text variants for the footer inserted by `footer-insertion`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FooterText {
    pub html: Option<String>,
    pub plain: Option<String>,
}

/// Unsubscribe text for `subscription-tracking`.
///
/// Either append a link (`html`/`plain`, where the link text sits between
/// `<% %>`) or `replace` a given tag in the body with the link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionText {
    pub html: Option<String>,
    pub plain: Option<String>,
    pub replace: Option<String>,
}

fn text_settings<const N: usize>(entries: [(&str, Option<String>); N]) -> Settings {
    entries
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), Value::String(v))))
        .collect()
}

fn enabled_settings(enabled: bool) -> Settings {
    let mut settings = Settings::new();
    settings.insert("enabled".to_string(), Value::from(u8::from(enabled)));
    settings
}

/// Typed builders over the toggle set, shared by the class-level and the
/// message-level stores.
pub trait FilterToggles {
    /// Shallow-merges `fragment` into the settings stored for `filter`.
    fn merge_filter(&mut self, filter: Filter, fragment: Settings);

    /// Sets `enabled: 1` on every given toggle.
    fn enable(&mut self, filters: &[Filter]) {
        for filter in filters {
            self.merge_filter(*filter, enabled_settings(true));
        }
    }

    /// Sets `enabled: 0` on every given toggle.
    fn disable(&mut self, filters: &[Filter]) {
        for filter in filters {
            self.merge_filter(*filter, enabled_settings(false));
        }
    }

    /// Sets the score above which `spam-check` drops the message.
    ///
    /// JSON has no representation for NaN or infinities, such scores leave
    /// the toggle untouched.
    fn set_spam_check_max_score(&mut self, score: f64) {
        let Some(score) = Number::from_f64(score) else {
            debug!(score, "Ignoring non-finite spam check score");
            return;
        };
        let mut settings = Settings::new();
        settings.insert("maxscore".to_string(), Value::Number(score));
        self.merge_filter(Filter::SpamCheck, settings);
    }

    fn set_footer_text(&mut self, text: FooterText) {
        let settings = text_settings([("text/html", text.html), ("text/plain", text.plain)]);
        self.merge_filter(Filter::FooterInsertion, settings);
    }

    fn set_subscription_tracking_text(&mut self, text: SubscriptionText) {
        let settings = text_settings([
            ("text/html", text.html),
            ("text/plain", text.plain),
            ("replace", text.replace),
        ]);
        self.merge_filter(Filter::SubscriptionTracking, settings);
    }
}

impl FilterToggles for FilterSettings {
    fn merge_filter(&mut self, filter: Filter, fragment: Settings) {
        self.merge(filter, fragment);
    }
}
