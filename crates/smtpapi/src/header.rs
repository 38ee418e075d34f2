//! Merge of class defaults and message overrides into the header document.

use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{Category, ClassDefaults, Filter, InstanceOverrides, Settings, Substitutions};

/// Name of the delivery-control header carrying the JSON document.
pub const SMTPAPI_HEADER: &str = "X-SMTPAPI";

/// The merged document serialized into the `X-SMTPAPI` header.
///
/// Optional sections are skipped when empty, `filters` is always written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<Substitutions>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_args: Option<Map<String, Value>>,

    pub filters: Filters,
}

/// The `filters` section, each entry written as `{"settings": {...}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(pub Vec<(Filter, Settings)>);

impl Filters {
    pub fn get(&self, filter: Filter) -> Option<&Settings> {
        self.0
            .iter()
            .find(|(f, _)| *f == filter)
            .map(|(_, settings)| settings)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Filters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Entry<'a> {
            settings: &'a Settings,
        }

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (filter, settings) in &self.0 {
            map.serialize_entry(filter, &Entry { settings })?;
        }
        map.end()
    }
}

/// Builds the header document for a message with the given `subject`.
///
/// The category comes from the message override first, then from the class
/// default, [`Category::SubjectLine`] resolving to `subject` at either
/// level (an empty subject leaves the category out). Toggle settings from
/// both levels are merged key by key with message keys winning, toggles
/// ending with an empty fragment are left out.
pub fn build_header(
    defaults: &ClassDefaults,
    overrides: &InstanceOverrides,
    subject: &str,
) -> HeaderDocument {
    HeaderDocument {
        category: resolve_category(defaults, overrides, subject),
        to: overrides
            .recipients()
            .filter(|recipients| !recipients.is_empty())
            .map(|recipients| recipients.to_vec()),
        sub: Some(overrides.substitutions())
            .filter(|subs| !subs.is_empty())
            .cloned(),
        unique_args: Some(overrides.unique_args())
            .filter(|args| !args.is_empty())
            .cloned(),
        filters: merge_filters(defaults, overrides),
    }
}

fn resolve_category(
    defaults: &ClassDefaults,
    overrides: &InstanceOverrides,
    subject: &str,
) -> Option<String> {
    match overrides.category().or(defaults.category.as_ref())? {
        Category::SubjectLine if subject.is_empty() => None,
        Category::SubjectLine => Some(subject.to_string()),
        Category::Named(name) => Some(name.clone()),
    }
}

fn merge_filters(defaults: &ClassDefaults, overrides: &InstanceOverrides) -> Filters {
    let instance = overrides.filters();
    let mut names: Vec<Filter> = defaults.filters.iter().map(|(filter, _)| filter).collect();
    for (filter, _) in instance.iter() {
        if !names.contains(&filter) {
            names.push(filter);
        }
    }

    let merged = names
        .into_iter()
        .filter_map(|filter| {
            let mut settings = defaults.filters.get(filter).cloned().unwrap_or_default();
            if let Some(fragment) = instance.get(filter) {
                settings.extend(fragment.clone());
            }
            (!settings.is_empty()).then_some((filter, settings))
        })
        .collect();

    Filters(merged)
}
