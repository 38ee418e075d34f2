use std::{collections::HashMap, fs, path::Path, sync::Arc};

use serde::{de::Error as _, Deserialize, Deserializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::{Category, Filter, FilterToggles, MailerClass, Settings};

/// Class-level value selecting [`Category::SubjectLine`].
pub const USE_SUBJECT_LINES: &str = "use_subject_lines";

/// Top-level configuration with the mailer class definitions.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Logs every rendered header on the `smtpapi::debug` target.
    #[serde(default)]
    pub debug_output: bool,

    #[serde(default)]
    pub classes: HashMap<String, ClassConfig>,
}

/// Defaults of a single mailer class.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassConfig {
    /// Default category, [`USE_SUBJECT_LINES`] uses each message subject.
    #[serde(default, deserialize_with = "deserialize_category")]
    pub category: Option<Category>,

    /// Settings per filter name, keyed by header or legacy name, in the
    /// order they appear in the file.
    #[serde(default, deserialize_with = "deserialize_filters")]
    pub filters: Vec<(String, Settings)>,
}

fn deserialize_category<'de, D>(deserializer: D) -> Result<Option<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|name| match name.as_str() {
        USE_SUBJECT_LINES => Category::SubjectLine,
        _ => Category::Named(name),
    }))
}

fn deserialize_filters<'de, D>(deserializer: D) -> Result<Vec<(String, Settings)>, D::Error>
where
    D: Deserializer<'de>,
{
    toml::Table::deserialize(deserializer)?
        .into_iter()
        .map(|(name, value)| {
            value
                .try_into::<Settings>()
                .map(|settings| (name, settings))
                .map_err(D::Error::custom)
        })
        .collect()
}

impl ClassConfig {
    /// Builds the [`MailerClass`] described by this configuration.
    pub fn build(&self, name: &str) -> MailerClass {
        let mut class = MailerClass::new(name);
        if let Some(category) = &self.category {
            class.set_default_category(category.clone());
        }
        for (filter, settings) in &self.filters {
            match filter.parse::<Filter>() {
                Ok(filter) => class.merge_filter(filter, settings.clone()),
                Err(error) => warn!(class = %name, error = %error, "Ignoring filter settings"),
            }
        }
        class
    }
}

impl Config {
    /// Builds every configured class, ready to be shared across messages.
    pub fn mailer_classes(&self) -> HashMap<String, Arc<MailerClass>> {
        self.classes
            .iter()
            .map(|(name, class)| (name.clone(), Arc::new(class.build(name))))
            .collect()
    }
}

/// Loads configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    info!(
        path = %path.display(),
        classes = config.classes.len(),
        "Loaded mailer configuration"
    );
    Ok(config)
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_parse_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(!config.debug_output);
        assert!(config.classes.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
debug_output = true

[classes.welcome]
category = "WelcomeEmail"

[classes.welcome.filters.open-tracking]
enabled = 1

[classes.welcome.filters.spamcheck]
enabled = 1
maxscore = 3.5

[classes.newsletter]
category = "use_subject_lines"

[classes.newsletter.filters.footer]
"text/plain" = "Sent by Example"

[classes.newsletter.filters.not-a-filter]
enabled = 1
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.debug_output);

        let classes = config.mailer_classes();
        assert_eq!(classes.len(), 2);

        let welcome = &classes["welcome"];
        assert_eq!(welcome.name(), "welcome");
        assert_eq!(
            welcome.defaults().category,
            Some(Category::named("WelcomeEmail"))
        );
        assert_eq!(
            welcome.defaults().filters.get(Filter::SpamCheck),
            Some(&Settings::from_iter([
                ("enabled".to_string(), json!(1)),
                ("maxscore".to_string(), json!(3.5)),
            ]))
        );

        let newsletter = &classes["newsletter"];
        assert_eq!(newsletter.defaults().category, Some(Category::SubjectLine));
        assert_eq!(newsletter.defaults().filters.len(), 1);
        assert_eq!(
            newsletter
                .defaults()
                .filters
                .get(Filter::FooterInsertion)
                .and_then(|settings| settings.get("text/plain")),
            Some(&json!("Sent by Example"))
        );
    }

    #[test]
    fn test_parse_example_config() {
        let config: Config = toml::from_str(include_str!("../../../smtpapi.example.toml")).unwrap();
        let classes = config.mailer_classes();

        let order: Vec<Filter> = classes["welcome"]
            .defaults()
            .filters
            .iter()
            .map(|(filter, _)| filter)
            .collect();
        assert_eq!(order, vec![Filter::OpenTracking, Filter::ClickTracking]);
        assert_eq!(
            classes["newsletter"].defaults().category,
            Some(Category::SubjectLine)
        );
    }

    #[test]
    fn test_filters_keep_file_order() {
        let toml = r#"
[classes.ordered.filters.spam-check]
maxscore = 2.0

[classes.ordered.filters.bypass-list-management]
enabled = 1

[classes.ordered.filters.clicktrack]
enabled = 0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let names: Vec<&str> = config.classes["ordered"]
            .filters
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["spam-check", "bypass-list-management", "clicktrack"]);

        let order: Vec<Filter> = config.classes["ordered"]
            .build("ordered")
            .defaults()
            .filters
            .iter()
            .map(|(filter, _)| filter)
            .collect();
        assert_eq!(
            order,
            vec![
                Filter::SpamCheck,
                Filter::BypassListManagement,
                Filter::ClickTracking
            ]
        );
    }

    #[test]
    fn test_filter_settings_must_be_tables() {
        let toml = r#"
[classes.broken.filters]
open-tracking = 1
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[classes.receipt]\ncategory = \"Receipts\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config.classes["receipt"].category,
            Some(Category::named("Receipts"))
        );
    }

    #[test]
    fn test_load_config_errors() {
        let missing = load_config(Path::new("/nonexistent/smtpapi.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "classes = 3").unwrap();
        let invalid = load_config(file.path());
        assert!(matches!(invalid, Err(ConfigError::Parse(_))));
    }
}
