use std::{error::Error, fs, io, path::PathBuf, sync::Arc};

use clap::Parser;
use serde_json::{Map, Value};
use smtpapi::{
    debug_output_from_env, load_config, Category, Config, Delivery, EmailMessage, Filter,
    FilterToggles, Mailer, MailerClass, SmtpApiHook,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Prepares an email for a configured mailer class and prints it, with its
/// `X-SMTPAPI` header, to stdout.
#[derive(Debug, Parser)]
#[command(name = "smtpapi", version, about)]
struct Args {
    /// TOML file with the mailer class definitions.
    #[arg(long, env = "SMTPAPI_CONFIG")]
    config: Option<PathBuf>,

    /// Mailer class providing the defaults, must exist in the config.
    #[arg(long)]
    class: Option<String>,

    /// Already composed email to prepare, replaces the `--from`, `--to`,
    /// `--subject` and `--body` options.
    #[arg(long, conflicts_with_all = ["from", "to", "subject", "body"])]
    message: Option<PathBuf>,

    #[arg(long, default_value = "noreply@localhost")]
    from: String,

    #[arg(long, default_value = "undisclosed-recipients:;")]
    to: String,

    #[arg(long, default_value = "")]
    subject: String,

    #[arg(long, default_value = "")]
    body: String,

    /// Recipient address for the `to` list, repeatable.
    #[arg(long = "recipient")]
    recipients: Vec<String>,

    /// Substitution as `PLACEHOLDER=value1,value2`, repeatable.
    #[arg(long = "sub", value_parser = parse_substitution)]
    substitutions: Vec<(String, Vec<String>)>,

    /// Unique argument as `KEY=VALUE`, values are read as JSON when possible.
    #[arg(long = "unique-arg", value_parser = parse_unique_arg)]
    unique_args: Vec<(String, Value)>,

    /// Category for this message, overriding the class default.
    #[arg(long, conflicts_with = "category_from_subject")]
    category: Option<String>,

    /// Use the subject line as the category of this message.
    #[arg(long)]
    category_from_subject: bool,

    /// Filter to enable for this message, repeatable.
    #[arg(long = "enable", value_parser = parse_filter)]
    enable: Vec<Filter>,

    /// Filter to disable for this message, repeatable.
    #[arg(long = "disable", value_parser = parse_filter)]
    disable: Vec<Filter>,

    /// Log the rendered header on the `smtpapi::debug` target.
    #[arg(long)]
    debug_output: bool,
}

fn parse_substitution(value: &str) -> Result<(String, Vec<String>), String> {
    let (placeholder, values) = value
        .split_once('=')
        .ok_or_else(|| format!("Expected PLACEHOLDER=values, got {value}"))?;
    let values = if values.is_empty() {
        Vec::new()
    } else {
        values.split(',').map(str::to_string).collect()
    };
    Ok((placeholder.to_string(), values))
}

fn parse_unique_arg(value: &str) -> Result<(String, Value), String> {
    let (key, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("Expected KEY=VALUE, got {value}"))?;
    let parsed = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), parsed))
}

fn parse_filter(value: &str) -> Result<Filter, String> {
    value.parse::<Filter>().map_err(|e| e.to_string())
}

fn resolve_class(config: &Config, name: Option<&str>) -> Result<Arc<MailerClass>, String> {
    match name {
        Some(name) => config
            .mailer_classes()
            .remove(name)
            .ok_or_else(|| format!("Unknown mailer class: {name}")),
        None => Ok(Arc::new(MailerClass::new("default"))),
    }
}

fn compose_message(args: &Args) -> io::Result<EmailMessage> {
    match &args.message {
        Some(path) => Ok(EmailMessage::from_raw(&fs::read_to_string(path)?)),
        None => Ok(EmailMessage::compose(
            &args.from,
            &args.to,
            &args.subject,
            &args.body,
        )),
    }
}

fn build_delivery(args: &Args, class: Arc<MailerClass>, message: EmailMessage) -> Delivery {
    let mut delivery = Delivery::new(class, message);

    if args.category_from_subject {
        delivery.set_category(Category::SubjectLine);
    } else if let Some(category) = &args.category {
        delivery.set_category(Category::named(category.as_str()));
    }
    if !args.recipients.is_empty() {
        delivery.set_recipients(args.recipients.clone());
    }
    for (placeholder, values) in &args.substitutions {
        delivery.add_substitution(placeholder.as_str(), values.clone());
    }
    if !args.unique_args.is_empty() {
        let unique_args: Map<String, Value> = args.unique_args.iter().cloned().collect();
        delivery.set_unique_args(Value::Object(unique_args));
    }
    delivery.enable(&args.enable);
    delivery.disable(&args.disable);

    delivery
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let class = resolve_class(&config, args.class.as_deref())?;
    info!(class = class.name(), "Preparing message");

    let debug_output = args.debug_output || config.debug_output || debug_output_from_env();
    let mailer = Mailer::new(vec![Box::new(SmtpApiHook::new(debug_output))]);
    let message = mailer.prepare(build_delivery(&args, class, compose_message(&args)?))?;

    println!("{}", message.raw());
    Ok(())
}
