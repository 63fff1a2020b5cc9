//! # repspec-cli
//!
//! Command-line interface for translating, validating and templating
//! representation specification documents.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use repspec_ir::TemplateConfig;
use repspec_pipeline::{
    generate_templates, translate_directory, validate_directory, Format, Gateway, GatewayConfig,
    TemplateSet,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "repspec")]
#[command(about = "Representation specification toolkit")]
#[command(version)]
struct Cli {
    /// Path to a gateway configuration file (JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the RS schema files; overrides the configuration
    #[arg(long, global = true)]
    schema_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a document, or a directory of documents, between formats
    Translate {
        /// Input file or directory
        input: PathBuf,

        /// Output file or directory
        output: PathBuf,

        /// Target format when translating a directory (json, yaml, cbor, xlsx)
        #[arg(short, long)]
        to: Option<Format>,
    },

    /// Validate a document, or every document below a directory
    Validate {
        /// Input file or directory
        input: PathBuf,
    },

    /// Write an empty document for one RS
    Template {
        /// RS id (e.g. RS0003)
        rs: String,

        /// Output file; `.xlsx` keeps the full sheet layout
        output: PathBuf,

        /// Selector keyword for an alternative or conditional field
        #[arg(short, long = "selector", value_parser = parse_key_value)]
        selectors: Vec<(String, String)>,
    },

    /// Write every template listed in a template configuration file
    GenerateTemplates {
        /// Template configuration (JSON or YAML)
        templates: PathBuf,

        /// Output directory
        output_dir: PathBuf,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid selector '{s}': expected key=value"))?;
    if key.is_empty() || value.is_empty() {
        return Err(format!("invalid selector '{s}': key and value must be non-empty"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn gateway_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(dir) = &cli.schema_dir {
        config = config.schema_dir(dir.clone());
    }
    Ok(config)
}

fn translate(gateway: &Gateway, input: &Path, output: &Path, to: Option<Format>) -> anyhow::Result<()> {
    if input.is_dir() {
        let Some(format) = to else {
            bail!("translating a directory needs --to <FORMAT>");
        };
        let written = translate_directory(gateway, input, output, format)?;
        println!("Translated {} files into {}", written.len(), output.display());
    } else {
        if let Some(format) = to {
            if Format::from_path(output)? != format {
                bail!("output {} does not have the .{} extension", output.display(), format);
            }
        }
        gateway
            .translate(input, output)
            .with_context(|| format!("translating {}", input.display()))?;
        println!("Translated {} -> {}", input.display(), output.display());
    }
    Ok(())
}

fn validate(gateway: &Gateway, input: &Path) -> anyhow::Result<()> {
    if input.is_dir() {
        for report in validate_directory(gateway, input)? {
            println!("{report}");
        }
    } else {
        println!("{}", gateway.validate(input)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let gateway = Gateway::new(gateway_config(&cli)?);
    tracing::debug!("Using schemas from {}", gateway.config().schema_dir.display());

    match cli.command {
        Commands::Translate { input, output, to } => translate(&gateway, &input, &output, to),
        Commands::Validate { input } => validate(&gateway, &input),
        Commands::Template { rs, output, selectors } => {
            let mut config = TemplateConfig::new(rs);
            for (key, value) in selectors {
                config = config.with_selector(key, value);
            }
            gateway.template(&config, &output)?;
            println!("Wrote {} template to {}", config.rs, output.display());
            Ok(())
        }
        Commands::GenerateTemplates {
            templates,
            output_dir,
        } => {
            let set = TemplateSet::from_file(&templates)?;
            let written = generate_templates(&gateway, &output_dir, &set.templates)?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}
