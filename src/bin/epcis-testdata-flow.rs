use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use epcis_testdata_flow::{
    Build, BuildOptions, GenerationClient, build_template,
    json_output::CheckJsonOutput,
    lint::lint_builtin_rules,
    load_design_from_path,
    resolve::{ParentCountPolicy, ResolveOptions},
    timestamp::UtcOffset,
};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "epcis-testdata-flow",
    about = "Turn EPCIS event design diagrams into test-data generation templates"
)]
struct Cli {
    #[command(flatten)]
    build: BuildArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a design and print the generation template.
    Template(TemplateArgs),
    /// Report inheritance violations and resolver warnings.
    Check(CheckArgs),
    /// Resolve a design and submit it to the generation service.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Offset appended to timestamps without one, e.g. +02:00. Defaults to the local zone.
    #[arg(long = "utc-offset", global = true, allow_hyphen_values = true)]
    utc_offset: Option<UtcOffset>,
    /// Weight parentCount by the upstream events' counts instead of the event's own count.
    #[arg(long = "weighted-parent-count", global = true)]
    weighted_parent_count: bool,
}

impl BuildArgs {
    fn options(&self) -> BuildOptions {
        let parent_count = if self.weighted_parent_count {
            ParentCountPolicy::WeightedByAncestry
        } else {
            ParentCountPolicy::OwnEventCount
        };
        BuildOptions {
            resolve: ResolveOptions { parent_count },
            utc_offset: self.utc_offset.unwrap_or_else(UtcOffset::local),
        }
    }
}

#[derive(Args, Debug)]
struct TemplateArgs {
    /// Design document (JSON or YAML).
    design: PathBuf,
    /// Write the template here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    design: PathBuf,
    /// Emit a JSON report on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    design: PathBuf,
    /// Base URL of the generation service.
    #[arg(long = "api-url", env = "API_URL")]
    api_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("epcis_testdata_flow=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let options = cli.build.options();
    match cli.command {
        Commands::Template(args) => handle_template(args, &options),
        Commands::Check(args) => handle_check(args, &options),
        Commands::Generate(args) => handle_generate(args, &options).await,
    }
}

fn load_and_build(design: &Path, options: &BuildOptions) -> Result<Build> {
    let doc = load_design_from_path(design)?;
    let build = build_template(&doc, options)
        .with_context(|| format!("failed to resolve {}", design.display()))?;
    for err in &build.node_errors {
        eprintln!("ERR {err}");
    }
    Ok(build)
}

fn handle_template(args: TemplateArgs, options: &BuildOptions) -> Result<()> {
    let build = load_and_build(&args.design, options)?;
    let json = build.bundle.to_pretty_json()?;
    match &args.out {
        Some(path) => {
            fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "wrote {} ({} events, blake3 {})",
                path.display(),
                build.bundle.template.events.len(),
                build.bundle.hash_blake3
            );
        }
        None => write_stdout_line(&json)?,
    }
    Ok(())
}

fn handle_check(args: CheckArgs, options: &BuildOptions) -> Result<()> {
    if args.json {
        let output = match load_design_from_path(&args.design)
            .and_then(|doc| build_template(&doc, options))
        {
            Ok(build) => CheckJsonOutput::from_build(&build),
            Err(err) => CheckJsonOutput::error(err),
        };
        let ok = output.ok;
        write_stdout_line(&output.into_string())?;
        return if ok {
            Ok(())
        } else {
            Err(anyhow::anyhow!("design check failed"))
        };
    }

    let build = load_and_build(&args.design, options)?;
    for warning in &build.warnings {
        println!("WARN {warning}");
    }
    let findings = lint_builtin_rules(&build.bundle.template.events);
    for finding in &findings {
        println!("ERR  {finding}");
    }
    if build.is_clean() {
        println!("OK  {} ({})", args.design.display(), build.bundle.hash_blake3);
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} violation(s), {} skipped node(s)",
            findings.len(),
            build.node_errors.len()
        ))
    }
}

async fn handle_generate(args: GenerateArgs, options: &BuildOptions) -> Result<()> {
    let build = load_and_build(&args.design, options)?;
    for violation in &build.violations {
        eprintln!("WARN {violation}");
    }
    let client = GenerationClient::new(&args.api_url)?;
    let body = client.submit(&build.bundle.template).await?;
    write_stdout_line(&body)
}

fn write_stdout_line(line: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}").context("failed to write to stdout")?;
    Ok(())
}
