use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mapbind::{bind, BuildOptions, MappingModel, MetadataSource};

/// MapBind - bind annotation metadata into a relational mapping model
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML file with class descriptors and global generators
    descriptors: PathBuf,

    /// YAML file with build options (environment variables are used otherwise)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Output format of the bound model
    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
    Summary,
}

fn load_options(cli: &Cli) -> anyhow::Result<BuildOptions> {
    let options = match &cli.options {
        Some(path) => BuildOptions::from_yaml_file(path)
            .with_context(|| format!("loading build options from {}", path.display()))?,
        None => BuildOptions::from_env().context("reading build options from the environment")?,
    };
    Ok(options)
}

fn print_summary(model: &MappingModel) {
    for entity in &model.entities {
        let table = model.table_of(entity.table);
        println!(
            "{} ({:?}) -> {}",
            entity.entity_name,
            entity.kind,
            table.qualified_name()
        );
        for property in &entity.properties {
            let columns: Vec<String> = model
                .value(property.value)
                .columns()
                .iter()
                .map(|c| c.render())
                .collect();
            let marker = if property.synthetic { " (synthetic)" } else { "" };
            println!("  {}{} [{}]", property.name, marker, columns.join(", "));
        }
    }
    for table in &model.tables {
        for foreign_key in &table.foreign_keys {
            let columns: Vec<String> = foreign_key.columns.iter().map(|c| c.render()).collect();
            println!(
                "FK {}({}) -> {}",
                table.qualified_name(),
                columns.join(", "),
                model.table_of(foreign_key.referenced_table).qualified_name()
            );
        }
    }
    for warning in &model.warnings {
        println!("WARN {}", warning);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let options = load_options(&cli)?;
    let source = MetadataSource::from_yaml_file(&cli.descriptors)
        .with_context(|| format!("loading descriptors from {}", cli.descriptors.display()))?;
    let model = bind(&source, &options)?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&model)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&model)?),
        OutputFormat::Summary => print_summary(&model),
    }
    Ok(())
}

fn main() {
    // Optional .env with MAPBIND_* settings
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::debug!("MapBind v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli) {
        eprintln!("Binding failed: {:#}", e);
        std::process::exit(1);
    }
}
