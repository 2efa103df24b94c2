use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tmsync::{
    CatalogFormat, CatalogStore, DirectoryResolver, FileCatalogStore, Glossary, ModuleLayout,
    ModuleResolver, SelectionMode, generate_candidates,
};
use tmsync_mt::{ProviderConfig, ProviderKind, RunOptions, TranslationOrchestrator};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tmsync", version, about = "Keep translation catalogs in sync using machine translation")]
struct Cli {
    /// Show debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate missing keys and optionally review existing ones
    Translate(TranslateArgs),

    /// Manage per-language-pair glossaries
    #[command(subcommand)]
    Glossary(GlossaryCommand),
}

#[derive(Subcommand)]
enum GlossaryCommand {
    /// Propose glossary terms from single-word translations already in the catalogs
    Generate(GenerateArgs),
}

#[derive(Args)]
struct ModuleArgs {
    /// Module directory, or its name under --root
    module: String,

    /// Directory containing the modules
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Source language code
    #[arg(long, short = 's', default_value = "en")]
    source: String,

    /// Catalog file format (json or yml)
    #[arg(long, default_value = "yml", value_parser = parse_format)]
    format: CatalogFormat,
}

#[derive(Args)]
struct TranslateArgs {
    #[command(flatten)]
    module: ModuleArgs,

    /// Target language code; repeat for several. Defaults to every catalog found
    #[arg(long = "target", short = 't')]
    targets: Vec<String>,

    /// Translation backend; defaults to deepl when an API key is given, else ollama
    #[arg(long, value_enum)]
    driver: Option<ProviderKind>,

    /// Use the offline mock translator
    #[arg(long, short = 'm', conflicts_with = "driver")]
    mock: bool,

    /// Ollama model
    #[arg(long, env = "OLLAMA_MODEL")]
    model: Option<String>,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_URL")]
    url: Option<String>,

    /// DeepL API host, when not derived from the key
    #[arg(long, env = "DEEPL_URL")]
    deepl_url: Option<String>,

    /// DeepL API key
    #[arg(long, env = "DEEPL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Retries for requests that fail before a response arrives
    #[arg(long, default_value_t = 1)]
    retries: u32,

    /// Entries per provider call; 1 disables batching
    #[arg(long, default_value_t = 15)]
    batch_size: usize,

    /// Maximum translation attempts (and corrections) per language
    #[arg(long, default_value_t = 1000)]
    limit: usize,

    /// Also re-translate values that are still identical to the source
    #[arg(long)]
    all: bool,

    /// Skip translation of new keys
    #[arg(long)]
    no_translate: bool,

    /// Review existing translations and apply corrections
    #[arg(long)]
    review: bool,

    /// Remove keys no longer in the source catalog
    #[arg(long)]
    clear_unused: bool,

    /// Merge source defaults into an existing target catalog
    #[arg(long)]
    merge: bool,

    /// Ignore glossary files
    #[arg(long)]
    no_glossary: bool,

    /// Language whose existing value is passed as a reference on single calls
    #[arg(long)]
    reference: Option<String>,

    /// Write changes; without it the run is a dry run
    #[arg(long, short = 'w')]
    write: bool,
}

#[derive(Args)]
struct GenerateArgs {
    #[command(flatten)]
    module: ModuleArgs,

    /// Target language code; repeat for several
    #[arg(long = "target", short = 't', required = true)]
    targets: Vec<String>,

    /// Minimum length of a source term
    #[arg(long, default_value_t = 3)]
    min_length: usize,

    /// Write the glossary file; without it candidates are only listed
    #[arg(long, short = 'w')]
    write: bool,
}

fn parse_format(value: &str) -> Result<CatalogFormat, String> {
    CatalogFormat::from_extension(value).ok_or_else(|| format!("unknown catalog format '{}'", value))
}

fn resolve(args: &ModuleArgs) -> Result<ModuleLayout, String> {
    DirectoryResolver::new(&args.root)
        .resolve(&args.module)
        .ok_or_else(|| format!("Module '{}' not found: no lang/ directory", args.module))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Command::Translate(args) => translate(args).await,
        Command::Glossary(GlossaryCommand::Generate(args)) => generate(args),
    }
}

async fn translate(args: TranslateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = resolve(&args.module)?;

    let kind = if args.mock {
        ProviderKind::Mock
    } else {
        args.driver.unwrap_or(if args.api_key.is_some() {
            ProviderKind::Deepl
        } else {
            ProviderKind::Ollama
        })
    };
    let glossary_map = layout.glossary_map();
    let config = ProviderConfig {
        kind,
        model: args.model,
        url: args.url,
        deepl_url: args.deepl_url,
        api_key: args.api_key,
        glossary_map: glossary_map.is_file().then_some(glossary_map),
        timeout_secs: args.timeout,
        max_retries: args.retries,
    };

    let options = RunOptions {
        source_lang: args.module.source.clone(),
        target_langs: args.targets,
        mode: if args.all { SelectionMode::All } else { SelectionMode::New },
        auto_translate: !args.no_translate,
        review: args.review,
        clear_unused: args.clear_unused,
        merge: args.merge,
        enrich: false,
        use_glossary: !args.no_glossary,
        reference_lang: args.reference,
        batch_size: args.batch_size,
        limit: args.limit,
        dry_run: !args.write,
    };

    let store = FileCatalogStore::new(args.module.format);
    let mut orchestrator = TranslationOrchestrator::new(store, config);
    let reports = orchestrator.run(&layout, &options, None).await?;

    if reports.is_empty() {
        println!("ℹ️  No target languages found in {}", layout.lang_dir().display());
        return Ok(());
    }

    let mut failed = 0;
    for (language, result) in &reports {
        match result {
            Ok(report) => println!(
                "✅ {}: {} translated, {} corrected, {} removed{}",
                language,
                report.translated,
                report.corrected,
                report.pruned,
                if report.written { "" } else { " (not written)" }
            ),
            Err(e) => {
                eprintln!("❌ {}: {}", language, e);
                failed += 1;
            }
        }
    }

    if options.dry_run {
        println!("ℹ️  Dry run. Pass --write to save changes.");
    }
    if failed > 0 {
        return Err(format!("{} of {} languages failed", failed, reports.len()).into());
    }
    Ok(())
}

fn generate(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = resolve(&args.module)?;
    let store = FileCatalogStore::new(args.module.format);
    let dir = layout.lang_dir();
    let source = store.read(&args.module.source, &dir)?;

    for target_lang in &args.targets {
        let target = store.read(target_lang, &dir)?;
        let candidates = generate_candidates(&source, &target, args.min_length);

        for term in &candidates.conflicts {
            eprintln!("⚠️  {}: '{}' has conflicting translations, keeping the first", target_lang, term);
        }

        let path = layout.glossary_file(&args.module.source, target_lang);
        let mut glossary = Glossary::load_csv(&path)?;
        let existing = glossary.len();
        for (term, translation) in &candidates.glossary.0 {
            if glossary.get(term).is_none() {
                glossary.with_term(term, translation);
            }
        }
        let added = glossary.len() - existing;

        if args.write {
            glossary.write_csv(&path)?;
            println!("✅ {}: {} new terms written to {}", target_lang, added, path.display());
        } else {
            for (term, translation) in &candidates.glossary.0 {
                println!("   {} → {}", term, translation);
            }
            println!("ℹ️  {}: {} new terms. Pass --write to save them.", target_lang, added);
        }
    }
    Ok(())
}
