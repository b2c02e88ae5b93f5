use clap::{Arg, ArgMatches, Command};
use glossa::{
    Document, EngineConfig, PanelController, ProgressFn, SharedDocument, TransformEngine, TransformResult,
};
use glossa_mt::{BackendChoice, build_panel, translation_chain};
use std::sync::Arc;
use tokio::sync::Mutex;

fn cli() -> Command {
    Command::new("glossa")
        .version("0.1.0")
        .about("Translate, proofread and restore document text")
        .subcommand_required(true)
        .arg(
            Arg::new("mock")
                .long("mock")
                .short('m')
                .global(true)
                .help("Use the mock backend instead of LibreTranslate")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .short('u')
                .global(true)
                .help("LibreTranslate server (default: $GLOSSA_LIBRETRANSLATE_URL)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("Engine configuration as JSON"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .help("Show detailed progress")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("translate-page")
                .about("Translate every text fragment of a JSON document")
                .arg(
                    Arg::new("document")
                        .help("Document file (JSON)")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("target-locale")
                        .help("Target language code (e.g., fr, es, de)")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("revert")
                        .long("revert")
                        .help("Restore the originals afterwards and print both versions")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("translate")
                .about("Translate a single string")
                .arg(Arg::new("text").required(true).index(1))
                .arg(Arg::new("target-locale").required(true).index(2))
                .arg(
                    Arg::new("source-locale")
                        .long("source")
                        .short('s')
                        .help("Source language code (default: auto)"),
                ),
        )
        .subcommand(
            Command::new("proofread")
                .about("Proofread a string and list the corrections")
                .arg(Arg::new("text").required(true).index(1)),
        )
        .subcommand(
            Command::new("ask")
                .about("Send a prompt to the assistant")
                .arg(Arg::new("prompt").required(true).index(1)),
        )
        .subcommand(Command::new("status").about("Check every backend once"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");

    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match matches.get_one::<String>("config") {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let choice = BackendChoice::from_flags(
        matches.get_flag("mock"),
        matches.get_one::<String>("url").map(String::as_str),
    )?;
    if verbose {
        eprintln!("🔌 Backend: {}", choice.label());
    }

    match matches.subcommand() {
        Some(("translate-page", sub)) => translate_page(sub, &choice, config, verbose).await,
        Some(("translate", sub)) => {
            let panel = build_panel(&choice, &config);
            translate(sub, &panel, verbose).await
        }
        Some(("proofread", sub)) => {
            let panel = build_panel(&choice, &config);
            proofread(sub, &panel).await
        }
        Some(("ask", sub)) => {
            let panel = build_panel(&choice, &config);
            let prompt = required(sub, "prompt")?;
            println!("{}", panel.ask(prompt).await);
            Ok(())
        }
        Some(("status", _)) => {
            let panel = build_panel(&choice, &config);
            for status in panel.status().await {
                let state = status
                    .state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "local only".to_string());
                let backend = status.backend.unwrap_or_else(|| "-".to_string());
                match status.diagnostic {
                    Some(diagnostic) => println!(
                        "{:<10} {:<16} {} ({})",
                        status.capability, backend, state, diagnostic
                    ),
                    None => println!("{:<10} {:<16} {}", status.capability, backend, state),
                }
            }
            panel.shutdown().await;
            Ok(())
        }
        _ => Err("unknown subcommand".into()),
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, Box<dyn std::error::Error>> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument: {}", name).into())
}

async fn translate_page(
    matches: &ArgMatches,
    choice: &BackendChoice,
    config: EngineConfig,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = required(matches, "document")?;
    let target = required(matches, "target-locale")?;

    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read document {}: {}", path, e))?;
    let document: SharedDocument = Arc::new(Mutex::new(Document::from_json(&raw)?));
    let chain = translation_chain(choice, &config);
    let engine = TransformEngine::new(Arc::clone(&document), chain, config)?;

    if verbose {
        let content = engine.extract_page_content().await;
        eprintln!("📄 \"{}\" ({} chars of main text)", content.title, content.main_text.chars().count());
    }

    let summary = match engine.transform_tree(target).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("❌ Translation failed: {}", e);
            return Err(e.into());
        }
    };

    if verbose {
        eprintln!(
            "🌍 {} elements translated to {} ({} skipped)",
            summary.translated_elements, summary.language, summary.skipped
        );
    }
    println!("{}", serde_json::to_string_pretty(&document.lock().await.to_spec())?);

    if matches.get_flag("revert") {
        let reverted = engine.revert().await;
        if verbose {
            eprintln!("↩️  {} elements restored", reverted);
        }
        println!("{}", serde_json::to_string_pretty(&document.lock().await.to_spec())?);
    }
    engine.chain().destroy().await;
    Ok(())
}

async fn translate(
    matches: &ArgMatches,
    panel: &PanelController,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = required(matches, "text")?;
    let target = required(matches, "target-locale")?;
    let source = matches.get_one::<String>("source-locale").map(String::as_str);

    if verbose {
        eprintln!("📝 Source: \"{}\"", text);
        eprintln!("🌍 {} → {}", source.unwrap_or("auto"), target);
    }

    let result = panel.translate_text(text, source, target).await?;
    panel.shutdown().await;
    match result {
        TransformResult::Success { output, metadata } => {
            if verbose && metadata.fallback_used {
                eprintln!("⚠️  Backend unavailable, used the local fallback");
            }
            println!("{}", output);
            Ok(())
        }
        TransformResult::Failure { message, .. } => {
            eprintln!("❌ {}", message);
            Err(message.into())
        }
    }
}

async fn proofread(
    matches: &ArgMatches,
    panel: &PanelController,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = required(matches, "text")?;
    let on_progress: &ProgressFn<'_> = &|percent| eprintln!("⏳ Downloading model: {}%", percent);

    let Some(report) = panel.proofread(text, Some(on_progress)).await else {
        eprintln!("Nothing to proofread");
        return Ok(());
    };
    println!("{}", report.corrected);
    if report.highlights.is_empty() {
        eprintln!("✅ No corrections");
    } else {
        for highlight in &report.highlights {
            eprintln!("   {}", highlight);
        }
    }
    panel.shutdown().await;
    Ok(())
}
