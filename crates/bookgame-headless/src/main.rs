//! Headless runner: loads a book, replays a scripted session against the
//! core with a simulated scene, prints the final state and checks that a
//! second replay ends in the same state.

use anyhow::{Context, Result, bail};
use bookgame_core::id::ChapterId;
use bookgame_data::load_book;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod script;

use script::{Session, load_script};

#[derive(Parser, Debug)]
#[command(name = "bookgame-headless")]
#[command(about = "Replay a scripted AR book session without a browser")]
#[command(version)]
struct Args {
    /// Directory holding content.{json,ron,toml} and optional settings.*
    #[arg(short, long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/../bookgame-data/content"))]
    book: PathBuf,

    /// JSON array of script steps. Without it only startup is replayed.
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Refuse camera access.
    #[arg(long)]
    deny_camera: bool,

    /// Make the scene fail to build for this chapter. Repeatable.
    #[arg(long = "fail-chapter")]
    fail_chapters: Vec<String>,

    /// Make this asset or entity fail to load. Repeatable.
    #[arg(long = "fail-resource")]
    fail_resources: Vec<String>,

    /// Print the final state as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookgame_core=info,bookgame_data=info,bookgame_headless=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let book = load_book(&args.book)
        .with_context(|| format!("loading book from {}", args.book.display()))?;
    let steps = match &args.script {
        Some(path) => load_script(path)?,
        None => Vec::new(),
    };
    tracing::info!(steps = steps.len(), "replaying session");

    let session = Session {
        deny_camera: args.deny_camera,
        fail_chapters: args.fail_chapters.iter().map(|c| ChapterId::from(c.as_str())).collect(),
        fail_resources: args.fail_resources.clone(),
    };

    let first = session.run(&book.content, &book.config, &steps)?;
    let state = &first.state;

    println!("=== {} chapters, content {} ===", book.content.chapters.len(), book.content.version.version);
    println!("mode:        {:?}", state.mode);
    println!("route:       {:?}", state.current_route.as_ref().map(|r| r.page.slug()));
    println!("chapter:     {:?}", state.current_chapter.as_ref().map(|c| c.as_str()));
    println!("loading:     {:?}", state.loading);
    println!("camera:      {:?}", state.camera_permission);
    println!("tracked:     {:?}", state.tracked_targets.as_slice());
    println!("tutorial:    {:?} (complete: {})", state.current_tutorial_step_id, state.tutorial_complete);
    println!("error:       {:?}", state.error.as_ref().map(|e| &e.message));
    println!(
        "events:      {}, commands: {}, notifications: {}",
        first.events_delivered, first.commands_applied, first.notifications
    );

    if !first.recent_commands.is_empty() {
        println!("recent commands:");
        let skip = first.recent_commands.len().saturating_sub(8);
        for (at, command) in &first.recent_commands[skip..] {
            println!("  @{at:>6}  {command:?}");
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(state)?);
    }

    let second = session.run(&book.content, &book.config, &steps)?;
    if second.state != first.state {
        bail!("replay is not deterministic: second run ended in a different state");
    }
    println!("Determinism: PASS");
    Ok(())
}
