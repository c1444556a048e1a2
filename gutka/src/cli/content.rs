//! Content commands: shabad, hukamnama, search, history

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use gurbani::prelude::*;
use gutka::prelude::*;

use super::{AppContext, emit_json, parse_date};

#[derive(Args, Debug)]
pub struct ShabadArgs {
    /// Shabad id
    pub id: u32,

    /// Join words without spaces. Default: from settings
    #[arg(long)]
    pub larivaar: bool,

    /// Don't record the shabad in history
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Args, Debug)]
pub struct HukamnamaArgs {
    /// Date (YYYY-MM-DD). Default: today
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub query: String,

    /// Search type
    #[arg(long = "type", default_value = "first-letters-start")]
    pub search_type: SearchType,

    /// Source collection (e.g. G for Guru Granth Sahib)
    #[arg(long)]
    pub source: Option<String>,

    /// Maximum number of results
    #[arg(long)]
    pub limit: Option<u32>,
}

pub async fn handle_shabad(ctx: &AppContext, args: &ShabadArgs) -> Result<()> {
    let client = ctx.client()?;
    let shabad = client
        .shabad(args.id)
        .get()
        .await
        .with_context(|| format!("fetching shabad {}", args.id))?;

    if !args.no_history {
        let (store, mut library) = ctx.load_library()?;
        library.record_history(shabad.clone(), None)?;
        store.save(&library)?;
    }

    if ctx.json {
        return emit_json(&shabad);
    }
    let settings = ctx.paths.settings_store().load();
    print_shabad(&shabad, &settings, args.larivaar || settings.larivaar);
    Ok(())
}

pub async fn handle_hukamnama(ctx: &AppContext, args: &HukamnamaArgs) -> Result<()> {
    let client = ctx.client()?;
    let request = match &args.date {
        Some(date) => client.hukamnama(parse_date(date)?),
        None => client.hukamnama_today(),
    };
    let hukamnama = request.get().await.context("fetching hukamnama")?;
    if ctx.json {
        return emit_json(&hukamnama);
    }
    let settings = ctx.paths.settings_store().load();
    println!("Hukamnama {}", hukamnama.date);
    for shabad in &hukamnama.shabads {
        println!();
        print_shabad(shabad, &settings, settings.larivaar);
    }
    Ok(())
}

pub async fn handle_search(ctx: &AppContext, args: &SearchArgs) -> Result<()> {
    let client = ctx.client()?;
    let mut request = client.search(&args.query).search_type(args.search_type);
    if let Some(source) = &args.source {
        request = request.source(source);
    }
    if let Some(limit) = args.limit {
        request = request.limit(limit);
    }
    let hits = request.execute().await.context("searching")?;
    if ctx.json {
        return emit_json(&hits);
    }
    for hit in &hits {
        println!("{:>6}  {}  ({} ang {})", hit.shabad_id, hit.gurmukhi, hit.source.id, hit.page_no);
    }
    Ok(())
}

pub fn handle_history(ctx: &AppContext) -> Result<()> {
    let (_, library) = ctx.load_library()?;
    let entries: Vec<&HistoryItem> = library.history().collect();
    if ctx.json {
        return emit_json(&entries);
    }
    for entry in entries {
        println!(
            "{}  {:>6}  {}",
            entry.viewed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            entry.shabad.id(),
            entry.shabad.title()
        );
    }
    Ok(())
}

fn print_shabad(shabad: &Shabad, settings: &Settings, larivaar: bool) {
    let info = &shabad.info;
    let writer = info.writer.as_ref().map_or("", |writer| writer.english.as_str());
    println!("[{}] {} ang {} {writer}", info.shabad_id, info.source.english, info.page_no);
    let visraam_source = settings
        .visraam_source
        .parse::<VisraamSource>()
        .unwrap_or_default();
    for line in &shabad.lines {
        if settings.show_visraam && !larivaar {
            println!("{}", marked_text(line, visraam_source));
        } else {
            println!("{}", line.display_text(larivaar));
        }
        if settings.show_transliteration {
            if let Some(text) = line.transliteration(&settings.transliteration_script) {
                println!("  {text}");
            }
        }
        if let Some(text) =
            line.translation_or_any(&settings.translation_language, &settings.translation_source)
        {
            println!("  {text}");
        }
    }
}

/// Line text with `;` after minor and `.` after major pauses
fn marked_text(line: &Line, source: VisraamSource) -> String {
    line.words(source)
        .iter()
        .map(|word| match word.visraam {
            Some(VisraamKind::Minor) => format!("{};", word.text),
            Some(VisraamKind::Major) => format!("{}.", word.text),
            None => word.text.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
