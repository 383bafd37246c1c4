use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::config;
use crate::data::{FileThreadSource, MockThreadSource, ThreadSource};
use crate::engine::ThreadEngine;
use crate::logging;
use crate::render::{self, TextViewport};
use crate::sequence::{SubMode, ViewMode};

const DEMO_POSTS: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Snapshot(PathBuf),
    Demo(u64),
}

/// Options for one render run. Unset values fall back to the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: Option<ViewMode>,
    pub sub_mode: Option<SubMode>,
    pub show_cover: bool,
    pub load_all: bool,
    pub categories: Vec<String>,
    pub excluded_notices: Vec<String>,
    pub config_file: Option<PathBuf>,
    pub source: Option<Source>,
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<RunOptions> {
    let mut options = RunOptions::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{flag} needs a value"))
        };
        match arg.as_str() {
            "--mode" => options.mode = Some(value("--mode")?.parse()?),
            "--sub" => options.sub_mode = Some(value("--sub")?.parse()?),
            "--cover" => options.show_cover = true,
            "--all" => options.load_all = true,
            "--category" => options.categories.push(value("--category")?),
            "--exclude" => options.excluded_notices.push(value("--exclude")?),
            "--config" => options.config_file = Some(PathBuf::from(value("--config")?)),
            "--demo" => {
                let seed = value("--demo")?;
                let seed = seed
                    .parse()
                    .with_context(|| format!("invalid demo seed {seed:?}"))?;
                options.source = Some(Source::Demo(seed));
            }
            flag if flag.starts_with('-') => bail!("unknown flag {flag}"),
            path => {
                if options.source.is_some() {
                    bail!("only one thread source may be given");
                }
                options.source = Some(Source::Snapshot(PathBuf::from(path)));
            }
        }
    }
    Ok(options)
}

pub fn run() -> Result<()> {
    let options = parse_args(std::env::args().skip(1))?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render_thread(&options, &mut out)
}

/// Loads the thread, applies view and filters, and writes the rows a
/// renderer would receive.
pub fn render_thread(options: &RunOptions, out: &mut impl Write) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    logging::init(&cfg.log.filter);

    let snapshot = match options.source.as_ref() {
        Some(Source::Snapshot(path)) => FileThreadSource::new()
            .load_thread(&path.to_string_lossy())
            .context("load thread")?,
        Some(Source::Demo(seed)) => MockThreadSource {
            seed: *seed,
            posts: DEMO_POSTS,
        }
        .load_thread("demo")?,
        None => bail!("no thread given; pass a snapshot path or --demo SEED"),
    };

    let mut view = cfg.view_context();
    if let Some(mode) = options.mode {
        view.mode = mode;
    }
    if let Some(sub_mode) = options.sub_mode {
        view.sub_mode = sub_mode;
    }
    view.show_cover |= options.show_cover;

    let mut filters = cfg.filter_config();
    if !options.categories.is_empty() {
        filters.categories = options.categories.iter().cloned().collect();
    }
    filters
        .excluded_notices
        .extend(options.excluded_notices.iter().cloned());

    let mut engine = ThreadEngine::new(cfg.engine_settings());
    engine.set_view(view);
    engine.set_filters(filters);
    engine.load_snapshot(&snapshot);

    let mut viewport = TextViewport::new();
    if options.load_all {
        while engine.has_idle_work() {
            engine.run_idle(&mut viewport, cfg.display.idle_budget);
        }
        // Only threaded views continue loading in idle time.
        while engine.display_more().has_more {}
    }

    let rows = engine.rows();
    viewport.sync(&rows);
    out.write_all(render::render(&rows).as_bytes())
        .context("write rows")?;
    if engine.window().has_more(engine.active_sequence().len()) {
        writeln!(
            out,
            "... {} more",
            engine.active_sequence().len() - engine.displayed().len()
        )
        .context("write rows")?;
    }
    engine.teardown();
    Ok(())
}
