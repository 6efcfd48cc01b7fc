use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use spanlight::logging::{init_logging, init_logging_with_dir, AttemptLog};
use spanlight::{Document, Locator, LocatorConfig, MatchResult, Mode, Query};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = "Locate a passage on a page and print its highlight rectangles as JSON.",
    arg_required_else_help = true
)]
pub struct Args {
    /// Page JSON ({text, words, bounds}) or document JSON ({pages: [...]})
    pub input: PathBuf,

    /// 1-indexed page to search
    #[clap(long, default_value_t = 1)]
    pub page: usize,

    /// Passage to locate
    #[clap(short, long, conflicts_with_all = ["query_file", "queries"])]
    pub query: Option<String>,

    /// Read the passage from a file
    #[clap(long, conflicts_with = "queries")]
    pub query_file: Option<PathBuf>,

    /// JSON lines of {"text": ..., "page": ...}, located in parallel
    #[clap(long)]
    pub queries: Option<PathBuf>,

    /// Locator configuration JSON. `~` and environment variables are expanded.
    #[clap(short, long)]
    pub config: Option<String>,

    /// Strategy preset, `full` or `selection`. Overrides the strategies of --config.
    #[clap(long)]
    pub mode: Option<Mode>,

    /// Print strategy and confidence along with the rectangles
    #[clap(short, long)]
    pub extended: bool,

    /// Optional pretty print output.
    #[clap(short, long)]
    pub pretty: bool,

    /// Optional output file path. If omitted, writes to stdout.
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Report every strategy attempt on stderr (single query only)
    #[clap(long, conflicts_with = "queries")]
    pub explain: bool,

    /// Directory for the debug log file
    #[clap(long)]
    pub log_dir: Option<PathBuf>,

    /// Debug logging for all engine targets
    #[clap(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }
}

fn load_config(path: Option<&str>) -> anyhow::Result<LocatorConfig> {
    let Some(path) = path else {
        return Ok(LocatorConfig::default());
    };
    let expanded = shellexpand::full(path).with_context(|| format!("expanding {path}"))?;
    LocatorConfig::from_json_file(expanded.as_ref())
        .with_context(|| format!("loading config {expanded}"))
}

fn load_queries(args: &Args) -> anyhow::Result<Vec<Query>> {
    if let Some(path) = &args.queries {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading queries {}", path.display()))?;
        return raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("{}:{}: malformed query", path.display(), n + 1))
            })
            .collect();
    }

    let text = match (&args.query, &args.query_file) {
        (Some(query), _) => query.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("reading query {}", path.display()))?
            .trim_end_matches(['\r', '\n'])
            .to_string(),
        (None, None) => bail!("one of --query, --query-file or --queries is required"),
    };
    Ok(vec![Query::new(text, args.page)])
}

fn render(result: &MatchResult, extended: bool) -> serde_json::Result<serde_json::Value> {
    if extended {
        serde_json::to_value(result)
    } else {
        serde_json::to_value(&result.rectangles)
    }
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse_args();

    let attempts = args.explain.then(AttemptLog::new);

    // Keep the guards alive until output is written
    let _guards = match &args.log_dir {
        Some(dir) => {
            let (file, stderr) = init_logging_with_dir(args.verbose, dir, attempts.clone())
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            vec![file, stderr]
        }
        None => vec![init_logging(args.verbose, attempts.clone())],
    };

    let mut config = load_config(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config = config.with_mode(mode);
    }
    let locator = Locator::new(config)?;

    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let document = Document::from_json_str(&raw)
        .with_context(|| format!("parsing {}", args.input.display()))?;

    let queries = load_queries(&args)?;

    let output = if args.queries.is_some() {
        let results = locator.locate_many(&document, &queries);
        let rendered = results
            .iter()
            .map(|r| match r {
                Ok(result) => render(result, args.extended),
                Err(e) => Ok(json!({ "error": e.to_string() })),
            })
            .collect::<serde_json::Result<Vec<_>>>()?;
        info!(queries = queries.len(), "Located batch");
        to_json(&rendered, args.pretty)?
    } else {
        let query = queries.first().context("no query given")?;
        let result = locator.locate_in_document(&document, query)?;
        info!(
            strategy = result.strategy.map(|s| s.as_str()),
            confidence = result.confidence,
            rects = result.rectangles.len(),
            "Located passage"
        );
        to_json(&render(&result, args.extended)?, args.pretty)?
    };

    if let Some(log) = &attempts {
        let mut stderr = std::io::stderr().lock();
        for (n, attempt) in log.snapshot().iter().enumerate() {
            let outcome = if attempt.skipped {
                "skipped (query too short)".to_string()
            } else if attempt.matched {
                format!("{} rects, confidence {:.3}", attempt.rects, attempt.confidence)
            } else {
                "no match".to_string()
            };
            writeln!(stderr, "{}. {}: {}", n + 1, attempt.strategy, outcome)?;
        }
    }

    match &args.output {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("writing {}", path.display()))?;
            info!("Output written to: {:?}", path);
        }
        None => println!("{}", output),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_flag() {
        let args = Args::try_parse_from(["spanlight", "page.json", "-q", "x", "--mode", "selection"])
            .unwrap();
        assert_eq!(args.mode, Some(Mode::Selection));

        let args = Args::try_parse_from(["spanlight", "page.json", "-q", "x"]).unwrap();
        assert_eq!(args.mode, None);

        assert!(Args::try_parse_from(["spanlight", "page.json", "-q", "x", "--mode", "fast"]).is_err());
    }

    #[test]
    fn test_explain_requires_single_query() {
        assert!(Args::try_parse_from(["spanlight", "page.json", "-q", "x", "--explain"]).is_ok());
        assert!(Args::try_parse_from([
            "spanlight",
            "page.json",
            "--queries",
            "queries.jsonl",
            "--explain"
        ])
        .is_err());
    }
}
