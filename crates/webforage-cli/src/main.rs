use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use webforage::{DictionaryClient, ResearchEngine, ResearchOptions, ResearchResult};

#[derive(Parser, Debug)]
#[command(name = "webforage")]
#[command(version)]
#[command(about = "Key-less web research from the command line", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Research a topic: expand it into queries, seed from search, crawl
    /// politely, and print the extracted fragments.
    Research(ResearchCmd),
    /// Look a topic up in the encyclopedia summary endpoints, skipping the crawl.
    Lookup(LookupCmd),
    /// Print the search queries a topic expands into, one per line.
    Expand(ExpandCmd),
}

#[derive(clap::Args, Debug)]
struct ResearchCmd {
    /// Topic to research.
    topic: String,
    /// Stop after this many extracted pages (clamped to 1..=200).
    #[arg(long)]
    max_pages: Option<usize>,
    /// Stop after this many seconds of wall clock (clamped to 1..=300).
    #[arg(long)]
    max_time_seconds: Option<u64>,
    /// Print the raw result as pretty JSON instead of markdown.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct LookupCmd {
    /// Topic to look up.
    topic: String,
    /// Print the hit as pretty JSON (a miss prints "null").
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct ExpandCmd {
    /// Topic to expand.
    topic: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Research(args) => {
            let mut engine = ResearchEngine::new().context("initialize research engine")?;
            let opts = ResearchOptions {
                max_pages: args.max_pages,
                max_time_seconds: args.max_time_seconds,
            };
            let out = engine.research(&args.topic, &opts).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_research(&out);
            }
        }
        Commands::Lookup(args) => {
            let dict = DictionaryClient::new().context("initialize dictionary client")?;
            match dict.lookup(&args.topic).await {
                Some(hit) => {
                    if args.json {
                        let v = serde_json::json!({
                            "title": hit.title,
                            "extract": hit.extract,
                            "sourceUrl": hit.source_url,
                        });
                        println!("{}", serde_json::to_string_pretty(&v)?);
                    } else {
                        println!("{}", hit.title);
                        println!();
                        println!("{}", hit.extract);
                        println!();
                        println!("Source: {}", hit.source_url);
                    }
                }
                None => {
                    // A miss is data in JSON mode, an error for humans.
                    if args.json {
                        println!("null");
                    } else {
                        anyhow::bail!("no summary found for \"{}\"", args.topic);
                    }
                }
            }
        }
        Commands::Expand(args) => {
            let key = webforage::normalize_topic(&args.topic);
            anyhow::ensure!(!key.is_empty(), "topic is empty after normalization");
            for query in webforage::local::expand::expand(&key) {
                println!("{query}");
            }
        }
    }

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level.
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("webforage=info,warn"),
            1 => EnvFilter::new("webforage=debug,info"),
            2 => EnvFilter::new("webforage=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_research(out: &ResearchResult) {
    if out.not_found {
        println!("No usable pages found for \"{}\".", out.topic);
        return;
    }

    println!("# {}", out.topic);
    println!();
    println!("{}", out.summary);
    println!();
    println!("## Sources");
    for (i, url) in out.sources.iter().enumerate() {
        println!("{}. {}", i + 1, url);
    }

    // Fragments pair with sources by index, so code samples can cite
    // the page they came from.
    let has_code = out.fragments.iter().any(|f| !f.code.is_empty());
    if has_code {
        println!();
        println!("## Code samples");
        for (frag, source) in out.fragments.iter().zip(&out.sources) {
            for sample in &frag.code {
                println!();
                println!("```{}", sample.lang.as_deref().unwrap_or(""));
                println!("{}", sample.code);
                println!("```");
                println!("({source})");
            }
        }
    }
}
