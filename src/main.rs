use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thumbcache::config;
use thumbcache::output;
use thumbcache::params::ParameterMap;
use thumbcache::thumbnail::Thumbnailer;

/// Transformation parameters shared by the building commands.
#[derive(clap::Args, Clone)]
struct ParamArgs {
    /// Parameters as an ordered JSON object, e.g. '{"resize":{"width":200}}'
    #[arg(long, short, default_value = "{}")]
    params: String,
}

#[derive(Parser)]
#[command(name = "thumbcache")]
#[command(about = "Cached image thumbnails from declarative parameters")]
#[command(long_about = "\
Cached image thumbnails from declarative parameters

A thumbnail is a source image plus an ordered JSON program of operations.
The pair is fingerprinted; the result is stored once under the cache root
and served from there until it goes stale.

Operations (applied in the order given):
  resize        {\"width\", \"height\", \"master\"}
  crop          {\"width\", \"height\", \"offset_x\", \"offset_y\"}
  scaleAndCrop  {\"width\", \"height\"}
  rotate        degrees | {\"degrees\"}
  flip          \"horizontal\" | \"vertical\" | {\"direction\"}
  sharpen       amount | {\"amount\"}
  reflection    {\"height\", \"opacity\", \"fade_in\"}
  watermark     path | {\"watermark\", \"offset_x\", \"offset_y\", \"opacity\"}
  background    \"#rrggbb\" | {\"color\", \"opacity\"}
  quality       0-100
  type          jpg | png | gif | webp | tiff | avif

Cache layout:

  {web_root}/{cache_path}/
  ├── 3/
  │   ├── 3f9c…e1.jpg       # {fingerprint}.{ext}
  │   └── 3f9c…e1@2x.jpg    # retina variant (retina_support = true)
  └── a/
      └── a07b…44.png

Run 'thumbcache gen-config' to generate a documented thumbcache.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (stock defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the URL of a thumbnail, building it if needed
    Url {
        /// Public path of the source image
        source: String,
        #[command(flatten)]
        params: ParamArgs,
        /// Version string mixed into the cache key
        #[arg(long)]
        hash: Option<String>,
    },
    /// Write a transformed image without caching it
    Render {
        /// Public path of the source image
        source: String,
        /// Output file
        #[arg(long, short)]
        out: PathBuf,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Thumbnail every supported image below a directory
    Batch {
        /// Directory to scan (defaults to the web root)
        dir: Option<PathBuf>,
        #[command(flatten)]
        params: ParamArgs,
        /// Version string mixed into every cache key
        #[arg(long)]
        hash: Option<String>,
        /// Maximum parallel workers (defaults to all cores)
        #[arg(long, short)]
        jobs: Option<usize>,
    },
    /// Summarize the cache directory
    Inspect,
    /// Print a stock thumbcache.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let thumbnailer = || -> Result<Thumbnailer, config::ConfigError> {
        Ok(Thumbnailer::from_config(config::load_config(
            cli.config.as_deref(),
        )?))
    };

    match cli.command {
        Command::Url {
            source,
            params,
            hash,
        } => {
            let params = ParameterMap::from_json(&params.params)?;
            let lookup = thumbnailer()?.thumbnail(&source, &params, hash.as_deref())?;
            output::print_lookup(&lookup);
        }
        Command::Render {
            source,
            out,
            params,
        } => {
            let params = ParameterMap::from_json(&params.params)?;
            match thumbnailer()?.render_thumbnail(&source, &params)? {
                Some(bytes) => {
                    std::fs::write(&out, &bytes)?;
                    println!("{} ({} bytes)", out.display(), bytes.len());
                }
                None => println!("unavailable"),
            }
        }
        Command::Batch {
            dir,
            params,
            hash,
            jobs,
        } => {
            let params = ParameterMap::from_json(&params.params)?;
            let thumbnailer = thumbnailer()?;
            init_thread_pool(jobs);
            let web_root = thumbnailer.config().web_root.clone();
            let dir = dir.unwrap_or_else(|| web_root.clone());
            let sources =
                thumbcache::batch::collect_sources(&web_root, thumbnailer.store().root(), &dir)?;
            println!("==> Thumbnailing {} images from {}", sources.len(), dir.display());

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let summary = thumbcache::batch::run_batch(
                &thumbnailer,
                &sources,
                &params,
                hash.as_deref(),
                Some(tx),
            );
            printer
                .join()
                .map_err(|_| "output thread panicked".to_string())?;
            println!("==> {summary}");
        }
        Command::Inspect => {
            let thumbnailer = thumbnailer()?;
            let summary = thumbnailer.store().inspect()?;
            output::print_inspect(thumbnailer.store().root(), &summary);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool.
///
/// Capped at the number of available CPU cores: `--jobs` can only lower it.
fn init_thread_pool(jobs: Option<usize>) {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let threads = jobs.map(|n| n.clamp(1, cores)).unwrap_or(cores);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
