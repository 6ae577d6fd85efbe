use clap::Parser;
use vidsift::fetch::HttpFetcher;
use vidsift::pipeline::{ExtractionPipeline, MediaAsset};

pub(crate) mod cli;
pub(crate) mod logger;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse arguments
    let args = cli::Args::parse();

    // Set up logger
    if let Err(err) = logger::init(args.debug) {
        eprintln!("Failed to set up logger: {err}");
    }

    let fetcher = match HttpFetcher::new(args.user_agent.as_deref(), args.retries.inner().copied()) {
        Ok(fetcher) => fetcher,
        Err(err) => {
            log::error!("Failed to create http client: {:#}", err);
            std::process::exit(1);
        }
    };

    let context = args.get_extraction_context();
    let pipeline = ExtractionPipeline::new(args.get_ranker());

    let assets = match &args.input {
        Some(input) => match tokio::fs::read_to_string(input).await {
            Ok(page_text) => pipeline.run(&page_text, &context, &fetcher).await,
            Err(err) => {
                log::error!("Failed to read {}: {}", input.display(), err);
                std::process::exit(1);
            }
        },
        None => match pipeline.run_url(&context, &fetcher).await {
            Ok(assets) => assets,
            Err(err) => {
                log::error!("Failed to get page source: {:#}", err);
                std::process::exit(1);
            }
        },
    };

    if assets.is_empty() {
        log::error!("No playable video found for the url: {}", args.url);
        std::process::exit(1);
    }

    log::debug!("Found {} video(s)", assets.len());

    if args.json {
        println!("{:#}", assets_to_json(&assets));
    } else {
        for asset in &assets {
            println!("{}\t{}", asset.label, asset.url);
        }
    }
}

fn assets_to_json(assets: &[MediaAsset]) -> serde_json::Value {
    assets
        .iter()
        .map(|asset| {
            serde_json::json!({
                "url": asset.url,
                "quality": asset.label.quality(),
                "label": asset.label.to_string(),
                "headers": asset.referer_headers,
            })
        })
        .collect()
}
