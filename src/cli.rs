use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use vidsift::pipeline::ExtractionContext;
use vidsift::quality::{QualityRanker, RankingPolicy};

#[derive(Parser, Debug)]
#[command(version)]
/// Find the playable videos of an embed page
pub(crate) struct Args {
    /// Preferred quality, e.g. 720p
    #[arg(short, long, value_name = "QUALITY")]
    pub(crate) quality: Option<String>,

    /// Order of the remaining qualities
    #[arg(value_enum, long, ignore_case = true, default_value_t = RankingPolicy::Descending)]
    pub(crate) policy: RankingPolicy,

    /// Prefix for quality labels, e.g. the name of the hoster
    #[arg(short, long, value_name = "TEXT")]
    pub(crate) label: Option<String>,

    /// Read the page source from a file instead of downloading it
    #[arg(short, long, value_name = "FILE")]
    pub(crate) input: Option<PathBuf>,

    /// Extra request header, can be repeated
    #[arg(short = 'H', long = "header", value_parser = parse_header, value_name = "NAME: VALUE")]
    pub(crate) headers: Vec<Header>,

    /// Referer to send instead of the page url
    #[arg(long, value_name = "URL")]
    pub(crate) referer: Option<String>,

    /// User agent for all requests
    #[arg(long, value_name = "USER_AGENT")]
    pub(crate) user_agent: Option<String>,

    /// Number of request retries
    #[arg(short = 'R', long, value_parser = parse_optional_with_inf_as_none::<u32>, default_value = "5", value_name = "INF|NUMBER")]
    pub(crate) retries: OptionWrapper<u32>,

    /// Print the videos as JSON
    #[arg(long)]
    pub(crate) json: bool,

    /// Enable debug mode
    #[arg(short, long)]
    pub(crate) debug: bool,

    /// Embed page URL
    pub(crate) url: String,
}

impl Args {
    pub(crate) fn get_ranker(&self) -> QualityRanker {
        QualityRanker::new(self.policy).with_preference(self.quality.as_deref())
    }

    pub(crate) fn get_extraction_context(&self) -> ExtractionContext {
        let mut context = ExtractionContext::new(self.url.as_str());

        if let Some(referer) = &self.referer {
            context = context.with_header("Referer", referer);
        }

        for header in &self.headers {
            context = context.with_header(&header.name, &header.value);
        }

        if let Some(label) = &self.label {
            context = context.with_label_prefix(label.as_str());
        }

        context
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) name: String,
    pub(crate) value: String,
}

fn parse_header(input: &str) -> Result<Header, String> {
    let Some((name, value)) = input.split_once(':') else {
        return Err(format!("expected \"Name: value\", got \"{input}\""));
    };

    let name = name.trim();

    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(format!("invalid header name \"{name}\""));
    }

    Ok(Header {
        name: name.to_string(),
        value: value.trim().to_string(),
    })
}

#[derive(Debug, Clone)]
pub(crate) struct OptionWrapper<T>(Option<T>);

impl<T> OptionWrapper<T> {
    pub(crate) fn inner(&self) -> Option<&T> {
        self.0.as_ref()
    }
}

fn parse_optional_with_none<T: FromStr>(input: &str, none_value: &'static str) -> Result<OptionWrapper<T>, String>
where
    T::Err: Display,
{
    if input.eq_ignore_ascii_case(none_value) {
        Ok(OptionWrapper(None))
    } else {
        input
            .parse::<T>()
            .map(|value| OptionWrapper(Some(value)))
            .map_err(|err| format!("{err}"))
    }
}

fn parse_optional_with_inf_as_none<T: FromStr>(input: &str) -> Result<OptionWrapper<T>, String>
where
    T::Err: Display,
{
    parse_optional_with_none(input, "inf")
}
