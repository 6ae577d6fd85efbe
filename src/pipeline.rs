use std::borrow::Cow;
use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::quality::{self, QualityLabel, QualityRanker};
use crate::{manifest, packer, resolve};

pub type HeaderList = BTreeMap<String, String>;

pub const MANIFEST_EXTENSIONS: &[&str] = &["m3u8", "m3u"];
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "m4v", "mov", "flv"];

static ABSOLUTE_URL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s"'`<>\\(){}\[\]]+"#).unwrap());
static PLAYER_PROPERTY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\b(?:file|src)["']?\s*[:=]\s*["']([^"'\s]+)["']"#).unwrap());

/// Everything the pipeline needs to know about the page it is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionContext {
    page_url: String,
    referer_headers: HeaderList,
    label_prefix: String,
}

impl ExtractionContext {
    /// Creates a context sending `Referer` and `Origin` of `page_url`, which is
    /// also the base for relative media URLs.
    pub fn new(page_url: impl Into<String>) -> Self {
        let page_url = page_url.into();
        let mut referer_headers = HeaderList::new();

        referer_headers.insert("Referer".to_string(), page_url.clone());

        if let Some(origin) = origin_of(&page_url) {
            referer_headers.insert("Origin".to_string(), origin);
        }

        Self {
            page_url,
            referer_headers,
            label_prefix: String::new(),
        }
    }

    /// Sets a header, replacing any header with the same name regardless of case.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.referer_headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        self.referer_headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Changes the base for relative media URLs, keeping the headers.
    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        self
    }

    pub fn with_label_prefix(mut self, label_prefix: impl Into<String>) -> Self {
        self.label_prefix = label_prefix.into();
        self
    }

    pub fn page_url(&self) -> &str {
        &self.page_url
    }

    pub fn headers(&self) -> &HeaderList {
        &self.referer_headers
    }

    pub fn label_prefix(&self) -> &str {
        &self.label_prefix
    }
}

fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub url: String,
    pub label: QualityLabel,
    pub referer_headers: HeaderList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    /// Url after following redirects
    pub final_url: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &str, headers: &HeaderList) -> Result<FetchedPage, anyhow::Error>;
}

/// Media found in a page: the first manifest and the first direct media file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaLocation {
    pub manifest_url: Option<String>,
    pub direct_url: Option<String>,
}

impl MediaLocation {
    pub fn is_empty(&self) -> bool {
        self.manifest_url.is_none() && self.direct_url.is_none()
    }
}

/// Searches `text` for absolute URLs and `file:`/`src:` player properties.
///
/// Candidates are taken in order of appearance and resolved against
/// `page_url`.
pub fn locate_media(text: &str, page_url: &str) -> MediaLocation {
    let text = text.replace(r"\/", "/");

    let mut candidates: Vec<(usize, &str)> = ABSOLUTE_URL_REGEX
        .find_iter(&text)
        .map(|m| (m.start(), m.as_str()))
        .chain(
            PLAYER_PROPERTY_REGEX
                .captures_iter(&text)
                .filter_map(|captures| captures.get(1))
                .map(|m| (m.start(), m.as_str())),
        )
        .collect();
    candidates.sort_by_key(|&(start, _)| start);
    candidates.dedup_by_key(|&mut (start, _)| start);

    let mut location = MediaLocation::default();

    for (_, candidate) in candidates {
        let url = match resolve::resolve(page_url, candidate) {
            Ok(url) => url,
            Err(err) => {
                log::debug!("Ignoring media candidate {}: {}", candidate, err);
                continue;
            }
        };

        if location.manifest_url.is_none() && resolve::has_extension(&url, MANIFEST_EXTENSIONS) {
            location.manifest_url = Some(url);
        } else if location.direct_url.is_none() && resolve::has_extension(&url, MEDIA_EXTENSIONS) {
            location.direct_url = Some(url);
        }

        if location.manifest_url.is_some() && location.direct_url.is_some() {
            break;
        }
    }

    location
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionPipeline {
    ranker: QualityRanker,
}

impl ExtractionPipeline {
    pub fn new(ranker: QualityRanker) -> Self {
        Self { ranker }
    }

    /// Finds the playable media of a page, best quality first.
    ///
    /// Packed scripts are decoded before searching. A manifest is fetched at
    /// most once; when it cannot be fetched or has no variants the direct
    /// media URL of the page is used instead. Finding nothing is not an
    /// error.
    pub async fn run<F: Fetcher>(
        &self,
        page_text: &str,
        context: &ExtractionContext,
        fetcher: &F,
    ) -> Vec<MediaAsset> {
        let revealed = packer::reveal(page_text);
        let mut location = locate_media(&revealed, context.page_url());

        if location.is_empty() && matches!(revealed, Cow::Owned(_)) {
            log::debug!("No media in decoded script, searching page source");
            location = locate_media(page_text, context.page_url());
        }

        let mut assets = match &location.manifest_url {
            Some(manifest_url) => self.manifest_assets(manifest_url, context, fetcher).await,
            None => Vec::new(),
        };

        if assets.is_empty() {
            if let Some(direct_url) = location.direct_url {
                log::debug!("Using direct media url: {}", direct_url);

                assets.push(MediaAsset {
                    label: quality::label_from_uri(&direct_url).with_prefix(context.label_prefix()),
                    url: direct_url,
                    referer_headers: context.headers().clone(),
                });
            }
        }

        if assets.is_empty() {
            log::debug!("No media found for {}", context.page_url());
        }

        self.ranker.sort_by_label(&mut assets, |asset| &asset.label);
        assets
    }

    /// Fetches the page of `context` and runs the pipeline on its source.
    ///
    /// Relative media URLs of the page resolve against the url the page was
    /// served from after redirects.
    pub async fn run_url<F: Fetcher>(
        &self,
        context: &ExtractionContext,
        fetcher: &F,
    ) -> Result<Vec<MediaAsset>, anyhow::Error> {
        let page = fetcher.fetch(context.page_url(), context.headers()).await?;

        if !page.is_success() {
            anyhow::bail!("server responded with status {}", page.status);
        }

        let mut context = context.clone();

        if !page.final_url.is_empty() && page.final_url != context.page_url() {
            log::debug!("Page was redirected to {}", page.final_url);
            context = context.with_page_url(page.final_url);
        }

        Ok(self.run(&page.body, &context, fetcher).await)
    }

    async fn manifest_assets<F: Fetcher>(
        &self,
        manifest_url: &str,
        context: &ExtractionContext,
        fetcher: &F,
    ) -> Vec<MediaAsset> {
        let page = match fetcher.fetch(manifest_url, context.headers()).await {
            Ok(page) if page.is_success() => page,
            Ok(page) => {
                log::warn!("Manifest request returned status {}: {}", page.status, manifest_url);
                return Vec::new();
            }
            Err(err) => {
                log::warn!("Failed to fetch manifest {}: {:#}", manifest_url, err);
                return Vec::new();
            }
        };

        let base_url = if page.final_url.is_empty() {
            manifest_url
        } else {
            page.final_url.as_str()
        };

        let variants = manifest::parse(&page.body, base_url);

        if variants.is_empty() {
            log::warn!("Manifest has no variants: {}", base_url);
        }

        variants
            .into_iter()
            .map(|variant| MediaAsset {
                label: quality::label(&variant).with_prefix(context.label_prefix()),
                url: variant.resolved_url,
                referer_headers: context.headers().clone(),
            })
            .collect()
    }
}
