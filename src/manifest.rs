use std::fmt::Display;
use std::str::FromStr;

use url::Url;

use crate::resolve;

pub const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF:";
const MEDIA_PLAYLIST_TAGS: &[&str] = &["#EXTINF", "#EXT-X-TARGETDURATION"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("malformed attribute \"{0}\"")]
    MalformedAttribute(String),
    #[error("invalid {key} value \"{value}\"")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s.split_once(['x', 'X']).ok_or(())?;

        Ok(Resolution {
            width: width.trim().parse().map_err(|_| ())?,
            height: height.trim().parse().map_err(|_| ())?,
        })
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Attributes of an `#EXT-X-STREAM-INF` line this crate cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamInf {
    pub bandwidth: Option<u64>,
    pub resolution: Option<Resolution>,
}

impl StreamInf {
    /// Parses the attribute list following the tag, e.g.
    /// `BANDWIDTH=800000,RESOLUTION=1280x720,CODECS="avc1.4d401f,mp4a.40.2"`.
    ///
    /// Keys other than `BANDWIDTH` and `RESOLUTION` are ignored.
    pub fn parse(attributes: &str) -> Result<Self, ManifestError> {
        let mut stream_inf = StreamInf::default();

        for attribute in split_attributes(attributes) {
            let Some((key, value)) = attribute.split_once('=') else {
                return Err(ManifestError::MalformedAttribute(attribute.to_string()));
            };

            let key = key.trim();
            let value = value.trim().trim_matches('"');

            let invalid_value = || ManifestError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            };

            if key.eq_ignore_ascii_case("BANDWIDTH") {
                stream_inf.bandwidth = Some(value.parse().map_err(|_| invalid_value())?);
            } else if key.eq_ignore_ascii_case("RESOLUTION") {
                stream_inf.resolution = Some(value.parse().map_err(|_| invalid_value())?);
            } else if key.is_empty() {
                return Err(ManifestError::MalformedAttribute(attribute.to_string()));
            }
        }

        Ok(stream_inf)
    }
}

/// Splits on commas that are not inside a quoted string.
fn split_attributes(list: &str) -> Vec<&str> {
    let mut attributes = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in list.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                attributes.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    attributes.push(&list[start..]);

    attributes
        .into_iter()
        .map(str::trim)
        .filter(|attribute| !attribute.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestVariant {
    pub sequence_index: usize,
    pub bandwidth: Option<u64>,
    pub resolution: Option<Resolution>,
    pub raw_uri: String,
    pub resolved_url: String,
}

/// Parses an HLS playlist into its variants, in manifest order.
///
/// Malformed stream info lines are logged and skipped, stream info without a
/// following URI is dropped, and so is any URI that cannot be made absolute.
/// A media playlist (segments, no variants) is a single rendition and yields
/// `base_url` itself.
pub fn parse(manifest_text: &str, base_url: &str) -> Vec<ManifestVariant> {
    let lines: Vec<&str> = manifest_text
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if is_media_playlist(&lines) {
        return single_rendition(base_url);
    }

    let mut variants = Vec::new();
    let mut pending: Option<StreamInf> = None;

    for line in lines {
        if let Some(attributes) = line.strip_prefix(STREAM_INF_TAG) {
            if pending.is_some() {
                log::debug!("Discarding stream info without uri");
            }

            pending = Some(StreamInf::parse(attributes).unwrap_or_else(|err| {
                log::warn!("Skipping stream info attributes: {}", err);
                StreamInf::default()
            }));
        } else if line.starts_with('#') {
            continue;
        } else {
            let stream_inf = pending.take().unwrap_or_default();

            match resolve::resolve(base_url, line) {
                Ok(resolved_url) => variants.push(ManifestVariant {
                    sequence_index: variants.len(),
                    bandwidth: stream_inf.bandwidth,
                    resolution: stream_inf.resolution,
                    raw_uri: line.to_string(),
                    resolved_url,
                }),
                Err(err) => log::warn!("Dropping variant {}: {}", line, err),
            }
        }
    }

    if pending.is_some() {
        log::debug!("Discarding stream info without uri at end of manifest");
    }

    variants
}

fn is_media_playlist(lines: &[&str]) -> bool {
    let has_variants = lines.iter().any(|line| line.starts_with(STREAM_INF_TAG));
    let has_segments = lines
        .iter()
        .any(|line| MEDIA_PLAYLIST_TAGS.iter().any(|tag| line.starts_with(tag)));

    has_segments && !has_variants
}

fn single_rendition(base_url: &str) -> Vec<ManifestVariant> {
    if Url::parse(base_url).is_err() {
        log::warn!("Dropping media playlist with invalid url: {}", base_url);
        return Vec::new();
    }

    vec![ManifestVariant {
        sequence_index: 0,
        bandwidth: None,
        resolution: None,
        raw_uri: base_url.to_string(),
        resolved_url: base_url.to_string(),
    }]
}
