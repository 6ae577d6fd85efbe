use std::cmp::Ordering;
use std::fmt::Display;

use clap::ValueEnum;

use crate::manifest::ManifestVariant;

pub const HEIGHT_BUCKETS: [u32; 7] = [2160, 1080, 720, 480, 360, 240, 144];
const MID_FIRST_ORDER: [u32; 4] = [720, 480, 360, 1080];

const ORIGINAL: &str = "Original";
const UNKNOWN: &str = "Unknown";
const ORIGINAL_RANK: u32 = u32::MAX;
const UNKNOWN_RANK: u32 = 0;

const URI_MARKERS: [(&str, u32); 4] = [("_o", ORIGINAL_RANK), ("_h", 720), ("_n", 480), ("_l", 360)];
const URI_NUMERALS: [u32; 4] = [1080, 720, 480, 360];

/// Display label of a rendition.
///
/// The rank only orders labels: two labels are equal when their quality text
/// and prefix are.
#[derive(Debug, Clone)]
pub struct QualityLabel {
    quality: String,
    rank: u32,
    prefix: Option<String>,
}

impl QualityLabel {
    pub fn original() -> Self {
        Self {
            quality: ORIGINAL.to_string(),
            rank: ORIGINAL_RANK,
            prefix: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            quality: UNKNOWN.to_string(),
            rank: UNKNOWN_RANK,
            prefix: None,
        }
    }

    pub fn from_height(height: u32) -> Self {
        Self {
            quality: format!("{height}p"),
            rank: height,
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim();
        self.prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        self
    }

    pub fn quality(&self) -> &str {
        &self.quality
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn is_unknown(&self) -> bool {
        self.rank == UNKNOWN_RANK
    }
}

impl PartialEq for QualityLabel {
    fn eq(&self, other: &Self) -> bool {
        self.quality == other.quality && self.prefix == other.prefix
    }
}

impl Eq for QualityLabel {}

impl Display for QualityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{} - {}", prefix, self.quality),
            None => write!(f, "{}", self.quality),
        }
    }
}

/// Labels a variant by its resolution, falling back to markers in its URI.
pub fn label(variant: &ManifestVariant) -> QualityLabel {
    match variant.resolution {
        Some(resolution) => QualityLabel::from_height(nearest_bucket(resolution.height)),
        None => label_from_uri(&variant.raw_uri),
    }
}

// Buckets are sorted from high to low and min_by_key keeps the first minimum,
// so ties round up.
fn nearest_bucket(height: u32) -> u32 {
    HEIGHT_BUCKETS
        .into_iter()
        .min_by_key(|bucket| bucket.abs_diff(height))
        .unwrap_or(height)
}

/// Labels a URI by the first quality marker it contains: `_o` (original),
/// `_h` (720p), `_n` (480p) or `_l` (360p). Without a marker a bare `1080`,
/// `720`, `480` or `360` that does not touch other digits is used.
pub fn label_from_uri(uri: &str) -> QualityLabel {
    if let Some((_, rank)) = URI_MARKERS.into_iter().find(|(marker, _)| uri.contains(marker)) {
        return match rank {
            ORIGINAL_RANK => QualityLabel::original(),
            height => QualityLabel::from_height(height),
        };
    }

    for numeral in URI_NUMERALS {
        let numeral_text = numeral.to_string();
        let standalone = uri.match_indices(&numeral_text).any(|(start, _)| {
            let before = uri[..start].chars().next_back();
            let after = uri[start + numeral_text.len()..].chars().next();
            !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
        });

        if standalone {
            return QualityLabel::from_height(numeral);
        }
    }

    QualityLabel::unknown()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, enum_iterator::Sequence)]
pub enum RankingPolicy {
    /// Highest resolution first, original above everything
    #[default]
    Descending,
    /// 720p, 480p, 360p, 1080p, then everything else
    MidFirst,
}

impl RankingPolicy {
    fn compare(self, a: &QualityLabel, b: &QualityLabel) -> Ordering {
        match self {
            RankingPolicy::Descending => b.rank.cmp(&a.rank),
            RankingPolicy::MidFirst => {
                let position = |label: &QualityLabel| {
                    MID_FIRST_ORDER
                        .iter()
                        .position(|&height| label.rank == height)
                        .unwrap_or(MID_FIRST_ORDER.len())
                };

                position(a).cmp(&position(b))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QualityRanker {
    policy: RankingPolicy,
    preference: Option<String>,
}

impl QualityRanker {
    pub fn new(policy: RankingPolicy) -> Self {
        Self {
            policy,
            preference: None,
        }
    }

    /// Labels whose quality contains `preference` (ignoring case) are ranked
    /// first. Blank preferences are ignored.
    pub fn with_preference(mut self, preference: Option<&str>) -> Self {
        self.preference = preference
            .map(str::trim)
            .filter(|preference| !preference.is_empty())
            .map(str::to_ascii_lowercase);
        self
    }

    pub fn policy(&self) -> RankingPolicy {
        self.policy
    }

    pub fn preference(&self) -> Option<&str> {
        self.preference.as_deref()
    }

    fn is_preferred(&self, label: &QualityLabel) -> bool {
        self.preference
            .as_deref()
            .is_some_and(|preference| label.quality.to_ascii_lowercase().contains(preference))
    }

    /// Orders `a` before `b` when `a` should be played first.
    pub fn compare(&self, a: &QualityLabel, b: &QualityLabel) -> Ordering {
        self.is_preferred(b)
            .cmp(&self.is_preferred(a))
            .then_with(|| self.policy.compare(a, b))
    }

    pub fn compare_variants(&self, a: &ManifestVariant, b: &ManifestVariant) -> Ordering {
        self.compare(&label(a), &label(b))
    }

    /// Stable sort, equally ranked items keep their order.
    pub fn sort_by_label<T, F>(&self, items: &mut [T], key: F)
    where
        F: Fn(&T) -> &QualityLabel,
    {
        items.sort_by(|a, b| self.compare(key(a), key(b)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Resolution;

    fn variant(height: Option<u32>, raw_uri: &str) -> ManifestVariant {
        ManifestVariant {
            sequence_index: 0,
            bandwidth: None,
            resolution: height.map(|height| Resolution {
                width: height * 16 / 9,
                height,
            }),
            raw_uri: raw_uri.to_string(),
            resolved_url: format!("https://host.example/{raw_uri}"),
        }
    }

    fn qualities(labels: &[QualityLabel]) -> Vec<&str> {
        labels.iter().map(QualityLabel::quality).collect()
    }

    #[test]
    fn test_label_from_resolution() {
        assert_eq!(label(&variant(Some(1080), "a.m3u8")).quality(), "1080p");
        assert_eq!(label(&variant(Some(1088), "a.m3u8")).quality(), "1080p");
        assert_eq!(label(&variant(Some(800), "a.m3u8")).quality(), "720p");
        assert_eq!(label(&variant(Some(2000), "a.m3u8")).quality(), "2160p");
        assert_eq!(label(&variant(Some(100), "a.m3u8")).quality(), "144p");
        // halfway between 720 and 480
        assert_eq!(label(&variant(Some(600), "a.m3u8")).quality(), "720p");
        // resolution wins over markers
        assert_eq!(label(&variant(Some(360), "video_o.m3u8")).quality(), "360p");
    }

    #[test]
    fn test_label_from_uri_markers() {
        assert_eq!(label_from_uri("https://cdn.example/x/video_o.m3u8"), QualityLabel::original());
        assert_eq!(label_from_uri("video_h.m3u8").quality(), "720p");
        assert_eq!(label_from_uri("video_n/index.m3u8").quality(), "480p");
        assert_eq!(label_from_uri("video_l").quality(), "360p");
        assert_eq!(label(&variant(None, "stream_h.m3u8")).quality(), "720p");
        assert_eq!(label_from_uri("https://host.example/plain.m3u8"), QualityLabel::unknown());
    }

    #[test]
    fn test_marker_inside_word() {
        assert_eq!(label_from_uri("https://cdn.example/video_hd.mp4").quality(), "720p");
        assert_eq!(label_from_uri("https://cdn.example/index_hls.m3u8").quality(), "720p");
        assert_eq!(label_from_uri("https://cdn.example/abc_o1.m3u8"), QualityLabel::original());
        assert_eq!(label_from_uri("https://host.example/some_name.m3u8").quality(), "480p");
        assert_eq!(label_from_uri("https://host.example/index.m3u8?q=video_h").quality(), "720p");
        // _o is checked before _h
        assert_eq!(label_from_uri("https://cdn.example/clip_h_o.mp4"), QualityLabel::original());
        // markers win over numerals
        assert_eq!(label_from_uri("https://cdn.example/1080/clip_l.mp4").quality(), "360p");
    }

    #[test]
    fn test_label_from_uri_numerals() {
        assert_eq!(label_from_uri("https://host.example/720/index.m3u8").quality(), "720p");
        assert_eq!(label_from_uri("https://host.example/movie.1080p.mp4").quality(), "1080p");
        assert_eq!(label_from_uri("https://host.example/480.mp4").quality(), "480p");
        assert_eq!(label_from_uri("https://host.example/v/17201.mp4"), QualityLabel::unknown());
        assert_eq!(label_from_uri("https://host.example/v/3600.mp4"), QualityLabel::unknown());
    }

    #[test]
    fn test_label_equality_and_display() {
        let label = QualityLabel::from_height(720);
        assert_eq!(label.rank(), 720);
        assert_eq!(label.to_string(), "720p");

        let prefixed = label.clone().with_prefix("RubyVid");
        assert_eq!(prefixed.to_string(), "RubyVid - 720p");
        assert_eq!(prefixed.prefix(), Some("RubyVid"));
        assert_ne!(prefixed, label);
        assert_eq!(label.clone().with_prefix("  "), label);

        let same_text = QualityLabel {
            quality: "720p".to_string(),
            rank: 1,
            prefix: None,
        };
        assert_eq!(same_text, label);
        assert!(QualityLabel::unknown().is_unknown());
    }

    #[test]
    fn test_descending_order() {
        let ranker = QualityRanker::default();
        let mut labels = vec![
            QualityLabel::unknown(),
            QualityLabel::from_height(720),
            QualityLabel::original(),
            QualityLabel::from_height(1080),
            QualityLabel::from_height(480),
            QualityLabel::from_height(2160),
        ];
        ranker.sort_by_label(&mut labels, |label| label);

        assert_eq!(
            qualities(&labels),
            ["Original", "2160p", "1080p", "720p", "480p", "Unknown"]
        );
    }

    #[test]
    fn test_preference_comes_first() {
        let input = vec![
            QualityLabel::from_height(1080),
            QualityLabel::from_height(720),
            QualityLabel::from_height(480),
            QualityLabel::unknown(),
        ];

        let mut labels = input.clone();
        QualityRanker::new(RankingPolicy::Descending).sort_by_label(&mut labels, |label| label);
        assert_eq!(qualities(&labels), ["1080p", "720p", "480p", "Unknown"]);

        let mut labels = input.clone();
        QualityRanker::new(RankingPolicy::Descending)
            .with_preference(Some("480"))
            .sort_by_label(&mut labels, |label| label);
        assert_eq!(qualities(&labels), ["480p", "1080p", "720p", "Unknown"]);

        let mut labels = input;
        QualityRanker::new(RankingPolicy::Descending)
            .with_preference(Some("UNKNOWN"))
            .sort_by_label(&mut labels, |label| label);
        assert_eq!(qualities(&labels), ["Unknown", "1080p", "720p", "480p"]);
    }

    #[test]
    fn test_preference_ignores_prefix_and_blank() {
        let ranker = QualityRanker::default().with_preference(Some("720"));
        let a = QualityLabel::from_height(1080).with_prefix("720 mirror");
        let b = QualityLabel::from_height(720);
        assert_eq!(ranker.compare(&a, &b), Ordering::Greater);

        let ranker = QualityRanker::default().with_preference(Some("   "));
        assert_eq!(ranker.preference(), None);
        assert_eq!(ranker.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_mid_first_order() {
        let ranker = QualityRanker::new(RankingPolicy::MidFirst);
        let mut labels = vec![
            QualityLabel::original(),
            QualityLabel::from_height(1080),
            QualityLabel::from_height(360),
            QualityLabel::unknown(),
            QualityLabel::from_height(720),
            QualityLabel::from_height(480),
        ];
        ranker.sort_by_label(&mut labels, |label| label);

        assert_eq!(
            qualities(&labels),
            ["720p", "480p", "360p", "1080p", "Original", "Unknown"]
        );
    }

    #[test]
    fn test_sort_is_stable() {
        for policy in enum_iterator::all::<RankingPolicy>() {
            let ranker = QualityRanker::new(policy);
            let mut items = vec![
                ("first", QualityLabel::from_height(720).with_prefix("A")),
                ("second", QualityLabel::from_height(720).with_prefix("B")),
                ("third", QualityLabel::unknown()),
                ("fourth", QualityLabel::unknown()),
            ];
            ranker.sort_by_label(&mut items, |(_, label)| label);

            let names: Vec<_> = items.iter().map(|(name, _)| *name).collect();
            assert_eq!(names, ["first", "second", "third", "fourth"], "{policy:?}");
        }
    }

    #[test]
    fn test_compare_variants() {
        let ranker = QualityRanker::default();
        let high = variant(Some(1080), "hi.m3u8");
        let low = variant(None, "video_l.m3u8");

        assert_eq!(ranker.compare_variants(&high, &low), Ordering::Less);
        assert_eq!(ranker.compare_variants(&low, &high), Ordering::Greater);
        assert_eq!(ranker.compare_variants(&high, &high), Ordering::Equal);
    }
}
