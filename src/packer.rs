use std::borrow::Cow;
use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::codec::{self, CodecError};

/// Start of a packer wrapper, tolerant to the whitespace obfuscators sprinkle in.
static BLOCK_START_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"eval\s*\(\s*function\s*\(\s*p\s*,\s*a\s*,\s*c\s*,\s*k\s*,\s*e\s*,\s*[rd]\s*\)").unwrap()
});
static SIGNATURE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"eval\(function\(p,a,c,k,e,[rd]\)").unwrap());
static ARGS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\}\s*\(\s*'(.*)'\s*,\s*(\d+|\[\])\s*,\s*(\d+)\s*,\s*'(.*?)'\.split\(\s*'\|'\s*\)").unwrap()
});
static WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedScript {
    pub signature_present: bool,
    pub payload: String,
    pub radix: u32,
    pub symbol_count: usize,
    pub symbol_table: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedScript(String);

impl DecodedScript {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for DecodedScript {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for DecodedScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("could not make sense of p.a.c.k.e.r. data (unexpected code structure)")]
    NoMatch,
    #[error("invalid p.a.c.k.e.r. radix: {0}")]
    InvalidRadix(String),
    #[error("invalid p.a.c.k.e.r. symbol count: {0}")]
    InvalidCount(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed p.a.c.k.e.r. symbol table: expected {expected} symbols, found {actual}")]
    SymbolCountMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnpackError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Whether `text` contains a P.A.C.K.E.R. wrapper call. Whitespace is ignored.
pub fn detect(text: &str) -> bool {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    SIGNATURE_REGEX.is_match(&compact)
}

/// Extracts payload, radix, symbol count and symbol table from the closing
/// call `}('payload', radix, count, 'a|b|c'.split('|')`.
pub fn parse(text: &str) -> Result<PackedScript, ParseError> {
    let captures = ARGS_REGEX.captures(text).ok_or(ParseError::NoMatch)?;

    let payload = captures[1].replace("\\\\", "\\").replace("\\'", "'");

    let radix = match &captures[2] {
        "[]" => 62,
        radix => radix
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidRadix(radix.to_owned()))?,
    };

    let symbol_count = captures[3]
        .parse::<usize>()
        .map_err(|_| ParseError::InvalidCount(captures[3].to_owned()))?;

    let symbol_table = captures[4].split('|').map(str::to_owned).collect();

    Ok(PackedScript {
        signature_present: detect(text),
        payload,
        radix,
        symbol_count,
        symbol_table,
    })
}

/// Substitutes every word token of the payload with its symbol.
///
/// The packer restores the source by replacing the encoding of index
/// `count - 1` down to `0`, whole words only. Substituting each token of the
/// original payload exactly once gives that result without ever rescanning
/// text that came out of the symbol table.
pub fn decode(packed: &PackedScript) -> Result<DecodedScript, DecodeError> {
    if packed.symbol_table.len() != packed.symbol_count {
        return Err(DecodeError::SymbolCountMismatch {
            expected: packed.symbol_count,
            actual: packed.symbol_table.len(),
        });
    }

    codec::base_n_table(packed.radix, None)?;

    let decoded = WORD_REGEX.replace_all(&packed.payload, |captures: &regex::Captures| {
        let word = &captures[0];

        match codec::decode_digit_string(word, packed.radix, None) {
            Ok(index) => match packed.symbol_table.get(index) {
                Some(symbol) if !symbol.is_empty() => symbol.clone(),
                _ => word.to_owned(),
            },
            Err(_) => word.to_owned(),
        }
    });

    Ok(DecodedScript(decoded.into_owned()))
}

pub fn unpack(text: &str) -> Result<DecodedScript, UnpackError> {
    let packed = parse(text)?;
    Ok(decode(&packed)?)
}

/// Splits `text` into one slice per packer wrapper, each running up to the
/// start of the next one.
pub fn packed_blocks(text: &str) -> Vec<&str> {
    let starts: Vec<usize> = BLOCK_START_REGEX.find_iter(text).map(|m| m.start()).collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

/// Decodes every packed script found in `text` and joins the results.
///
/// Blocks that fail to parse or decode are skipped. When nothing decodes the
/// original text is returned, so callers can keep searching it as plain script.
pub fn reveal(text: &str) -> Cow<'_, str> {
    if !detect(text) {
        return Cow::Borrowed(text);
    }

    let mut scripts = Vec::new();

    for block in packed_blocks(text) {
        match unpack(block) {
            Ok(script) => scripts.push(script.into_string()),
            Err(err) => log::debug!("Skipping packed script: {}", err),
        }
    }

    if scripts.is_empty() {
        log::debug!("No packed script could be decoded, using page as is");
        Cow::Borrowed(text)
    } else {
        log::debug!("Decoded {} packed script(s)", scripts.len());
        Cow::Owned(scripts.join("\n"))
    }
}
