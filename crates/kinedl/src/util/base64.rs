use std::sync::LazyLock;

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{alphabet, DecodeError, Engine};

static ENGINE: LazyLock<GeneralPurpose> = LazyLock::new(|| engine(&alphabet::STANDARD));
static URL_SAFE_ENGINE: LazyLock<GeneralPurpose> = LazyLock::new(|| engine(&alphabet::URL_SAFE));

fn engine(alphabet: &alphabet::Alphabet) -> GeneralPurpose {
    GeneralPurpose::new(
        alphabet,
        GeneralPurposeConfig::new()
            .with_encode_padding(false)
            .with_decode_padding_mode(DecodePaddingMode::Indifferent)
            .with_decode_allow_trailing_bits(true),
    )
}

/// Standard alphabet, no padding.
pub fn base64_encode<T: AsRef<[u8]>>(input: T) -> String {
    ENGINE.encode(input)
}

/// Accepts standard or URL-safe alphabet, with or without padding.
pub fn base64_decode<T: AsRef<[u8]>>(input: T) -> Result<Vec<u8>, DecodeError> {
    let input = input.as_ref();
    ENGINE
        .decode(input)
        .or_else(|_| URL_SAFE_ENGINE.decode(input))
}
