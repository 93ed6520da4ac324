use super::{TokenId, Tokenizer, TokenizerError};

/// Tokenizer that emits one token per UTF-8 byte.
///
/// A cut inside a multi-byte character decodes to U+FFFD, so the output is
/// always valid text even though it may not re-encode to the same length.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteTokenizer;

impl Tokenizer for ByteTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        Ok(text.bytes().map(TokenId::from).collect())
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        let bytes = tokens
            .iter()
            .map(|&id| {
                u8::try_from(id)
                    .map_err(|_| TokenizerError::Decode(format!("{id} is not a byte token")))
            })
            .collect::<Result<Vec<u8>, _>>()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(text.len())
    }
}
