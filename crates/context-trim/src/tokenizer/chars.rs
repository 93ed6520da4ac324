use super::{TokenId, Tokenizer, TokenizerError};

/// Tokenizer that emits one token per Unicode scalar value.
///
/// Encoding and decoding round-trip exactly, and re-encoding any decoded
/// suffix yields the same token count, which makes budget arithmetic exact.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, TokenizerError> {
        Ok(text.chars().map(TokenId::from).collect())
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, TokenizerError> {
        tokens
            .iter()
            .map(|&id| {
                char::from_u32(id)
                    .ok_or_else(|| TokenizerError::Decode(format!("{id:#x} is not a scalar value")))
            })
            .collect()
    }

    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(text.chars().count())
    }
}
