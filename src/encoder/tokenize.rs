//! Coefficient tokens: mapping levels to tokens, writing them, and the inverse.
//!
//! A block is coded in zigzag order from `first`. Every position up to the
//! last nonzero level carries a value token; an EOB token follows unless the
//! last nonzero level sits at position 15. After a ZERO token the EOB branch
//! is not coded, so the next token starts at the second tree node.

use crate::common::types::{
    TokenKind, TokenProbTables, COEFF_BANDS, DCT_CAT_BASE, DCT_CAT_BITS, PROB_DCT_CAT,
};

use super::arithmetic::BoolEncoder;
use super::tree::{write_token_from, DCT_TOKENS};

/// Coefficient block type, selecting the probability table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockType {
    /// Luma AC after a Y2 block (first = 1).
    YAfterY2 = 0,
    /// The Y2 block.
    Y2 = 1,
    /// Chroma.
    Chroma = 2,
    /// Luma including DC (B_PRED and SPLITMV macroblocks).
    YWithDc = 3,
}

impl BlockType {
    /// First coded zigzag position.
    pub(crate) const fn first(self) -> usize {
        match self {
            BlockType::YAfterY2 => 1,
            _ => 0,
        }
    }
}

/// One coded token with its position metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    /// Band of the position the token describes.
    pub(crate) band: u8,
    /// Context from the previous token (or the neighbours for the first).
    pub(crate) ctx: u8,
    /// Extra bits value for CAT tokens (`magnitude - base`).
    pub(crate) extra: u16,
    pub(crate) negative: bool,
}

/// Token and extra-bits value for a nonzero magnitude.
pub(crate) fn token_for(magnitude: u16) -> (TokenKind, u16) {
    match magnitude {
        0 => (TokenKind::Zero, 0),
        1 => (TokenKind::One, 0),
        2 => (TokenKind::Two, 0),
        3 => (TokenKind::Three, 0),
        4 => (TokenKind::Four, 0),
        _ => {
            let cat = DCT_CAT_BASE
                .iter()
                .rposition(|&base| magnitude >= base)
                .unwrap_or(0);
            (
                TokenKind::from_value(5 + cat as i8),
                magnitude - DCT_CAT_BASE[cat],
            )
        }
    }
}

/// Context a token leaves for the next one.
#[inline]
pub(crate) fn next_ctx(kind: TokenKind) -> u8 {
    match kind {
        TokenKind::Zero => 0,
        TokenKind::One => 1,
        _ => 2,
    }
}

/// Tokens of one block, stack allocated.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TokenBlock {
    tokens: [Token; 17],
    len: usize,
}

impl TokenBlock {
    pub(crate) fn tokens(&self) -> &[Token] {
        &self.tokens[..self.len]
    }
}

/// Tokenizes zigzag `levels` from `first` with initial context `ctx`.
pub(crate) fn tokenize(levels: &[i16; 16], first: usize, ctx: u8) -> TokenBlock {
    let empty = Token {
        kind: TokenKind::Eob,
        band: 0,
        ctx: 0,
        extra: 0,
        negative: false,
    };
    let mut block = TokenBlock {
        tokens: [empty; 17],
        len: 0,
    };
    let end = levels
        .iter()
        .rposition(|&l| l != 0)
        .map_or(first, |last| (last + 1).max(first));

    let mut ctx = ctx;
    for (i, &level) in levels.iter().enumerate().take(end).skip(first) {
        let (kind, extra) = token_for(level.unsigned_abs());
        block.tokens[block.len] = Token {
            kind,
            band: COEFF_BANDS[i],
            ctx,
            extra,
            negative: level < 0,
        };
        block.len += 1;
        ctx = next_ctx(kind);
    }
    if end < 16 {
        block.tokens[block.len] = Token {
            kind: TokenKind::Eob,
            band: COEFF_BANDS[end],
            ctx,
            ..empty
        };
        block.len += 1;
    }
    block
}

/// Writes a token block with the probabilities of `btype`.
pub(crate) fn write_tokens(
    encoder: &mut BoolEncoder,
    probs: &TokenProbTables,
    btype: BlockType,
    block: &TokenBlock,
) {
    let table = &probs[btype as usize];
    let mut after_zero = false;
    for token in block.tokens() {
        let p = &table[usize::from(token.band)][usize::from(token.ctx)];
        let start = if after_zero { 2 } else { 0 };
        write_token_from(encoder, &DCT_TOKENS, p, token.kind as i8, start);
        if let Some(cat) = token.kind.category() {
            write_extra_bits(encoder, cat, token.extra);
        }
        if token.kind != TokenKind::Eob && token.kind != TokenKind::Zero {
            encoder.encode_flag(token.negative);
        }
        after_zero = token.kind == TokenKind::Zero;
    }
}

fn write_extra_bits(encoder: &mut BoolEncoder, cat: usize, extra: u16) {
    let bits = DCT_CAT_BITS[cat];
    for (k, &p) in PROB_DCT_CAT[cat].iter().take(usize::from(bits)).enumerate() {
        let bit = (extra >> (usize::from(bits) - 1 - k)) & 1 != 0;
        encoder.encode_bool(bit, p);
    }
}

/// Rebuilds zigzag levels from tokens; returns the levels and the EOB index.
#[cfg(test)]
pub(crate) fn detokenize(tokens: &[Token], first: usize) -> ([i16; 16], usize) {
    let mut levels = [0i16; 16];
    let mut pos = first;
    let mut eob = first;
    for token in tokens {
        if token.kind == TokenKind::Eob {
            break;
        }
        let magnitude = match token.kind.category() {
            Some(cat) => DCT_CAT_BASE[cat] + token.extra,
            None => token.kind as u16,
        };
        if magnitude != 0 {
            levels[pos] = if token.negative {
                -(magnitude as i16)
            } else {
                magnitude as i16
            };
            eob = pos + 1;
        }
        pos += 1;
    }
    (levels, eob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::COEFF_PROBS;
    use crate::encoder::arithmetic::tests::BoolDecoder;
    use alloc::vec::Vec;
    use rand::{Rng, SeedableRng};

    #[test]
    fn category_mapping() {
        assert_eq!(token_for(1), (TokenKind::One, 0));
        assert_eq!(token_for(4), (TokenKind::Four, 0));
        assert_eq!(token_for(5), (TokenKind::Cat1, 0));
        assert_eq!(token_for(10), (TokenKind::Cat2, 3));
        assert_eq!(token_for(18), (TokenKind::Cat3, 7));
        assert_eq!(token_for(37), (TokenKind::Cat5, 2));
        assert_eq!(token_for(67), (TokenKind::Cat6, 0));
        assert_eq!(token_for(2114), (TokenKind::Cat6, 2047));
    }

    #[test]
    fn empty_block_is_a_single_eob() {
        let block = tokenize(&[0; 16], 0, 2);
        assert_eq!(block.tokens().len(), 1);
        assert_eq!(block.tokens()[0].kind, TokenKind::Eob);
        assert_eq!(block.tokens()[0].ctx, 2);

        let block = tokenize(&[0; 16], 1, 0);
        assert_eq!(block.tokens()[0].band, COEFF_BANDS[1]);
    }

    #[test]
    fn full_block_has_no_eob() {
        let levels = [1i16; 16];
        let block = tokenize(&levels, 0, 0);
        assert_eq!(block.tokens().len(), 16);
        assert!(block.tokens().iter().all(|t| t.kind == TokenKind::One));
        assert_eq!(block.tokens()[1].ctx, 1);
    }

    #[test]
    fn contexts_follow_the_previous_token() {
        let mut levels = [0i16; 16];
        levels[0] = 7;
        levels[2] = -1;
        let block = tokenize(&levels, 0, 1);
        let ctxs: Vec<u8> = block.tokens().iter().map(|t| t.ctx).collect();
        assert_eq!(ctxs, [1, 2, 0, 1]);
        let kinds: Vec<TokenKind> = block.tokens().iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [TokenKind::Cat2, TokenKind::Zero, TokenKind::One, TokenKind::Eob]
        );
    }

    #[test]
    fn detokenize_inverts_tokenize() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let first = rng.gen_range(0..2);
            let mut levels = [0i16; 16];
            for l in levels.iter_mut().skip(first) {
                if rng.gen_bool(0.4) {
                    *l = rng.gen_range(-2114..=2114);
                }
            }
            let block = tokenize(&levels, first, 0);
            let (back, eob) = detokenize(block.tokens(), first);
            assert_eq!(back, levels);
            let expected_eob = levels.iter().rposition(|&l| l != 0).map_or(first, |p| p + 1);
            assert_eq!(eob, expected_eob.max(first));
        }
    }

    #[test]
    fn written_tokens_decode() {
        let mut levels = [0i16; 16];
        levels[0] = 37;
        levels[3] = -2;
        levels[4] = 300;
        let block = tokenize(&levels, 0, 0);
        let mut encoder = BoolEncoder::new();
        write_tokens(&mut encoder, &COEFF_PROBS, BlockType::YWithDc, &block);
        let bytes = encoder.stop().unwrap();

        // Minimal token reader mirroring a decoder.
        let mut d = BoolDecoder::new(&bytes);
        let table = &COEFF_PROBS[BlockType::YWithDc as usize];
        let mut out = [0i16; 16];
        let mut ctx = 0usize;
        let mut skip_eob = false;
        let mut i = 0;
        while i < 16 {
            let p = &table[usize::from(COEFF_BANDS[i])][ctx];
            if !skip_eob && !d.read_bool(p[0]) {
                break;
            }
            if !d.read_bool(p[1]) {
                ctx = 0;
                skip_eob = true;
                i += 1;
                continue;
            }
            skip_eob = false;
            let mut index = 4usize;
            let v = loop {
                let next = DCT_TOKENS.nodes[index + usize::from(d.read_bool(p[index >> 1]))];
                if next <= 0 {
                    break -next;
                }
                index = next as usize;
            };
            let kind = TokenKind::from_value(v);
            let magnitude = match kind.category() {
                Some(cat) => {
                    let mut extra = 0u16;
                    for &pb in PROB_DCT_CAT[cat].iter().take(usize::from(DCT_CAT_BITS[cat])) {
                        extra = (extra << 1) | u16::from(d.read_bool(pb));
                    }
                    DCT_CAT_BASE[cat] + extra
                }
                None => v as u16,
            };
            let negative = d.read_bool(128);
            out[i] = if negative { -(magnitude as i16) } else { magnitude as i16 };
            ctx = if magnitude == 1 { 1 } else { 2 };
            i += 1;
        }
        assert_eq!(out, levels);
    }
}
