//! GSM 03.38 default alphabet and septet packing.
//!
//! Characters from the basic table cost one septet; characters from the
//! extension table cost two (the escape septet `0x1B` followed by the code).

use super::error::CodecError;

/// Escape septet that introduces an extension-table character.
pub const ESCAPE: u8 = 0x1B;

/// Basic character table, indexed by septet value. `0x1B` is the escape slot.
const BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', //
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É', //
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', //
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', //
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', //
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', //
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', //
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à', //
];

/// Extension table: (septet following the escape, character).
const EXTENSION: [(u8, char); 10] = [
    (0x0A, '\u{0C}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

/// Septets needed for `c`, or `None` when it is outside the alphabet.
fn septets_for(c: char) -> Option<([u8; 2], usize)> {
    if c != '\u{1B}' {
        if let Some(pos) = BASIC.iter().position(|&b| b == c) {
            return Some(([pos as u8, 0], 1));
        }
    }
    EXTENSION
        .iter()
        .find(|(_, ext)| *ext == c)
        .map(|(code, _)| ([ESCAPE, *code], 2))
}

/// Whether every character of `text` can be sent in the GSM 7-bit alphabet.
pub fn is_encodable(text: &str) -> bool {
    text.chars().all(|c| septets_for(c).is_some())
}

/// Number of septets `c` occupies, if encodable.
pub fn septet_len(c: char) -> Option<usize> {
    septets_for(c).map(|(_, len)| len)
}

/// Convert text into unpacked septets.
pub fn to_septets(text: &str) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        let (septets, len) = septets_for(c).ok_or(CodecError::NotGsm7(c))?;
        out.extend_from_slice(&septets[..len]);
    }
    Ok(out)
}

/// Convert unpacked septets back into text.
///
/// An escape followed by an unknown code decodes as a space, then the code is
/// read from the basic table, which is what handsets do.
pub fn from_septets(septets: &[u8]) -> String {
    let mut out = String::with_capacity(septets.len());
    let mut iter = septets.iter().copied().peekable();
    while let Some(s) = iter.next() {
        let s = s & 0x7F;
        if s == ESCAPE {
            match iter.peek().and_then(|next| {
                EXTENSION
                    .iter()
                    .find(|(code, _)| *code == (next & 0x7F))
                    .map(|(_, c)| *c)
            }) {
                Some(c) => {
                    out.push(c);
                    iter.next();
                }
                None => out.push(' '),
            }
            continue;
        }
        out.push(BASIC[s as usize]);
    }
    out
}

/// Pack septets into octets, starting `fill_bits` into the first octet.
///
/// `fill_bits` is non-zero when a user data header precedes the text and the
/// septets must start on a septet boundary.
pub fn pack(septets: &[u8], fill_bits: usize) -> Vec<u8> {
    let total_bits = fill_bits + septets.len() * 7;
    let mut out = vec![0u8; total_bits.div_ceil(8)];
    for (i, &septet) in septets.iter().enumerate() {
        let bit = fill_bits + i * 7;
        let (byte, shift) = (bit / 8, bit % 8);
        let value = u16::from(septet & 0x7F) << shift;
        out[byte] |= value as u8;
        if shift > 1 {
            out[byte + 1] |= (value >> 8) as u8;
        }
    }
    out
}

/// Unpack `count` septets from octets, skipping `fill_bits` leading bits.
pub fn unpack(octets: &[u8], count: usize, fill_bits: usize) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let bit = fill_bits + i * 7;
        let (byte, shift) = (bit / 8, bit % 8);
        let low = *octets
            .get(byte)
            .ok_or(CodecError::Truncated("user data"))?;
        let high = if shift > 1 {
            *octets
                .get(byte + 1)
                .ok_or(CodecError::Truncated("user data"))?
        } else {
            0
        };
        let value = (u16::from(high) << 8 | u16::from(low)) >> shift;
        out.push((value & 0x7F) as u8);
    }
    Ok(out)
}
