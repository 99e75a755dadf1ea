//! Hex and UCS2 helpers shared by the PDU and text-mode paths.

use super::error::CodecError;

/// Upper-case hex rendering, the form modems expect on the wire.
pub fn to_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}

/// Parse a hex string (either case). Odd lengths and non-hex digits fail.
pub fn from_hex(text: &str) -> Result<Vec<u8>, CodecError> {
    let text = text.trim();
    if text.len() % 2 != 0 {
        return Err(CodecError::InvalidHex(format!(
            "odd length {}",
            text.len()
        )));
    }
    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = nibble(pair[0]);
            let lo = nibble(pair[1]);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok(hi << 4 | lo),
                _ => Err(CodecError::InvalidHex(
                    String::from_utf8_lossy(pair).into_owned(),
                )),
            }
        })
        .collect()
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Encode text as UTF-16BE octets.
pub fn encode(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
}

/// Decode UTF-16BE octets. Lone surrogates become U+FFFD.
///
/// Returns `None` for an odd number of octets.
pub fn decode(octets: &[u8]) -> Option<String> {
    if octets.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = octets
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Some(String::from_utf16_lossy(&units))
}

/// Decode a UCS2 hex string, returning the input unchanged when it is not one.
pub fn decode_ucs2_hex(text: &str) -> String {
    from_hex(text)
        .ok()
        .and_then(|octets| decode(&octets))
        .unwrap_or_else(|| text.to_string())
}

/// Encode text as a UCS2 hex string.
pub fn encode_ucs2_hex(text: &str) -> String {
    to_hex(&encode(text))
}
