//! SMS-SUBMIT encoding and SMS-DELIVER / SMS-SUBMIT decoding (3GPP TS 23.040).

use super::error::CodecError;
use super::ucs2::{self, from_hex, to_hex};
use super::{gsm7, Alphabet, Concatenation, DecodedPdu, MessageKind, SubmitPdu};
use chrono::{DateTime, FixedOffset, NaiveDate};

/// Septets that fit one PDU without a user data header.
pub const MAX_SEPTETS: usize = 160;
/// Octets that fit one PDU.
pub const MAX_OCTETS: usize = 140;
/// Septets per part once the 6-octet concatenation header is present.
pub const MAX_SEPTETS_CONCAT: usize = 153;
/// UTF-16 code units per part once the concatenation header is present.
pub const MAX_UCS2_UNITS_CONCAT: usize = 67;

const MTI_DELIVER: u8 = 0x00;
const MTI_SUBMIT: u8 = 0x01;
const UDHI: u8 = 0x40;
/// SMS-SUBMIT with a relative validity period.
const SUBMIT_FIRST_OCTET: u8 = MTI_SUBMIT | 0x10;
/// Relative validity period of one day.
const VALIDITY_ONE_DAY: u8 = 0xA7;

const DCS_GSM7: u8 = 0x00;
const DCS_UCS2: u8 = 0x08;

const TOA_INTERNATIONAL: u8 = 0x91;
const TOA_UNKNOWN: u8 = 0x81;

/// Encode one SMS-SUBMIT. Fails rather than truncating when the text does
/// not fit a single PDU.
pub fn encode_submit(number: &str, text: &str) -> Result<SubmitPdu, CodecError> {
    if gsm7::is_encodable(text) {
        let septets = gsm7::to_septets(text)?;
        if septets.len() > MAX_SEPTETS {
            return Err(CodecError::MessageTooLong {
                needed: septets.len(),
                limit: MAX_SEPTETS,
                unit: "septets",
            });
        }
        build_submit(number, Alphabet::Gsm7, None, &septets)
    } else {
        let octets = ucs2::encode(text);
        if octets.len() > MAX_OCTETS {
            return Err(CodecError::MessageTooLong {
                needed: octets.len(),
                limit: MAX_OCTETS,
                unit: "octets",
            });
        }
        build_submit(number, Alphabet::Ucs2, None, &octets)
    }
}

/// Split `text` into concatenated SMS-SUBMIT parts sharing `reference`.
///
/// Text that fits one PDU yields exactly what [`encode_submit`] returns.
pub fn encode_submit_parts(
    number: &str,
    text: &str,
    reference: u8,
) -> Result<Vec<SubmitPdu>, CodecError> {
    let gsm = gsm7::is_encodable(text);
    let fits = if gsm {
        gsm7::to_septets(text)?.len() <= MAX_SEPTETS
    } else {
        text.encode_utf16().count() * 2 <= MAX_OCTETS
    };
    if fits {
        return Ok(vec![encode_submit(number, text)?]);
    }

    // Chunking per char keeps escape pairs and surrogate pairs together.
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut used = 0usize;
    let limit = if gsm {
        MAX_SEPTETS_CONCAT
    } else {
        MAX_UCS2_UNITS_CONCAT
    };
    for c in text.chars() {
        let cost = if gsm {
            gsm7::septet_len(c).unwrap_or(1)
        } else {
            c.len_utf16()
        };
        if used + cost > limit {
            chunks.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += cost;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.len() > 255 {
        return Err(CodecError::TooManyParts(chunks.len()));
    }

    let total = chunks.len() as u8;
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let concat = Concatenation {
                reference: u16::from(reference),
                total,
                sequence: (i + 1) as u8,
            };
            if gsm {
                build_submit(number, Alphabet::Gsm7, Some(concat), &gsm7::to_septets(chunk)?)
            } else {
                build_submit(number, Alphabet::Ucs2, Some(concat), &ucs2::encode(chunk))
            }
        })
        .collect()
}

/// Assemble the PDU. `payload` is unpacked septets for GSM-7, raw octets otherwise.
fn build_submit(
    number: &str,
    alphabet: Alphabet,
    concat: Option<Concatenation>,
    payload: &[u8],
) -> Result<SubmitPdu, CodecError> {
    let mut pdu = vec![0x00]; // default SMSC
    let first = if concat.is_some() {
        SUBMIT_FIRST_OCTET | UDHI
    } else {
        SUBMIT_FIRST_OCTET
    };
    pdu.push(first);
    pdu.push(0x00); // message reference, assigned by the modem
    pdu.extend(encode_address(number)?);
    pdu.push(0x00); // protocol identifier
    pdu.push(match alphabet {
        Alphabet::Ucs2 => DCS_UCS2,
        _ => DCS_GSM7,
    });
    pdu.push(VALIDITY_ONE_DAY);

    let header: Vec<u8> = concat
        .map(|c| vec![0x05, 0x00, 0x03, c.reference as u8, c.total, c.sequence])
        .unwrap_or_default();

    match alphabet {
        Alphabet::Gsm7 => {
            let header_bits = header.len() * 8;
            let fill = (7 - header_bits % 7) % 7;
            let udl = (header_bits + fill) / 7 + payload.len();
            pdu.push(udl as u8);
            pdu.extend_from_slice(&header);
            pdu.extend(gsm7::pack(payload, fill));
        }
        _ => {
            pdu.push((header.len() + payload.len()) as u8);
            pdu.extend_from_slice(&header);
            pdu.extend_from_slice(payload);
        }
    }

    Ok(SubmitPdu {
        tpdu_length: pdu.len() - 1,
        hex: to_hex(&pdu),
        alphabet,
        concatenation: concat,
    })
}

/// Encode a destination number as length, type of address and BCD digits.
fn encode_address(number: &str) -> Result<Vec<u8>, CodecError> {
    let trimmed: String = number
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let (toa, digits) = match trimmed.strip_prefix('+') {
        Some(rest) => (TOA_INTERNATIONAL, rest),
        None => (TOA_UNKNOWN, trimmed.as_str()),
    };
    if digits.is_empty() {
        return Err(CodecError::InvalidAddress(number.to_string()));
    }
    let nibbles = digits
        .chars()
        .map(|c| match c {
            '0'..='9' => Ok(c as u8 - b'0'),
            '*' => Ok(0x0A),
            '#' => Ok(0x0B),
            _ => Err(CodecError::InvalidAddress(number.to_string())),
        })
        .collect::<Result<Vec<u8>, _>>()?;

    let mut out = Vec::with_capacity(2 + nibbles.len().div_ceil(2));
    out.push(nibbles.len() as u8);
    out.push(toa);
    for pair in nibbles.chunks(2) {
        let high = pair.get(1).copied().unwrap_or(0x0F);
        out.push(high << 4 | pair[0]);
    }
    Ok(out)
}

/// Cursor over PDU octets that names the field it was reading when it ran out.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        let b = *self.bytes.get(self.pos).ok_or(CodecError::Truncated(field))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::Truncated(field))?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(CodecError::Truncated(field))?;
        self.pos = end;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos.min(self.bytes.len())..]
    }
}

/// Decode a PDU as returned by `AT+CMGL` in PDU mode (SMSC field included).
pub fn decode_pdu(hex: &str) -> Result<DecodedPdu, CodecError> {
    let bytes = from_hex(hex)?;
    let mut r = Reader::new(&bytes);

    let smsc_len = r.u8("SMSC length")? as usize;
    r.take(smsc_len, "SMSC address")?;

    let first = r.u8("first octet")?;
    let has_header = first & UDHI != 0;
    let (kind, address, dcs, timestamp) = match first & 0x03 {
        MTI_DELIVER => {
            let address = decode_address(&mut r)?;
            r.u8("protocol identifier")?;
            let dcs = r.u8("data coding scheme")?;
            let scts = r.take(7, "service centre timestamp")?;
            (MessageKind::Deliver, address, dcs, decode_timestamp(scts))
        }
        MTI_SUBMIT => {
            r.u8("message reference")?;
            let address = decode_address(&mut r)?;
            r.u8("protocol identifier")?;
            let dcs = r.u8("data coding scheme")?;
            match (first >> 3) & 0x03 {
                0x00 => {}
                0x02 => {
                    r.u8("validity period")?;
                }
                _ => {
                    r.take(7, "validity period")?;
                }
            }
            (MessageKind::Submit, address, dcs, None)
        }
        other => return Err(CodecError::UnsupportedMessageType(other)),
    };

    let alphabet = Alphabet::from_dcs(dcs);
    let udl = r.u8("user data length")? as usize;
    let (text, concatenation) = match alphabet {
        Alphabet::Gsm7 => {
            let octets = r.take((udl * 7).div_ceil(8), "user data")?;
            decode_gsm7_user_data(octets, udl, has_header)?
        }
        _ => {
            let octets = r.take(udl, "user data")?;
            let (header, body) = split_header(octets, has_header)?;
            let text = match alphabet {
                Alphabet::Ucs2 => ucs2::decode(body).ok_or(CodecError::Truncated("UCS2 text"))?,
                _ => String::from_utf8_lossy(body).into_owned(),
            };
            (text, header.and_then(parse_concatenation))
        }
    };

    Ok(DecodedPdu {
        kind,
        address,
        timestamp,
        dcs,
        alphabet,
        text,
        concatenation,
    })
}

fn decode_gsm7_user_data(
    octets: &[u8],
    udl: usize,
    has_header: bool,
) -> Result<(String, Option<Concatenation>), CodecError> {
    if !has_header {
        let septets = gsm7::unpack(octets, udl, 0)?;
        return Ok((gsm7::from_septets(&septets), None));
    }
    let (header, body) = split_header(octets, true)?;
    let header_bits = (header.map_or(0, <[u8]>::len) + 1) * 8;
    let fill = (7 - header_bits % 7) % 7;
    let skipped = (header_bits + fill) / 7;
    let count = udl.saturating_sub(skipped);
    let septets = gsm7::unpack(body, count, fill)?;
    Ok((
        gsm7::from_septets(&septets),
        header.and_then(parse_concatenation),
    ))
}

/// Split the user data header (without its length octet) from the body.
fn split_header(octets: &[u8], has_header: bool) -> Result<(Option<&[u8]>, &[u8]), CodecError> {
    if !has_header {
        return Ok((None, octets));
    }
    let udhl = *octets.first().ok_or(CodecError::Truncated("UDH length"))? as usize;
    let header = octets
        .get(1..=udhl)
        .ok_or(CodecError::Truncated("user data header"))?;
    Ok((Some(header), &octets[udhl + 1..]))
}

/// Find the concatenation information element (8-bit or 16-bit reference).
fn parse_concatenation(header: &[u8]) -> Option<Concatenation> {
    let mut i = 0;
    while i + 1 < header.len() {
        let (iei, len) = (header[i], header[i + 1] as usize);
        let data = header.get(i + 2..i + 2 + len)?;
        let concat = match (iei, len) {
            (0x00, 3) => Some(Concatenation {
                reference: u16::from(data[0]),
                total: data[1],
                sequence: data[2],
            }),
            (0x08, 4) => Some(Concatenation {
                reference: u16::from_be_bytes([data[0], data[1]]),
                total: data[2],
                sequence: data[3],
            }),
            _ => None,
        };
        if let Some(c) = concat.filter(|c| c.total > 0 && c.sequence > 0) {
            return Some(c);
        }
        i += 2 + len;
    }
    None
}

fn decode_address(r: &mut Reader<'_>) -> Result<String, CodecError> {
    let digits = r.u8("address length")? as usize;
    let toa = r.u8("type of address")?;
    let octets = r.take(digits.div_ceil(2), "address")?;

    if toa & 0x70 == 0x50 {
        // Alphanumeric sender: the length counts semi-octets of packed septets.
        let septets = gsm7::unpack(octets, digits * 4 / 7, 0)?;
        return Ok(gsm7::from_septets(&septets));
    }

    let mut out = String::with_capacity(digits + 1);
    if toa & 0x70 == 0x10 {
        out.push('+');
    }
    for b in octets {
        for nibble in [b & 0x0F, b >> 4] {
            match nibble {
                0..=9 => out.push((b'0' + nibble) as char),
                0x0A => out.push('*'),
                0x0B => out.push('#'),
                0x0C => out.push('a'),
                0x0D => out.push('b'),
                0x0E => out.push('c'),
                _ => {}
            }
        }
    }
    Ok(out)
}

fn swapped_bcd(b: u8) -> u32 {
    u32::from(b & 0x0F) * 10 + u32::from(b >> 4)
}

/// Service centre timestamp; `None` when the fields do not form a valid date.
fn decode_timestamp(scts: &[u8]) -> Option<DateTime<FixedOffset>> {
    let [year, month, day, hour, minute, second, tz] = <[u8; 7]>::try_from(scts).ok()?;
    let quarters = ((tz & 0x07) as i32) * 10 + (tz >> 4) as i32;
    let offset_secs = quarters * 15 * 60 * if tz & 0x08 != 0 { -1 } else { 1 };
    let offset = FixedOffset::east_opt(offset_secs)?;
    NaiveDate::from_ymd_opt(
        2000 + swapped_bcd(year) as i32,
        swapped_bcd(month),
        swapped_bcd(day),
    )?
    .and_hms_opt(swapped_bcd(hour), swapped_bcd(minute), swapped_bcd(second))?
    .and_local_timezone(offset)
    .single()
}
