//! Text-mode fragment decoding and multi-part reassembly.

use super::ucs2;
use super::{LogicalSms, SmsFragment};
use std::collections::BTreeMap;

/// One decoded text-mode payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub reference: u16,
    pub total: u8,
    pub sequence: u8,
}

impl Fragment {
    fn single(text: String) -> Self {
        Self {
            text,
            reference: 0,
            total: 1,
            sequence: 1,
        }
    }
}

const UDH_8BIT_REF: [u8; 3] = [0x05, 0x00, 0x03];
const UDH_16BIT_REF: [u8; 3] = [0x06, 0x08, 0x04];

/// Decode a UCS2 hex payload that may start with a concatenation header.
///
/// Never fails: a payload that is not valid hex, or whose text part has an odd
/// number of octets, comes back verbatim as a single-part fragment.
pub fn decode_fragment(hex: &str) -> Fragment {
    let Ok(bytes) = ucs2::from_hex(hex) else {
        return Fragment::single(hex.to_string());
    };

    let (reference, total, sequence, body) =
        if bytes.len() > 6 && bytes[..3] == UDH_8BIT_REF {
            (u16::from(bytes[3]), bytes[4], bytes[5], &bytes[6..])
        } else if bytes.len() > 7 && bytes[..3] == UDH_16BIT_REF {
            (
                u16::from_be_bytes([bytes[3], bytes[4]]),
                bytes[5],
                bytes[6],
                &bytes[7..],
            )
        } else {
            (0, 1, 1, &bytes[..])
        };

    match ucs2::decode(body) {
        Some(text) => Fragment {
            text,
            reference,
            total,
            sequence,
        },
        None => Fragment::single(hex.to_string()),
    }
}

/// Merge complete concatenated sets and order everything by device index.
///
/// Parts are grouped by `(sender, reference)`. A group merges only when every
/// sequence number from 1 to its total is present exactly once; otherwise its
/// parts are returned one by one.
pub fn reassemble(fragments: Vec<SmsFragment>) -> Vec<LogicalSms> {
    let mut out = Vec::with_capacity(fragments.len());
    let mut groups: BTreeMap<(String, u16), Vec<SmsFragment>> = BTreeMap::new();

    for fragment in fragments {
        if fragment.total <= 1 {
            out.push(LogicalSms::from(fragment));
        } else {
            groups
                .entry((fragment.sender.clone(), fragment.reference))
                .or_default()
                .push(fragment);
        }
    }

    for (_, mut parts) in groups {
        parts.sort_by_key(|p| (p.sequence, p.index));
        if !is_complete(&parts) {
            out.extend(parts.into_iter().map(LogicalSms::from));
            continue;
        }
        let message: String = parts.iter().map(|p| p.text.as_str()).collect();
        let first = &parts[0];
        out.push(LogicalSms {
            index: first.index,
            status: first.status.clone(),
            number: first.sender.clone(),
            time: first.timestamp.clone(),
            message,
        });
    }

    out.sort_by_key(|sms| sms.index);
    out
}

/// `parts` must already be sorted by sequence.
fn is_complete(parts: &[SmsFragment]) -> bool {
    let total = parts[0].total;
    parts.len() == usize::from(total)
        && parts
            .iter()
            .enumerate()
            .all(|(i, p)| p.total == total && usize::from(p.sequence) == i + 1)
}
