//! Reply grammar for the 27.005 / 27.007 commands the session issues.

use once_cell::sync::Lazy;
use regex::Regex;

static CSQ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+CSQ:\s*(-?\d+)\s*,\s*(-?\d+)").expect("valid CSQ regex"));
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("valid quote regex"));
static COPS_ACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\+COPS:\s*\d+\s*,\s*\d+\s*,\s*"[^"]*"\s*,\s*(\d+)"#).expect("valid COPS regex")
});
static CNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\+CNUM:.*,"([^"]+)""#).expect("valid CNUM regex"));
static CMGL_PDU: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*,\s*(\d+)").expect("valid CMGL regex"));
static CMGL_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(\d+)\s*,\s*"([^"]*)"\s*,\s*"([^"]*)"(?:\s*,\s*(?:"[^"]*")?\s*(?:,\s*"([^"]*)")?)?"#)
        .expect("valid CMGL text regex")
});

/// First non-empty line that is neither `OK` nor an echo of an `AT` command.
pub fn extract_value(response: &str) -> Option<String> {
    response
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && *line != "OK" && !line.starts_with("AT"))
        .map(str::to_string)
}

/// `(rssi, ber)` from a `+CSQ` reply.
pub fn parse_csq(response: &str) -> Option<(i32, i32)> {
    let caps = CSQ.captures(response)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Operator name: the first quoted string of a `+COPS?` reply.
pub fn parse_operator(response: &str) -> Option<String> {
    QUOTED.captures(response).map(|c| c[1].to_string())
}

/// Radio access technology from the `<AcT>` field of `+COPS?`.
pub fn parse_access_technology(response: &str) -> Option<String> {
    let code: u8 = COPS_ACT.captures(response)?[1].parse().ok()?;
    let name = match code {
        0 => "GSM",
        1 => "GSM Compact",
        2 => "UTRAN",
        3 => "GSM w/EGPRS",
        4 => "UTRAN w/HSDPA",
        5 => "UTRAN w/HSUPA",
        6 => "UTRAN w/HSDPA and HSUPA",
        7 => "E-UTRAN",
        8 => "EC-GSM-IoT",
        9 => "E-UTRAN (NB-S1)",
        10 => "E-UTRA-5GCN",
        11 => "NR-5GCN",
        12 => "NG-RAN",
        13 => "E-UTRA-NR dual connectivity",
        _ => return Some(format!("unknown ({code})")),
    };
    Some(name.to_string())
}

/// The number field of `+CNUM: "<alpha>","<number>",<type>`, still raw.
pub fn parse_cnum(response: &str) -> Option<String> {
    CNUM.captures(response).map(|c| c[1].to_string())
}

pub fn is_dialable(number: &str) -> bool {
    !number.is_empty()
        && number
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '*' | '#'))
}

/// One `+CMGL:` record: the header line after the prefix and the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRecord<'a> {
    pub header: &'a str,
    pub body: &'a str,
}

/// Split a listing on `+CMGL: `; the payload loses a trailing `OK`.
///
/// Records without a payload line are skipped.
pub fn split_list_records(response: &str) -> Vec<ListRecord<'_>> {
    response
        .split("+CMGL: ")
        .skip(1)
        .filter_map(|chunk| {
            let (header, rest) = chunk.split_once('\n')?;
            let body = rest.trim();
            let body = body.strip_suffix("OK").unwrap_or(body).trim();
            Some(ListRecord {
                header: header.trim(),
                body,
            })
        })
        .collect()
}

/// `(index, stat)` from a PDU-mode header `<index>,<stat>,[<alpha>],<length>`.
pub fn parse_pdu_header(header: &str) -> Option<(u32, u8)> {
    let caps = CMGL_PDU.captures(header)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Text-mode header `<index>,"<stat>","<oa>",[<alpha>],"<scts>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextHeader {
    pub index: u32,
    pub status: String,
    pub sender: String,
    pub time: String,
}

pub fn parse_text_header(header: &str) -> Option<TextHeader> {
    let caps = CMGL_TEXT.captures(header)?;
    Some(TextHeader {
        index: caps[1].parse().ok()?,
        status: caps[2].to_string(),
        sender: caps[3].to_string(),
        time: caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default(),
    })
}
