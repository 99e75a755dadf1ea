//! Device discovery by path pattern.

use super::error::PortError;
use super::traits::DeviceScanner;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

/// Default candidates: USB serial adapters and CDC-ACM modems.
pub const DEFAULT_PATTERNS: [&str; 2] = ["/dev/ttyUSB*", "/dev/ttyACM*"];

/// Lists system serial ports whose path matches one of a set of globs.
///
/// Ports reported by the OS enumeration are used first; the parent directory
/// of each pattern is also listed so plain device nodes are found on hosts
/// without udev.
#[derive(Debug, Clone)]
pub struct GlobScanner {
    patterns: Vec<(String, Regex)>,
}

impl GlobScanner {
    pub fn new<I, S>(patterns: I) -> Result<Self, PortError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                glob_to_regex(p)
                    .map(|re| (p.to_string(), re))
                    .map_err(|e| PortError::config(format!("bad scan pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|(_, re)| re.is_match(path))
    }

    fn listed_nodes(&self) -> Vec<String> {
        let mut found = Vec::new();
        for (pattern, re) in &self.patterns {
            let Some(dir) = Path::new(pattern).parent() else {
                continue;
            };
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            found.extend(
                entries
                    .flatten()
                    .map(|e| e.path().to_string_lossy().into_owned())
                    .filter(|p| re.is_match(p)),
            );
        }
        found
    }
}

impl Default for GlobScanner {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS
                .iter()
                .filter_map(|p| glob_to_regex(p).ok().map(|re| (p.to_string(), re)))
                .collect(),
        }
    }
}

impl DeviceScanner for GlobScanner {
    fn candidates(&self) -> Result<Vec<String>, PortError> {
        let mut found: BTreeSet<String> = match serialport::available_ports() {
            Ok(ports) => ports
                .into_iter()
                .map(|p| p.port_name)
                .filter(|name| self.matches(name))
                .collect(),
            Err(e) => {
                tracing::debug!(error = %e, "port enumeration failed, listing device nodes");
                BTreeSet::new()
            }
        };
        found.extend(self.listed_nodes());
        Ok(found.into_iter().collect())
    }
}

/// Translate a shell glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut re = String::with_capacity(glob.len() + 8);
    re.push('^');
    for c in glob.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re)
}
