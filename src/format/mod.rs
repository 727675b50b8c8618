//! Encoding and decoding of the two on-disk plugin list formats.
//!
//! Both formats are line-oriented text files with a generated `#` comment
//! header and CRLF line endings, but they differ in structure and byte
//! encoding:
//! - `Original`: `loadorder.txt` (UTF-8, every non-native plugin in load
//!   order) plus `plugins.txt` (Latin-1, only the enabled subset)
//! - `AlternateOrdered`: a single `plugins.txt` (Latin-1) where line order is
//!   the load order and a leading `*` marks a plugin enabled
//!
//! Decoding is defensive: a file with no content at all is treated as a
//! truncated or corrupted read ([`FormatError::EmptyContent`]) rather than a
//! valid empty state, since a legitimately written file always carries the
//! generated header. A file containing only the header parses to an empty
//! list and is fine.

use std::collections::HashSet;

use thiserror::Error;

use crate::models::{PluginEntry, PluginFormat, PluginMap, entries_by_load_order};

/// Comment line written at the top of every generated file.
pub const GENERATED_HEADER: &str =
    concat!("# Automatically generated by ", env!("CARGO_PKG_NAME"));

/// Leading character marking a plugin enabled in the `AlternateOrdered` format.
pub const ENABLED_MARKER: char = '*';

/// Errors produced while decoding plugin list files.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The file had no content at all. A legitimately empty list still
    /// contains the generated header, so true emptiness signals a truncated
    /// or mid-write read and feeds the retry path.
    #[error("file content is empty (likely a truncated or mid-write read)")]
    EmptyContent,

    #[error("order file is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// One file produced by [`render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// File name inside the bound directory.
    pub name: &'static str,
    pub bytes: Vec<u8>,
}

/// One line decoded by [`parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPlugin {
    pub name: String,
    /// For `AlternateOrdered` this is authoritative (marker presence). For
    /// the `Original` order file it is always `false`; enabled state is
    /// resolved in a second pass against the enabled file's membership.
    pub enabled_hint: bool,
}

/// Render the map into the file set for `format`, excluding native plugins.
///
/// Entries are emitted ascending by `load_order`. Returns one buffer for
/// `AlternateOrdered`, two for `Original` (order file first).
pub fn render(map: &PluginMap, format: PluginFormat, native: &HashSet<String>) -> Vec<RenderedFile> {
    let ordered: Vec<(&str, &PluginEntry)> = entries_by_load_order(map)
        .into_iter()
        .filter(|(name, _)| !native.contains(&name.to_lowercase()))
        .collect();

    match format {
        PluginFormat::Original => {
            let order_lines: Vec<&str> = ordered.iter().map(|(name, _)| *name).collect();
            let enabled_lines: Vec<&str> = ordered
                .iter()
                .filter(|(_, entry)| entry.enabled)
                .map(|(name, _)| *name)
                .collect();

            vec![
                RenderedFile {
                    name: "loadorder.txt",
                    bytes: join_lines(&order_lines).into_bytes(),
                },
                RenderedFile {
                    name: "plugins.txt",
                    bytes: encode_latin1(&join_lines(&enabled_lines)),
                },
            ]
        }
        PluginFormat::AlternateOrdered => {
            let lines: Vec<String> = ordered
                .iter()
                .map(|(name, entry)| {
                    if entry.enabled {
                        format!("{ENABLED_MARKER}{name}")
                    } else {
                        (*name).to_string()
                    }
                })
                .collect();
            let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();

            vec![RenderedFile {
                name: "plugins.txt",
                bytes: encode_latin1(&join_lines(&line_refs)),
            }]
        }
    }
}

/// Decode one file's bytes into its plugin lines.
///
/// Comment lines (leading `#`) and blank lines are stripped. The order file
/// of `Original` is UTF-8; everything else is Latin-1. Returns
/// [`FormatError::EmptyContent`] when the raw content is empty.
pub fn parse(bytes: &[u8], format: PluginFormat) -> Result<Vec<ParsedPlugin>, FormatError> {
    let text = match format {
        PluginFormat::Original => String::from_utf8(bytes.to_vec())?,
        PluginFormat::AlternateOrdered => decode_latin1(bytes),
    };

    if text.trim().is_empty() {
        return Err(FormatError::EmptyContent);
    }

    Ok(plugin_lines(&text)
        .map(|line| match format {
            PluginFormat::Original => ParsedPlugin {
                name: line.to_string(),
                enabled_hint: false,
            },
            PluginFormat::AlternateOrdered => match line.strip_prefix(ENABLED_MARKER) {
                Some(name) => ParsedPlugin {
                    name: name.to_string(),
                    enabled_hint: true,
                },
                None => ParsedPlugin {
                    name: line.to_string(),
                    enabled_hint: false,
                },
            },
        })
        .collect())
}

/// Decode the `Original` format's enabled file into its membership set,
/// lower-cased for case-insensitive resolution against the order file.
pub fn parse_enabled_set(bytes: &[u8]) -> Result<HashSet<String>, FormatError> {
    let text = decode_latin1(bytes);
    if text.trim().is_empty() {
        return Err(FormatError::EmptyContent);
    }
    Ok(plugin_lines(&text).map(|line| line.to_lowercase()).collect())
}

/// Build a fresh map from parsed lines, in file order.
///
/// Freshly parsed file order wins: `load_order` is assigned sequentially in
/// the order names appear, native plugins are skipped, names missing from the
/// file are dropped, and a duplicated name keeps its first occurrence.
pub fn reconcile(parsed: &[ParsedPlugin], native: &HashSet<String>) -> PluginMap {
    let mut map = PluginMap::new();
    for plugin in parsed {
        if native.contains(&plugin.name.to_lowercase()) {
            continue;
        }
        if map.contains_key(&plugin.name) {
            continue;
        }
        let load_order = map.len();
        map.insert(
            plugin.name.clone(),
            PluginEntry {
                enabled: plugin.enabled_hint,
                load_order,
            },
        );
    }
    map
}

/// Non-comment, non-blank lines of a decoded file.
fn plugin_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Join plugin lines under the generated header, CRLF-terminated.
fn join_lines(lines: &[&str]) -> String {
    let mut out = String::with_capacity(
        GENERATED_HEADER.len() + lines.iter().map(|l| l.len() + 2).sum::<usize>() + 2,
    );
    out.push_str(GENERATED_HEADER);
    out.push_str("\r\n");
    for line in lines {
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}

/// Encode to Latin-1. Code points above U+00FF have no representation and
/// degrade to `?`, matching how the game engines treat them.
fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}

/// Decode Latin-1 bytes; every byte maps 1:1 to the same code point.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(entries: &[(&str, bool)]) -> PluginMap {
        entries
            .iter()
            .enumerate()
            .map(|(i, (name, enabled))| {
                (
                    name.to_string(),
                    PluginEntry {
                        enabled: *enabled,
                        load_order: i,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_render_original_produces_two_files() {
        let map = map_of(&[("ModA.esp", true), ("ModB.esp", false), ("ModC.esp", true)]);
        let files = render(&map, PluginFormat::Original, &HashSet::new());

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "loadorder.txt");
        assert_eq!(files[1].name, "plugins.txt");

        let order = String::from_utf8(files[0].bytes.clone()).unwrap();
        assert_eq!(
            order,
            format!("{GENERATED_HEADER}\r\nModA.esp\r\nModB.esp\r\nModC.esp\r\n")
        );

        let enabled = decode_latin1(&files[1].bytes);
        assert_eq!(enabled, format!("{GENERATED_HEADER}\r\nModA.esp\r\nModC.esp\r\n"));
    }

    #[test]
    fn test_render_alternate_ordered_markers() {
        let map = map_of(&[("ModX.esp", true), ("ModY.esp", false)]);
        let files = render(&map, PluginFormat::AlternateOrdered, &HashSet::new());

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "plugins.txt");

        let text = decode_latin1(&files[0].bytes);
        assert_eq!(text, format!("{GENERATED_HEADER}\r\n*ModX.esp\r\nModY.esp\r\n"));
    }

    #[test]
    fn test_render_skips_native_plugins() {
        let map = map_of(&[("Skyrim.esm", true), ("ModA.esp", true)]);
        let native: HashSet<String> = ["skyrim.esm".to_string()].into();

        let files = render(&map, PluginFormat::AlternateOrdered, &native);
        let text = decode_latin1(&files[0].bytes);
        assert!(!text.contains("Skyrim.esm"));
        assert!(text.contains("*ModA.esp"));
    }

    #[test]
    fn test_parse_strips_header_and_blanks() {
        let bytes = b"# header\r\n\r\nModA.esp\r\nModB.esp\r\n";
        let parsed = parse(bytes, PluginFormat::Original).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "ModA.esp");
        assert!(!parsed[0].enabled_hint);
    }

    #[test]
    fn test_parse_alternate_marker() {
        let bytes = b"# header\r\n*ModX.esp\r\nModY.esp\r\n";
        let parsed = parse(bytes, PluginFormat::AlternateOrdered).unwrap();

        assert_eq!(parsed[0].name, "ModX.esp");
        assert!(parsed[0].enabled_hint);
        assert_eq!(parsed[1].name, "ModY.esp");
        assert!(!parsed[1].enabled_hint);
    }

    #[test]
    fn test_parse_empty_content_is_error() {
        assert!(matches!(
            parse(b"", PluginFormat::Original),
            Err(FormatError::EmptyContent)
        ));
        assert!(matches!(
            parse(b"  \r\n", PluginFormat::AlternateOrdered),
            Err(FormatError::EmptyContent)
        ));
        assert!(matches!(
            parse_enabled_set(b""),
            Err(FormatError::EmptyContent)
        ));
    }

    #[test]
    fn test_parse_header_only_is_valid_empty_list() {
        let parsed = parse(b"# header\r\n", PluginFormat::AlternateOrdered).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_reconcile_sequential_order_and_native_skip() {
        let parsed = vec![
            ParsedPlugin {
                name: "Fallout4.esm".to_string(),
                enabled_hint: true,
            },
            ParsedPlugin {
                name: "ModA.esp".to_string(),
                enabled_hint: true,
            },
            ParsedPlugin {
                name: "ModB.esp".to_string(),
                enabled_hint: false,
            },
        ];
        let native: HashSet<String> = ["fallout4.esm".to_string()].into();

        let map = reconcile(&parsed, &native);
        assert_eq!(map.len(), 2);
        assert_eq!(map["ModA.esp"].load_order, 0);
        assert!(map["ModA.esp"].enabled);
        assert_eq!(map["ModB.esp"].load_order, 1);
        assert!(!map["ModB.esp"].enabled);
    }

    #[test]
    fn test_reconcile_duplicate_keeps_first() {
        let parsed = vec![
            ParsedPlugin {
                name: "ModA.esp".to_string(),
                enabled_hint: true,
            },
            ParsedPlugin {
                name: "ModA.esp".to_string(),
                enabled_hint: false,
            },
        ];
        let map = reconcile(&parsed, &HashSet::new());
        assert_eq!(map.len(), 1);
        assert!(map["ModA.esp"].enabled);
    }

    #[test]
    fn test_latin1_round_trip() {
        let text = "Stra\u{00DF}e.esp";
        let bytes = encode_latin1(text);
        assert_eq!(bytes, b"Stra\xDFe.esp");
        assert_eq!(decode_latin1(&bytes), text);
    }

    #[test]
    fn test_latin1_unencodable_degrades() {
        assert_eq!(encode_latin1("Mod\u{2603}.esp"), b"Mod?.esp");
    }
}
