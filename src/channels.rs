//! Convert a cycle/channel mapping spreadsheet into the YAML channel configuration consumed by
//! the viewer.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::{Error, Result};
use crate::table::{read_table, Table};

///Leading columns every mapping must start with, in this order
pub const MANDATORY_COLS: [&str; 6] = ["Cycle", "Channel", "Layer", "Marker", "Cycle Color", "Failed"];
///Intensity range written for every channel
pub const MIN: u32 = 0;
pub const MAX: u32 = 65536;

//a handful of names people actually type into the color column
const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("lime", [0, 255, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("aqua", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("fuchsia", [255, 0, 255]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("violet", [238, 130, 238]),
    ("pink", [255, 192, 203]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("maroon", [128, 0, 0]),
    ("olive", [128, 128, 0]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
];

///An RGB display color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 3]);

impl Color {
    ///`#rgb`, `#rrggbb` (with or without `#`) or a color name
    pub fn parse(text: &str) -> Result<Color> {
        let lower = text.trim().to_lowercase();
        if let Some((_, rgb)) = NAMED_COLORS.iter().find(|(n, _)| *n == lower) {
            return Ok(Color(*rgb));
        }
        let hex = lower.strip_prefix('#').unwrap_or(&lower);
        let digit = |c: char| c.to_digit(16).map(|d| d as u8);
        let digits: Option<Vec<u8>> = hex.chars().map(digit).collect();
        match digits.as_deref() {
            Some([r, g, b]) => Ok(Color([r * 17, g * 17, b * 17])),
            Some([r1, r2, g1, g2, b1, b2]) => Ok(Color([r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2])),
            _ => Err(Error::Color(text.to_string())),
        }
    }

    ///Six lower case hex digits, no `#`
    pub fn hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

///One configured channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEntry {
    pub label: String,
    pub min: u32,
    pub max: u32,
    pub color: Color,
}

///Channel entries keyed by layer
pub type ChannelMap = BTreeMap<i64, ChannelEntry>;

///Header checks: the mandatory columns first, then uniquely named channel groupings
pub fn check_header(header: &[String]) -> Result<&[String]> {
    if header.len() < MANDATORY_COLS.len()
        || header.iter().zip(MANDATORY_COLS).any(|(h, m)| h != m)
    {
        return Err(Error::MandatoryColumns(&MANDATORY_COLS));
    }
    let groups = &header[MANDATORY_COLS.len()..];
    if groups.iter().any(|g| g.trim().is_empty()) {
        return Err(Error::UnnamedGrouping);
    }
    //a grouping named like one of the mandatory columns is accepted
    let mut seen = std::collections::HashSet::new();
    if !groups.iter().all(|g| seen.insert(g)) {
        return Err(Error::DuplicateGrouping);
    }
    Ok(groups)
}

///The cycle color of a row, `None` for `NA` or an empty cell
fn cycle_color(cell: &str) -> Result<Option<Color>> {
    let value = cell.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("NA") {
        return Ok(None);
    }
    Color::parse(value).map(Some)
}

///Marker name, flagged when the cycle failed
fn cycle_name(marker: &str, failed: &str) -> String {
    let mut name = marker.trim().to_string();
    if failed.trim().eq_ignore_ascii_case("TRUE") {
        name.push_str("-failed");
    }
    name
}

fn cell(row: &[String], i: usize) -> &str {
    row.get(i).map(String::as_str).unwrap_or_default()
}

///Build the channel map from a mapping table. Rows without a color are skipped.
pub fn channels_from_table(table: &Table) -> Result<ChannelMap> {
    check_header(&table.header)?;
    let mut channels = ChannelMap::new();
    for row in &table.rows {
        let Some(color) = cycle_color(cell(row, 4))? else {
            continue;
        };
        let layer = cell(row, 2);
        let layer: i64 = layer
            .trim()
            .parse()
            .map_err(|_| Error::Layer(layer.to_string()))?;
        channels.insert(
            layer,
            ChannelEntry {
                label: cycle_name(cell(row, 3), cell(row, 5)),
                min: MIN,
                max: MAX,
                color,
            },
        );
    }
    Ok(channels)
}

///Single quoted unless the text has control characters, which only survive double quoting
fn quoted(s: &str) -> String {
    if !s.chars().any(char::is_control) {
        return format!("'{}'", s.replace('\'', "''"));
    }
    let mut out = String::from("\"");
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

///Render as YAML under a top level `channels` key. Labels and colors are always quoted so that
///hex colors like `000001` or labels like `yes` stay strings.
pub fn to_yaml(channels: &ChannelMap) -> String {
    if channels.is_empty() {
        return "channels: {}\n".to_string();
    }
    let mut out = String::from("channels:\n");
    for (layer, entry) in channels {
        //writing to a String cannot fail
        let _ = write!(
            out,
            "  {layer}:\n    color: {}\n    label: {}\n    max: {}\n    min: {}\n",
            quoted(&entry.color.hex()),
            quoted(&entry.label),
            entry.max,
            entry.min,
        );
    }
    out
}

///Read `infile`, write the YAML configuration to `outfile`
pub fn convert(infile: &Path, outfile: &Path) -> Result<ChannelMap> {
    let table = read_table(infile)?;
    let channels = channels_from_table(&table)?;
    std::fs::write(outfile, to_yaml(&channels))?;
    log::info!("wrote {} channels to {}", channels.len(), outfile.display());
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(extra: &[&str]) -> Vec<String> {
        MANDATORY_COLS
            .iter()
            .chain(extra)
            .map(|s| s.to_string())
            .collect()
    }

    fn table(rows: &[[&str; 6]]) -> Table {
        Table {
            header: header(&["Nuclei"]),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).chain(["x".to_string()]).collect())
                .collect(),
        }
    }

    #[test]
    fn mandatory_columns_must_lead_in_order() {
        assert!(check_header(&header(&[])).is_ok());
        let mut swapped = header(&[]);
        swapped.swap(0, 1);
        assert!(matches!(check_header(&swapped), Err(Error::MandatoryColumns(_))));
        assert!(check_header(&header(&[])[..5]).is_err());
    }

    #[test]
    fn groupings_must_be_named_and_unique() {
        assert!(matches!(
            check_header(&header(&["A", " "])),
            Err(Error::UnnamedGrouping)
        ));
        assert!(matches!(
            check_header(&header(&["A", "B", "A"])),
            Err(Error::DuplicateGrouping)
        ));
        //collisions with the cycle columns are not checked
        assert!(check_header(&header(&["Cycle"])).is_ok());
    }

    #[test]
    fn rows_without_color_are_dropped() {
        let channels = channels_from_table(&table(&[
            ["1", "1", "1", "DAPI", "NA", "FALSE"],
            ["1", "2", "2", "CD3", "na", "FALSE"],
            ["1", "3", "3", "CD4", "", "FALSE"],
            ["1", "4", "4", "CD8", "#00ff00", "FALSE"],
        ]))
        .unwrap();
        assert_eq!(channels.keys().copied().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn colored_row_becomes_entry() {
        let channels = channels_from_table(&table(&[["2", "1", "3", "Ki67", "red", "FALSE"]])).unwrap();
        let entry = &channels[&3];
        assert_eq!(entry.min, 0);
        assert_eq!(entry.max, 65536);
        assert_eq!(entry.label, "Ki67");
        assert_eq!(entry.color.hex(), "ff0000");
    }

    #[test]
    fn failed_cycles_are_labelled() {
        let channels = channels_from_table(&table(&[
            ["1", "1", "1", "CD45", "blue", "TRUE"],
            ["1", "2", "2", "CD20", "blue", "FALSE"],
        ]))
        .unwrap();
        assert_eq!(channels[&1].label, "CD45-failed");
        assert_eq!(channels[&2].label, "CD20");
    }

    #[test]
    fn bad_layer_and_color_are_errors() {
        assert!(matches!(
            channels_from_table(&table(&[["1", "1", "one", "CD3", "red", "FALSE"]])),
            Err(Error::Layer(_))
        ));
        assert!(matches!(
            channels_from_table(&table(&[["1", "1", "1", "CD3", "reddish", "FALSE"]])),
            Err(Error::Color(_))
        ));
    }

    #[test]
    fn colors_parse_in_several_spellings() {
        assert_eq!(Color::parse("#f00").unwrap().hex(), "ff0000");
        assert_eq!(Color::parse("00FF7F").unwrap().hex(), "00ff7f");
        assert_eq!(Color::parse(" Orange ").unwrap().hex(), "ffa500");
        assert!(Color::parse("#12345").is_err());
    }

    #[test]
    fn yaml_quotes_labels_and_colors() {
        let channels = channels_from_table(&table(&[
            ["1", "1", "10", "yes", "#000001", "FALSE"],
            ["1", "2", "2", "it's", "white", "FALSE"],
        ]))
        .unwrap();
        let yaml = to_yaml(&channels);
        assert!(yaml.starts_with("channels:\n  2:\n"));
        assert!(yaml.contains("    color: '000001'\n    label: 'yes'\n    max: 65536\n    min: 0\n"));
        assert!(yaml.contains("label: 'it''s'"));

        //and it is still valid YAML with string colors
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let entry = &parsed["channels"][10];
        assert_eq!(entry["color"].as_str(), Some("000001"));
        assert_eq!(entry["label"].as_str(), Some("yes"));
        assert_eq!(entry["max"].as_u64(), Some(65536));
        assert_eq!(parsed["channels"][2]["label"].as_str(), Some("it's"));
    }

    #[test]
    fn convert_reads_and_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let infile = dir.path().join("map.csv");
        let outfile = dir.path().join("map.yaml");
        std::fs::write(
            &infile,
            "Cycle,Channel,Layer,Marker,Cycle Color,Failed,Immune\n\
             1,1,0,DAPI,#0000ff,FALSE,x\n\
             1,2,1,CD3,NA,FALSE,x\n",
        )
        .unwrap();
        let channels = convert(&infile, &outfile).unwrap();
        assert_eq!(channels.len(), 1);
        let text = std::fs::read_to_string(&outfile).unwrap();
        assert!(text.contains("  0:\n    color: '0000ff'\n    label: 'DAPI'\n"));
    }

    #[test]
    fn multi_line_labels_survive() {
        let mut channels = ChannelMap::new();
        channels.insert(
            1,
            ChannelEntry {
                label: "CD3\nCD4\t\"x\" \\ y".to_string(),
                min: MIN,
                max: MAX,
                color: Color([1, 2, 3]),
            },
        );
        let yaml = to_yaml(&channels);
        assert!(yaml.contains(r#"label: "CD3\nCD4\t\"x\" \\ y""#));
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed["channels"][1]["label"].as_str(),
            Some("CD3\nCD4\t\"x\" \\ y")
        );
        assert_eq!(parsed["channels"][1]["color"].as_str(), Some("010203"));
    }
}
