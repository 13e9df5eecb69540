//! Reading and writing the plain files the CLI works with.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, bail};
use csv::{ReaderBuilder, Trim, Writer};

use district_core::DistrictsDefinition;

/// Read a JSON districts definition.
pub fn read_plan(path: &Path) -> anyhow::Result<DistrictsDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a districts definition", path.display()))
}

/// Parse `block id,district` rows. A first row whose district column is
/// not a number is taken as a header.
pub fn parse_assignment(text: &str) -> anyhow::Result<HashMap<String, u32>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut assignment = HashMap::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = record.position().map_or(i as u64 + 1, |p| p.line());
        let (Some(block), Some(district)) = (record.get(0), record.get(1)) else {
            bail!("line {line}: expected `block,district`");
        };
        match district.parse::<u32>() {
            Ok(district) => {
                assignment.insert(block.to_string(), district);
            }
            Err(_) if i == 0 => continue,
            Err(_) => bail!("line {line}: invalid district {district:?}"),
        }
    }
    Ok(assignment)
}

pub fn read_assignment(path: &Path) -> anyhow::Result<HashMap<String, u32>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_assignment(&content).with_context(|| format!("invalid assignment {}", path.display()))
}

/// Render export rows with a header.
pub fn format_rows(rows: &[(String, u32)]) -> anyhow::Result<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(["BLOCKID", "DISTRICT"])?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().context("failed to flush rows")?;
    Ok(String::from_utf8(bytes)?)
}

/// Write `content` to `out`, or stdout when no path is given.
pub fn emit(out: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{content}");
            Ok(())
        }
    }
}
