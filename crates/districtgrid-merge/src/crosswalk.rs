//! Moving a plan from an archived region onto its successor.
//!
//! A crosswalk lists, for every new block, the old blocks overlapping it and
//! the share of each. A new block goes to the district holding the largest
//! share; ties go to the lower district id.

use std::collections::{BTreeMap, HashMap};

use ::csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrosswalkShare {
    /// Old block id.
    pub fips: String,
    pub amount: f64,
}

/// New block id → overlapping old blocks.
pub type Crosswalk = HashMap<String, Vec<CrosswalkShare>>;

#[derive(Debug, Error, PartialEq)]
pub enum CrosswalkError {
    #[error("line {line}: expected a block id followed by (block id, share) pairs")]
    Malformed { line: u64 },
    #[error("line {line}: invalid share {value:?}")]
    InvalidShare { line: u64, value: String },
    #[error("line {line}: {message}")]
    Csv { line: u64, message: String },
}

/// Parse the published crosswalk format: one new block per row, followed
/// by alternating old block ids and shares. Rows vary in width.
pub fn parse_crosswalk(text: &str) -> Result<Crosswalk, CrosswalkError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut crosswalk = Crosswalk::new();
    let mut record = StringRecord::new();
    loop {
        let line = reader.position().line();
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                return Err(CrosswalkError::Csv {
                    line: e.position().map_or(line, |p| p.line()),
                    message: e.to_string(),
                });
            }
        }
        let line = record.position().map_or(line, |p| p.line());
        let mut fields = record.iter();
        let Some(new_block) = fields.next() else {
            continue;
        };
        let rest: Vec<&str> = fields.collect();
        if new_block.is_empty() {
            return Err(CrosswalkError::Malformed { line });
        }
        if rest.len() % 2 != 0 {
            return Err(CrosswalkError::Malformed { line });
        }
        let shares = rest
            .chunks_exact(2)
            .map(|pair| {
                let amount = pair[1].parse::<f64>().map_err(|_| CrosswalkError::InvalidShare {
                    line,
                    value: pair[1].to_string(),
                })?;
                Ok(CrosswalkShare {
                    fips: pair[0].to_string(),
                    amount,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        crosswalk.insert(new_block.to_string(), shares);
    }
    Ok(crosswalk)
}

/// Assign every new block to the district with the largest crosswalk share.
///
/// Old blocks missing from `old_assignment` contribute nothing; a new block
/// with no contributing share is left out and imports as unassigned.
pub fn reassign(old_assignment: &HashMap<String, u32>, crosswalk: &Crosswalk) -> HashMap<String, u32> {
    let mut assignment = HashMap::with_capacity(crosswalk.len());
    for (new_block, shares) in crosswalk {
        let mut sums: BTreeMap<u32, f64> = BTreeMap::new();
        for share in shares {
            if let Some(&district) = old_assignment.get(&share.fips) {
                *sums.entry(district).or_insert(0.0) += share.amount;
            }
        }
        let mut best: Option<(u32, f64)> = None;
        for (district, sum) in sums {
            if best.is_none_or(|(_, top)| sum > top) {
                best = Some((district, sum));
            }
        }
        if let Some((district, _)) = best {
            assignment.insert(new_block.clone(), district);
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_share_pairs() {
        let crosswalk = parse_crosswalk("n1,o1,0.5,o2,0.5\nn2,o3,1\n\n").unwrap();
        assert_eq!(crosswalk.len(), 2);
        assert_eq!(crosswalk["n1"].len(), 2);
        assert_eq!(crosswalk["n2"][0].fips, "o3");
        assert_eq!(crosswalk["n2"][0].amount, 1.0);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(
            parse_crosswalk("n1,o1").unwrap_err(),
            CrosswalkError::Malformed { line: 1 }
        );
        assert!(matches!(
            parse_crosswalk("n1,o1,1\nn2,o2,lots"),
            Err(CrosswalkError::InvalidShare { line: 2, .. })
        ));
    }

    #[test]
    fn quoted_fields_are_unwrapped() {
        let crosswalk =
            parse_crosswalk("\"n1\",\"o1\",\"0.25\",o2,0.75\n\"n,2\",o3,1\n").unwrap();
        assert_eq!(crosswalk["n1"][0].fips, "o1");
        assert_eq!(crosswalk["n1"][0].amount, 0.25);
        assert_eq!(crosswalk["n,2"][0].fips, "o3");
    }

    #[test]
    fn largest_share_wins() {
        let old: HashMap<String, u32> =
            [("o1", 1), ("o2", 2), ("o3", 2)].map(|(k, v)| (k.to_string(), v)).into();
        let crosswalk = parse_crosswalk("n1,o1,0.6,o2,0.4\nn2,o1,0.3,o2,0.2,o3,0.2\nn3,o9,1").unwrap();

        let new = reassign(&old, &crosswalk);
        assert_eq!(new["n1"], 1);
        assert_eq!(new["n2"], 2);
        assert!(!new.contains_key("n3"));
    }

    #[test]
    fn ties_go_to_the_lower_district() {
        let old: HashMap<String, u32> = [("o1", 3), ("o2", 1)].map(|(k, v)| (k.to_string(), v)).into();
        let crosswalk = parse_crosswalk("n1,o1,0.5,o2,0.5").unwrap();
        assert_eq!(reassign(&old, &crosswalk)["n1"], 1);
    }
}
