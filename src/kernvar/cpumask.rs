use std::collections::BTreeSet;

use super::{Error, Result};

/// Parses a cpu list such as `0-3,6,8-9` into the set of cpu numbers.
///
/// Returns `Ok(None)` for an empty list, mirroring an empty cpuset.
///
/// # Errors
///
/// Returns [`Error::InvalidCpuList`] for malformed items or reversed ranges.
pub fn parse_cpumask(list: &str) -> Result<Option<BTreeSet<usize>>> {
    let invalid = || Error::InvalidCpuList(list.to_owned());
    let mut cpus = BTreeSet::new();

    for item in list.trim().split(',').filter(|s| !s.trim().is_empty()) {
        let item = item.trim();
        match item.split_once('-') {
            Some((from, to)) => {
                let from: usize = from.trim().parse().map_err(|_| invalid())?;
                let to: usize = to.trim().parse().map_err(|_| invalid())?;
                if from > to {
                    return Err(invalid());
                }
                cpus.extend(from..=to);
            }
            None => {
                cpus.insert(item.parse().map_err(|_| invalid())?);
            }
        }
    }

    if cpus.is_empty() {
        return Ok(None);
    }
    log::trace!("cpu list `{list}` selects {} cpus", cpus.len());
    Ok(Some(cpus))
}

/// Formats a set of cpus as a compact list, e.g. `0-3,6`.
pub fn format_cpumask(cpus: &BTreeSet<usize>) -> String {
    let mut out = Vec::new();
    let mut iter = cpus.iter().copied().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if start == end {
            out.push(start.to_string());
        } else {
            out.push(format!("{start}-{end}"));
        }
    }

    out.join(",")
}
