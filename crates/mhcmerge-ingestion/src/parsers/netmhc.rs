//! NetMHCpan / NetMHCIIpan output.
//!
//! The `-xls` export puts allele names on the first line, each at the
//! column where that allele's group starts, and a header on the second line
//! with the per-allele columns repeated once per group:
//!
//! ```text
//!         HLA-A02:01                                  HLA-A03:01
//! Pos  Peptide  ID  core  icore  EL-score  EL_Rank  BA-score  BA_Rank  core  icore  EL-score ...
//! ```
//!
//! A score column belongs to the nearest allele name at or before its index.
//! When the allele line is blank the sample's alleles are assigned to the
//! score groups in sorted order, which is how both tools order them.
//!
//! Concatenated per-allele exports carry an explicit `allele` column instead
//! and are read as a long table.

use tracing::debug;

use mhcmerge_common::error::Result;

use super::{identity, read_long, read_wide, ParseContext, ScoreTransform, Table};
use crate::affinity::ba_to_ic50;

/// Which columns of a NetMHC-family export carry the score.
pub struct Dialect {
    /// Used as-is, first match wins
    direct: &'static [&'static str],
    /// 0–1 binding affinity converted to nM, used when no direct column exists
    converted: &'static [&'static str],
}

pub const NETMHCPAN: Dialect = Dialect {
    direct: &["nM", "Aff(nM)"],
    converted: &["BA-score", "1-log50k"],
};

pub const NETMHCIIPAN: Dialect = Dialect {
    direct: &["Rank"],
    converted: &[],
};

const ALLELE_COLUMNS: [&str; 3] = ["allele", "MHC", "HLA"];

impl Dialect {
    /// Every column holding the score, plus the transform into the tool's unit.
    fn score_columns(&self, table: &Table) -> Option<(Vec<usize>, ScoreTransform)> {
        for name in self.direct {
            let cols = table.columns_named(name);
            if !cols.is_empty() {
                let transform: ScoreTransform = identity;
                return Some((cols, transform));
            }
        }
        for name in self.converted {
            let cols = table.columns_named(name);
            if !cols.is_empty() {
                let transform: ScoreTransform = ba_to_ic50;
                return Some((cols, transform));
            }
        }
        None
    }

    fn describe(&self) -> String {
        self.direct
            .iter()
            .chain(self.converted.iter())
            .map(|c| format!("'{c}'"))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

pub fn parse(raw: &str, dialect: &Dialect, ctx: &mut ParseContext<'_>) -> Result<()> {
    if raw.trim().is_empty() {
        return Ok(());
    }
    let first = raw.lines().next().unwrap_or("");
    let first_is_header = first
        .split(['\t', ','])
        .any(|field| field.trim().eq_ignore_ascii_case("peptide"));

    if first_is_header {
        parse_long(raw, dialect, ctx)
    } else {
        parse_xls(raw, first, dialect, ctx)
    }
}

fn parse_long(raw: &str, dialect: &Dialect, ctx: &mut ParseContext<'_>) -> Result<()> {
    let Some(table) = Table::read(raw, 0, ctx)? else { return Ok(()) };

    let peptide_col = table
        .column(&["Peptide"])
        .ok_or_else(|| ctx.header_error(table.header_line(), "no 'Peptide' column"))?;
    let allele_col = table
        .column(&ALLELE_COLUMNS)
        .ok_or_else(|| ctx.header_error(table.header_line(), "no allele line and no 'allele' column"))?;
    let (score_cols, transform) = dialect
        .score_columns(&table)
        .ok_or_else(|| ctx.header_error(table.header_line(), format!("no {} column", dialect.describe())))?;

    read_long(&table, peptide_col, allele_col, score_cols[0], transform, ctx);
    Ok(())
}

fn parse_xls(raw: &str, allele_line: &str, dialect: &Dialect, ctx: &mut ParseContext<'_>) -> Result<()> {
    let body = raw.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    let Some(table) = Table::read(body, 1, ctx)? else { return Ok(()) };

    let peptide_col = table
        .column(&["Peptide"])
        .ok_or_else(|| ctx.header_error(table.header_line(), "no 'Peptide' column"))?;
    let (score_cols, transform) = dialect
        .score_columns(&table)
        .ok_or_else(|| ctx.header_error(table.header_line(), format!("no {} column", dialect.describe())))?;

    let anchors: Vec<(usize, &str)> = allele_line
        .split('\t')
        .map(str::trim)
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .collect();

    let columns: Vec<(usize, String)> = if anchors.is_empty() {
        let mut alleles = ctx.meta().alleles.clone();
        alleles.sort();
        if alleles.len() < score_cols.len() {
            return Err(ctx.header_error(
                1,
                format!(
                    "blank allele line with {} score groups but only {} sample alleles",
                    score_cols.len(),
                    alleles.len()
                ),
            ));
        }
        debug!(tool = ctx.predictor().as_str(), "Blank allele line, assigning sample alleles in sorted order");
        score_cols.iter().copied().zip(alleles).collect()
    } else {
        score_cols
            .iter()
            .filter_map(|&col| {
                anchors
                    .iter()
                    .rev()
                    .find(|(pos, _)| *pos <= col)
                    .map(|(_, name)| (col, name.to_string()))
            })
            .collect()
    };

    if columns.is_empty() {
        return Err(ctx.header_error(1, "no allele name precedes any score column"));
    }

    read_wide(&table, peptide_col, &columns, transform, ctx);
    Ok(())
}
