//! MHCnuggets output, long or wide.
//!
//! Long CSV as printed by `mhcnuggets.src.predict`:
//! ```text
//! peptide,ic50,human_proteome_rank,allele
//! ```
//! Wide TSV as written by the pipeline wrapper:
//! ```text
//! peptide  ic50_affinity_score_HLA-A02:01  human_proteome_rank_HLA-A02:01
//! ```
//! The score is the IC50 in nM. The proteome rank is not used.

use mhcmerge_common::error::Result;

use super::{identity, read_long, read_wide, ParseContext, Table};

const PEPTIDE_COLUMNS: [&str; 2] = ["peptide", "sequence"];
const LONG_SCORE_COLUMNS: [&str; 2] = ["ic50", "ic50_affinity_score"];
const WIDE_SCORE_PREFIXES: [&str; 1] = ["ic50_affinity_score_"];

pub fn parse(raw: &str, ctx: &mut ParseContext<'_>) -> Result<()> {
    let Some(table) = Table::read(raw, 0, ctx)? else { return Ok(()) };

    let peptide_col = table
        .column(&PEPTIDE_COLUMNS)
        .ok_or_else(|| ctx.header_error(table.header_line(), "no 'peptide' column"))?;

    if let Some(allele_col) = table.column(&["allele"]) {
        let score_col = table
            .column(&LONG_SCORE_COLUMNS)
            .ok_or_else(|| ctx.header_error(table.header_line(), "no 'ic50' column"))?;
        read_long(&table, peptide_col, allele_col, score_col, identity, ctx);
        return Ok(());
    }

    let allele_cols = table.prefixed(&WIDE_SCORE_PREFIXES);
    if allele_cols.is_empty() {
        return Err(ctx.header_error(table.header_line(), "no 'allele' column and no ic50_affinity_score_<allele> columns"));
    }
    read_wide(&table, peptide_col, &allele_cols, identity, ctx);
    Ok(())
}
