//! MHC allele nomenclature normalisation.
//!
//! Every predictor spells alleles its own way ("HLA-A*02:01", "HLA-A02:01",
//! "A0201", "DRB1_0101", "H-2-Kb", ...). This module maps all of them onto
//! one canonical spelling per allele so predictions can be joined.
//!
//! Canonical grammars:
//! - human class I: `HLA-A*02:01`
//! - human class II single chain: `DRB1_0101`
//! - human class II alpha/beta pair: `HLA-DQA10501-DQB10201`
//! - mouse: `H2-Kb`, `H2-IAb`
//!
//! # Example
//! ```ignore
//! let norm = AlleleNormaliser::new();
//! assert_eq!(norm.canonical("A0201", MhcClass::I).unwrap(), "HLA-A*02:01");
//! assert_eq!(norm.canonical("HLA-DRB1*01:01", MhcClass::II).unwrap(), "DRB1_0101");
//! ```

use regex::{Captures, Regex};

use mhcmerge_common::entities::{Allele, MhcClass};
use mhcmerge_common::error::{MhcMergeError, Result};

const CLASS_I_LOCI: [&str; 6] = ["A", "B", "C", "E", "F", "G"];

/// Class of a human locus name, e.g. "A" → I, "DQB1" → II.
fn human_locus_class(locus: &str) -> MhcClass {
    if CLASS_I_LOCI.contains(&locus) {
        MhcClass::I
    } else {
        MhcClass::II
    }
}

/// Class of a mouse H2 locus, e.g. "K" → I, "IA" → II.
fn mouse_locus_class(locus: &str) -> MhcClass {
    match locus {
        "IA" | "IE" => MhcClass::II,
        _ => MhcClass::I,
    }
}

/// Zero-pad a numeric field to at least two digits, dropping extra leading zeros.
fn canonical_field(digits: &str) -> Option<String> {
    let value: u32 = digits.parse().ok()?;
    Some(format!("{value:02}"))
}

/// Split the numeric part of a human allele into (group, protein).
///
/// Colon-separated input keeps the first two fields. Compact digit runs are
/// split 4 → 2+2, 5 → 2+3, 6 → 2+2, 7 → 2+3, 8 → 2+2; trailing fields are
/// synonymous/non-coding and dropped.
fn split_fields(fields: &str) -> Option<(String, String)> {
    let (group, protein) = if fields.contains(':') {
        let mut parts = fields.split(':');
        (parts.next()?, parts.next()?)
    } else {
        match fields.len() {
            4 | 6 | 8 => (&fields[0..2], &fields[2..4]),
            5 | 7     => (&fields[0..2], &fields[2..5]),
            _ => return None,
        }
    };
    Some((canonical_field(group)?, canonical_field(protein)?))
}

/// A single parsed human chain.
#[derive(Debug, Clone, PartialEq)]
struct HumanChain {
    locus: String,
    group: String,
    protein: String,
    suffix: String,
}

impl HumanChain {
    fn class(&self) -> MhcClass {
        human_locus_class(&self.locus)
    }

    /// "HLA-A*02:01"
    fn class_i_form(&self) -> String {
        format!("HLA-{}*{}:{}{}", self.locus, self.group, self.protein, self.suffix)
    }

    /// "DRB1_0101"
    fn class_ii_form(&self) -> String {
        format!("{}_{}{}{}", self.locus, self.group, self.protein, self.suffix)
    }

    /// "DQA10501", used inside alpha/beta pairs
    fn compact_form(&self) -> String {
        format!("{}{}{}{}", self.locus, self.group, self.protein, self.suffix)
    }

    fn is_alpha(&self) -> bool {
        self.locus.starts_with("DQA") || self.locus.starts_with("DPA") || self.locus == "DRA"
    }
}

pub struct AlleleNormaliser {
    /// Regex: one human chain, prefix already stripped, e.g. A*02:01, DRB10101
    re_human: Regex,
    /// Regex: mouse H2 allele, e.g. H2-Kb, H-2-IAb
    re_mouse: Regex,
}

impl AlleleNormaliser {
    pub fn new() -> Self {
        Self {
            re_human: Regex::new(
                r"^(A|B|C|E|F|G|DRA|DRB[1-9]|DQA[12]|DQB[12]|DPA[12]|DPB[12])[*_]?(\d{1,3}(?::\d{1,3}){1,3}|\d{4,8})([NLSCAQ])?$",
            )
            .expect("valid human allele regex"),
            re_mouse: Regex::new(r"(?i)^H-?2-?(K|D|L|I-?A|I-?E)([a-z]{1,3}\d?)$")
                .expect("valid mouse allele regex"),
        }
    }

    /// Normalise a raw allele string of the given class.
    pub fn normalise(&self, raw: &str, mhc_class: MhcClass) -> Result<Allele> {
        let canonical = self.canonical(raw, mhc_class)?;
        Ok(Allele {
            raw: raw.to_string(),
            canonical,
            mhc_class,
        })
    }

    /// Canonical spelling of `raw`, or `UnrecognizedAlleleFormat` when no
    /// dialect of `mhc_class` matches.
    pub fn canonical(&self, raw: &str, mhc_class: MhcClass) -> Result<String> {
        let unrecognized = || MhcMergeError::UnrecognizedAlleleFormat {
            raw: raw.to_string(),
            mhc_class,
        };
        let trimmed = raw.trim();

        // Mouse: H2-Kb, H-2-Kb, H-2Kb, h2-kb
        if let Some(caps) = self.re_mouse.captures(trimmed) {
            let locus = caps[1].to_uppercase().replace('-', "");
            if mouse_locus_class(&locus) != mhc_class {
                return Err(unrecognized());
            }
            return Ok(format!("H2-{}{}", locus, caps[2].to_lowercase()));
        }

        let upper = trimmed.to_uppercase();
        let body = upper.strip_prefix("HLA-").unwrap_or(&upper);

        // Class II alpha/beta pair: DQA1*05:01-DQB1*02:01
        if let Some((alpha, beta)) = body.split_once('-') {
            if mhc_class != MhcClass::II {
                return Err(unrecognized());
            }
            let alpha = self.human_chain(alpha).ok_or_else(unrecognized)?;
            let beta = self.human_chain(beta).ok_or_else(unrecognized)?;
            if !alpha.is_alpha() || beta.is_alpha() || beta.class() != MhcClass::II {
                return Err(unrecognized());
            }
            return Ok(format!("HLA-{}-{}", alpha.compact_form(), beta.compact_form()));
        }

        let chain = self.human_chain(body).ok_or_else(unrecognized)?;
        match (chain.class(), mhc_class) {
            (MhcClass::I, MhcClass::I)   => Ok(chain.class_i_form()),
            (MhcClass::II, MhcClass::II) => Ok(chain.class_ii_form()),
            _ => Err(unrecognized()),
        }
    }

    /// Normalise a requested allele list, splitting successes from failures.
    pub fn normalise_all(&self, raws: &[String], mhc_class: MhcClass) -> (Vec<Allele>, Vec<MhcMergeError>) {
        let mut alleles = Vec::new();
        let mut errors = Vec::new();
        for raw in raws {
            match self.normalise(raw, mhc_class) {
                Ok(a) => alleles.push(a),
                Err(e) => errors.push(e),
            }
        }
        (alleles, errors)
    }

    fn human_chain(&self, s: &str) -> Option<HumanChain> {
        let caps: Captures = self.re_human.captures(s)?;
        let (group, protein) = split_fields(&caps[2])?;
        Some(HumanChain {
            locus: caps[1].to_string(),
            group,
            protein,
            suffix: caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
        })
    }
}

impl Default for AlleleNormaliser {
    fn default() -> Self { Self::new() }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
