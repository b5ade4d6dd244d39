//! Core entity types shared by the parsers, the merge engine and the writer.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// MHC class
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MhcClass {
    I,
    II,
}

impl MhcClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MhcClass::I  => "I",
            MhcClass::II => "II",
        }
    }
}

impl fmt::Display for MhcClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MhcClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "I" | "1"   => Ok(MhcClass::I),
            "II" | "2"  => Ok(MhcClass::II),
            other => Err(format!("unknown MHC class '{other}' (expected I or II)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Score semantics
// ---------------------------------------------------------------------------

/// What a predictor's score means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreType {
    /// Predicted IC50 in nM; lower binds stronger.
    #[serde(rename = "affinity_nM")]
    AffinityNm,
    /// Percentile rank against a reference peptide set; lower binds stronger.
    #[serde(rename = "rank_percentile")]
    RankPercentile,
    /// Tool-specific scale where higher binds stronger.
    #[serde(rename = "raw_score")]
    RawScore,
}

impl ScoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreType::AffinityNm     => "affinity_nM",
            ScoreType::RankPercentile => "rank_percentile",
            ScoreType::RawScore       => "raw_score",
        }
    }

    pub fn binder_direction(&self) -> BinderDirection {
        match self {
            ScoreType::AffinityNm | ScoreType::RankPercentile => BinderDirection::AtMost,
            ScoreType::RawScore => BinderDirection::AtLeast,
        }
    }
}

/// Comparison used to turn a score and a threshold into a binder verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderDirection {
    /// binder ⇔ score ≤ threshold
    AtMost,
    /// binder ⇔ score ≥ threshold
    AtLeast,
}

impl BinderDirection {
    pub fn is_binder(&self, score: f64, threshold: f64) -> bool {
        match self {
            BinderDirection::AtMost  => score <= threshold,
            BinderDirection::AtLeast => score >= threshold,
        }
    }
}

// ---------------------------------------------------------------------------
// Predictors
// ---------------------------------------------------------------------------

/// The closed set of supported binding predictors.
///
/// Declaration order is the canonical column order of the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predictor {
    /// SYFPEITHI position-specific matrices (half-max score, higher is better).
    Syfpeithi,
    /// MHCflurry presentation percentile.
    Mhcflurry,
    /// MHCnuggets IC50 in nM.
    Mhcnuggets,
    /// NetMHCpan affinity in nM.
    Netmhcpan,
    /// NetMHCIIpan EL percentile rank.
    Netmhciipan,
}

impl Predictor {
    pub const ALL: [Predictor; 5] = [
        Predictor::Syfpeithi,
        Predictor::Mhcflurry,
        Predictor::Mhcnuggets,
        Predictor::Netmhcpan,
        Predictor::Netmhciipan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Predictor::Syfpeithi   => "syfpeithi",
            Predictor::Mhcflurry   => "mhcflurry",
            Predictor::Mhcnuggets  => "mhcnuggets",
            Predictor::Netmhcpan   => "netmhcpan",
            Predictor::Netmhciipan => "netmhciipan",
        }
    }

    /// MHC classes the tool is able to score.
    pub fn supported_classes(&self) -> &'static [MhcClass] {
        match self {
            Predictor::Syfpeithi   => &[MhcClass::I, MhcClass::II],
            Predictor::Mhcflurry   => &[MhcClass::I],
            Predictor::Mhcnuggets  => &[MhcClass::I, MhcClass::II],
            Predictor::Netmhcpan   => &[MhcClass::I],
            Predictor::Netmhciipan => &[MhcClass::II],
        }
    }

    pub fn supports(&self, class: MhcClass) -> bool {
        self.supported_classes().contains(&class)
    }

    /// Fixed score semantics of the value the tool's parser extracts.
    pub fn score_type(&self) -> ScoreType {
        match self {
            Predictor::Syfpeithi   => ScoreType::RawScore,
            Predictor::Mhcflurry   => ScoreType::RankPercentile,
            Predictor::Mhcnuggets  => ScoreType::AffinityNm,
            Predictor::Netmhcpan   => ScoreType::AffinityNm,
            Predictor::Netmhciipan => ScoreType::RankPercentile,
        }
    }

    pub fn binder_direction(&self) -> BinderDirection {
        self.score_type().binder_direction()
    }
}

impl fmt::Display for Predictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Predictor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Predictor::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| format!("unknown predictor '{}'", s.trim()))
    }
}

// ---------------------------------------------------------------------------
// Peptide
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPeptide {
    #[error("empty peptide")]
    Empty,
    #[error("invalid residue '{0}' in peptide")]
    InvalidResidue(char),
}

/// An amino-acid sequence. Identity is the exact sequence string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Peptide(String);

impl Peptide {
    pub fn new(sequence: &str) -> Result<Self, InvalidPeptide> {
        let sequence = sequence.trim();
        if sequence.is_empty() {
            return Err(InvalidPeptide::Empty);
        }
        if let Some(c) = sequence.chars().find(|c| !c.is_ascii_alphabetic()) {
            return Err(InvalidPeptide::InvalidResidue(c));
        }
        Ok(Self(sequence.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Peptide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Allele
// ---------------------------------------------------------------------------

/// An MHC allele as emitted by a tool together with its canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allele {
    /// Spelling as it appeared in the tool output, e.g. "HLA-A02:01"
    pub raw: String,
    /// Normalised spelling, e.g. "HLA-A*02:01"
    pub canonical: String,
    pub mhc_class: MhcClass,
}

// ---------------------------------------------------------------------------
// Sample metadata
// ---------------------------------------------------------------------------

/// Type of the upstream input the peptides were derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputFileType {
    Variant,
    #[default]
    Peptide,
    Protein,
}

impl FromStr for InputFileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "variant" | "vcf"   => Ok(InputFileType::Variant),
            "peptide" | "tsv"   => Ok(InputFileType::Peptide),
            "protein" | "fasta" => Ok(InputFileType::Protein),
            other => Err(format!("unknown input file type '{other}'")),
        }
    }
}

/// Read-only description of one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    pub sample_id: String,
    /// Requested alleles, spelled as the upstream sample description wrote them.
    /// Accepts a list or the upstream `;`-delimited string.
    #[serde(deserialize_with = "deserialize_allele_list")]
    pub alleles: Vec<String>,
    pub mhc_class: MhcClass,
    #[serde(default)]
    pub file_type: InputFileType,
    /// Requested tools; iteration order is the canonical column order.
    pub tools: BTreeSet<Predictor>,
}

impl SampleMetadata {
    /// Build metadata from the upstream semicolon-delimited allele list.
    pub fn new(
        sample_id: impl Into<String>,
        allele_list: &str,
        mhc_class: MhcClass,
        file_type: InputFileType,
        tools: impl IntoIterator<Item = Predictor>,
    ) -> Self {
        Self {
            sample_id: sample_id.into(),
            alleles: split_allele_list(allele_list),
            mhc_class,
            file_type,
            tools: tools.into_iter().collect(),
        }
    }

    pub fn requests(&self, predictor: Predictor) -> bool {
        self.tools.contains(&predictor)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AlleleList {
    Delimited(String),
    Items(Vec<String>),
}

fn deserialize_allele_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match AlleleList::deserialize(deserializer)? {
        AlleleList::Delimited(list) => split_allele_list(&list),
        AlleleList::Items(items) => items.iter().flat_map(|item| split_allele_list(item)).collect(),
    })
}

/// Split a `;`-delimited allele list, dropping blanks.
pub fn split_allele_list(list: &str) -> Vec<String> {
    list.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Prediction records
// ---------------------------------------------------------------------------

/// One normalised prediction of one tool for one (peptide, allele) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub peptide: Peptide,
    pub allele: Allele,
    pub predictor: Predictor,
    pub score: f64,
    pub score_type: ScoreType,
    pub is_binder: Option<bool>,
}

impl PredictionRecord {
    /// New unclassified record; the score type is fixed by the predictor.
    pub fn new(peptide: Peptide, allele: Allele, predictor: Predictor, score: f64) -> Self {
        Self {
            peptide,
            allele,
            predictor,
            score,
            score_type: predictor.score_type(),
            is_binder: None,
        }
    }

    /// Returns the record with its verdict replaced.
    pub fn with_verdict(self, is_binder: Option<bool>) -> Self {
        Self { is_binder, ..self }
    }

    /// Join key: (peptide, canonical allele).
    pub fn key(&self) -> (&str, &str) {
        (self.peptide.as_str(), self.allele.canonical.as_str())
    }
}

// ---------------------------------------------------------------------------
// Merged rows
// ---------------------------------------------------------------------------

/// Score and verdict of one tool in a merged row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolCell {
    pub score: f64,
    pub is_binder: Option<bool>,
}

/// One row of a sample's merged table.
///
/// `cells` holds an entry for every requested tool of the sample; `None`
/// marks a tool that produced nothing for this pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub peptide: Peptide,
    pub allele: String,
    pub cells: BTreeMap<Predictor, Option<ToolCell>>,
}

impl MergedRow {
    pub fn cell(&self, predictor: Predictor) -> Option<&ToolCell> {
        self.cells.get(&predictor).and_then(Option::as_ref)
    }

    pub fn tools(&self) -> impl Iterator<Item = Predictor> + '_ {
        self.cells.keys().copied()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
