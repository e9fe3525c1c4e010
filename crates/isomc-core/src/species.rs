//! Isotope species, ratio descriptors and the analysis-method inputs consumed
//! by the engine.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, IsoError};

/// Isotope species known to the analysis method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsotopeSpecies {
    /// Display name, e.g. `206Pb`.
    pub name: String,
}

impl IsotopeSpecies {
    /// Creates a species with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Ratio between two species, identified by their index in the species list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IsotopicRatio {
    /// Numerator species index.
    pub numerator: usize,
    /// Denominator species index.
    pub denominator: usize,
}

impl IsotopicRatio {
    /// Creates a ratio descriptor.
    pub fn new(numerator: usize, denominator: usize) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// The same pair with numerator and denominator swapped.
    pub fn inverse(&self) -> Self {
        Self::new(self.denominator, self.numerator)
    }

    /// Human readable label such as `204Pb/208Pb`.
    pub fn label(&self, species: &[IsotopeSpecies]) -> String {
        let name = |index: usize| {
            species
                .get(index)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| format!("#{index}"))
        };
        format!("{}/{}", name(self.numerator), name(self.denominator))
    }
}

/// Where a queried ratio lives in the table and in which direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioLookup {
    /// Position of the registered ratio in the list the table was built from.
    pub index: usize,
    /// `true` when the query is the inverse of the registered ratio.
    pub inverted: bool,
}

/// Symmetric ratio / inverse-ratio relation.
///
/// Built once from a ratio list; every registered ratio is reachable from
/// itself and from its inverse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioPairTable {
    entries: BTreeMap<IsotopicRatio, RatioLookup>,
    #[serde(default)]
    duplicates: usize,
}

impl RatioPairTable {
    /// Builds the table; the first occurrence of a pair wins.
    ///
    /// A ratio whose inverse is already registered resolves to that entry.
    pub fn build(ratios: &[IsotopicRatio]) -> Self {
        let mut entries: BTreeMap<IsotopicRatio, RatioLookup> = BTreeMap::new();
        let mut duplicates = 0;
        for (index, ratio) in ratios.iter().enumerate() {
            match entries.get(ratio) {
                Some(existing) if !existing.inverted => {
                    duplicates += 1;
                    continue;
                }
                Some(_) => continue,
                None => {}
            }
            entries.insert(
                *ratio,
                RatioLookup {
                    index,
                    inverted: false,
                },
            );
            entries.entry(ratio.inverse()).or_insert(RatioLookup {
                index,
                inverted: true,
            });
        }
        Self {
            entries,
            duplicates,
        }
    }

    /// Number of ratios listed again in the same orientation.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Resolves a ratio in either direction.
    pub fn lookup(&self, ratio: &IsotopicRatio) -> Option<RatioLookup> {
        self.entries.get(ratio).copied()
    }

    /// Partner of `ratio` if the pair is registered in either direction.
    pub fn partner(&self, ratio: &IsotopicRatio) -> Option<IsotopicRatio> {
        self.entries.get(ratio).map(|_| ratio.inverse())
    }

    /// Number of registered pairs.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|entry| !entry.inverted).count()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Inputs supplied by the analysis-method collaborator.
///
/// Species are ordered by ascending abundance. The last species is taken as
/// the reference for every direct ratio; this ordering is trusted, not
/// re-derived. The initializer reports when the measured data disagrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MethodDefinition", into = "MethodDefinition")]
pub struct AnalysisMethod {
    species: Vec<IsotopeSpecies>,
    direct_ratios: Vec<IsotopicRatio>,
    derived_ratios: Vec<IsotopicRatio>,
    faraday_detectors: Vec<String>,
    pairs: RatioPairTable,
}

/// Serialized form of an [`AnalysisMethod`]; the pair table is rebuilt on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDefinition {
    /// Species ordered by ascending abundance.
    pub species: Vec<IsotopeSpecies>,
    /// Direct ratios against the last species.
    #[serde(default)]
    pub direct_ratios: Vec<IsotopicRatio>,
    /// Derived ratios.
    #[serde(default)]
    pub derived_ratios: Vec<IsotopicRatio>,
    /// Faraday detector names.
    #[serde(default)]
    pub faraday_detectors: Vec<String>,
}

impl TryFrom<MethodDefinition> for AnalysisMethod {
    type Error = IsoError;

    fn try_from(definition: MethodDefinition) -> Result<Self, Self::Error> {
        AnalysisMethod::new(
            definition.species,
            definition.direct_ratios,
            definition.derived_ratios,
            definition.faraday_detectors,
        )
    }
}

impl From<AnalysisMethod> for MethodDefinition {
    fn from(method: AnalysisMethod) -> Self {
        Self {
            species: method.species,
            direct_ratios: method.direct_ratios,
            derived_ratios: method.derived_ratios,
            faraday_detectors: method.faraday_detectors,
        }
    }
}

impl AnalysisMethod {
    /// Validates the method inputs and builds the ratio pair table.
    pub fn new(
        species: Vec<IsotopeSpecies>,
        direct_ratios: Vec<IsotopicRatio>,
        derived_ratios: Vec<IsotopicRatio>,
        faraday_detectors: Vec<String>,
    ) -> Result<Self, IsoError> {
        if species.is_empty() {
            return Err(IsoError::method("no-species", "species list is empty"));
        }
        let reference = species.len() - 1;
        for ratio in direct_ratios.iter().chain(derived_ratios.iter()) {
            if ratio.numerator >= species.len() || ratio.denominator >= species.len() {
                return Err(IsoError::Method(
                    ErrorInfo::new("unknown-species", "ratio references an unknown species")
                        .with_context("numerator", ratio.numerator)
                        .with_context("denominator", ratio.denominator),
                ));
            }
            if ratio.numerator == ratio.denominator {
                return Err(IsoError::Method(
                    ErrorInfo::new("degenerate-ratio", "ratio of a species to itself")
                        .with_context("species", ratio.numerator),
                ));
            }
        }
        for ratio in &direct_ratios {
            if ratio.denominator != reference {
                return Err(IsoError::Method(
                    ErrorInfo::new(
                        "direct-ratio-not-referenced",
                        "direct ratios must use the most abundant species as denominator",
                    )
                    .with_context("ratio", ratio.label(&species))
                    .with_hint("list species in ascending abundance order"),
                ));
            }
        }
        let mut registered = direct_ratios.clone();
        registered.extend(derived_ratios.iter().copied());
        let pairs = RatioPairTable::build(&registered);
        if pairs.duplicates() > 0 {
            warn!(
                "analysis method lists {} ratio(s) more than once",
                pairs.duplicates()
            );
        }
        Ok(Self {
            species,
            direct_ratios,
            derived_ratios,
            faraday_detectors,
            pairs,
        })
    }

    /// Convenience constructor: every non-reference species against the
    /// reference, no derived ratios.
    pub fn with_direct_ratios(
        species: Vec<IsotopeSpecies>,
        faraday_detectors: Vec<String>,
    ) -> Result<Self, IsoError> {
        let reference = species.len().saturating_sub(1);
        let direct = (0..reference)
            .map(|index| IsotopicRatio::new(index, reference))
            .collect();
        Self::new(species, direct, Vec::new(), faraday_detectors)
    }

    /// Species ordered by ascending abundance.
    pub fn species(&self) -> &[IsotopeSpecies] {
        &self.species
    }

    /// Index of the reference (most abundant) species.
    pub fn reference_species(&self) -> usize {
        self.species.len() - 1
    }

    /// Direct ratios, each against the reference species.
    pub fn direct_ratios(&self) -> &[IsotopicRatio] {
        &self.direct_ratios
    }

    /// Derived ratios between non-reference species (or inverted direct ratios).
    pub fn derived_ratios(&self) -> &[IsotopicRatio] {
        &self.derived_ratios
    }

    /// Names of the Faraday detectors in use, in detector index order.
    pub fn faraday_detectors(&self) -> &[String] {
        &self.faraday_detectors
    }

    /// Symmetric ratio / inverse table over direct and derived ratios.
    pub fn pairs(&self) -> &RatioPairTable {
        &self.pairs
    }
}
