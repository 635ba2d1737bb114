//! Treatment protocols: the closed comparison universe.
//!
//! Treatments are identified by a closed enum resolved when the catalog is built. Names
//! coming from configuration go through [`TreatmentId::from_str`], so a typo is a load-time
//! [`SimError::UnknownTreatment`] rather than a silent default.

use std::fmt;
use std::str::FromStr;

use crate::SimError;

/// Identifier of a treatment protocol.
///
/// Declaration order is the stable tie-break order used by rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TreatmentId {
    StandardCare,
    IntensiveTherapy,
    ExperimentalTreatment,
}

impl TreatmentId {
    /// All identifiers, in declaration order.
    pub const ALL: [TreatmentId; 3] = [
        TreatmentId::StandardCare,
        TreatmentId::IntensiveTherapy,
        TreatmentId::ExperimentalTreatment,
    ];

    /// Stable index, used for sub-seeding.
    pub fn index(self) -> usize {
        match self {
            TreatmentId::StandardCare => 0,
            TreatmentId::IntensiveTherapy => 1,
            TreatmentId::ExperimentalTreatment => 2,
        }
    }

    /// Human-readable protocol name.
    pub fn name(self) -> &'static str {
        match self {
            TreatmentId::StandardCare => "Standard Care",
            TreatmentId::IntensiveTherapy => "Intensive Therapy",
            TreatmentId::ExperimentalTreatment => "Experimental Treatment",
        }
    }
}

impl fmt::Display for TreatmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for TreatmentId {
    type Err = SimError;

    /// Accepts the display name (`"Intensive Therapy"`), the variant name
    /// (`"IntensiveTherapy"`) or a snake-case key (`"intensive_therapy"`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(*c, ' ' | '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "standardcare" => Ok(TreatmentId::StandardCare),
            "intensivetherapy" => Ok(TreatmentId::IntensiveTherapy),
            "experimentaltreatment" => Ok(TreatmentId::ExperimentalTreatment),
            _ => Err(SimError::UnknownTreatment { name: s.to_string() }),
        }
    }
}

/// Baseline parameters of one protocol, before any patient adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreatmentProfile {
    /// Efficacy Beta alpha (> 0).
    pub efficacy_alpha: f64,
    /// Efficacy Beta beta (> 0).
    pub efficacy_beta: f64,
    /// Best-case recovery, days.
    pub recovery_optimistic: f64,
    /// Most likely recovery, days.
    pub recovery_likely: f64,
    /// Worst-case recovery, days.
    pub recovery_pessimistic: f64,
    /// Baseline complication probability in `[0, 1]`.
    pub complication_probability: f64,
    /// Cost of the protocol itself.
    pub base_cost: f64,
    /// Additional cost incurred when a complication occurs.
    pub complication_cost: f64,
}

impl TreatmentProfile {
    /// Mean of the baseline efficacy distribution.
    pub fn mean_efficacy(&self) -> f64 {
        self.efficacy_alpha / (self.efficacy_alpha + self.efficacy_beta)
    }

    /// Check the profile invariants.
    ///
    /// Distribution-parameter violations are [`SimError::Domain`]; cost violations are
    /// [`SimError::InvalidConfiguration`].
    pub fn validate(&self) -> Result<(), SimError> {
        crate::sampling::beta_distribution(self.efficacy_alpha, self.efficacy_beta)?;
        let concentration = self.efficacy_alpha + self.efficacy_beta;
        if !concentration.is_finite() {
            return Err(SimError::domain(
                "Beta",
                "alpha + beta",
                concentration,
                "concentration must be finite",
            ));
        }
        crate::sampling::triangular_distribution(
            self.recovery_optimistic,
            self.recovery_likely,
            self.recovery_pessimistic,
        )?;
        if self.recovery_optimistic <= 0.0 {
            return Err(SimError::domain(
                "Triangular",
                "a",
                self.recovery_optimistic,
                "recovery time must be positive",
            ));
        }
        crate::sampling::bernoulli_distribution(self.complication_probability)?;
        for (name, v) in [
            ("base_cost", self.base_cost),
            ("complication_cost", self.complication_cost),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(SimError::config(format!(
                    "{name} must be finite and >= 0 (got {v})"
                )));
            }
        }
        Ok(())
    }
}

/// One catalog row: a resolved identifier and its profile.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreatmentEntry {
    #[cfg_attr(
        feature = "serde",
        serde(rename = "name", deserialize_with = "deserialize_treatment_id")
    )]
    pub id: TreatmentId,
    pub profile: TreatmentProfile,
}

#[cfg(feature = "serde")]
fn deserialize_treatment_id<'de, D>(d: D) -> Result<TreatmentId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    let s = String::deserialize(d)?;
    s.parse().map_err(serde::de::Error::custom)
}

/// The closed set of treatments being compared, in declaration order.
///
/// Invariants (checked by [`TreatmentCatalog::new`]): non-empty, no duplicate ids, every
/// profile valid.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<TreatmentEntry>", into = "Vec<TreatmentEntry>"))]
pub struct TreatmentCatalog {
    entries: Vec<TreatmentEntry>,
}

impl TreatmentCatalog {
    /// Build a catalog, validating every profile up front.
    pub fn new(entries: Vec<TreatmentEntry>) -> Result<Self, SimError> {
        if entries.is_empty() {
            return Err(SimError::config("treatment set is empty"));
        }
        for (i, e) in entries.iter().enumerate() {
            if entries[..i].iter().any(|p| p.id == e.id) {
                return Err(SimError::config(format!("duplicate treatment `{}`", e.id)));
            }
            e.profile.validate()?;
        }
        Ok(Self { entries })
    }

    /// Build from `(name, profile)` pairs, resolving names fail-fast.
    pub fn from_named<S: AsRef<str>>(
        named: impl IntoIterator<Item = (S, TreatmentProfile)>,
    ) -> Result<Self, SimError> {
        let entries = named
            .into_iter()
            .map(|(name, profile)| {
                Ok(TreatmentEntry {
                    id: name.as_ref().parse()?,
                    profile,
                })
            })
            .collect::<Result<Vec<_>, SimError>>()?;
        Self::new(entries)
    }

    /// The three reference protocols.
    ///
    /// Efficacy uses `alpha = 10 * mean`, `beta = 10 * (1 - mean)`.
    pub fn reference() -> Self {
        Self {
            entries: vec![
                TreatmentEntry {
                    id: TreatmentId::StandardCare,
                    profile: TreatmentProfile {
                        efficacy_alpha: 6.5,
                        efficacy_beta: 3.5,
                        recovery_optimistic: 30.0,
                        recovery_likely: 60.0,
                        recovery_pessimistic: 120.0,
                        complication_probability: 0.10,
                        base_cost: 5_000.0,
                        complication_cost: 8_000.0,
                    },
                },
                TreatmentEntry {
                    id: TreatmentId::IntensiveTherapy,
                    profile: TreatmentProfile {
                        efficacy_alpha: 7.8,
                        efficacy_beta: 2.2,
                        recovery_optimistic: 20.0,
                        recovery_likely: 45.0,
                        recovery_pessimistic: 90.0,
                        complication_probability: 0.18,
                        base_cost: 12_000.0,
                        complication_cost: 15_000.0,
                    },
                },
                TreatmentEntry {
                    id: TreatmentId::ExperimentalTreatment,
                    profile: TreatmentProfile {
                        efficacy_alpha: 7.2,
                        efficacy_beta: 2.8,
                        recovery_optimistic: 15.0,
                        recovery_likely: 40.0,
                        recovery_pessimistic: 100.0,
                        complication_probability: 0.25,
                        base_cost: 20_000.0,
                        complication_cost: 18_000.0,
                    },
                },
            ],
        }
    }

    pub fn entries(&self) -> &[TreatmentEntry] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = TreatmentId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Profile lookup; an id outside this catalog is an error, never a default.
    pub fn profile(&self, id: TreatmentId) -> Result<&TreatmentProfile, SimError> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| &e.profile)
            .ok_or_else(|| SimError::UnknownTreatment {
                name: id.name().to_string(),
            })
    }

    /// Position of `id` in declaration order.
    pub fn position(&self, id: TreatmentId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }
}

impl TryFrom<Vec<TreatmentEntry>> for TreatmentCatalog {
    type Error = SimError;

    fn try_from(entries: Vec<TreatmentEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<TreatmentCatalog> for Vec<TreatmentEntry> {
    fn from(c: TreatmentCatalog) -> Self {
        c.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for id in TreatmentId::ALL {
            assert_eq!(id.name().parse::<TreatmentId>().unwrap(), id);
        }
        assert_eq!(
            "intensive_therapy".parse::<TreatmentId>().unwrap(),
            TreatmentId::IntensiveTherapy
        );
        assert_eq!(
            "EXPERIMENTAL-TREATMENT".parse::<TreatmentId>().unwrap(),
            TreatmentId::ExperimentalTreatment
        );
    }

    #[test]
    fn unknown_name_fails_fast() {
        let err = "Homeopathy".parse::<TreatmentId>().unwrap_err();
        assert_eq!(
            err,
            SimError::UnknownTreatment {
                name: "Homeopathy".to_string()
            }
        );
    }

    #[test]
    fn reference_catalog_is_valid_and_ordered() {
        let c = TreatmentCatalog::reference();
        let rebuilt = TreatmentCatalog::new(c.entries().to_vec()).unwrap();
        assert_eq!(rebuilt, c);
        assert_eq!(c.ids().collect::<Vec<_>>(), TreatmentId::ALL.to_vec());
        let sc = c.profile(TreatmentId::StandardCare).unwrap();
        assert!((sc.mean_efficacy() - 0.65).abs() < 1e-12);
    }

    #[test]
    fn catalog_rejects_empty_duplicate_and_invalid() {
        assert!(TreatmentCatalog::new(vec![]).unwrap_err().is_invalid_configuration());

        let e = TreatmentCatalog::reference().entries()[0];
        assert!(TreatmentCatalog::new(vec![e, e])
            .unwrap_err()
            .is_invalid_configuration());

        let mut bad = e;
        bad.profile.efficacy_alpha = 0.0;
        assert!(TreatmentCatalog::new(vec![bad]).unwrap_err().is_domain());

        let mut bad = e;
        bad.profile.efficacy_alpha = 1e308;
        bad.profile.efficacy_beta = 1e308;
        assert!(TreatmentCatalog::new(vec![bad]).unwrap_err().is_domain());

        let mut bad = e;
        bad.profile.recovery_likely = 200.0;
        assert!(TreatmentCatalog::new(vec![bad]).unwrap_err().is_domain());

        let mut bad = e;
        bad.profile.base_cost = -1.0;
        assert!(TreatmentCatalog::new(vec![bad])
            .unwrap_err()
            .is_invalid_configuration());
    }

    #[test]
    fn lookup_outside_catalog_is_an_error() {
        let e = TreatmentCatalog::reference().entries()[0];
        let c = TreatmentCatalog::new(vec![e]).unwrap();
        assert!(c.profile(TreatmentId::StandardCare).is_ok());
        assert!(matches!(
            c.profile(TreatmentId::IntensiveTherapy),
            Err(SimError::UnknownTreatment { .. })
        ));
    }

    #[test]
    fn from_named_resolves_names() {
        let p = TreatmentCatalog::reference().entries()[1].profile;
        let c = TreatmentCatalog::from_named([("Intensive Therapy", p)]).unwrap();
        assert_eq!(c.position(TreatmentId::IntensiveTherapy), Some(0));
        assert!(TreatmentCatalog::from_named([("Surgery", p)]).is_err());
    }
}
