//! Finite domain catalog: addresses, proposals, bounded integers and step
//! indices, plus the bounded arithmetic every contract model goes through.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::str::FromStr;
use thiserror::Error;

/// An opaque participant identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u32);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An opaque votable option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Proposal(pub u32);

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl Serialize for Proposal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The sort a rule parameter ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    Address,
    Proposal,
    Int,
}

/// A named rule parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Param {
    pub name: &'static str,
    pub sort: Sort,
}

impl Param {
    pub const fn address(name: &'static str) -> Self {
        Self {
            name,
            sort: Sort::Address,
        }
    }

    pub const fn proposal(name: &'static str) -> Self {
        Self {
            name,
            sort: Sort::Proposal,
        }
    }

    pub const fn int(name: &'static str) -> Self {
        Self {
            name,
            sort: Sort::Int,
        }
    }
}

/// A concrete parameter value drawn from the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    Address(Address),
    Proposal(Proposal),
    Int(i64),
}

impl Value {
    pub fn sort(&self) -> Sort {
        match self {
            Value::Address(_) => Sort::Address,
            Value::Proposal(_) => Sort::Proposal,
            Value::Int(_) => Sort::Int,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Address(a) => write!(f, "{a}"),
            Value::Proposal(p) => write!(f, "{p}"),
            Value::Int(v) => write!(f, "{v}"),
        }
    }
}

/// Parameter binding for one rule application, in parameter order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Binding {
    entries: Vec<(&'static str, Value)>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: Value) -> Self {
        self.entries.push((name, value));
        self
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn address(&self, name: &str) -> Option<Address> {
        match self.get(name)? {
            Value::Address(a) => Some(a),
            _ => None,
        }
    }

    pub fn proposal(&self, name: &str) -> Option<Proposal> {
        match self.get(name)? {
            Value::Proposal(p) => Some(p),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    /// True when the binding supplies exactly `params`, in order, with matching sorts.
    pub fn matches(&self, params: &[Param]) -> bool {
        self.entries.len() == params.len()
            && self
                .entries
                .iter()
                .zip(params)
                .all(|((name, value), param)| *name == param.name && value.sort() == param.sort)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl Serialize for Binding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// What to do when an update leaves `[int_min, int_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// The update is inadmissible; the rule's guard fails.
    #[default]
    Reject,
    /// Clamp to the nearest bound.
    Saturate,
    /// Wrap modulo the width of the range.
    Wrap,
}

impl OverflowPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            OverflowPolicy::Reject => "reject",
            OverflowPolicy::Saturate => "saturate",
            OverflowPolicy::Wrap => "wrap",
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = ConfigurationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "reject" => Ok(OverflowPolicy::Reject),
            "saturate" => Ok(OverflowPolicy::Saturate),
            "wrap" => Ok(OverflowPolicy::Wrap),
            other => Err(ConfigurationError::UnknownOption {
                kind: "overflow policy",
                value: other.to_string(),
                expected: "reject, saturate, wrap",
            }),
        }
    }
}

/// A bounded-integer update fell outside the configured range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("arithmetic overflow: {value} is outside the integer range [{min}, {max}]")]
pub struct ArithmeticOverflow {
    pub value: i128,
    pub min: i64,
    pub max: i64,
}

/// Invalid domain bounds or model constants. No search is performed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{name} must be non-negative, got {value}")]
    NegativeCount { name: &'static str, value: i64 },
    #[error("{name} is too large to enumerate: {value}")]
    CountTooLarge { name: &'static str, value: i64 },
    #[error("integer range is empty: int_min {min} > int_max {max}")]
    EmptyIntRange { min: i64, max: i64 },
    #[error("max_trace_length must be at least 1, got {0}")]
    TraceLengthTooShort(i64),
    #[error("{model} model needs at least {needed} {what}, got {got}")]
    DomainTooSmall {
        model: &'static str,
        what: &'static str,
        needed: usize,
        got: usize,
    },
    #[error("{context} requires the value {value}, which is outside [{min}, {max}]")]
    ConstantOutOfRange {
        context: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("unknown {kind} '{value}' (expected one of: {expected})")]
    UnknownOption {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Raw domain bounds as supplied by a caller.
///
/// Counts are signed so that negative input can be rejected with a
/// [`ConfigurationError`] instead of being unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub address_count: i64,
    pub proposal_count: i64,
    pub int_min: i64,
    pub int_max: i64,
    /// Maximum number of snapshots in a trace (the initial snapshot counts).
    pub max_trace_length: i64,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            address_count: 2,
            proposal_count: 2,
            int_min: 0,
            int_max: 3,
            max_trace_length: 4,
        }
    }
}

impl DomainConfig {
    /// Validate the bounds and materialize the finite sets.
    pub fn build(&self) -> Result<Domain, ConfigurationError> {
        let address_count = count("address_count", self.address_count)?;
        let proposal_count = count("proposal_count", self.proposal_count)?;
        if self.int_min > self.int_max {
            return Err(ConfigurationError::EmptyIntRange {
                min: self.int_min,
                max: self.int_max,
            });
        }
        let width = i128::from(self.int_max) - i128::from(self.int_min) + 1;
        if width > i128::from(u32::MAX) {
            return Err(ConfigurationError::CountTooLarge {
                name: "integer range width",
                value: i64::try_from(width).unwrap_or(i64::MAX),
            });
        }
        if self.max_trace_length < 1 {
            return Err(ConfigurationError::TraceLengthTooShort(
                self.max_trace_length,
            ));
        }
        Ok(Domain {
            addresses: (0..address_count).map(Address).collect(),
            proposals: (0..proposal_count).map(Proposal).collect(),
            int_min: self.int_min,
            int_max: self.int_max,
            max_trace_length: usize::try_from(self.max_trace_length).unwrap_or(usize::MAX),
            overflow: OverflowPolicy::default(),
        })
    }
}

fn count(name: &'static str, value: i64) -> Result<u32, ConfigurationError> {
    if value < 0 {
        return Err(ConfigurationError::NegativeCount { name, value });
    }
    u32::try_from(value).map_err(|_| ConfigurationError::CountTooLarge { name, value })
}

/// The validated finite sets every other component draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    addresses: Vec<Address>,
    proposals: Vec<Proposal>,
    int_min: i64,
    int_max: i64,
    max_trace_length: usize,
    overflow: OverflowPolicy,
}

impl Domain {
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    pub fn int_min(&self) -> i64 {
        self.int_min
    }

    pub fn int_max(&self) -> i64 {
        self.int_max
    }

    pub fn max_trace_length(&self) -> usize {
        self.max_trace_length
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn int_values(&self) -> RangeInclusive<i64> {
        self.int_min..=self.int_max
    }

    /// In-range values that are `>= 0` (empty when `int_max < 0`).
    pub fn nonnegative_values(&self) -> RangeInclusive<i64> {
        self.int_min.max(0)..=self.int_max
    }

    /// Step indices a snapshot can carry: `0..max_trace_length`.
    pub fn steps(&self) -> Range<usize> {
        0..self.max_trace_length
    }

    pub fn contains(&self, value: i64) -> bool {
        self.int_values().contains(&value)
    }

    /// Bring a raw result back into range according to the overflow policy.
    pub fn fit(&self, raw: i128) -> Result<i64, ArithmeticOverflow> {
        let (min, max) = (i128::from(self.int_min), i128::from(self.int_max));
        if (min..=max).contains(&raw) {
            return Ok(raw as i64);
        }
        match self.overflow {
            OverflowPolicy::Reject => Err(ArithmeticOverflow {
                value: raw,
                min: self.int_min,
                max: self.int_max,
            }),
            OverflowPolicy::Saturate => Ok(raw.clamp(min, max) as i64),
            OverflowPolicy::Wrap => {
                let width = max - min + 1;
                Ok((min + (raw - min).rem_euclid(width)) as i64)
            }
        }
    }

    pub fn add(&self, a: i64, b: i64) -> Result<i64, ArithmeticOverflow> {
        self.fit(i128::from(a) + i128::from(b))
    }

    pub fn sub(&self, a: i64, b: i64) -> Result<i64, ArithmeticOverflow> {
        self.fit(i128::from(a) - i128::from(b))
    }

    /// Reject a model constant that the range cannot hold.
    pub fn require_constant(
        &self,
        context: &'static str,
        value: i64,
    ) -> Result<(), ConfigurationError> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(ConfigurationError::ConstantOutOfRange {
                context,
                value,
                min: self.int_min,
                max: self.int_max,
            })
        }
    }

    pub fn values_of(&self, sort: Sort) -> Vec<Value> {
        match sort {
            Sort::Address => self.addresses.iter().copied().map(Value::Address).collect(),
            Sort::Proposal => self.proposals.iter().copied().map(Value::Proposal).collect(),
            Sort::Int => self.int_values().map(Value::Int).collect(),
        }
    }

    /// Every binding of `params` drawn from the domain, in lexicographic
    /// parameter order. A rule without parameters has exactly one (empty)
    /// binding; a parameter over an empty sort yields none.
    pub fn bindings(&self, params: &[Param]) -> Vec<Binding> {
        let mut out = vec![Binding::new()];
        for param in params {
            let values = self.values_of(param.sort);
            out = out
                .into_iter()
                .flat_map(|prefix| {
                    values
                        .iter()
                        .map(move |v| prefix.clone().with(param.name, *v))
                })
                .collect();
        }
        out
    }

    /// All permutations of the interchangeable atoms, identity first.
    pub fn permutations(&self) -> Vec<Permutation> {
        let address_perms = permutations_of(&self.addresses);
        let proposal_perms = permutations_of(&self.proposals);
        let mut out = Vec::with_capacity(address_perms.len() * proposal_perms.len());
        for addresses in &address_perms {
            for proposals in &proposal_perms {
                out.push(Permutation {
                    addresses: addresses.clone(),
                    proposals: proposals.clone(),
                });
            }
        }
        out
    }

    /// Human-readable scope, e.g.
    /// `2 addresses, 0 proposals, ints [0, 3], traces <= 4 snapshots, overflow=reject`.
    pub fn describe(&self) -> String {
        format!(
            "{} addresses, {} proposals, ints [{}, {}], traces <= {} snapshots, overflow={}",
            self.addresses.len(),
            self.proposals.len(),
            self.int_min,
            self.int_max,
            self.max_trace_length,
            self.overflow.name()
        )
    }
}

/// A relabelling of addresses and proposals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    addresses: Vec<Address>,
    proposals: Vec<Proposal>,
}

impl Permutation {
    pub fn identity(domain: &Domain) -> Self {
        Self {
            addresses: domain.addresses.clone(),
            proposals: domain.proposals.clone(),
        }
    }

    pub fn address(&self, a: Address) -> Address {
        self.addresses.get(a.0 as usize).copied().unwrap_or(a)
    }

    pub fn proposal(&self, p: Proposal) -> Proposal {
        self.proposals.get(p.0 as usize).copied().unwrap_or(p)
    }
}

fn permutations_of<T: Copy>(items: &[T]) -> Vec<Vec<T>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for (i, head) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations_of(&rest) {
            tail.insert(0, *head);
            out.push(tail);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(min: i64, max: i64) -> Domain {
        DomainConfig {
            int_min: min,
            int_max: max,
            ..DomainConfig::default()
        }
        .build()
        .unwrap()
    }

    #[test]
    fn negative_counts_are_rejected() {
        let err = DomainConfig {
            address_count: -1,
            ..DomainConfig::default()
        }
        .build()
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::NegativeCount {
                name: "address_count",
                value: -1
            }
        );

        let err = DomainConfig {
            proposal_count: -3,
            ..DomainConfig::default()
        }
        .build()
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::NegativeCount {
                name: "proposal_count",
                ..
            }
        ));
    }

    #[test]
    fn empty_int_range_is_rejected() {
        let err = DomainConfig {
            int_min: 5,
            int_max: 4,
            ..DomainConfig::default()
        }
        .build()
        .unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyIntRange { min: 5, max: 4 });
    }

    #[test]
    fn unenumerable_int_range_is_rejected() {
        let err = DomainConfig {
            int_min: i64::MIN,
            int_max: i64::MAX,
            ..DomainConfig::default()
        }
        .build()
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::CountTooLarge {
                name: "integer range width",
                value: i64::MAX
            }
        ));
    }

    #[test]
    fn zero_trace_length_is_rejected() {
        let err = DomainConfig {
            max_trace_length: 0,
            ..DomainConfig::default()
        }
        .build()
        .unwrap_err();
        assert_eq!(err, ConfigurationError::TraceLengthTooShort(0));
    }

    #[test]
    fn zero_counts_are_valid() {
        let d = DomainConfig {
            address_count: 0,
            proposal_count: 0,
            ..DomainConfig::default()
        }
        .build()
        .unwrap();
        assert!(d.addresses().is_empty());
        assert!(d.proposals().is_empty());
    }

    #[test]
    fn reject_policy_reports_overflow() {
        let d = domain(0, 3);
        assert_eq!(d.add(2, 1), Ok(3));
        let err = d.add(2, 2).unwrap_err();
        assert_eq!(err.value, 4);
        assert!(d.sub(0, 1).is_err());
    }

    #[test]
    fn saturate_policy_clamps() {
        let d = domain(0, 3).with_overflow_policy(OverflowPolicy::Saturate);
        assert_eq!(d.add(2, 5), Ok(3));
        assert_eq!(d.sub(1, 4), Ok(0));
    }

    #[test]
    fn wrap_policy_wraps_modulo_width() {
        let d = domain(0, 3).with_overflow_policy(OverflowPolicy::Wrap);
        assert_eq!(d.add(3, 1), Ok(0));
        assert_eq!(d.add(3, 3), Ok(2));
        assert_eq!(d.sub(0, 1), Ok(3));

        let d = domain(-2, 2).with_overflow_policy(OverflowPolicy::Wrap);
        assert_eq!(d.add(2, 1), Ok(-2));
    }

    #[test]
    fn bindings_enumerate_the_cartesian_product() {
        let d = domain(0, 2);
        let b = d.bindings(&[Param::address("sender"), Param::int("value")]);
        assert_eq!(b.len(), 2 * 3);
        assert_eq!(b[0].to_string(), "sender=A0, value=0");
        assert_eq!(b[5].to_string(), "sender=A1, value=2");
        assert_eq!(d.bindings(&[]).len(), 1);
    }

    #[test]
    fn bindings_over_empty_sort_are_empty() {
        let d = DomainConfig {
            proposal_count: 0,
            ..DomainConfig::default()
        }
        .build()
        .unwrap();
        assert!(d
            .bindings(&[Param::address("sender"), Param::proposal("proposal")])
            .is_empty());
    }

    #[test]
    fn binding_matches_checks_names_and_sorts() {
        let params = [Param::address("sender"), Param::int("value")];
        let good = Binding::new()
            .with("sender", Value::Address(Address(0)))
            .with("value", Value::Int(1));
        let wrong_sort = Binding::new()
            .with("sender", Value::Int(0))
            .with("value", Value::Int(1));
        assert!(good.matches(&params));
        assert!(!wrong_sort.matches(&params));
        assert!(!Binding::new().matches(&params));
    }

    #[test]
    fn permutations_cover_both_sorts() {
        let d = DomainConfig {
            address_count: 3,
            proposal_count: 2,
            ..DomainConfig::default()
        }
        .build()
        .unwrap();
        let perms = d.permutations();
        assert_eq!(perms.len(), 6 * 2);
        assert_eq!(perms[0], Permutation::identity(&d));
    }

    #[test]
    fn policy_parses_from_cli_names() {
        assert_eq!("wrap".parse::<OverflowPolicy>(), Ok(OverflowPolicy::Wrap));
        assert!("clip".parse::<OverflowPolicy>().is_err());
    }
}
