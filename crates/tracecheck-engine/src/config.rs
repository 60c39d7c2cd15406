//! Run configuration shared by the CLI and JSON run files.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use tracecheck_ir::auction::{auction_invariants, Auction, AuctionOptions, AuctionState};
use tracecheck_ir::ballot::{ballot_invariants, Ballot, BallotOptions, BallotState, DelegationGuard};
use tracecheck_ir::domain::{ConfigurationError, DomainConfig, OverflowPolicy};
use tracecheck_ir::properties::{InvariantCatalog, InvariantShape};

use crate::checker::check_invariants;
use crate::error::CheckError;
use crate::explorer::{ExploreOptions, SearchStrategy};
use crate::result::CheckReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    #[default]
    Auction,
    Ballot,
}

impl ModelChoice {
    pub fn name(&self) -> &'static str {
        match self {
            ModelChoice::Auction => "auction",
            ModelChoice::Ballot => "ballot",
        }
    }
}

impl FromStr for ModelChoice {
    type Err = ConfigurationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "auction" => Ok(ModelChoice::Auction),
            "ballot" => Ok(ModelChoice::Ballot),
            other => Err(ConfigurationError::UnknownOption {
                kind: "model",
                value: other.to_string(),
                expected: "auction, ballot",
            }),
        }
    }
}

/// Everything needed to run one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub model: ModelChoice,
    pub domain: DomainConfig,
    /// Invariant names; empty selects the whole catalog.
    pub invariants: Vec<String>,
    pub strategy: SearchStrategy,
    pub parallelism: usize,
    /// Wall-clock budget in seconds (0 disables).
    pub timeout_secs: u64,
    /// Step budget per invariant (0 disables).
    pub max_steps: u64,
    pub overflow: OverflowPolicy,
    pub delegation_guard: DelegationGuard,
    /// Pin every auction account to this initial balance.
    pub fixed_balance: Option<i64>,
    pub symmetry: bool,
    pub prune_revisits: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: ModelChoice::default(),
            domain: DomainConfig::default(),
            invariants: Vec::new(),
            strategy: SearchStrategy::default(),
            parallelism: 1,
            timeout_secs: 0,
            max_steps: 0,
            overflow: OverflowPolicy::default(),
            delegation_guard: DelegationGuard::default(),
            fixed_balance: None,
            symmetry: false,
            prune_revisits: false,
        }
    }
}

impl RunConfig {
    pub fn from_json(source: &str) -> Result<Self, CheckError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn explore_options(&self) -> ExploreOptions {
        ExploreOptions {
            strategy: self.strategy,
            parallelism: self.parallelism,
            timeout_secs: self.timeout_secs,
            max_steps: self.max_steps,
            prune_revisits: self.prune_revisits,
            symmetry: self.symmetry,
            cancel: None,
        }
    }

    pub fn auction(&self) -> Result<Auction, ConfigurationError> {
        let domain = self.domain.build()?.with_overflow_policy(self.overflow);
        Auction::new(
            domain,
            AuctionOptions {
                fixed_balance: self.fixed_balance,
            },
        )
    }

    pub fn ballot(&self) -> Result<Ballot, ConfigurationError> {
        let domain = self.domain.build()?.with_overflow_policy(self.overflow);
        Ballot::new(
            domain,
            BallotOptions {
                delegation_guard: self.delegation_guard,
            },
        )
    }
}

/// A report for whichever model was run.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ModelReport {
    Auction(CheckReport<AuctionState>),
    Ballot(CheckReport<BallotState>),
}

impl ModelReport {
    pub fn overall_verdict(&self) -> &'static str {
        match self {
            ModelReport::Auction(r) => r.overall_verdict(),
            ModelReport::Ballot(r) => r.overall_verdict(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ModelReport::Auction(r) => r.exit_code(),
            ModelReport::Ballot(r) => r.exit_code(),
        }
    }
}

/// Build the configured model and check the selected invariants.
pub fn run(config: &RunConfig) -> Result<ModelReport, CheckError> {
    run_with_options(config, &config.explore_options())
}

pub fn run_with_options(
    config: &RunConfig,
    options: &ExploreOptions,
) -> Result<ModelReport, CheckError> {
    match config.model {
        ModelChoice::Auction => {
            let model = config.auction()?;
            let invariants = auction_invariants().select(&config.invariants)?;
            Ok(ModelReport::Auction(check_invariants(&model, &invariants, options)?))
        }
        ModelChoice::Ballot => {
            let model = config.ballot()?;
            let invariants = ballot_invariants().select(&config.invariants)?;
            Ok(ModelReport::Ballot(check_invariants(&model, &invariants, options)?))
        }
    }
}

/// One row of an invariant catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub shape: InvariantShape,
    pub description: String,
}

fn entries<S>(catalog: &InvariantCatalog<S>) -> Vec<CatalogEntry> {
    catalog
        .iter()
        .map(|inv| CatalogEntry {
            name: inv.name.clone(),
            shape: inv.shape(),
            description: inv.description.clone(),
        })
        .collect()
}

pub fn catalog_entries(model: ModelChoice) -> Vec<CatalogEntry> {
    match model {
        ModelChoice::Auction => entries(&auction_invariants()),
        ModelChoice::Ballot => entries(&ballot_invariants()),
    }
}
