#![warn(missing_docs)]
#![doc(test(no_crate_inject))]
#![doc(test(attr(deny(unused, future_incompatible))))]

//! This crate searches a table for subgroups: conjunctions of conditions on some columns whose
//! rows behave unusually with respect to one or more target columns. The search and the
//! optimal-split algorithms follow these papers:
//!
//! - Mampaey, Nijssen, Feelders, Knobbe, Efficient Algorithms for Finding Richer Subgroup
//!   Descriptions in Numeric and Nominal Data, ICDM 2012
//! - Meeng, Knobbe, For Real: A Thorough Look at Numeric Attributes in Subgroup Discovery,
//!   Data Mining and Knowledge Discovery, 2021
//!
//! A search starts from the subgroup covering every row and repeatedly refines candidates by
//! adding one condition. Which candidate is refined next is decided by a [`CandidateQueue`];
//! which values a new condition may take is decided per column type and by the
//! [`NumericStrategy`]. Every refined subgroup is scored against a [`TargetContext`] by a
//! [`QualityMeasure`], and the best ones are kept in a bounded [`SubgroupSet`].
//!
//! ```
//! use std::time::Instant;
//! use subgroup_discovery::{SearchParameters, SubgroupDiscovery, TableBuilder, TargetConcept, TargetContext};
//!
//! let table = TableBuilder::new("patients")
//!     .nominal("smoker", ["yes", "no", "yes", "no", "yes", "no"])?
//!     .numeric("age", vec![61.0, 35.0, 58.0, 42.0, 70.0, 29.0])?
//!     .binary("disease", [true, false, true, false, true, true])?
//!     .build();
//! let concept = TargetConcept::SingleNominal { column: "disease".into(), value: "1".into() };
//! let target = TargetContext::from_concept(&table, &concept)?;
//!
//! let mut search = SubgroupDiscovery::new(SearchParameters::default(), &table, target)?;
//! search.mine_threaded(Instant::now(), 2);
//! for subgroup in search.result().iter() {
//!     assert!(subgroup.quality() > 0.0);
//! }
//! # Ok::<(), subgroup_discovery::Error>(())
//! ```

pub mod bivariate;
pub mod condition;
pub mod crosstable;
pub mod dependency;
pub mod discovery;
pub mod error;
pub mod hull;
pub mod params;
pub mod postprocess;
pub mod quality;
pub mod queue;
pub mod refinement;
pub mod split;
pub mod subgroup;
pub mod subgroup_set;
pub mod table;
pub mod target;
pub mod validation;

pub use condition::{Condition, ConditionList, ConditionValue, Interval, Operator, ValueSet};
pub use crosstable::{BaseIntervalCrossTable, NominalCrossTable};
pub use dependency::{BinaryTargets, ChiSquaredDependence, DependencyGraph, GraphInducer};
pub use discovery::{LogObserver, MiningSummary, SearchObserver, SubgroupDiscovery};
pub use error::{Error, Result};
pub use params::{
    NominalOperators, NumericOperators, NumericStrategy, SearchParameters, SearchStrategy,
    TargetConcept,
};
pub use postprocess::PostProcessor;
pub use quality::{Measure, QualityMeasure, TargetKind};
pub use queue::{Candidate, CandidateQueue, Lease};
pub use refinement::{Refinement, RefinementList};
pub use split::{best_interval, best_value_set};
pub use subgroup::{Population, Subgroup};
pub use subgroup_set::SubgroupSet;
pub use table::{Column, ColumnType, NumericStatistics, Table, TableBuilder};
pub use target::{Evaluation, TargetContext};
pub use validation::{NormalDistribution, Validation};
