//! Configuration compiler for the collector and aggregator.
//!
//! [`compile`] is a pure function of a [`RoutingSpec`]: identical input
//! produces byte-identical text. A `RoutingSpec` can only be derived from a
//! validated specification, so rendering cannot fail.
//!
//! ```ignore
//! let routing = RoutingSpec::from_spec(&validated);
//! let fluent_bit = compile(Dialect::Collector, &routing);
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod aggregator;
pub mod collector;
pub mod parsers;
pub mod routing;

use std::collections::BTreeMap;
use std::fmt;

pub use routing::{Route, RoutingSpec};

/// Logical file name of the collector configuration.
pub const COLLECTOR_FILE: &str = "fluent-bit.conf";

/// Logical file name of the parser definitions.
pub const PARSERS_FILE: &str = "parsers.conf";

/// Logical file name of the aggregator configuration.
pub const AGGREGATOR_FILE: &str = "fluent.conf";

/// Textual configuration grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Collector,
    Aggregator,
    Parsers,
}

impl Dialect {
    pub const ALL: [Self; 3] = [Self::Collector, Self::Parsers, Self::Aggregator];

    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Collector => COLLECTOR_FILE,
            Self::Aggregator => AGGREGATOR_FILE,
            Self::Parsers => PARSERS_FILE,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Collector => "collector",
            Self::Aggregator => "aggregator",
            Self::Parsers => "parsers",
        };
        f.write_str(name)
    }
}

pub fn compile(dialect: Dialect, spec: &RoutingSpec) -> String {
    match dialect {
        Dialect::Collector => collector::render(spec),
        Dialect::Aggregator => aggregator::render(spec),
        Dialect::Parsers => parsers::render(spec),
    }
}

/// Files mounted by the collector, keyed by logical file name.
pub fn collector_files(spec: &RoutingSpec) -> BTreeMap<String, String> {
    [Dialect::Collector, Dialect::Parsers]
        .into_iter()
        .map(|dialect| (dialect.file_name().to_string(), compile(dialect, spec)))
        .collect()
}

/// Files mounted by the aggregator, keyed by logical file name.
pub fn aggregator_files(spec: &RoutingSpec) -> BTreeMap<String, String> {
    BTreeMap::from([(
        AGGREGATOR_FILE.to_string(),
        compile(Dialect::Aggregator, spec),
    )])
}
