//! fluent-bit parser definitions.

use logpipe_core::ParserSpec;

use crate::collector::{RUNTIME_PARSER, Section, render_sections};
use crate::routing::RoutingSpec;

pub fn render(spec: &RoutingSpec) -> String {
    let mut sections: Vec<Section> = spec.parsers.iter().map(regex_parser).collect();
    sections.push(runtime_parser());
    render_sections(&sections)
}

fn regex_parser(parser: &ParserSpec) -> Section {
    Section::new("PARSER")
        .entry("Name", &parser.name)
        .entry("Format", "regex")
        .entry("Regex", &parser.pattern)
}

fn runtime_parser() -> Section {
    Section::new("PARSER")
        .entry("Name", RUNTIME_PARSER)
        .entry("Format", "json")
        .entry("Time_Key", "time")
        .entry("Time_Format", "%Y-%m-%dT%H:%M:%S.%L")
        .entry("Time_Keep", "On")
        .entry("Decode_Field_As", "escaped log")
}
