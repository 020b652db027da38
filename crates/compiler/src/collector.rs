//! fluent-bit classic configuration.

pub use logpipe_core::RUNTIME_PARSER;

use crate::routing::{Route, RoutingSpec};

/// Port of the collector's built-in HTTP server.
pub const COLLECTOR_HTTP_PORT: u16 = 2020;

/// A `[NAME]` section with aligned `Key Value` entries.
#[derive(Debug, Clone)]
pub(crate) struct Section {
    header: &'static str,
    entries: Vec<(&'static str, String)>,
}

impl Section {
    pub(crate) const fn new(header: &'static str) -> Self {
        Self {
            header,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub(crate) fn entry(mut self, key: &'static str, value: impl ToString) -> Self {
        self.entries.push((key, value.to_string()));
        self
    }

    pub(crate) fn render(&self) -> String {
        let width = self.entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        let body: String = self
            .entries
            .iter()
            .map(|(key, value)| format!("    {key:<width$} {value}\n"))
            .collect();
        format!("[{}]\n{body}", self.header)
    }
}

/// Joins sections with a blank line between each.
pub(crate) fn render_sections(sections: &[Section]) -> String {
    sections.iter().map(Section::render).collect::<Vec<_>>().join("\n")
}

pub fn render(spec: &RoutingSpec) -> String {
    let mut sections = vec![service(spec)];
    sections.extend(spec.routes.iter().flat_map(inputs));
    sections.extend(spec.routes.iter().flat_map(parser_filters));
    if spec.include_k8s_metadata {
        sections.push(metadata_filter());
    }
    sections.push(forward_output());
    render_sections(&sections)
}

fn service(spec: &RoutingSpec) -> Section {
    Section::new("SERVICE")
        .entry("Flush", 1)
        .entry("Log_Level", &spec.log_level)
        .entry("Log_File", &spec.log_file)
        .entry("Daemon", "off")
        .entry("HTTP_Server", "On")
        .entry("HTTP_Listen", "0.0.0.0")
        .entry("HTTP_Port", COLLECTOR_HTTP_PORT)
        .entry("Parsers_File", crate::PARSERS_FILE)
}

fn inputs(route: &Route) -> Vec<Section> {
    route
        .paths
        .iter()
        .map(|path| {
            Section::new("INPUT")
                .entry("Name", "tail")
                .entry("Tag", route.tag_pattern())
                .entry("Path", path)
                .entry("Parser", RUNTIME_PARSER)
                .entry("Refresh_Interval", 5)
                .entry("Mem_Buf_Limit", "5MB")
                .entry("Skip_Long_Lines", "On")
        })
        .collect()
}

fn parser_filters(route: &Route) -> Vec<Section> {
    route
        .parsers
        .iter()
        .map(|parser| {
            Section::new("FILTER")
                .entry("Name", "parser")
                .entry("Match", route.tag_pattern())
                .entry("Key_Name", "log")
                .entry("Parser", &parser.name)
                .entry("Reserve_Data", "On")
        })
        .collect()
}

fn metadata_filter() -> Section {
    Section::new("FILTER")
        .entry("Name", "kubernetes")
        .entry("Match", "**")
        .entry("K8S-Logging.Parser", "On")
        .entry("Merge_Log", "On")
}

/// The aggregator address comes from the service environment of the pod.
fn forward_output() -> Section {
    Section::new("OUTPUT")
        .entry("Name", "forward")
        .entry("Match", "*")
        .entry("Host", "${FLUENTD_SERVICE_HOST}")
        .entry("Port", "${FLUENTD_SERVICE_PORT}")
}
