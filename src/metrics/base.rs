use crate::types::Sample;

pub const RESPONSE_CODE_LABEL: &str = "response_code";

/// Kind of mesh entity whose perspective a sample is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Service,
    App,
    Workload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Source,
    Destination,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Source => "source",
            Direction::Destination => "destination",
        }
    }
}

/// Identity of the entity a rate vector is demultiplexed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRef<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    pub kind: EntityKind,
}

impl<'a> EntityRef<'a> {
    pub fn service(namespace: &'a str, name: &'a str) -> Self {
        Self { namespace, name, kind: EntityKind::Service }
    }

    pub fn app(namespace: &'a str, name: &'a str) -> Self {
        Self { namespace, name, kind: EntityKind::App }
    }

    pub fn workload(namespace: &'a str, name: &'a str) -> Self {
        Self { namespace, name, kind: EntityKind::Workload }
    }
}

// (identity label suffix, namespace label suffix), most specific first.
fn label_suffixes(kind: EntityKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        EntityKind::App => &[
            ("app", "workload_namespace"),
            ("workload", "workload_namespace"),
            ("service", "service_namespace"),
        ],
        EntityKind::Workload => &[
            ("workload", "workload_namespace"),
            ("service", "service_namespace"),
        ],
        EntityKind::Service => &[
            ("service", "service_namespace"),
            ("workload", "workload_namespace"),
        ],
    }
}

/// Whether the `dir` endpoint of `sample` is the entity.
///
/// The first identity label present on the sample decides; both the
/// `_service` and `_workload` vocabularies are understood. Only service
/// labels carry fully-qualified hosts; app and workload names compare exactly.
pub fn endpoint_matches(sample: &Sample, dir: Direction, entity: &EntityRef) -> bool {
    let prefix = dir.prefix();
    for (id_suffix, ns_suffix) in label_suffixes(entity.kind) {
        let Some(value) = sample.label(&format!("{}_{}", prefix, id_suffix)) else {
            continue;
        };
        if let Some(ns) = sample.label(&format!("{}_{}", prefix, ns_suffix)) {
            if ns != entity.namespace {
                return false;
            }
        }
        return if *id_suffix == "service" {
            name_matches(value, entity.name)
        } else {
            !entity.name.is_empty() && value == entity.name
        };
    }
    false
}

/// Whether a sample carries any identity label for `dir`.
pub fn has_endpoint(sample: &Sample, dir: Direction) -> bool {
    let prefix = dir.prefix();
    ["app", "workload", "service"]
        .iter()
        .any(|s| sample.labels.contains_key(&format!("{}_{}", prefix, s)))
}

/// A label value names the entity when equal to it, or when it is a
/// fully-qualified host whose first segment is the entity name.
pub fn name_matches(value: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    value == name
        || value
            .split_once('.')
            .map(|(host, _)| host == name)
            .unwrap_or(false)
}
