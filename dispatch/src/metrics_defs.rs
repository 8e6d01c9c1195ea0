use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status.",
};

pub const LINKS_DISPATCHED: MetricDef = MetricDef {
    name: "links.dispatched",
    metric_type: MetricType::Counter,
    description: "Number of send requests handled. Tagged with result.",
};

pub const DEVICE_STORE_SESSIONS: MetricDef = MetricDef {
    name: "device_store.sessions",
    metric_type: MetricType::Gauge,
    description: "Number of device store sessions currently checked out",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUEST_DURATION, LINKS_DISPATCHED, DEVICE_STORE_SESSIONS];
