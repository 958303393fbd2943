use std::{
    collections::BTreeMap,
    fmt::Write as _,
    sync::{Mutex, OnceLock},
};

pub(crate) const GATEWAY_DROP_REASON_OVERSIZED_OUTBOUND: &str = "oversized_outbound";
pub(crate) const GATEWAY_DROP_REASON_SERIALIZE_ERROR: &str = "serialize_error";
pub(crate) const GATEWAY_DROP_REASON_FULL_QUEUE: &str = "full_queue";
pub(crate) const GATEWAY_DROP_REASON_CLOSED: &str = "closed";

/// A counter family exposed on `/metrics`. Families render in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Family {
    AuthFailures,
    WsDisconnects,
    GatewayEventsEmitted,
    GatewayEventsDropped,
    LivenessTerminations,
}

impl Family {
    const ALL: [Self; 5] = [
        Self::AuthFailures,
        Self::WsDisconnects,
        Self::GatewayEventsEmitted,
        Self::GatewayEventsDropped,
        Self::LivenessTerminations,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::AuthFailures => "tradepost_auth_failures_total",
            Self::WsDisconnects => "tradepost_ws_disconnects_total",
            Self::GatewayEventsEmitted => "tradepost_gateway_events_emitted_total",
            Self::GatewayEventsDropped => "tradepost_gateway_events_dropped_total",
            Self::LivenessTerminations => "tradepost_liveness_terminations_total",
        }
    }

    fn help(self) -> &'static str {
        match self {
            Self::AuthFailures => "Authentication failures by reason",
            Self::WsDisconnects => "Websocket sessions ended, by reason",
            Self::GatewayEventsEmitted => "Realtime events queued to a socket, by scope and type",
            Self::GatewayEventsDropped => {
                "Realtime events that never reached a socket, by scope, type and reason"
            }
            Self::LivenessTerminations => "Sockets closed after missing a liveness ping",
        }
    }

    /// Unlabelled families always render a sample, even before the first increment.
    fn is_unlabelled(self) -> bool {
        matches!(self, Self::LivenessTerminations)
    }
}

type Labels = Vec<(&'static str, String)>;

#[derive(Default)]
pub(crate) struct MetricsState {
    counters: Mutex<BTreeMap<(Family, Labels), u64>>,
}

impl MetricsState {
    fn increment(&self, family: Family, labels: Labels) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry((family, labels)).or_default() += 1;
        }
    }

    #[cfg(test)]
    pub(crate) fn value(&self, family: Family, labels: &[(&'static str, &str)]) -> u64 {
        let key: Labels = labels
            .iter()
            .map(|(name, value)| (*name, (*value).to_owned()))
            .collect();
        self.counters
            .lock()
            .ok()
            .and_then(|counters| counters.get(&(family, key)).copied())
            .unwrap_or(0)
    }

    fn snapshot(&self) -> BTreeMap<(Family, Labels), u64> {
        self.counters
            .lock()
            .map(|counters| counters.clone())
            .unwrap_or_default()
    }
}

static METRICS_STATE: OnceLock<MetricsState> = OnceLock::new();

pub(crate) fn metrics_state() -> &'static MetricsState {
    METRICS_STATE.get_or_init(MetricsState::default)
}

fn write_sample(output: &mut String, family: Family, labels: &Labels, value: u64) {
    output.push_str(family.name());
    if !labels.is_empty() {
        let rendered: Vec<String> = labels
            .iter()
            .map(|(name, label)| format!("{name}=\"{label}\""))
            .collect();
        let _ = write!(output, "{{{}}}", rendered.join(","));
    }
    let _ = writeln!(output, " {value}");
}

/// Prometheus text exposition of every counter family.
pub(crate) fn render_metrics() -> String {
    let snapshot = metrics_state().snapshot();
    let mut output = String::new();
    for family in Family::ALL {
        let _ = writeln!(output, "# HELP {} {}", family.name(), family.help());
        let _ = writeln!(output, "# TYPE {} counter", family.name());
        let mut wrote_any = false;
        let samples = snapshot
            .range((family, Vec::new())..)
            .take_while(|((owner, _), _)| *owner == family);
        for ((_, labels), value) in samples {
            write_sample(&mut output, family, labels, *value);
            wrote_any = true;
        }
        if family.is_unlabelled() && !wrote_any {
            write_sample(&mut output, family, &Vec::new(), 0);
        }
    }
    output
}

pub(crate) fn record_auth_failure(reason: &'static str) {
    metrics_state().increment(Family::AuthFailures, vec![("reason", reason.to_owned())]);
}

pub(crate) fn record_ws_disconnect(reason: &'static str) {
    metrics_state().increment(Family::WsDisconnects, vec![("reason", reason.to_owned())]);
}

pub(crate) fn record_gateway_event_emitted(scope: &'static str, event_type: &str) {
    metrics_state().increment(
        Family::GatewayEventsEmitted,
        vec![
            ("scope", scope.to_owned()),
            ("event_type", event_type.to_owned()),
        ],
    );
}

pub(crate) fn record_gateway_event_dropped(
    scope: &'static str,
    event_type: &str,
    reason: &'static str,
) {
    metrics_state().increment(
        Family::GatewayEventsDropped,
        vec![
            ("scope", scope.to_owned()),
            ("event_type", event_type.to_owned()),
            ("reason", reason.to_owned()),
        ],
    );
}

pub(crate) fn record_gateway_event_serialize_error(scope: &'static str, event_type: &str) {
    record_gateway_event_dropped(scope, event_type, GATEWAY_DROP_REASON_SERIALIZE_ERROR);
}

pub(crate) fn record_liveness_termination() {
    metrics_state().increment(Family::LivenessTerminations, Vec::new());
}
