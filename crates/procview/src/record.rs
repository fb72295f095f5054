use serde_json::Value;

/// One process row as reported by the backend. `name` and `hostname` stay
/// optional here; placeholders are substituted at render time only.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub pid: i64,
    pub parent_pid: Option<i64>,
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub timestamp: Option<String>,
}

impl ProcessRecord {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "unknown",
        }
    }

    pub fn display_host(&self) -> &str {
        match self.hostname.as_deref() {
            Some(host) if !host.is_empty() => host,
            _ => "-",
        }
    }
}

/// Converts a backend response body into normalized records. Anything that
/// is not a JSON array yields an empty batch; rows whose `pid` does not
/// coerce to a finite number are dropped. Everything else is tolerated.
pub fn normalize_records(body: &Value) -> Vec<ProcessRecord> {
    let Some(rows) = body.as_array() else {
        return Vec::new();
    };

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(pid) = coerce_int(row.get("pid")) else {
            continue;
        };
        records.push(ProcessRecord {
            pid,
            parent_pid: coerce_int(row.get("parent_pid")),
            name: coerce_string(row.get("name")),
            hostname: coerce_string(row.get("hostname")),
            cpu_usage: coerce_float(row.get("cpu_usage")),
            memory_usage: coerce_float(row.get("memory_usage")),
            timestamp: coerce_string(row.get("timestamp")),
        });
    }
    records
}

fn coerce_int(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if let Some(f) = value.as_f64() {
        return f.is_finite().then_some(f as i64);
    }
    if let Some(s) = value.as_str() {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Some(n);
        }
        if let Ok(f) = s.parse::<f64>() {
            return f.is_finite().then_some(f as i64);
        }
    }
    None
}

fn coerce_float(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() => f,
        _ => 0.0,
    }
}

fn coerce_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// Free-text filter over the latest snapshot. An empty or whitespace-only
/// query passes the batch through in source order. A non-empty query is
/// lowercased and matched as a substring against pid digits, parent-pid
/// digits (empty when absent), name, and hostname; any one hit keeps the
/// record.
pub fn filter_records(records: &[ProcessRecord], query: &str) -> Vec<ProcessRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }

    records
        .iter()
        .filter(|record| {
            record.pid.to_string().contains(&needle)
                || record
                    .parent_pid
                    .map(|ppid| ppid.to_string())
                    .unwrap_or_default()
                    .contains(&needle)
                || record
                    .name
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase()
                    .contains(&needle)
                || record
                    .hostname
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase()
                    .contains(&needle)
        })
        .cloned()
        .collect()
}

/// Host filter: whole-string, case-insensitive hostname equality. Applied
/// to the snapshot before the free-text query. Empty host keeps everything.
pub fn filter_by_host(records: &[ProcessRecord], host: &str) -> Vec<ProcessRecord> {
    let host = host.trim();
    if host.is_empty() {
        return records.to_vec();
    }

    records
        .iter()
        .filter(|record| {
            record
                .hostname
                .as_deref()
                .unwrap_or("")
                .eq_ignore_ascii_case(host)
        })
        .cloned()
        .collect()
}
