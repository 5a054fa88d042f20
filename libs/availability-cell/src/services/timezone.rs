use chrono_tz::Tz;
use tracing::warn;

use crate::models::Professional;

/// Resolves an IANA zone name, falling back to `default` when it is missing or unknown.
pub fn resolve_timezone(name: Option<&str>, default: Tz) -> Tz {
    match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
            warn!("Unknown timezone {:?}, falling back to {}", name, default);
            default
        }),
        None => default,
    }
}

pub fn professional_timezone(professional: &Professional, default: Tz) -> Tz {
    resolve_timezone(professional.timezone.as_deref(), default)
}
