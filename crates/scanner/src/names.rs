use scanner_core::{NameResolver, StaticData, STRUCTURE_ID_FLOOR};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Prefetch every name a result set will need in two batch calls
/// instead of one lookup per row.
pub async fn prefetch_names(
    resolver: &Arc<dyn NameResolver>,
    locations: &HashSet<i64>,
    access_token: Option<&str>,
    cancel: &CancellationToken,
) {
    let stations: HashSet<i64> = locations
        .iter()
        .copied()
        .filter(|&id| id <= STRUCTURE_ID_FLOOR)
        .collect();
    let structures: HashSet<i64> = locations
        .iter()
        .copied()
        .filter(|&id| id > STRUCTURE_ID_FLOOR)
        .collect();

    if !stations.is_empty() {
        resolver.prefetch_station_names(&stations).await;
    }
    if !structures.is_empty() {
        resolver
            .prefetch_structure_names(&structures, access_token, cancel)
            .await;
    }
}

/// Resolve one location label, falling back to "Structure @ <system>"
/// when the resolver has nothing.
pub async fn location_label(
    resolver: &Arc<dyn NameResolver>,
    static_data: &StaticData,
    location_id: i64,
    system_id: i32,
) -> String {
    let resolved = if location_id > STRUCTURE_ID_FLOOR {
        resolver.structure_name(location_id).await
    } else {
        resolver.station_name(location_id).await
    };
    if let Some(name) = resolved {
        return name;
    }
    match static_data.system_name(system_id) {
        Some(system) => format!("Structure @ {}", system),
        None => format!("Structure @ {}", system_id),
    }
}
