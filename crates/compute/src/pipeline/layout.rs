use logdiff_core::{ClusterMap, ControlClusterEntry, TestClusterEntry, UnknownClusterEntry};

/// One text per cluster, in layout order: control, then test, then unknown
/// clusters. Each cluster is represented by its first host's text.
pub fn layout_texts(
    control: &ClusterMap<ControlClusterEntry>,
    test: &ClusterMap<TestClusterEntry>,
    unknown: &ClusterMap<UnknownClusterEntry>,
) -> Vec<String> {
    let control = control
        .values()
        .filter_map(|hosts| hosts.values().next().map(|e| e.text.clone()));
    let test = test
        .values()
        .filter_map(|hosts| hosts.values().next().map(|e| e.text.clone()));
    let unknown = unknown
        .values()
        .filter_map(|hosts| hosts.values().next().map(|e| e.text.clone()));
    control.chain(test).chain(unknown).collect()
}

/// Write `points` back in [`layout_texts`] order. Every host entry of a
/// cluster shares the cluster's position.
pub fn apply_positions(
    points: &[(f64, f64)],
    control: &mut ClusterMap<ControlClusterEntry>,
    test: &mut ClusterMap<TestClusterEntry>,
    unknown: &mut ClusterMap<UnknownClusterEntry>,
) {
    let mut points = points.iter().copied();

    for hosts in control.values_mut().filter(|h| !h.is_empty()) {
        let Some((x, y)) = points.next() else { return };
        for entry in hosts.values_mut() {
            entry.x = Some(x);
            entry.y = Some(y);
        }
    }
    for hosts in test.values_mut().filter(|h| !h.is_empty()) {
        let Some((x, y)) = points.next() else { return };
        for entry in hosts.values_mut() {
            entry.x = Some(x);
            entry.y = Some(y);
        }
    }
    for hosts in unknown.values_mut().filter(|h| !h.is_empty()) {
        let Some((x, y)) = points.next() else { return };
        for entry in hosts.values_mut() {
            entry.x = Some(x);
            entry.y = Some(y);
        }
    }
}
