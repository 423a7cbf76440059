mod common;

use std::collections::BTreeSet;

use trellis::strategy::RoutingAlgorithm;

/// After three LSA-min-intervals with no link changes, every node holds all
/// four advertisements and each records the right neighbour set.
#[test]
fn square_lsdb_converges() {
    let mut net = common::graphs::vnet_square();
    net.run_for(30);

    let expected = [
        ("A", &["B", "D"][..]),
        ("B", &["A", "C"][..]),
        ("C", &["B", "D"][..]),
        ("D", &["A", "C"][..]),
    ];
    for node in ["A", "B", "C", "D"] {
        let lsr = net.lsr(node);
        assert_eq!(lsr.link_state_db.len(), 4, "LSDB incomplete at {node}");
        for (origin, neighbors) in expected {
            let entry = &lsr.link_state_db[origin];
            let got: BTreeSet<&str> = entry.neighbors.keys().map(String::as_str).collect();
            let want: BTreeSet<&str> = neighbors.iter().copied().collect();
            assert_eq!(got, want, "wrong neighbour set for {origin} at {node}");
        }
    }
}

/// Equal-cost paths resolve to the lexicographically smaller live neighbour,
/// so the diagonal route is stable across runs.
#[test]
fn tie_break_is_deterministic() {
    let mut net = common::graphs::vnet_square();
    net.run_for(30);

    assert_eq!(net.next_hop("A", "C"), Some("B".to_owned()));
    assert_eq!(net.next_hop("A", "B"), Some("B".to_owned()));
    assert_eq!(net.next_hop("A", "D"), Some("D".to_owned()));

    // a "restart": an identically configured second network lands on the
    // same tables
    let mut again = common::graphs::vnet_square();
    again.run_for(30);
    for node in ["A", "B", "C", "D"] {
        assert_eq!(
            net.routers[node].algorithm.routing_table(),
            again.routers[node].algorithm.routing_table(),
            "tables diverged at {node}"
        );
    }
}

/// Everyone learns everyone: four nodes in every area set, full tables.
#[test]
fn all_nodes_become_routable() {
    let mut net = common::graphs::vnet_square();
    net.run_for(30);

    for node in ["A", "B", "C", "D"] {
        let lsr = net.lsr(node);
        assert_eq!(lsr.area_routers.len(), 4);
        assert_eq!(lsr.routing_table().len(), 3, "missing routes at {node}");
    }
}
